//! UseCase layer of the broadcast server.

mod error;
mod submit_message;

pub use error::SubmitError;
pub use submit_message::SubmitMessageUseCase;
