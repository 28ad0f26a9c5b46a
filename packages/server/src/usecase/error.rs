//! UseCase errors.
//!
//! The `Display` text of each variant is the failure message returned to the client.

use dengon_shared::notifier::SendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubmitError {
    /// The request carried an empty message
    #[error("Message content must not be empty")]
    EmptyMessage,

    /// The notification sink rejected the message
    #[error("Failed to send message: {0}")]
    SendFailed(#[from] SendError),
}
