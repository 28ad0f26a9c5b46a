//! UseCase errors.

use dengon_shared::notifier::SendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    /// The notification sink rejected the relayed text
    #[error("Failed to relay message: {0}")]
    Sink(#[from] SendError),
}
