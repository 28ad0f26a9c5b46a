//! Consumer of decoded feed messages.

use crate::message::RelayMessage;

/// Receives every decoded [`RelayMessage`].
///
/// Called synchronously on the read task; nothing is decoded until `handle` returns.
/// Implementations must not block, and in particular must not wait on the feed
/// connection they are fed from. Hand work off to a channel instead.
pub trait FeedHandler: Send + Sync {
    fn handle(&self, message: RelayMessage);
}

impl<F> FeedHandler for F
where
    F: Fn(RelayMessage) + Send + Sync,
{
    fn handle(&self, message: RelayMessage) {
        self(message)
    }
}
