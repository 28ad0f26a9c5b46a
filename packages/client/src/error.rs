//! Error types for the feed client.

use std::time::Duration;

use thiserror::Error;

/// Connection-level errors; every one of them except `InvalidUrl` leads to a reconnect
#[derive(Debug, Error)]
pub enum ClientError {
    /// The feed URL cannot be turned into a WebSocket request
    #[error("invalid feed URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Connection error
    #[error("connection error: {0}")]
    Connect(String),

    /// The handshake did not finish in time
    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),

    /// Read error on an established session
    #[error("read error: {0}")]
    Read(String),

    /// The feed closed the session
    #[error("connection closed by peer")]
    ClosedByPeer,
}

/// Frame-level errors; the frame is dropped and the session continues
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to decode feed message: {0}")]
    Decode(#[from] serde_json::Error),
}
