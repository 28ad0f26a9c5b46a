//! Resilient WebSocket feed client.
//!
//! Connects to a remote feed, decodes every frame as a [`RelayMessage`] and hands it to a
//! [`FeedHandler`]. Read and connect failures lead to a reconnect after a fixed backoff until
//! the client is cancelled.

pub mod domain;
pub mod error;
pub mod formatter;
pub mod handler;
pub mod message;
mod runner;
mod session;

pub use domain::ConnectionState;
pub use error::{ClientError, FeedError};
pub use handler::FeedHandler;
pub use message::RelayMessage;
pub use runner::{DEFAULT_BACKOFF, FeedClient, FeedClientConfig, FeedClientHandle};
pub use session::CLOSE_TIMEOUT;
