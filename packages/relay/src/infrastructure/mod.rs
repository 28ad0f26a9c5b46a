//! Infrastructure layer of the relay.

pub mod bot_api;

pub use bot_api::{BotApiUpdates, BotApiUpstream, DEFAULT_POLL_TIMEOUT};
