//! Channel relay for dengon.
//!
//! Resolves the monitored source handles, filters inbound channel posts and relays
//! the accepted ones to the notification sink and the WebSocket fan-out server.

pub mod config;

// layers
pub mod domain;
pub mod infrastructure;
pub mod usecase;
