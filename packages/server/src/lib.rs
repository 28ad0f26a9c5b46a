//! WebSocket fan-out server for the dengon relay.
//!
//! Accepts WebSocket sessions, broadcasts relayed items to every session and
//! forwards client-submitted messages to the notification sink.

// layers
pub mod domain;
pub mod infrastructure;
pub mod ui;
pub mod usecase;
