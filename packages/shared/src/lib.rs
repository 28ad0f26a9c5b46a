//! Shared building blocks for the dengon relay.
//!
//! - `logger`: tracing subscriber setup for every binary
//! - `time`: clock abstraction and timestamp formatting
//! - `notifier`: the outbound notification sink (Telegram Bot API)
//! - `shutdown`: process-wide cancellation driven by OS signals

pub mod logger;
pub mod notifier;
pub mod shutdown;
pub mod time;
