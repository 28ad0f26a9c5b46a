//! Outbound notification sink.
//!
//! ## 概要
//!
//! 転送対象のテキストを外部のメッセージング API に送信するためのインターフェース。
//! 送信先は既定の宛先、または明示的に指定された宛先のいずれか。
//!
//! ## 実装
//!
//! - `telegram`: Telegram Bot API (`sendMessage`) を使った実装
//!
//! リトライは行わない。リトライ方針は呼び出し側の責務。

pub mod telegram;

use async_trait::async_trait;
use thiserror::Error;

pub use telegram::{DEFAULT_API_BASE, TelegramNotifier};

/// Errors reported by a [`NotificationSink`]
#[derive(Debug, Error)]
pub enum SendError {
    /// Bot token is not configured
    #[error("bot token is not configured")]
    MissingToken,

    /// Neither an explicit nor a default destination is available
    #[error("no destination chat configured")]
    NoDestination,

    /// The endpoint answered with a non-success status
    #[error("endpoint responded with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Network or protocol failure before a response was received
    #[error("transport error: {0}")]
    Transport(#[source] reqwest::Error),
}

/// Sink for relayed text
///
/// Implementations are stateless after construction and safe to share
/// between tasks behind an `Arc`.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Send `text` to `destination`, or to the default destination when `None`.
    async fn send(&self, text: &str, destination: Option<&str>) -> Result<(), SendError>;
}

/// Normalize a destination chat identifier.
///
/// Group and channel ids are negative on the Bot API, so a bare number gets a
/// leading `-`. Usernames (containing `@`) and already-negative ids are kept.
///
/// # Examples
///
/// ```
/// use dengon_shared::notifier::normalize_chat_id;
///
/// assert_eq!(normalize_chat_id("123"), "-123");
/// assert_eq!(normalize_chat_id("-123"), "-123");
/// assert_eq!(normalize_chat_id("@name"), "@name");
/// ```
pub fn normalize_chat_id(chat_id: &str) -> String {
    if chat_id.starts_with('-') || chat_id.contains('@') {
        chat_id.to_string()
    } else {
        format!("-{}", chat_id)
    }
}
