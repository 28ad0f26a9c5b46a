//! Telegram Bot API を使った NotificationSink 実装
//!
//! `POST {api_base}/bot{token}/sendMessage` に `{"chat_id": ..., "text": ...}` を送信する。
//! 1 回の送信につき HTTP リクエストは 1 回のみ。

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::{NotificationSink, SendError, normalize_chat_id};

/// Default Bot API host
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
}

/// Notification sink backed by the Telegram Bot API
pub struct TelegramNotifier {
    client: reqwest::Client,
    api_base: String,
    token: String,
    default_chat_id: Option<String>,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base", &self.api_base)
            .field("default_chat_id", &self.default_chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    /// Create a new notifier
    ///
    /// # Arguments
    ///
    /// * `token` - Bot token, must not be empty
    /// * `default_chat_id` - Destination used when a send has no explicit one
    pub fn new(
        token: impl Into<String>,
        default_chat_id: Option<String>,
    ) -> Result<Self, SendError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(SendError::MissingToken);
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SendError::Transport(e.without_url()))?;

        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            default_chat_id: default_chat_id.filter(|id| !id.is_empty()),
        })
    }

    /// Point the notifier at another API host (tests, self-hosted Bot API servers)
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    async fn send(&self, text: &str, destination: Option<&str>) -> Result<(), SendError> {
        let chat_id = destination
            .filter(|id| !id.is_empty())
            .or(self.default_chat_id.as_deref())
            .map(normalize_chat_id)
            .ok_or(SendError::NoDestination)?;

        let body = SendMessageBody {
            chat_id: &chat_id,
            text,
        };

        // The URL carries the bot token, so it is stripped from transport errors.
        let response = self
            .client
            .post(self.endpoint())
            .json(&body)
            .send()
            .await
            .map_err(|e| SendError::Transport(e.without_url()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SendError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(chat_id = %chat_id, "Notification delivered");
        Ok(())
    }
}
