//! WebSocket frame DTOs.

use serde::{Deserialize, Serialize};

/// Welcome text written to every new session
pub const WELCOME_MESSAGE: &str = "Connected to dengon notification relay";

/// Acknowledgement text for a delivered submission
pub const SENT_MESSAGE: &str = "Message sent";

/// Failure text for an undecodable frame
pub const INVALID_FORMAT_MESSAGE: &str = "Invalid message format";

/// Client-submitted message
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SendRequest {
    /// Text to forward
    pub message: String,
    /// Optional explicit destination, default destination when absent or empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
}

/// Acknowledgement written back for each request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SendResponse {
    pub success: bool,
    pub message: String,
}

impl SendResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }

    pub fn welcome() -> Self {
        Self::success(WELCOME_MESSAGE)
    }

    /// Serialize to the JSON text frame body
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            tracing::error!("Failed to serialize response: {}", e);
            String::from(r#"{"success":false,"message":"internal error"}"#)
        })
    }
}
