//! Feed message DTO.
//!
//! Wire format (one JSON object per frame):
//!
//! ```json
//! {"source_name": "...", "news_title": "...", "coins_included": ["BTC"], "url": "...", "timestamp": 1700000000000}
//! ```
//!
//! Missing fields and `null` tag lists decode to their defaults.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::FeedError;

/// One message from the relay feed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayMessage {
    pub source_name: String,
    #[serde(rename = "news_title")]
    pub title: String,
    #[serde(rename = "coins_included", deserialize_with = "null_as_empty")]
    pub tags: Vec<String>,
    pub url: String,
    #[serde(rename = "timestamp")]
    pub timestamp_millis: i64,
}

impl RelayMessage {
    /// Decode one frame payload
    pub fn decode(payload: &[u8]) -> Result<Self, FeedError> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// A message with neither a source nor a title carries nothing worth relaying
    pub fn is_empty(&self) -> bool {
        self.source_name.is_empty() && self.title.is_empty()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
