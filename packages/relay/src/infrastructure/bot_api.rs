//! Telegram Bot API upstream
//!
//! - `getChat?chat_id=@handle` でハンドルを数値 ID に解決する ([`PeerDirectory`])
//! - `getUpdates` のロングポーリングでチャンネル投稿を取得する ([`UpdateSource`])
//!
//! `ok: false` のレスポンスは HTTP ステータスに関わらず API エラーとして扱う。
//! エラーには URL (トークンを含む) を残さない。

use std::{collections::VecDeque, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use dengon_shared::{notifier::DEFAULT_API_BASE, time::Clock};

use crate::domain::{
    InboundEvent, PeerDirectory, ResolveError, SourceId, UpdateSource, UpstreamError,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default long-poll timeout for `getUpdates`
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Bot API response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: SourceId,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    channel_post: Option<ChannelPost>,
}

#[derive(Debug, Deserialize)]
struct ChannelPost {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
}

#[derive(Debug, Serialize)]
struct GetUpdatesBody<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

/// Bot API client shared by handle resolution and update polling
#[derive(Clone)]
pub struct BotApiUpstream {
    client: reqwest::Client,
    api_base: String,
    token: String,
}

impl std::fmt::Debug for BotApiUpstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotApiUpstream")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl BotApiUpstream {
    pub fn new(token: impl Into<String>) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport_error)?;

        Ok(Self {
            client,
            api_base: DEFAULT_API_BASE.to_string(),
            token: token.into(),
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Long-poll stream of channel posts, stamped with `clock` at arrival
    pub fn updates(&self, clock: Arc<dyn Clock>, poll_timeout: Duration) -> BotApiUpdates {
        BotApiUpdates {
            api: self.clone(),
            clock,
            poll_timeout,
            offset: 0,
            pending: VecDeque::new(),
        }
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn get_chat(&self, handle: &str) -> Result<Chat, UpstreamError> {
        let request = self
            .client
            .get(self.endpoint("getChat"))
            .query(&[("chat_id", format!("@{}", handle))]);
        call(request).await
    }

    async fn get_updates(
        &self,
        offset: i64,
        poll_timeout: Duration,
    ) -> Result<Vec<Update>, UpstreamError> {
        let body = GetUpdatesBody {
            offset,
            timeout: poll_timeout.as_secs(),
            allowed_updates: &["channel_post"],
        };
        let request = self
            .client
            .post(self.endpoint("getUpdates"))
            .timeout(poll_timeout + REQUEST_TIMEOUT)
            .json(&body);
        call(request).await
    }
}

/// The request URL carries the bot token, so it is stripped before formatting
fn transport_error(e: reqwest::Error) -> UpstreamError {
    UpstreamError::Transport(e.without_url().to_string())
}

/// Send one request and unwrap the Bot API envelope
async fn call<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, UpstreamError> {
    let response = request
        .send()
        .await
        .map_err(transport_error)?;
    let status = response.status();
    let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
        UpstreamError::Decode(format!("HTTP {}: {}", status.as_u16(), e.without_url()))
    })?;

    match envelope {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse { ok: true, .. } => {
            Err(UpstreamError::Decode("response has no result".to_string()))
        }
        ApiResponse {
            error_code,
            description,
            ..
        } => Err(UpstreamError::Api {
            code: error_code.unwrap_or_else(|| i64::from(status.as_u16())),
            description: description.unwrap_or_default(),
        }),
    }
}

#[async_trait]
impl PeerDirectory for BotApiUpstream {
    async fn resolve_domain(&self, handle: &str) -> Result<SourceId, ResolveError> {
        self.get_chat(handle)
            .await
            .map(|chat| chat.id)
            .map_err(|e| ResolveError::Lookup {
                handle: handle.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Channel posts from `getUpdates`, one event at a time
pub struct BotApiUpdates {
    api: BotApiUpstream,
    clock: Arc<dyn Clock>,
    poll_timeout: Duration,
    /// Next update id to request; every received update is acknowledged
    offset: i64,
    pending: VecDeque<InboundEvent>,
}

impl BotApiUpdates {
    pub fn offset(&self) -> i64 {
        self.offset
    }
}

#[async_trait]
impl UpdateSource for BotApiUpdates {
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, UpstreamError> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Ok(Some(event));
            }

            let updates = self.api.get_updates(self.offset, self.poll_timeout).await?;
            let received_at = self.clock.now_millis();
            for update in updates {
                self.offset = self.offset.max(update.update_id + 1);
                let Some(post) = update.channel_post else {
                    continue;
                };
                let text = post.text.or(post.caption).unwrap_or_default();
                self.pending
                    .push_back(InboundEvent::new(post.chat.id, text, received_at));
            }
        }
    }
}
