//! Feed client execution logic with reconnection support.

use std::{sync::Arc, time::Duration};

use tokio::{sync::watch, task::JoinHandle};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::{ConnectionState, should_attempt_reconnect},
    error::ClientError,
    handler::FeedHandler,
    session::{self, CLOSE_TIMEOUT, FeedStream, SessionEnd},
};

/// Fixed wait between a failure and the next connect attempt
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Feed client settings
#[derive(Debug, Clone)]
pub struct FeedClientConfig {
    /// WebSocket URL of the feed (`ws://` or `wss://`)
    pub url: String,
    /// Wait between a failure and the next attempt
    pub backoff: Duration,
    /// Give up after this many consecutive failures; `None` retries forever
    pub max_reconnect_attempts: Option<u32>,
}

impl FeedClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            backoff: DEFAULT_BACKOFF,
            max_reconnect_attempts: None,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_reconnect_attempts(mut self, max: u32) -> Self {
        self.max_reconnect_attempts = Some(max);
        self
    }
}

/// WebSocket feed client that survives disconnects
pub struct FeedClient {
    config: FeedClientConfig,
    handler: Arc<dyn FeedHandler>,
    cancel: CancellationToken,
    state: watch::Sender<ConnectionState>,
}

impl FeedClient {
    /// Create a client. It stops when `cancel` (or a parent of it) is cancelled.
    pub fn new(
        config: FeedClientConfig,
        handler: Arc<dyn FeedHandler>,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            handler,
            cancel: cancel.child_token(),
            state,
        }
    }

    /// Subscribe to state transitions
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Run the supervisor on a new task
    pub fn spawn(self) -> FeedClientHandle {
        let cancel = self.cancel.clone();
        let state = self.state();
        let task = tokio::spawn(self.run());
        FeedClientHandle {
            cancel,
            state,
            task,
        }
    }

    /// Connect, read, and reconnect until cancelled or out of attempts.
    ///
    /// Returns once the client reaches [`ConnectionState::Closed`].
    pub async fn run(self) {
        if let Err(e) = self.validate_url() {
            tracing::error!("{}", e);
            self.set_state(ConnectionState::Closed);
            return;
        }

        let mut consecutive_failures: u32 = 0;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            let attempt = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                attempt = self.connect() => attempt,
            };

            let error = match attempt {
                Ok(stream) => {
                    consecutive_failures = 0;
                    match session::run_session(stream, self.handler.as_ref(), &self.cancel).await {
                        SessionEnd::Cancelled => break,
                        SessionEnd::Lost(e) => e,
                    }
                }
                Err(e) => e,
            };

            if self.cancel.is_cancelled() {
                break;
            }

            consecutive_failures += 1;
            if !should_attempt_reconnect(consecutive_failures, self.config.max_reconnect_attempts)
            {
                tracing::error!(
                    "Feed connection failed {} time(s) in a row: {}. Giving up.",
                    consecutive_failures,
                    error
                );
                break;
            }

            tracing::warn!(
                "Feed connection lost: {}. Reconnecting in {:?}...",
                error,
                self.config.backoff
            );
            self.set_state(ConnectionState::Reconnecting);

            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.backoff) => {}
            }
        }

        self.set_state(ConnectionState::Closed);
        tracing::info!("Feed client closed");
    }

    /// Establish one WebSocket session
    pub async fn connect(&self) -> Result<FeedStream, ClientError> {
        self.set_state(ConnectionState::Connecting);
        tracing::info!("Connecting to feed {}", self.config.url);

        let stream = tokio::time::timeout(CONNECT_TIMEOUT, session::connect(&self.config.url))
            .await
            .map_err(|_| ClientError::ConnectTimeout(CONNECT_TIMEOUT))??;

        self.set_state(ConnectionState::Connected);
        Ok(stream)
    }

    fn validate_url(&self) -> Result<(), ClientError> {
        self.config
            .url
            .as_str()
            .into_client_request()
            .map(|_| ())
            .map_err(|e| ClientError::InvalidUrl {
                url: self.config.url.clone(),
                reason: e.to_string(),
            })
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!("Feed client state: {:?} -> {:?}", previous, state);
        }
    }
}

/// Handle to a spawned [`FeedClient`]
pub struct FeedClientHandle {
    cancel: CancellationToken,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl FeedClientHandle {
    /// Subscribe to state transitions
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Latest published state
    pub fn current_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Stop the client: close the session and wait a bounded time for the task to finish.
    pub async fn close(self) {
        self.cancel.cancel();
        let mut task = self.task;
        if tokio::time::timeout(CLOSE_TIMEOUT * 2, &mut task)
            .await
            .is_err()
        {
            tracing::warn!("Feed client did not stop in time, aborting");
            task.abort();
        }
    }
}
