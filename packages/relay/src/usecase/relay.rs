//! RelayOrchestrator
//!
//! ## 責務
//!
//! - 上流イベントを監視対象ソースで絞り込み、通知先 (NotificationSink) へ転送する
//! - フィードのメッセージを整形して通知先へ転送する
//! - 転送した内容を接続中の WebSocket クライアントへブロードキャストする (Broadcaster が設定されている場合)
//!
//! ## 設計ノート
//!
//! 上流イベントは 1 件ごとに独立したタスクで処理する。
//! フィードのハンドラは読み取りタスク上で同期的に呼ばれるため、チャンネルへの push のみを行い、
//! 送信は `run_feed_forwarder` が別タスクで行う。
//! 送信の失敗はログに記録して呼び出し元へ返すのみで、リトライは行わない。

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use tokio::{sync::mpsc, task::JoinSet};
use tokio_util::sync::CancellationToken;

use dengon_client::{FeedHandler, RelayMessage, formatter::MessageFormatter};
use dengon_server::domain::Broadcaster;
use dengon_shared::{notifier::NotificationSink, time::Clock};

use super::{
    error::RelayError,
    filter_event::{DropReason, ForwardDecision, should_forward},
    resolve_source::SourceResolver,
};
use crate::domain::{InboundEvent, UpdateSource};

/// Wait before polling the upstream again after an error
pub const UPSTREAM_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Where a relayed item came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Channel,
    Feed,
}

/// Payload broadcast to WebSocket subscribers for every relayed item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayedNotice {
    pub origin: Origin,
    pub text: String,
    /// Unix timestamp at arrival (milliseconds)
    pub received_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayOutcome {
    Forwarded,
    Dropped(DropReason),
}

/// Text sent to the sink for a forwarded channel post
pub fn format_channel_notification(text: &str, received_at_millis: i64) -> String {
    format!("{}\nTimestamp: {}", text, received_at_millis)
}

pub struct RelayOrchestrator {
    resolver: Arc<SourceResolver>,
    handles: Vec<String>,
    sink: Arc<dyn NotificationSink>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    clock: Arc<dyn Clock>,
    retry_delay: Duration,
}

impl RelayOrchestrator {
    /// Create a new orchestrator
    ///
    /// # Arguments
    ///
    /// * `resolver` - Resolver for the monitored handles
    /// * `handles` - Monitored source handles, `@` optional
    /// * `sink` - Destination for relayed text (its default destination is used)
    /// * `clock` - Arrival time source for feed messages
    pub fn new(
        resolver: Arc<SourceResolver>,
        handles: Vec<String>,
        sink: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver,
            handles,
            sink,
            broadcaster: None,
            clock,
            retry_delay: UPSTREAM_RETRY_DELAY,
        }
    }

    /// Also broadcast every relayed item
    pub fn with_broadcaster(mut self, broadcaster: Arc<dyn Broadcaster>) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    /// Override the wait after an upstream error
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Filter one upstream event and relay it if it comes from a monitored source.
    ///
    /// Cached identities are checked first. Unresolved handles are only looked up when the
    /// event matches none of them.
    pub async fn handle_event(&self, event: InboundEvent) -> Result<RelayOutcome, RelayError> {
        let mut sources = self.resolver.cached_sources(&self.handles).await;
        let matched = sources.iter().any(|s| s.matches(event.source_id));
        if !matched && sources.iter().any(|s| s.resolved_id.is_none()) {
            sources = self.resolver.resolve_all(&self.handles).await;
        }

        let text = match should_forward(&event, &sources) {
            ForwardDecision::Forward(text) => text,
            ForwardDecision::Drop(reason) => {
                tracing::debug!("Dropped event: {}", reason);
                return Ok(RelayOutcome::Dropped(reason));
            }
        };

        let notification = format_channel_notification(&text, event.received_at_millis);
        let notice = RelayedNotice {
            origin: Origin::Channel,
            text,
            received_at: event.received_at_millis,
        };
        self.deliver(&notification, &notice).await
    }

    /// Relay one feed message, stamped with the current time
    pub async fn handle_feed_message(
        &self,
        message: RelayMessage,
    ) -> Result<RelayOutcome, RelayError> {
        if message.is_empty() {
            tracing::debug!("Dropped empty feed message");
            return Ok(RelayOutcome::Dropped(DropReason::EmptyText));
        }

        let received_at = self.clock.now_millis();
        let notification = MessageFormatter::format_feed_notification(&message, received_at);
        let notice = RelayedNotice {
            origin: Origin::Feed,
            text: notification.clone(),
            received_at,
        };
        self.deliver(&notification, &notice).await
    }

    /// Send to the sink, then broadcast regardless of the sink result
    async fn deliver(
        &self,
        notification: &str,
        notice: &RelayedNotice,
    ) -> Result<RelayOutcome, RelayError> {
        let sent = self.sink.send(notification, None).await;

        if let Some(broadcaster) = &self.broadcaster {
            match serde_json::to_string(notice) {
                Ok(payload) => {
                    broadcaster.broadcast(&payload).await;
                }
                Err(e) => tracing::error!("Failed to encode relayed notice: {}", e),
            }
        }

        match sent {
            Ok(()) => {
                tracing::info!("Relayed {:?} message", notice.origin);
                Ok(RelayOutcome::Forwarded)
            }
            Err(e) => {
                tracing::warn!("Failed to send {:?} message: {}", notice.origin, e);
                Err(e.into())
            }
        }
    }

    /// Pull events from `source` until it ends or `cancel` fires.
    ///
    /// Each event is handled on its own task. In-flight tasks are awaited before returning.
    pub async fn run_upstream<S: UpdateSource>(
        self: Arc<Self>,
        mut source: S,
        cancel: CancellationToken,
    ) {
        let mut tasks = JoinSet::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                next = source.next_event() => next,
            };

            match next {
                Ok(Some(event)) => {
                    let this = self.clone();
                    tasks.spawn(async move {
                        // Failures are already logged by `deliver`
                        let _ = this.handle_event(event).await;
                    });
                }
                Ok(None) => {
                    tracing::info!("Upstream ended");
                    break;
                }
                Err(e) => {
                    tracing::warn!("{}. Retrying in {:?}", e, self.retry_delay);
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.retry_delay) => {}
                    }
                }
            }

            while tasks.try_join_next().is_some() {}
        }

        while tasks.join_next().await.is_some() {}
        tracing::info!("Upstream relay stopped");
    }

    /// Feed handler that only queues messages for [`Self::run_feed_forwarder`]
    pub fn feed_handler() -> (Arc<dyn FeedHandler>, mpsc::UnboundedReceiver<RelayMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler: Arc<dyn FeedHandler> = Arc::new(move |message: RelayMessage| {
            if tx.send(message).is_err() {
                tracing::debug!("Feed forwarder stopped, dropping message");
            }
        });
        (handler, rx)
    }

    /// Relay queued feed messages until the queue closes or `cancel` fires
    pub async fn run_feed_forwarder(
        &self,
        mut rx: mpsc::UnboundedReceiver<RelayMessage>,
        cancel: CancellationToken,
    ) {
        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                message = rx.recv() => message,
            };
            let Some(message) = message else {
                break;
            };
            let _ = self.handle_feed_message(message).await;
        }
        tracing::info!("Feed forwarder stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex};

    use async_trait::async_trait;
    use dengon_server::domain::BroadcastReport;
    use dengon_shared::{notifier::SendError, time::FixedClock};

    use super::*;
    use crate::domain::{
        MockPeerDirectory, MockUpdateSource, PeerDirectory, ResolveError, SourceId, UpstreamError,
    };

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - 上流イベント / フィードメッセージの転送判定と送信・ブロードキャスト
    //
    // 【なぜこのテストが必要か】
    // - 監視対象ソースからのイベントだけが 1 回だけ送信されることを保証する
    // - 送信の失敗が呼び出し元に報告され、ブロードキャストは継続されることを保証する
    // ========================================

    /// NotificationSink that records every call
    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(String, Option<String>)>>,
        fail: bool,
    }

    impl RecordingSink {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn texts(&self) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .map(|(text, _)| text.clone())
                .collect()
        }
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, text: &str, destination: Option<&str>) -> Result<(), SendError> {
            self.calls
                .lock()
                .unwrap()
                .push((text.to_string(), destination.map(str::to_string)));
            if self.fail {
                return Err(SendError::Status {
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(())
        }
    }

    /// Broadcaster that records every payload
    #[derive(Default)]
    struct RecordingBroadcaster {
        payloads: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Broadcaster for RecordingBroadcaster {
        async fn broadcast(&self, payload: &str) -> BroadcastReport {
            self.payloads.lock().unwrap().push(payload.to_string());
            BroadcastReport {
                delivered: 1,
                removed: 0,
            }
        }
    }

    /// Directory that answers `BWENews` at once and never answers any other handle
    struct StalledDirectory;

    #[async_trait]
    impl PeerDirectory for StalledDirectory {
        async fn resolve_domain(&self, handle: &str) -> Result<SourceId, ResolveError> {
            match handle {
                "BWENews" => Ok(42),
                _ => std::future::pending().await,
            }
        }
    }

    fn directory(id: i64) -> MockPeerDirectory {
        let mut directory = MockPeerDirectory::new();
        directory
            .expect_resolve_domain()
            .times(1)
            .returning(move |_| Ok(id));
        directory
    }

    /// Directory without a call-count expectation (event tasks may race on the first lookup)
    fn any_directory(id: i64) -> MockPeerDirectory {
        let mut directory = MockPeerDirectory::new();
        directory.expect_resolve_domain().returning(move |_| Ok(id));
        directory
    }

    fn orchestrator(
        directory: MockPeerDirectory,
        handles: &[&str],
        sink: Arc<RecordingSink>,
    ) -> RelayOrchestrator {
        RelayOrchestrator::new(
            Arc::new(SourceResolver::new(Arc::new(directory))),
            handles.iter().map(|h| h.to_string()).collect(),
            sink,
            Arc::new(FixedClock::new(5000)),
        )
    }

    #[tokio::test]
    async fn test_monitored_event_is_sent_once_and_unmonitored_is_dropped() {
        // テスト項目: 監視対象ソース (ID 42) のイベントは 1 回送信され、ID 99 のイベントは送信されない
        // given (前提条件):
        let sink = Arc::new(RecordingSink::default());
        let relay = orchestrator(directory(42), &["@BWENews"], sink.clone());

        // when (操作):
        let forwarded = relay
            .handle_event(InboundEvent::new(42, "Hello", 1000))
            .await
            .unwrap();
        let dropped = relay
            .handle_event(InboundEvent::new(99, "Hello", 1000))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(forwarded, RelayOutcome::Forwarded);
        assert_eq!(
            dropped,
            RelayOutcome::Dropped(DropReason::UnmonitoredSource(99))
        );
        let texts = sink.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("Hello"));
        assert!(texts[0].contains("1000"));
        assert_eq!(sink.calls.lock().unwrap()[0].1, None);
    }

    #[tokio::test]
    async fn test_duplicate_handles_forward_once() {
        // テスト項目: 同じ ID に解決される重複ハンドルがあっても送信は 1 回のみ
        // given (前提条件):
        let mut directory = MockPeerDirectory::new();
        directory
            .expect_resolve_domain()
            .times(1)
            .returning(|_| Ok(42));
        let sink = Arc::new(RecordingSink::default());
        let relay = orchestrator(directory, &["BWENews", "@BWENews"], sink.clone());

        // when (操作):
        relay
            .handle_event(InboundEvent::new(42, "Hello", 1000))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(sink.texts(), vec!["Hello\nTimestamp: 1000".to_string()]);
    }

    #[tokio::test]
    async fn test_resolved_source_is_not_delayed_by_pending_lookup() {
        // テスト項目: 別のハンドルの解決が終わらなくても、解決済みソースのイベントは待たずに転送される
        // given (前提条件):
        let resolver = Arc::new(SourceResolver::new(Arc::new(StalledDirectory)));
        resolver.resolve("BWENews").await;
        let sink = Arc::new(RecordingSink::default());
        let relay = RelayOrchestrator::new(
            resolver,
            vec!["BWENews".to_string(), "stalled".to_string()],
            sink.clone(),
            Arc::new(FixedClock::new(5000)),
        );

        // when (操作):
        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            relay.handle_event(InboundEvent::new(42, "Hello", 1000)),
        )
        .await
        .expect("event waited on an unrelated lookup")
        .unwrap();

        // then (期待する結果):
        assert_eq!(outcome, RelayOutcome::Forwarded);
        assert_eq!(sink.texts(), vec!["Hello\nTimestamp: 1000".to_string()]);
    }

    #[tokio::test]
    async fn test_forwarded_event_is_broadcast() {
        // テスト項目: 転送されたイベントは RelayedNotice としてブロードキャストされる
        // given (前提条件):
        let sink = Arc::new(RecordingSink::default());
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let relay = orchestrator(directory(42), &["BWENews"], sink)
            .with_broadcaster(broadcaster.clone());

        // when (操作):
        relay
            .handle_event(InboundEvent::new(42, "Hello", 1000))
            .await
            .unwrap();

        // then (期待する結果):
        let payloads = broadcaster.payloads.lock().unwrap().clone();
        assert_eq!(payloads.len(), 1);
        let notice: RelayedNotice = serde_json::from_str(&payloads[0]).unwrap();
        assert_eq!(
            notice,
            RelayedNotice {
                origin: Origin::Channel,
                text: "Hello".to_string(),
                received_at: 1000,
            }
        );
        assert!(payloads[0].contains(r#""origin":"channel""#));
    }

    #[tokio::test]
    async fn test_sink_failure_is_reported_and_still_broadcast() {
        // テスト項目: 送信に失敗した場合はエラーが返り、ブロードキャストは行われる
        // given (前提条件):
        let sink = Arc::new(RecordingSink::failing());
        let broadcaster = Arc::new(RecordingBroadcaster::default());
        let relay = orchestrator(directory(42), &["BWENews"], sink.clone())
            .with_broadcaster(broadcaster.clone());

        // when (操作):
        let result = relay
            .handle_event(InboundEvent::new(42, "Hello", 1000))
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(RelayError::Sink(SendError::Status { status: 500, .. }))));
        assert_eq!(sink.texts().len(), 1);
        assert_eq!(broadcaster.payloads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_feed_message_is_formatted_with_clock_time() {
        // テスト項目: フィードのメッセージは Clock の時刻付きで整形されて送信される
        // given (前提条件):
        let mut directory = MockPeerDirectory::new();
        directory.expect_resolve_domain().never();
        let sink = Arc::new(RecordingSink::default());
        let relay = orchestrator(directory, &["BWENews"], sink.clone());
        let message = RelayMessage {
            source_name: "BWENews".to_string(),
            title: "Listing".to_string(),
            ..RelayMessage::default()
        };

        // when (操作):
        let outcome = relay.handle_feed_message(message).await.unwrap();

        // then (期待する結果):
        assert_eq!(outcome, RelayOutcome::Forwarded);
        assert_eq!(
            sink.texts(),
            vec!["Feed message:\nSource: BWENews\nTitle: Listing\nTimestamp: 5000".to_string()]
        );
    }

    #[tokio::test]
    async fn test_empty_feed_message_is_dropped() {
        // テスト項目: ソース名もタイトルもないフィードメッセージは送信されない
        // given (前提条件):
        let sink = Arc::new(RecordingSink::default());
        let relay = orchestrator(MockPeerDirectory::new(), &[], sink.clone());

        // when (操作):
        let outcome = relay
            .handle_feed_message(RelayMessage::default())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(outcome, RelayOutcome::Dropped(DropReason::EmptyText));
        assert!(sink.texts().is_empty());
    }

    #[tokio::test]
    async fn test_run_upstream_relays_until_source_ends() {
        // テスト項目: 上流が終了するまでイベントを処理し、監視対象のイベントのみ送信する
        // given (前提条件):
        let mut events = VecDeque::from(vec![
            InboundEvent::new(42, "first", 1),
            InboundEvent::new(99, "other", 2),
            InboundEvent::new(42, "", 3),
            InboundEvent::new(42, "second", 4),
        ]);
        let mut source = MockUpdateSource::new();
        source
            .expect_next_event()
            .times(5)
            .returning(move || Ok(events.pop_front()));
        let sink = Arc::new(RecordingSink::default());
        let relay = Arc::new(orchestrator(any_directory(42), &["BWENews"], sink.clone()));

        // when (操作):
        relay.run_upstream(source, CancellationToken::new()).await;

        // then (期待する結果): タスクの実行順は不定のため並び替えて比較する
        let mut texts = sink.texts();
        texts.sort();
        assert_eq!(
            texts,
            vec![
                "first\nTimestamp: 1".to_string(),
                "second\nTimestamp: 4".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_run_upstream_retries_after_error() {
        // テスト項目: 上流のエラー後は待機してから再度イベントを取得する
        // given (前提条件):
        let mut results: VecDeque<Result<Option<InboundEvent>, UpstreamError>> = VecDeque::from(vec![
            Err(UpstreamError::Api {
                code: 502,
                description: "Bad Gateway".to_string(),
            }),
            Ok(Some(InboundEvent::new(42, "after error", 1))),
            Ok(None),
        ]);
        let mut source = MockUpdateSource::new();
        source
            .expect_next_event()
            .times(3)
            .returning(move || results.pop_front().unwrap_or(Ok(None)));
        let sink = Arc::new(RecordingSink::default());
        let relay = Arc::new(
            orchestrator(any_directory(42), &["BWENews"], sink.clone())
                .with_retry_delay(Duration::from_millis(10)),
        );

        // when (操作):
        relay.run_upstream(source, CancellationToken::new()).await;

        // then (期待する結果):
        assert_eq!(sink.texts(), vec!["after error\nTimestamp: 1".to_string()]);
    }

    /// UpdateSource that never yields
    struct PendingSource;

    #[async_trait]
    impl UpdateSource for PendingSource {
        async fn next_event(&mut self) -> Result<Option<InboundEvent>, UpstreamError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_run_upstream_stops_on_cancel() {
        // テスト項目: キャンセルされるとイベント待ちの途中でも終了する
        // given (前提条件):
        let sink = Arc::new(RecordingSink::default());
        let relay = Arc::new(orchestrator(MockPeerDirectory::new(), &[], sink));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(relay.run_upstream(PendingSource, cancel.clone()));

        // when (操作):
        cancel.cancel();

        // then (期待する結果):
        let stopped = tokio::time::timeout(Duration::from_secs(1), task).await;
        assert!(stopped.is_ok());
    }

    #[tokio::test]
    async fn test_feed_handler_forwards_through_channel() {
        // テスト項目: フィードハンドラに渡したメッセージがフォワーダー経由で送信される
        // given (前提条件):
        let sink = Arc::new(RecordingSink::default());
        let relay = orchestrator(MockPeerDirectory::new(), &[], sink.clone());
        let (handler, rx) = RelayOrchestrator::feed_handler();

        // when (操作):
        handler.handle(RelayMessage {
            source_name: "news6551".to_string(),
            title: "Headline".to_string(),
            ..RelayMessage::default()
        });
        drop(handler);
        relay.run_feed_forwarder(rx, CancellationToken::new()).await;

        // then (期待する結果):
        let texts = sink.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("Title: Headline"));
    }
}
