//! In-process tests for the WebSocket relay server.
//!
//! The server is bound to an ephemeral port and driven with a tokio-tungstenite client.

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;

use dengon_server::{
    domain::Broadcaster,
    infrastructure::{ConnectionManager, dto::websocket::SendResponse},
    ui::Server,
    usecase::SubmitMessageUseCase,
};
use dengon_shared::notifier::{NotificationSink, SendError};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Sink that records calls and replays scripted outcomes (status codes), then succeeds
#[derive(Default)]
struct ScriptedSink {
    calls: Mutex<Vec<(String, Option<String>)>>,
    failures: Mutex<VecDeque<u16>>,
}

impl ScriptedSink {
    fn failing_once(status: u16) -> Self {
        let sink = Self::default();
        sink.failures.lock().unwrap().push_back(status);
        sink
    }

    fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for ScriptedSink {
    async fn send(&self, text: &str, destination: Option<&str>) -> Result<(), SendError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), destination.map(str::to_string)));
        match self.failures.lock().unwrap().pop_front() {
            Some(status) => Err(SendError::Status {
                status,
                body: "scripted failure".to_string(),
            }),
            None => Ok(()),
        }
    }
}

/// Helper struct to manage server lifecycle
struct TestServer {
    addr: SocketAddr,
    connections: Arc<ConnectionManager>,
    cancel: CancellationToken,
}

impl TestServer {
    async fn start(sink: Arc<ScriptedSink>) -> Self {
        let connections = Arc::new(ConnectionManager::new());
        let usecase = Arc::new(SubmitMessageUseCase::new(sink));
        let listener = Server::bind("127.0.0.1", 0).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let cancel = CancellationToken::new();

        let server = Server::new(connections.clone(), usecase);
        let server_cancel = cancel.clone();
        tokio::spawn(async move {
            server.serve(listener, server_cancel).await.unwrap();
        });

        TestServer {
            addr,
            connections,
            cancel,
        }
    }

    fn url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }

    /// Connect and consume the welcome frame
    async fn connect(&self) -> Client {
        let (mut client, _) = connect_async(self.url()).await.unwrap();
        let welcome = next_response(&mut client).await;
        assert_eq!(welcome, SendResponse::welcome());
        client
    }

    async fn wait_for_connections(&self, expected: usize) {
        let deadline = tokio::time::Instant::now() + READ_TIMEOUT;
        while self.connections.len().await != expected {
            assert!(
                tokio::time::Instant::now() < deadline,
                "expected {} connection(s)",
                expected
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let frame = tokio::time::timeout(READ_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("read error");
        if let Message::Text(text) = frame {
            return text.to_string();
        }
    }
}

async fn next_response(client: &mut Client) -> SendResponse {
    serde_json::from_str(&next_text(client).await).unwrap()
}

async fn send_text(client: &mut Client, text: &str) {
    client.send(Message::Text(text.into())).await.unwrap();
}

#[tokio::test]
async fn test_client_receives_welcome_and_is_registered() {
    // テスト項目: 接続直後にウェルカムメッセージを受信し、接続が登録される
    // given (前提条件):
    let server = TestServer::start(Arc::new(ScriptedSink::default())).await;

    // when (操作):
    let _client = server.connect().await;

    // then (期待する結果):
    assert_eq!(server.connections.len().await, 1);
}

#[tokio::test]
async fn test_sequential_requests_get_ordered_responses_even_after_failure() {
    // テスト項目: 同一接続で 2 件のリクエストを送ると、1 件目の送信が失敗しても 2 件のレスポンスが順番通りに返る
    // given (前提条件):
    let sink = Arc::new(ScriptedSink::failing_once(502));
    let server = TestServer::start(sink.clone()).await;
    let mut client = server.connect().await;

    // when (操作):
    send_text(&mut client, r#"{"message":"first"}"#).await;
    send_text(&mut client, r#"{"message":"second","chat_id":"123"}"#).await;
    let first = next_response(&mut client).await;
    let second = next_response(&mut client).await;

    // then (期待する結果):
    assert!(!first.success);
    assert!(first.message.starts_with("Failed to send message: "));
    assert!(first.message.contains("502"));
    assert_eq!(second, SendResponse::success("Message sent"));
    assert_eq!(
        sink.calls(),
        vec![
            ("first".to_string(), None),
            ("second".to_string(), Some("123".to_string())),
        ]
    );
}

#[tokio::test]
async fn test_malformed_json_gets_failure_and_connection_stays_open() {
    // テスト項目: 不正な JSON には失敗レスポンスが返り、接続は維持される
    // given (前提条件):
    let sink = Arc::new(ScriptedSink::default());
    let server = TestServer::start(sink.clone()).await;
    let mut client = server.connect().await;

    // when (操作):
    send_text(&mut client, "not json").await;
    let invalid = next_response(&mut client).await;
    send_text(&mut client, r#"{"message":"still here"}"#).await;
    let valid = next_response(&mut client).await;

    // then (期待する結果):
    assert_eq!(invalid, SendResponse::failure("Invalid message format"));
    assert!(valid.success);
    assert_eq!(sink.calls().len(), 1);
}

#[tokio::test]
async fn test_empty_message_gets_failure_without_send() {
    // テスト項目: 空メッセージには失敗レスポンスが返り、送信は行われない
    // given (前提条件):
    let sink = Arc::new(ScriptedSink::default());
    let server = TestServer::start(sink.clone()).await;
    let mut client = server.connect().await;

    // when (操作):
    send_text(&mut client, r#"{"message":""}"#).await;
    let response = next_response(&mut client).await;

    // then (期待する結果):
    assert_eq!(
        response,
        SendResponse::failure("Message content must not be empty")
    );
    assert!(sink.calls().is_empty());
}

#[tokio::test]
async fn test_binary_frames_are_ignored() {
    // テスト項目: バイナリフレームは無視され、レスポンスは返らない
    // given (前提条件):
    let server = TestServer::start(Arc::new(ScriptedSink::default())).await;
    let mut client = server.connect().await;

    // when (操作):
    client
        .send(Message::Binary(vec![1u8, 2, 3].into()))
        .await
        .unwrap();
    send_text(&mut client, r#"{"message":"after binary"}"#).await;
    let response = next_response(&mut client).await;

    // then (期待する結果): 最初に返るのはテキストリクエストへのレスポンス
    assert_eq!(response, SendResponse::success("Message sent"));
}

#[tokio::test]
async fn test_broadcast_reaches_every_client() {
    // テスト項目: ブロードキャストが接続中の全クライアントに届く
    // given (前提条件):
    let server = TestServer::start(Arc::new(ScriptedSink::default())).await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    server.wait_for_connections(2).await;

    // when (操作):
    let report = server.connections.broadcast(r#"{"text":"news"}"#).await;

    // then (期待する結果):
    assert_eq!(report.delivered, 2);
    assert_eq!(next_text(&mut alice).await, r#"{"text":"news"}"#);
    assert_eq!(next_text(&mut bob).await, r#"{"text":"news"}"#);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_welcome_precedes_concurrent_broadcasts() {
    // テスト項目: ブロードキャストが流れ続けている間に接続しても、最初に届くフレームはウェルカムメッセージ
    // given (前提条件): 別タスクがブロードキャストを送り続ける
    let server = TestServer::start(Arc::new(ScriptedSink::default())).await;
    let stop = CancellationToken::new();
    let broadcaster = {
        let connections = server.connections.clone();
        let stop = stop.clone();
        tokio::spawn(async move {
            while !stop.is_cancelled() {
                connections.broadcast(r#"{"text":"news"}"#).await;
                tokio::task::yield_now().await;
            }
        })
    };

    // when (操作):
    let mut first_frames = Vec::new();
    for _ in 0..100 {
        let (mut client, _) = connect_async(server.url()).await.unwrap();
        first_frames.push(next_text(&mut client).await);
    }
    stop.cancel();
    broadcaster.await.unwrap();

    // then (期待する結果):
    let welcome = SendResponse::welcome().to_json();
    assert!(first_frames.iter().all(|frame| *frame == welcome));
}

#[tokio::test]
async fn test_client_close_deregisters_connection() {
    // テスト項目: クライアントが切断すると接続の登録が解除される
    // given (前提条件):
    let server = TestServer::start(Arc::new(ScriptedSink::default())).await;
    let mut client = server.connect().await;
    server.wait_for_connections(1).await;

    // when (操作):
    client.close(None).await.unwrap();

    // then (期待する結果):
    server.wait_for_connections(0).await;
}

#[tokio::test]
async fn test_health_check_reports_connection_count() {
    // テスト項目: ヘルスチェックが接続数を返す
    // given (前提条件):
    let server = TestServer::start(Arc::new(ScriptedSink::default())).await;
    let _client = server.connect().await;
    server.wait_for_connections(1).await;

    // when (操作):
    let body: serde_json::Value = reqwest::get(format!("http://{}/api/health", server.addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    // then (期待する結果):
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 1);
}

#[tokio::test]
async fn test_shutdown_closes_open_sessions() {
    // テスト項目: サーバーのキャンセルで接続中のセッションが終了する
    // given (前提条件):
    let server = TestServer::start(Arc::new(ScriptedSink::default())).await;
    let mut client = server.connect().await;
    server.wait_for_connections(1).await;

    // when (操作):
    server.cancel.cancel();

    // then (期待する結果): クライアント側のストリームが Close またはエラー / 終了になる
    let ended = tokio::time::timeout(READ_TIMEOUT, async {
        loop {
            match client.next().await {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(ended.is_ok());
    server.wait_for_connections(0).await;
}
