//! 接続中セッションの管理とブロードキャストの実装
//!
//! ## 責務
//!
//! - 接続中セッションの送信チャンネル (`mpsc::Sender`) を保持
//! - 全セッションへのブロードキャスト
//!
//! ## 設計ノート
//!
//! 各セッションのソケットへの書き込みは UI 層の writer タスクが行う。
//! ここではチャンネルへの `try_send` のみを行うため、ロック中にネットワーク I/O は発生しない。
//! チャンネルが満杯 (遅いクライアント) または閉じている (切断済み) 場合は書き込み失敗とみなし、
//! 同じブロードキャスト内で登録解除とクローズを行う。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use crate::domain::{BroadcastReport, Broadcaster, ConnectionId};

/// Capacity of each session's outbound queue
pub const OUTBOUND_BUFFER: usize = 64;

/// Handle to one registered session
#[derive(Debug, Clone)]
pub struct Connection {
    /// Outbound queue drained by the session's writer task
    sender: mpsc::Sender<String>,
    /// Cancelled when the session must close
    closer: CancellationToken,
}

impl Connection {
    pub fn new(sender: mpsc::Sender<String>, closer: CancellationToken) -> Self {
        Self { sender, closer }
    }

    fn close(&self) {
        self.closer.cancel();
    }
}

/// Registry of live sessions guarded by a single lock
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: Mutex<HashMap<ConnectionId, Connection>>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session
    pub async fn add(&self, id: ConnectionId, connection: Connection) {
        let mut connections = self.connections.lock().await;
        connections.insert(id, connection);
        tracing::info!(
            "Connection '{}' registered, {} connection(s) active",
            id,
            connections.len()
        );
    }

    /// Deregister and close a session. Returns `false` if it was already gone.
    pub async fn remove(&self, id: &ConnectionId) -> bool {
        let mut connections = self.connections.lock().await;
        match connections.remove(id) {
            Some(connection) => {
                connection.close();
                tracing::info!(
                    "Connection '{}' removed, {} connection(s) active",
                    id,
                    connections.len()
                );
                true
            }
            None => false,
        }
    }

    /// Number of registered sessions
    pub async fn len(&self) -> usize {
        self.connections.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.lock().await.is_empty()
    }

    /// Whether `id` is currently registered
    pub async fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.lock().await.contains_key(id)
    }
}

#[async_trait]
impl Broadcaster for ConnectionManager {
    async fn broadcast(&self, payload: &str) -> BroadcastReport {
        let mut connections = self.connections.lock().await;
        let mut report = BroadcastReport::default();

        connections.retain(|id, connection| {
            match connection.sender.try_send(payload.to_string()) {
                Ok(()) => {
                    report.delivered += 1;
                    true
                }
                Err(e) => {
                    // No retry after a failed write: drop and close in this pass.
                    tracing::warn!("Broadcast to connection '{}' failed: {}", id, e);
                    connection.close();
                    report.removed += 1;
                    false
                }
            }
        });

        tracing::debug!(
            "Broadcast delivered to {} connection(s), removed {}",
            report.delivered,
            report.removed
        );
        report
    }
}
