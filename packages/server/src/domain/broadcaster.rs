//! Broadcaster trait 定義
//!
//! 接続中の全セッションへペイロードを配信するためのインターフェース。
//! リレー側 (Orchestrator) はこの trait にのみ依存し、具体的な接続管理の実装には依存しない。

use async_trait::async_trait;

/// Result of one broadcast pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the payload was queued for
    pub delivered: usize,
    /// Connections removed and closed because the write failed
    pub removed: usize,
}

/// Fan-out of a payload to every live connection
#[async_trait]
pub trait Broadcaster: Send + Sync {
    /// Deliver `payload` to every registered connection.
    ///
    /// A failed write removes that connection without stopping delivery to the others.
    async fn broadcast(&self, payload: &str) -> BroadcastReport;
}
