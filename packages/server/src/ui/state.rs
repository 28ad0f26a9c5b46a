//! Server state shared by the handlers.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::{infrastructure::ConnectionManager, usecase::SubmitMessageUseCase};

/// Shared application state
pub struct AppState {
    /// 接続中セッションの管理
    pub connections: Arc<ConnectionManager>,
    /// SubmitMessageUseCase（メッセージ転送のユースケース）
    pub submit_message_usecase: Arc<SubmitMessageUseCase>,
    /// Server-wide shutdown signal, parent of every session's closer
    pub cancel: CancellationToken,
}
