//! UseCase: クライアントから送信されたメッセージの転送処理
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - SubmitMessageUseCase::execute() メソッド
//!
//! ### なぜこのテストが必要か
//! - 空メッセージが NotificationSink に渡らないことを保証
//! - chat_id の有無で宛先が正しく切り替わることを保証
//! - 送信失敗が呼び出し元に報告されることを保証
//!
//! ### どのような状況を想定しているか
//! - 正常系：既定の宛先 / 明示的な宛先への送信
//! - 異常系：空メッセージ、送信失敗

use std::sync::Arc;

use dengon_shared::notifier::NotificationSink;

use crate::infrastructure::dto::websocket::SendRequest;

use super::error::SubmitError;

/// メッセージ転送のユースケース
pub struct SubmitMessageUseCase {
    /// NotificationSink（外部送信先の抽象化）
    sink: Arc<dyn NotificationSink>,
}

impl SubmitMessageUseCase {
    /// 新しい SubmitMessageUseCase を作成
    pub fn new(sink: Arc<dyn NotificationSink>) -> Self {
        Self { sink }
    }

    /// メッセージ転送を実行
    ///
    /// # Arguments
    ///
    /// * `request` - クライアントから受信したリクエスト
    ///
    /// # Returns
    ///
    /// * `Ok(())` - 送信成功
    /// * `Err(SubmitError)` - 空メッセージ、または送信失敗
    pub async fn execute(&self, request: SendRequest) -> Result<(), SubmitError> {
        if request.message.is_empty() {
            return Err(SubmitError::EmptyMessage);
        }

        // 空の chat_id は未指定として扱う
        let destination = request.chat_id.as_deref().filter(|id| !id.is_empty());

        self.sink.send(&request.message, destination).await?;

        tracing::info!(
            "Forwarded submitted message to {}",
            destination.unwrap_or("default chat")
        );
        Ok(())
    }
}
