//! Graceful shutdown wiring.
//!
//! Every long-running loop in the relay watches one `CancellationToken`.
//! This module turns Ctrl+C / SIGTERM into a cancellation of that token.

use tokio_util::sync::CancellationToken;

/// Wait for Ctrl+C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}

/// Spawn a task that cancels `token` once a shutdown signal arrives.
///
/// Returns a child token so callers can hand it to subsystems directly.
pub fn cancel_on_signal(token: CancellationToken) -> CancellationToken {
    let child = token.child_token();
    tokio::spawn(async move {
        tokio::select! {
            _ = shutdown_signal() => token.cancel(),
            _ = token.cancelled() => {}
        }
    });
    child
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_on_signal_child_follows_parent() {
        // テスト項目: 親トークンをキャンセルすると子トークンもキャンセルされる
        // given (前提条件):
        let parent = CancellationToken::new();
        let child = cancel_on_signal(parent.clone());

        // when (操作):
        parent.cancel();

        // then (期待する結果):
        assert!(child.is_cancelled());
    }
}
