//! Server execution logic.

use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::{infrastructure::ConnectionManager, usecase::SubmitMessageUseCase};

use super::{
    handler::{health_check, websocket_handler},
    state::AppState,
};

/// WebSocket broadcast server
///
/// This struct encapsulates the server dependencies and provides methods to run the server.
///
/// # Example
///
/// ```ignore
/// let connections = Arc::new(ConnectionManager::new());
/// let server = Server::new(connections.clone(), submit_message_usecase);
/// server.run("127.0.0.1", 8081, cancel).await?;
/// ```
pub struct Server {
    /// 接続中セッションの管理（ブロードキャストにも使用）
    connections: Arc<ConnectionManager>,
    /// SubmitMessageUseCase（メッセージ転送のユースケース）
    submit_message_usecase: Arc<SubmitMessageUseCase>,
}

impl Server {
    /// Create a new Server instance
    ///
    /// # Arguments
    ///
    /// * `connections` - Registry of sessions, shared with whoever broadcasts
    /// * `submit_message_usecase` - UseCase for client-submitted messages
    pub fn new(
        connections: Arc<ConnectionManager>,
        submit_message_usecase: Arc<SubmitMessageUseCase>,
    ) -> Self {
        Self {
            connections,
            submit_message_usecase,
        }
    }

    /// Bind a listener. Port `0` picks an ephemeral port.
    pub async fn bind(host: &str, port: u16) -> std::io::Result<TcpListener> {
        let bind_addr = format!("{}:{}", host, port);
        TcpListener::bind(&bind_addr).await
    }

    /// Bind and run until `cancel` fires
    ///
    /// # Arguments
    ///
    /// * `host` - The host address to bind to (e.g., "127.0.0.1")
    /// * `port` - The port number to bind to (e.g., 8081)
    /// * `cancel` - Shutdown signal
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to the specified address or
    /// if there's an error during server execution.
    pub async fn run(self, host: &str, port: u16, cancel: CancellationToken) -> std::io::Result<()> {
        let listener = Self::bind(host, port).await?;
        self.serve(listener, cancel).await
    }

    /// Run the accept loop on a pre-bound listener until `cancel` fires
    pub async fn serve(self, listener: TcpListener, cancel: CancellationToken) -> std::io::Result<()> {
        let app_state = Arc::new(AppState {
            connections: self.connections,
            submit_message_usecase: self.submit_message_usecase,
            cancel: cancel.clone(),
        });

        // Define handlers
        let app = Router::new()
            // WebSocket エンドポイント
            .route("/ws", get(websocket_handler))
            // HTTP エンドポイント
            .route("/api/health", get(health_check))
            .layer(TraceLayer::new_for_http())
            .with_state(app_state);

        let local_addr = listener.local_addr()?;
        tracing::info!("WebSocket relay server listening on {}", local_addr);
        tracing::info!("Connect to: ws://{}/ws", local_addr);

        // Sessions watch child tokens of `cancel`, so open sockets end with it
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .await?;

        tracing::info!("Server shutdown complete");

        Ok(())
    }
}
