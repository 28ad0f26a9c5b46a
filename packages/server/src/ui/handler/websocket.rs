//! WebSocket connection handlers.
//!
//! Session lifecycle: `Accepted → Welcomed → Serving → Closed`.
//! Each session owns one writer task (`pusher_loop`) fed by a bounded queue.
//! Responses and broadcasts both go through that queue, so the socket has a single writer.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{
    sink::SinkExt,
    stream::{SplitSink, SplitStream, StreamExt},
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::ConnectionId,
    infrastructure::{
        Connection, OUTBOUND_BUFFER,
        dto::websocket::{INVALID_FORMAT_MESSAGE, SENT_MESSAGE, SendRequest, SendResponse},
    },
    ui::state::AppState,
};

/// Upper bound on waiting for the writer to flush its close frame
const WRITER_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Spawns a task that drains the outbound queue into the WebSocket sink.
///
/// The task ends when the queue closes or `closer` fires, then sends a Close frame.
/// A failed write cancels `closer` so the reading side stops too.
fn pusher_loop(
    mut rx: mpsc::Receiver<String>,
    mut sender: SplitSink<WebSocket, Message>,
    closer: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                biased;
                _ = closer.cancelled() => break,
                msg = rx.recv() => msg,
            };
            let Some(msg) = msg else {
                break;
            };
            if let Err(e) = sender.send(Message::Text(msg.into())).await {
                tracing::debug!("WebSocket write failed: {}", e);
                closer.cancel();
                return;
            }
        }

        let _ = sender.send(Message::Close(None)).await;
        let _ = sender.close().await;
    })
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let connection_id = ConnectionId::generate();
    let (sender, receiver) = socket.split();
    let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
    let closer = state.cancel.child_token();

    // Accepted: queue the welcome before registering, so no broadcast can overtake it
    if let Err(e) = tx.try_send(SendResponse::welcome().to_json()) {
        tracing::warn!("Failed to welcome connection '{}': {}", connection_id, e);
        return;
    }

    // Welcomed
    state
        .connections
        .add(connection_id, Connection::new(tx.clone(), closer.clone()))
        .await;

    let mut send_task = pusher_loop(rx, sender, closer.clone());
    tracing::info!("Queued welcome for connection '{}'", connection_id);

    // Serving
    serve_requests(receiver, &tx, &closer, &state, connection_id).await;

    // Closed: unconditional cleanup
    state.connections.remove(&connection_id).await;
    closer.cancel();
    drop(tx);
    if tokio::time::timeout(WRITER_SHUTDOWN_TIMEOUT, &mut send_task)
        .await
        .is_err()
    {
        send_task.abort();
    }
    tracing::info!("Connection '{}' closed", connection_id);
}

/// Read one request per iteration and answer it before reading the next.
async fn serve_requests(
    mut receiver: SplitStream<WebSocket>,
    tx: &mpsc::Sender<String>,
    closer: &CancellationToken,
    state: &AppState,
    connection_id: ConnectionId,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = closer.cancelled() => {
                tracing::debug!("Connection '{}' cancelled", connection_id);
                break;
            }
            frame = receiver.next() => frame,
        };

        let text = match frame {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => {
                tracing::info!("Connection '{}' requested close", connection_id);
                break;
            }
            Some(Ok(_)) => {
                // Binary, ping and pong frames carry no request
                continue;
            }
            Some(Err(e)) => {
                tracing::warn!("WebSocket error on connection '{}': {}", connection_id, e);
                break;
            }
        };

        tracing::debug!("Received text from '{}': {}", connection_id, text.as_str());
        let response = handle_request(text.as_str(), state).await;

        if !enqueue(tx, closer, response).await {
            break;
        }
    }
}

/// Turn one text frame into exactly one response.
async fn handle_request(text: &str, state: &AppState) -> SendResponse {
    let request = match serde_json::from_str::<SendRequest>(text) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("Failed to parse send request: {}", e);
            return SendResponse::failure(INVALID_FORMAT_MESSAGE);
        }
    };

    match state.submit_message_usecase.execute(request).await {
        Ok(()) => SendResponse::success(SENT_MESSAGE),
        Err(e) => {
            tracing::warn!("Submit failed: {}", e);
            SendResponse::failure(e.to_string())
        }
    }
}

/// Queue a response for the writer. Returns `false` if the session is closing.
async fn enqueue(
    tx: &mpsc::Sender<String>,
    closer: &CancellationToken,
    response: SendResponse,
) -> bool {
    tokio::select! {
        biased;
        _ = closer.cancelled() => false,
        sent = tx.send(response.to_json()) => sent.is_ok(),
    }
}
