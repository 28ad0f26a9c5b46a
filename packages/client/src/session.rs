//! One WebSocket session against the feed.

use std::time::Duration;

use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Message,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tokio_util::sync::CancellationToken;

use crate::{error::ClientError, handler::FeedHandler, message::RelayMessage};

pub(crate) type FeedStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Bounded wait for the peer to answer our Close frame
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// How a session ended
#[derive(Debug)]
pub(crate) enum SessionEnd {
    /// Shutdown was requested; no reconnect
    Cancelled,
    /// The session broke and the client should reconnect
    Lost(ClientError),
}

/// Open one WebSocket connection to `url`
pub(crate) async fn connect(url: &str) -> Result<FeedStream, ClientError> {
    let (stream, response) = connect_async(url)
        .await
        .map_err(|e| ClientError::Connect(e.to_string()))?;
    tracing::info!("Connected to feed {} (HTTP {})", url, response.status());
    Ok(stream)
}

/// Read frames until the session ends, passing decoded messages to `handler`.
///
/// `cancel` is raced against every read, so shutdown never waits for the next frame.
pub(crate) async fn run_session(
    stream: FeedStream,
    handler: &dyn FeedHandler,
    cancel: &CancellationToken,
) -> SessionEnd {
    let (mut write, mut read) = stream.split();

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            frame = read.next() => Some(frame),
        };

        let Some(frame) = frame else {
            close_gracefully(&mut write, &mut read).await;
            return SessionEnd::Cancelled;
        };

        match frame {
            Some(Ok(Message::Text(text))) => dispatch(text.as_str().as_bytes(), handler),
            Some(Ok(Message::Binary(data))) => dispatch(&data, handler),
            Some(Ok(Message::Close(frame))) => {
                match frame {
                    Some(frame) => tracing::info!(
                        "Feed closed the connection ({}: {})",
                        u16::from(frame.code),
                        frame.reason.as_str()
                    ),
                    None => tracing::info!("Feed closed the connection"),
                }
                return SessionEnd::Lost(ClientError::ClosedByPeer);
            }
            Some(Ok(_)) => {
                // Ping/pong is handled by tungstenite
            }
            Some(Err(e)) => {
                tracing::warn!("Feed read error: {}", e);
                return SessionEnd::Lost(ClientError::Read(e.to_string()));
            }
            None => return SessionEnd::Lost(ClientError::ClosedByPeer),
        }
    }
}

/// Decode one frame; a bad frame is logged and dropped
fn dispatch(payload: &[u8], handler: &dyn FeedHandler) {
    match RelayMessage::decode(payload) {
        Ok(message) => handler.handle(message),
        Err(e) => tracing::warn!("{}", e),
    }
}

/// Send a Close frame and wait at most [`CLOSE_TIMEOUT`] for the peer's reply
async fn close_gracefully(
    write: &mut SplitSink<FeedStream, Message>,
    read: &mut SplitStream<FeedStream>,
) {
    let close = Message::Close(Some(CloseFrame {
        code: CloseCode::Normal,
        reason: "client shutdown".into(),
    }));
    if let Err(e) = write.send(close).await {
        tracing::debug!("Failed to send close frame: {}", e);
        return;
    }

    let acknowledged = tokio::time::timeout(CLOSE_TIMEOUT, async {
        while let Some(Ok(message)) = read.next().await {
            if message.is_close() {
                break;
            }
        }
    })
    .await;
    if acknowledged.is_err() {
        tracing::debug!("Feed did not acknowledge close within {:?}", CLOSE_TIMEOUT);
    }
}
