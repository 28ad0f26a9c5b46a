//! Feed tail client.
//!
//! Connects to a relay feed and prints one line per decoded message.
//! Reconnects with a fixed backoff whenever the feed drops.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin dengon-client
//! cargo run --bin dengon-client -- --url ws://127.0.0.1:9000/ws --backoff-secs 2
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use tokio_util::sync::CancellationToken;

use dengon_client::{
    FeedClient, FeedClientConfig, RelayMessage, formatter::MessageFormatter,
};
use dengon_shared::{logger::setup_logger, shutdown::cancel_on_signal};

#[derive(Parser, Debug)]
#[command(name = "dengon-client")]
#[command(about = "Tail a WebSocket news feed with automatic reconnection", long_about = None)]
struct Args {
    /// Feed WebSocket URL
    #[arg(
        short = 'u',
        long,
        env = "FEED_URL",
        default_value = "wss://bwenews-api.bwe-ws.com/ws"
    )]
    url: String,

    /// Seconds to wait before reconnecting
    #[arg(long, env = "FEED_BACKOFF_SECS", default_value_t = 5)]
    backoff_secs: u64,

    /// Stop after this many consecutive failures (retry forever if omitted)
    #[arg(long)]
    max_attempts: Option<u32>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();

    let mut config =
        FeedClientConfig::new(args.url).with_backoff(Duration::from_secs(args.backoff_secs));
    if let Some(max) = args.max_attempts {
        config = config.with_max_reconnect_attempts(max);
    }

    let cancel = cancel_on_signal(CancellationToken::new());
    let handler = Arc::new(|message: RelayMessage| {
        println!("{}", MessageFormatter::format_console_line(&message));
    });
    let handle = FeedClient::new(config, handler, cancel.clone()).spawn();

    // Stop on a signal or when the client gives up on its own
    let mut state = handle.state();
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = state.wait_for(|s| s.is_terminal()) => {}
    }

    handle.close().await;
}
