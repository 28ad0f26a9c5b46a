//! Standalone WebSocket relay server.
//!
//! Accepts `{"message": ..., "chat_id": ...}` frames on `/ws` and forwards them
//! to Telegram, answering each with `{"success": ..., "message": ...}`.
//!
//! Run with:
//! ```not_rust
//! BOT_TOKEN=... TARGET_CHAT_ID=... cargo run --bin dengon-server
//! cargo run --bin dengon-server -- --host 0.0.0.0 --port 8081
//! ```

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use dengon_server::{infrastructure::ConnectionManager, ui::Server, usecase::SubmitMessageUseCase};
use dengon_shared::{
    logger::setup_logger,
    notifier::{DEFAULT_API_BASE, TelegramNotifier},
    shutdown::cancel_on_signal,
};

#[derive(Parser, Debug)]
#[command(name = "dengon-server")]
#[command(about = "WebSocket server forwarding submitted messages to Telegram", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "WS_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "WS_PORT", default_value = "8081")]
    port: u16,

    /// Telegram bot token
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true)]
    bot_token: String,

    /// Default destination chat
    #[arg(long, env = "TARGET_CHAT_ID")]
    target_chat_id: Option<String>,

    /// Bot API base URL
    #[arg(long, env = "TELEGRAM_API_BASE", default_value = DEFAULT_API_BASE)]
    api_base: String,
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine, the environment may already be populated
    let _ = dotenvy::dotenv();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();

    // 1. NotificationSink
    let notifier = match TelegramNotifier::new(args.bot_token, args.target_chat_id) {
        Ok(notifier) => Arc::new(notifier.with_api_base(args.api_base)),
        Err(e) => {
            tracing::error!("Failed to create notifier: {}", e);
            std::process::exit(1);
        }
    };

    // 2. Connection registry and UseCase
    let connections = Arc::new(ConnectionManager::new());
    let submit_message_usecase = Arc::new(SubmitMessageUseCase::new(notifier));

    // 3. Server
    let cancel = cancel_on_signal(CancellationToken::new());
    let server = Server::new(connections, submit_message_usecase);
    if let Err(e) = server.run(&args.host, args.port, cancel).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
