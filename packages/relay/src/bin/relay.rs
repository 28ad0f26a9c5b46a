//! dengon relay.
//!
//! Watches the monitored channels through the Telegram Bot API, forwards their posts to
//! `TARGET_CHAT_ID` and broadcasts them to WebSocket subscribers on `/ws`.
//! When `FEED_URL` is set, messages from that news feed are relayed the same way.
//!
//! Run with:
//! ```not_rust
//! BOT_TOKEN=... TARGET_CHAT_ID=... cargo run --bin dengon
//! cargo run --bin dengon -- --monitor-channels BWENews,news6551 --port 9000
//! ```

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use dengon_client::{FeedClient, FeedClientConfig};
use dengon_relay::{
    config::{Args, RelayConfig},
    infrastructure::BotApiUpstream,
    usecase::{RelayOrchestrator, SourceResolver},
};
use dengon_server::{infrastructure::ConnectionManager, ui::Server, usecase::SubmitMessageUseCase};
use dengon_shared::{
    logger::setup_logger,
    notifier::TelegramNotifier,
    shutdown::cancel_on_signal,
    time::SystemClock,
};

#[tokio::main]
async fn main() {
    // A missing .env file is fine, the environment may already be populated
    let _ = dotenvy::dotenv();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let config = match RelayConfig::try_from(Args::parse()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    // 1. NotificationSink and upstream
    let notifier = match TelegramNotifier::new(
        config.bot_token.clone(),
        Some(config.target_chat_id.clone()),
    ) {
        Ok(notifier) => Arc::new(notifier.with_api_base(config.api_base.clone())),
        Err(e) => {
            tracing::error!("Failed to create notifier: {}", e);
            std::process::exit(1);
        }
    };
    let upstream = match BotApiUpstream::new(config.bot_token.clone()) {
        Ok(upstream) => upstream.with_api_base(config.api_base.clone()),
        Err(e) => {
            tracing::error!("Failed to create upstream client: {}", e);
            std::process::exit(1);
        }
    };

    // 2. Broadcast server
    let cancel = cancel_on_signal(CancellationToken::new());
    let connections = Arc::new(ConnectionManager::new());
    let listener = match Server::bind(&config.host, config.port).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}:{}: {}", config.host, config.port, e);
            std::process::exit(1);
        }
    };
    let server = Server::new(
        connections.clone(),
        Arc::new(SubmitMessageUseCase::new(notifier.clone())),
    );
    let server_task = tokio::spawn(server.serve(listener, cancel.clone()));

    // 3. Relay pipeline
    let clock = Arc::new(SystemClock);
    let resolver = Arc::new(SourceResolver::new(Arc::new(upstream.clone())));
    let sources = resolver.resolve_all(&config.monitor_channels).await;
    let resolved = sources.iter().filter(|s| s.resolved_id.is_some()).count();
    tracing::info!(
        "Monitoring {} channel(s), {} resolved",
        sources.len(),
        resolved
    );

    let orchestrator = Arc::new(
        RelayOrchestrator::new(
            resolver,
            config.monitor_channels.clone(),
            notifier,
            clock.clone(),
        )
        .with_broadcaster(connections),
    );

    // 4. Optional news feed
    let feed = config.feed_url.clone().map(|url| {
        let (handler, rx) = RelayOrchestrator::feed_handler();
        let client = FeedClient::new(
            FeedClientConfig::new(url).with_backoff(config.feed_backoff),
            handler,
            cancel.clone(),
        )
        .spawn();
        let forwarder = {
            let orchestrator = orchestrator.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { orchestrator.run_feed_forwarder(rx, cancel).await })
        };
        (client, forwarder)
    });

    // 5. Upstream loop runs until shutdown
    let updates = upstream.updates(clock, config.poll_timeout);
    orchestrator.run_upstream(updates, cancel.clone()).await;

    if let Some((client, forwarder)) = feed {
        client.close().await;
        let _ = forwarder.await;
    }
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("Server error: {}", e),
        Err(e) => tracing::error!("Server task failed: {}", e),
    }
    tracing::info!("dengon stopped");
}
