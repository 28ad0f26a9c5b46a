//! Relay configuration.
//!
//! Every option can come from the command line or from the environment (a `.env`
//! file is loaded by the binary before parsing).

use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use dengon_shared::notifier::DEFAULT_API_BASE;

pub const DEFAULT_MONITOR_CHANNELS: &str =
    "BWENews,news6551,NewListingsFeed,TrumpTruthSocial_Alert";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("BOT_TOKEN is not set")]
    MissingToken,

    #[error("TARGET_CHAT_ID is not set")]
    MissingTargetChat,

    #[error("MONITOR_CHANNELS contains no channel")]
    NoChannels,

    #[error("FEED_BACKOFF_SECS must be greater than zero")]
    ZeroBackoff,
}

#[derive(Parser, Debug, Clone)]
#[command(name = "dengon")]
#[command(about = "Relay monitored channel posts and feed messages to Telegram and WebSocket subscribers", long_about = None)]
pub struct Args {
    /// Telegram bot token
    #[arg(long, env = "BOT_TOKEN", hide_env_values = true, default_value = "")]
    pub bot_token: String,

    /// Chat receiving relayed messages
    #[arg(long, env = "TARGET_CHAT_ID", default_value = "")]
    pub target_chat_id: String,

    /// Comma-separated channel handles to monitor
    #[arg(long, env = "MONITOR_CHANNELS", default_value = DEFAULT_MONITOR_CHANNELS)]
    pub monitor_channels: String,

    /// Host address of the broadcast server
    #[arg(short = 'H', long, env = "WS_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port of the broadcast server
    #[arg(short = 'p', long, env = "WS_PORT", default_value_t = 8081)]
    pub port: u16,

    /// News feed WebSocket URL (feed relay disabled if omitted)
    #[arg(long, env = "FEED_URL")]
    pub feed_url: Option<String>,

    /// Seconds to wait before reconnecting to the feed
    #[arg(long, env = "FEED_BACKOFF_SECS", default_value_t = 5)]
    pub feed_backoff_secs: u64,

    /// Bot API base URL
    #[arg(long, env = "TELEGRAM_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Long-poll timeout for getUpdates in seconds
    #[arg(long, env = "POLL_TIMEOUT_SECS", default_value_t = 30)]
    pub poll_timeout_secs: u64,
}

/// Validated relay settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    pub bot_token: String,
    pub target_chat_id: String,
    pub monitor_channels: Vec<String>,
    pub host: String,
    pub port: u16,
    pub feed_url: Option<String>,
    pub feed_backoff: Duration,
    pub api_base: String,
    pub poll_timeout: Duration,
}

impl TryFrom<Args> for RelayConfig {
    type Error = ConfigError;

    fn try_from(args: Args) -> Result<Self, Self::Error> {
        let bot_token = args.bot_token.trim().to_string();
        if bot_token.is_empty() {
            return Err(ConfigError::MissingToken);
        }

        let target_chat_id = args.target_chat_id.trim().to_string();
        if target_chat_id.is_empty() {
            return Err(ConfigError::MissingTargetChat);
        }

        let monitor_channels = parse_channels(&args.monitor_channels);
        if monitor_channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }

        if args.feed_backoff_secs == 0 {
            return Err(ConfigError::ZeroBackoff);
        }

        Ok(Self {
            bot_token,
            target_chat_id,
            monitor_channels,
            host: args.host,
            port: args.port,
            feed_url: args
                .feed_url
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            feed_backoff: Duration::from_secs(args.feed_backoff_secs),
            api_base: args.api_base,
            poll_timeout: Duration::from_secs(args.poll_timeout_secs),
        })
    }
}

/// Split a comma-separated handle list, dropping blanks and duplicates
pub fn parse_channels(raw: &str) -> Vec<String> {
    let mut channels: Vec<String> = Vec::new();
    for handle in raw.split(',').map(str::trim).filter(|h| !h.is_empty()) {
        if !channels.iter().any(|c| c == handle) {
            channels.push(handle.to_string());
        }
    }
    channels
}
