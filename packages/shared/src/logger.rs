//! Logging setup utilities for the dengon binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber with the specified default log level.
///
/// The filter covers this crate and the calling binary. `RUST_LOG` overrides it.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "dengon", "dengon-server")
/// * `default_log_level` - The default log level (e.g., "debug", "info", "warn", "error")
///
/// # Examples
///
/// ```no_run
/// use dengon_shared::logger::setup_logger;
///
/// setup_logger("dengon-server", "debug");
/// ```
pub fn setup_logger(binary_name: &str, default_log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(binary_name, default_log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Build the fallback filter directive used when `RUST_LOG` is unset.
///
/// Every workspace crate gets the same level so that logs from the server,
/// client and relay libraries show up next to the binary's own.
fn default_filter(binary_name: &str, default_log_level: &str) -> String {
    let mut targets = vec![
        "dengon_shared",
        "dengon_server",
        "dengon_client",
        "dengon_relay",
    ]
    .into_iter()
    .map(|target| format!("{}={}", target, default_log_level))
    .collect::<Vec<_>>();

    targets.push(format!(
        "{}={}",
        binary_name.replace("-", "_"),
        default_log_level
    ));
    targets.join(",")
}
