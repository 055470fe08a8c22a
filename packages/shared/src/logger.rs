//! Logging setup utilities for the dengon binaries.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Library crates of the workspace whose logs are enabled by default.
const WORKSPACE_CRATES: [&str; 4] = [
    "dengon_shared",
    "dengon_server",
    "dengon_client",
    "dengon_store",
];

/// Initialize the tracing subscriber with the specified default log level.
///
/// Logging is enabled for every workspace library crate, the binary itself and
/// `tower_http` request spans. The filter can be overridden using the
/// `RUST_LOG` environment variable.
///
/// # Arguments
///
/// * `binary_name` - The name of the binary (e.g., "dengon-server")
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

fn default_filter(binary_name: &str, default_log_level: &str) -> String {
    WORKSPACE_CRATES
        .iter()
        .copied()
        .chain([binary_name, "tower_http"])
        .map(|target| format!("{}={}", target.replace('-', "_"), default_log_level))
        .collect::<Vec<_>>()
        .join(",")
}
