//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. Filter comes from `RUST_LOG` (default `info`);
/// `SELLERFLOW_LOG_JSON=1` switches to JSON lines.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let json = std::env::var("SELLERFLOW_LOG_JSON")
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
