//! Tracing/logging initialization.
//!
//! `RUST_LOG` wins over the configured filter when it is set.

use tracing_subscriber::EnvFilter;

fn env_filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(filter: &str, json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(filter))
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    // JSON for shipped logs, pretty lines for a terminal.
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
