//! Tracing subscriber setup for binaries and tests embedding the crate

use crate::config::LoggingConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

/// Install a global fmt subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `config.level` (e.g. `"info"`)
/// applies. Returns an error if a global subscriber is already set.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| format!("Invalid log filter '{}': {}", config.level, e))?;

    let subscriber = Registry::default().with(filter).with(
        fmt::layer()
            .with_target(true)
            .with_line_number(true),
    );

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to set tracing subscriber: {}", e))
}
