//! Logging setup
//!
//! `RUST_LOG`, when set, takes precedence over the `[logging]` filter.

use crate::config::LoggingConfig;
use crate::{Result, WikicrawlError};
use tracing_subscriber::EnvFilter;

/// Builds the filter used by [`init_logging`]
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter).map_err(|e| {
            WikicrawlError::Logging(format!("invalid filter '{}': {}", config.filter, e))
        }),
    }
}

/// Installs the global tracing subscriber
///
/// Fails if the filter is invalid or a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target)
        .with_thread_ids(false)
        .with_file(false)
        .try_init()
        .map_err(|e| WikicrawlError::Logging(e.to_string()))
}
