//! Wikicrawl: a crawl-frontier and link-graph store
//!
//! This crate persists the state of a link crawler (pages, aliases, links and
//! the frontier of pages still to explore) in SQLite, and drives a pool of
//! workers over that state through a pluggable [`crawler::PageSource`].

pub mod config;
pub mod crawler;
pub mod key;
pub mod logging;
pub mod query;
pub mod state;
pub mod storage;

use thiserror::Error;

/// Main error type for Wikicrawl operations
#[derive(Debug, Error)]
pub enum WikicrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Canonical key errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("Key is empty")]
    Empty,

    #[error("Unsupported URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid percent-encoding in {0}")]
    Encoding(String),
}

/// Result type alias for Wikicrawl operations
pub type Result<T> = std::result::Result<T, WikicrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for key operations
pub type KeyResult<T> = std::result::Result<T, KeyError>;

// Re-export commonly used types
pub use config::Config;
pub use key::{CanonicalKey, KeyRules};
pub use state::CrawlStatus;
pub use storage::{AliasIndex, Database, Frontier, LinkGraph, Page, PageId, PageStore};
