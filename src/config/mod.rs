//! Configuration module for Wikicrawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section is optional and falls back to its defaults.
//!
//! # Example
//!
//! ```no_run
//! use wikicrawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("wikicrawl.toml")).unwrap();
//! println!("Crawler will use {} workers", config.driver.workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    default_excluded_prefixes, Config, DriverConfig, EdgeIdentity, FrontierConfig, KeyConfig,
    LoggingConfig, SeedEntry, StoreConfig,
};

// Re-export parser functions
pub use parser::{load_config, parse_config};
