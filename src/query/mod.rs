//! Read-only queries over a crawl database
//!
//! This module provides:
//! - Full-text search over page keys, aliases and link text
//! - Crawl statistics and the progress summary
//! - Shortest link paths between two pages

mod path;
mod search;
pub mod stats;

pub use path::{shortest_path, PathStep};
pub use search::{search, SearchHit};
pub use stats::{load_statistics, CrawlStatistics};
