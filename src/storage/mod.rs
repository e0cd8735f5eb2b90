//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Page identity and crawl status ([`PageStore`])
//! - Alternate names of pages ([`AliasIndex`])
//! - Link relationship tracking ([`LinkGraph`])
//! - Frontier claims ([`Frontier`])

mod aliases;
mod error;
mod frontier;
mod links;
pub(crate) mod pages;
mod schema;
mod sqlite;

pub use aliases::{AliasIndex, AliasOutcome};
pub use error::{StoreError, StoreResult};
pub use frontier::{Claim, Frontier, FrontierSignal};
pub use links::{Edge, EdgeCursor, EdgeOutcome, LinkGraph};
pub use pages::{PageStore, Upserted};
pub use schema::SCHEMA_VERSION;
pub use sqlite::Database;

use crate::state::CrawlStatus;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use std::fmt;

/// Stable identifier of a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PageId(pub i64);

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for PageId {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.0))
    }
}

impl FromSql for PageId {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(PageId)
    }
}

/// Represents a page in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub id: PageId,
    pub canonical_key: String,
    pub explored: bool,
    pub bugged: bool,
    pub discovered_at: String,
}

impl Page {
    pub fn status(&self) -> CrawlStatus {
        CrawlStatus::from_flags(self.explored, self.bugged)
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ \"id\": {}, \"key\": \"{}\" }}",
            self.id,
            self.canonical_key.replace('"', "\\\"")
        )
    }
}

#[cfg(test)]
pub(crate) fn test_database(identity: crate::config::EdgeIdentity) -> Database {
    let store = crate::config::StoreConfig {
        edge_identity: identity,
        ..Default::default()
    };
    Database::open_in_memory(&store, &crate::config::FrontierConfig::default())
        .expect("in-memory database")
}
