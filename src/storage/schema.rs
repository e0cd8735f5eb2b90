//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Wikicrawl database.
//! The frontier is not a table: it is the set of `pages` rows with
//! `explored = 0 AND bugged = 0`, served through `idx_pages_status`.

use crate::config::EdgeIdentity;
use crate::storage::{StoreError, StoreResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Current schema version, recorded in `meta`
pub const SCHEMA_VERSION: u32 = 1;

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Store-wide settings fixed at creation time
CREATE TABLE IF NOT EXISTS meta (
    name TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Every page ever discovered
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY,
    canonical_key TEXT NOT NULL UNIQUE,
    explored INTEGER NOT NULL DEFAULT 0,
    bugged INTEGER NOT NULL DEFAULT 0,
    claim_token INTEGER,
    claimed_at INTEGER,
    discovered_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(explored, bugged, id);

-- Alternate names (redirects, link spellings) of a page
CREATE TABLE IF NOT EXISTS aliases (
    alias_key TEXT PRIMARY KEY,
    page_id INTEGER NOT NULL REFERENCES pages(id)
);

CREATE INDEX IF NOT EXISTS idx_aliases_page ON aliases(page_id);

-- Directed links; an empty display means no anchor text was recorded
CREATE TABLE IF NOT EXISTS links (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    linker INTEGER NOT NULL REFERENCES pages(id),
    linked INTEGER NOT NULL REFERENCES pages(id),
    display TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_links_linker ON links(linker, seq);
CREATE INDEX IF NOT EXISTS idx_links_linked ON links(linked, seq);

-- Full-text indexes, written alongside their base rows
CREATE VIRTUAL TABLE IF NOT EXISTS pages_fts USING fts5(canonical_key);
CREATE VIRTUAL TABLE IF NOT EXISTS aliases_fts USING fts5(alias_key, page_id UNINDEXED);
CREATE VIRTUAL TABLE IF NOT EXISTS links_fts USING fts5(display, linker UNINDEXED, linked UNINDEXED);
"#;

/// Unique index enforcing the configured edge identity
fn edge_identity_index(identity: EdgeIdentity) -> &'static str {
    match identity {
        EdgeIdentity::PairOnly => {
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_links_pair ON links(linker, linked);"
        }
        EdgeIdentity::PairPlusDisplay => {
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_links_pair_display ON links(linker, linked, display);"
        }
    }
}

/// Initializes the database schema
///
/// The edge identity is recorded the first time a database is initialized;
/// reopening it with a different identity fails with `SchemaMismatch`.
pub fn initialize_schema(conn: &Connection, identity: EdgeIdentity) -> StoreResult<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    let version = ensure_meta(conn, "schema_version", &SCHEMA_VERSION.to_string())?;
    if version != SCHEMA_VERSION.to_string() {
        return Err(StoreError::SchemaMismatch(format!(
            "database schema version {} is not supported (expected {})",
            version, SCHEMA_VERSION
        )));
    }

    let stored = ensure_meta(conn, "edge_identity", identity.to_db_string())?;
    if EdgeIdentity::from_db_string(&stored) != Some(identity) {
        return Err(StoreError::SchemaMismatch(format!(
            "database uses edge identity '{}', configuration asks for '{}'",
            stored,
            identity.to_db_string()
        )));
    }

    conn.execute_batch(edge_identity_index(identity))?;
    Ok(())
}

/// Inserts `name` with `value` unless present, and returns the stored value
fn ensure_meta(conn: &Connection, name: &str, value: &str) -> StoreResult<String> {
    conn.execute(
        "INSERT OR IGNORE INTO meta (name, value) VALUES (?1, ?2)",
        params![name, value],
    )?;

    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM meta WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;

    stored.ok_or_else(|| StoreError::SchemaMismatch(format!("meta entry '{}' is missing", name)))
}
