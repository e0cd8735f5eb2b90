//! Alternate names resolving to canonical pages

use crate::key::CanonicalKey;
use crate::storage::pages::page_exists;
use crate::storage::{Database, PageId, StoreError, StoreResult};
use rusqlite::{params, OptionalExtension, TransactionBehavior};

/// Result of adding an alias
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasOutcome {
    Inserted,

    /// The identical mapping already existed
    AlreadyPresent,
}

/// Maps alias keys (redirects, alternate titles) to page ids
#[derive(Debug, Clone)]
pub struct AliasIndex {
    db: Database,
}

impl AliasIndex {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// Records that `alias` names `page_id`
    ///
    /// Aliases never move: mapping an existing alias to another page fails with
    /// `Conflict`, re-adding the same mapping is a no-op.
    pub fn add_alias(&self, alias: &CanonicalKey, page_id: PageId) -> StoreResult<AliasOutcome> {
        let outcome = self.db.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if !page_exists(&tx, page_id)? {
                return Err(StoreError::DanglingReference(page_id));
            }

            let inserted = tx.execute(
                "INSERT OR IGNORE INTO aliases (alias_key, page_id) VALUES (?1, ?2)",
                params![alias.as_str(), page_id],
            )?;

            let outcome = if inserted == 1 {
                tx.execute(
                    "INSERT INTO aliases_fts (alias_key, page_id) VALUES (?1, ?2)",
                    params![alias.as_str(), page_id],
                )?;
                AliasOutcome::Inserted
            } else {
                let existing: PageId = tx.query_row(
                    "SELECT page_id FROM aliases WHERE alias_key = ?1",
                    params![alias.as_str()],
                    |row| row.get(0),
                )?;
                if existing != page_id {
                    return Err(StoreError::Conflict {
                        alias: alias.to_string(),
                        existing,
                        requested: page_id,
                    });
                }
                AliasOutcome::AlreadyPresent
            };

            tx.commit()?;
            Ok(outcome)
        })?;

        if outcome == AliasOutcome::Inserted {
            tracing::trace!("Alias '{}' -> page {}", alias, page_id);
        }
        Ok(outcome)
    }

    /// Resolves an alias to its page id
    pub fn resolve(&self, alias: &CanonicalKey) -> StoreResult<PageId> {
        self.db
            .with_conn(|conn| {
                let id = conn
                    .query_row(
                        "SELECT page_id FROM aliases WHERE alias_key = ?1",
                        params![alias.as_str()],
                        |row| row.get(0),
                    )
                    .optional()?;
                Ok(id)
            })?
            .ok_or_else(|| StoreError::NotFound(format!("alias '{}'", alias)))
    }

    /// Resolves a key that may be either a canonical key or an alias
    pub fn lookup(&self, key: &CanonicalKey) -> StoreResult<Option<PageId>> {
        self.db.with_conn(|conn| {
            let id = conn
                .query_row(
                    "SELECT id FROM pages WHERE canonical_key = ?1
                     UNION ALL
                     SELECT page_id FROM aliases WHERE alias_key = ?1
                     LIMIT 1",
                    params![key.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(id)
        })
    }

    /// Gets all aliases of a page, sorted
    pub fn aliases_of(&self, page_id: PageId) -> StoreResult<Vec<String>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT alias_key FROM aliases WHERE page_id = ?1 ORDER BY alias_key",
            )?;
            let aliases = stmt
                .query_map(params![page_id], |row| row.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(aliases)
        })
    }

    /// Counts the total number of aliases
    pub fn count(&self) -> StoreResult<u64> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM aliases", [], |row| row.get(0))?;
            Ok(count as u64)
        })
    }
}
