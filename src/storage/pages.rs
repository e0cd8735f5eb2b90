//! Page identity and crawl status

use crate::key::CanonicalKey;
use crate::storage::{Database, Page, PageId, StoreError, StoreResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};

const PAGE_COLUMNS: &str = "id, canonical_key, explored, bugged, discovered_at";

/// Result of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upserted {
    pub id: PageId,

    /// True if this call created the page
    pub created: bool,
}

/// Single source of truth for page identity and crawl status
#[derive(Debug, Clone)]
pub struct PageStore {
    db: Database,
}

impl PageStore {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a new page or gets the existing page ID
    ///
    /// New pages start unexplored and not bugged, so they join the frontier
    /// immediately. Concurrent callers racing on the same key all receive the
    /// id of the single row that wins the unique constraint.
    pub fn upsert(&self, key: &CanonicalKey) -> StoreResult<Upserted> {
        self.upsert_inner(key, None)
    }

    /// Like [`upsert`](Self::upsert), with an id assigned by the caller
    ///
    /// Fails with `IdentityViolation` if the key is already stored under a
    /// different id, and with `DuplicateKey` if the id belongs to another key.
    pub fn upsert_with_id(&self, key: &CanonicalKey, id: PageId) -> StoreResult<Upserted> {
        self.upsert_inner(key, Some(id))
    }

    fn upsert_inner(&self, key: &CanonicalKey, id: Option<PageId>) -> StoreResult<Upserted> {
        let upserted = self.db.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let upserted = insert_or_get(&tx, key, id)?;
            tx.commit()?;
            Ok(upserted)
        })?;

        if upserted.created {
            tracing::trace!("Discovered page {} ({})", upserted.id, key);
            self.db.signal().announce();
        }

        Ok(upserted)
    }

    /// Gets a page by ID
    pub fn get(&self, id: PageId) -> StoreResult<Page> {
        self.db
            .with_conn(|conn| {
                let page = conn
                    .query_row(
                        &format!("SELECT {} FROM pages WHERE id = ?1", PAGE_COLUMNS),
                        params![id],
                        page_from_row,
                    )
                    .optional()?;
                Ok(page)
            })?
            .ok_or_else(|| StoreError::NotFound(format!("page {}", id)))
    }

    /// Gets a page by canonical key
    pub fn find(&self, key: &CanonicalKey) -> StoreResult<Option<Page>> {
        self.db.with_conn(|conn| {
            let page = conn
                .query_row(
                    &format!("SELECT {} FROM pages WHERE canonical_key = ?1", PAGE_COLUMNS),
                    params![key.as_str()],
                    page_from_row,
                )
                .optional()?;
            Ok(page)
        })
    }

    /// Marks a page as explored and drops any claim on it
    pub fn mark_explored(&self, id: PageId) -> StoreResult<()> {
        self.set_flag(id, "explored")
    }

    /// Marks a page as bugged (could not be fetched or parsed) and drops any claim on it
    pub fn mark_bugged(&self, id: PageId) -> StoreResult<()> {
        self.set_flag(id, "bugged")
    }

    fn set_flag(&self, id: PageId, column: &'static str) -> StoreResult<()> {
        let updated = self.db.with_conn(|conn| {
            let updated = conn.execute(
                &format!(
                    "UPDATE pages SET {} = 1, claim_token = NULL, claimed_at = NULL WHERE id = ?1",
                    column
                ),
                params![id],
            )?;
            Ok(updated)
        })?;

        if updated == 0 {
            return Err(StoreError::NotFound(format!("page {}", id)));
        }

        tracing::trace!("Page {} marked {}", id, column);
        Ok(())
    }

    /// Lists pages in id order, starting after `after`
    pub fn list(&self, after: Option<PageId>, limit: usize) -> StoreResult<Vec<Page>> {
        let after = after.unwrap_or(PageId(i64::MIN));
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {} FROM pages WHERE id > ?1 ORDER BY id ASC LIMIT ?2",
                PAGE_COLUMNS
            ))?;
            let pages = stmt
                .query_map(params![after, limit as i64], page_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(pages)
        })
    }

    /// Gets total page count
    pub fn count(&self) -> StoreResult<u64> {
        self.count_where("1 = 1")
    }

    pub fn count_explored(&self) -> StoreResult<u64> {
        self.count_where("explored = 1")
    }

    pub fn count_bugged(&self) -> StoreResult<u64> {
        self.count_where("bugged = 1")
    }

    fn count_where(&self, condition: &'static str) -> StoreResult<u64> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM pages WHERE {}", condition),
                [],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}

/// Inserts the page unless its key (or requested id) exists, then reads back the winner
fn insert_or_get(conn: &Connection, key: &CanonicalKey, id: Option<PageId>) -> StoreResult<Upserted> {
    let now = Utc::now().to_rfc3339();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO pages (id, canonical_key, discovered_at) VALUES (?1, ?2, ?3)",
        params![id, key.as_str(), now],
    )?;

    if inserted == 1 {
        let new_id = PageId(conn.last_insert_rowid());
        conn.execute(
            "INSERT INTO pages_fts (rowid, canonical_key) VALUES (?1, ?2)",
            params![new_id, key.as_str()],
        )?;
        return Ok(Upserted {
            id: new_id,
            created: true,
        });
    }

    let existing: Option<PageId> = conn
        .query_row(
            "SELECT id FROM pages WHERE canonical_key = ?1",
            params![key.as_str()],
            |row| row.get(0),
        )
        .optional()?;

    match (existing, id) {
        (Some(found), None) => Ok(Upserted {
            id: found,
            created: false,
        }),
        (Some(found), Some(requested)) if found == requested => Ok(Upserted {
            id: found,
            created: false,
        }),
        (Some(found), Some(requested)) => Err(StoreError::IdentityViolation(format!(
            "key '{}' is stored under id {} but was claimed by id {}",
            key, found, requested
        ))),
        (None, Some(requested)) => Err(StoreError::DuplicateKey(format!(
            "page id {} is already assigned to another key than '{}'",
            requested, key
        ))),
        (None, None) => Err(StoreError::IdentityViolation(format!(
            "insert of '{}' was ignored but no page holds the key",
            key
        ))),
    }
}

/// Returns true if a page with this id exists
pub(crate) fn page_exists(conn: &Connection, id: PageId) -> StoreResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM pages WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

pub(crate) fn page_from_row(row: &Row<'_>) -> rusqlite::Result<Page> {
    Ok(Page {
        id: row.get(0)?,
        canonical_key: row.get(1)?,
        explored: row.get(2)?,
        bugged: row.get(3)?,
        discovered_at: row.get(4)?,
    })
}
