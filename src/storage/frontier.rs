//! Frontier of pages still to explore
//!
//! The frontier is derived from page status: every page with
//! `explored = 0 AND bugged = 0` belongs to it. Workers take pages out of it by
//! claiming them; a claim is a token written on the row together with the time
//! it was taken, and it lapses after the configured lease.

use crate::storage::pages::page_from_row;
use crate::storage::{Database, Page, PageId, StoreResult};
use chrono::Utc;
use rusqlite::params;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::futures::Notified;
use tokio::sync::Notify;

static CLAIM_SEQUENCE: AtomicI64 = AtomicI64::new(0);

/// Wakes tasks waiting for frontier changes
///
/// Raised when a page is created or a claim is released.
#[derive(Debug, Default)]
pub struct FrontierSignal {
    notify: Notify,
}

impl FrontierSignal {
    pub(crate) fn announce(&self) {
        self.notify.notify_waiters();
    }

    /// Future resolving on the next announcement
    ///
    /// Announcements made after this call are seen even if the future is
    /// polled later.
    pub fn notified(&self) -> Notified<'_> {
        self.notify.notified()
    }
}

/// Exclusive right to explore one page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    pub page_id: PageId,
    token: i64,
}

impl Claim {
    pub fn token(&self) -> i64 {
        self.token
    }
}

/// Claims and lists frontier pages
#[derive(Debug, Clone)]
pub struct Frontier {
    db: Database,
}

impl Frontier {
    pub(crate) fn new(db: Database) -> Self {
        Self { db }
    }

    /// Claims up to `batch` unclaimed frontier pages, lowest id first
    ///
    /// The selection and the claim happen in one statement, so two callers
    /// never receive the same page while its claim is live.
    pub fn next(&self, batch: usize) -> StoreResult<Vec<Claim>> {
        self.claim("explored = 0 AND bugged = 0", None, batch)
    }

    /// Claims up to `batch` pages that are bugged but were never explored
    pub fn next_bugged(&self, batch: usize) -> StoreResult<Vec<Claim>> {
        self.claim("explored = 0 AND bugged = 1", None, batch)
    }

    /// Like [`next_bugged`](Self::next_bugged), restricted to ids above `after`
    ///
    /// A retry pass walks forward with this so pages failing again are not
    /// handed out a second time.
    pub fn next_bugged_after(&self, after: PageId, batch: usize) -> StoreResult<Vec<Claim>> {
        self.claim("explored = 0 AND bugged = 1", Some(after), batch)
    }

    fn claim(
        &self,
        condition: &'static str,
        after: Option<PageId>,
        batch: usize,
    ) -> StoreResult<Vec<Claim>> {
        if batch == 0 {
            return Ok(Vec::new());
        }

        let token = next_token();
        let now = Utc::now().timestamp_millis();
        let expired_before = now - self.lease_millis();
        let after = after.unwrap_or(PageId(i64::MIN));

        let sql = format!(
            "UPDATE pages SET claim_token = ?1, claimed_at = ?2
             WHERE id IN (
                 SELECT id FROM pages
                 WHERE {} AND id > ?5 AND (claim_token IS NULL OR claimed_at < ?3)
                 ORDER BY id ASC LIMIT ?4
             )
             RETURNING id",
            condition
        );

        let mut ids = self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let ids = stmt
                .query_map(params![token, now, expired_before, batch as i64, after], |row| {
                    row.get::<_, PageId>(0)
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ids)
        })?;
        ids.sort_unstable();

        if !ids.is_empty() {
            tracing::trace!("Claimed {} page(s) with token {}", ids.len(), token);
        }

        Ok(ids
            .into_iter()
            .map(|page_id| Claim { page_id, token })
            .collect())
    }

    /// Gives a claimed page back to the frontier
    ///
    /// Returns false if the claim is no longer held (already released, expired
    /// and taken by someone else, or the page was marked explored or bugged).
    pub fn release(&self, claim: &Claim) -> StoreResult<bool> {
        let released = self.db.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE pages SET claim_token = NULL, claimed_at = NULL
                 WHERE id = ?1 AND claim_token = ?2",
                params![claim.page_id, claim.token],
            )?;
            Ok(n == 1)
        })?;

        if released {
            tracing::debug!("Released claim on page {}", claim.page_id);
            self.db.signal().announce();
        }
        Ok(released)
    }

    /// Clears every claim whose lease has run out, returning how many
    pub fn release_expired(&self) -> StoreResult<usize> {
        let expired_before = Utc::now().timestamp_millis() - self.lease_millis();
        let cleared = self.db.with_conn(|conn| {
            let n = conn.execute(
                "UPDATE pages SET claim_token = NULL, claimed_at = NULL
                 WHERE claim_token IS NOT NULL AND claimed_at < ?1",
                params![expired_before],
            )?;
            Ok(n)
        })?;

        if cleared > 0 {
            tracing::info!("Recovered {} expired claim(s)", cleared);
            self.db.signal().announce();
        }
        Ok(cleared)
    }

    /// Lists frontier pages by ascending id without claiming them
    pub fn list(&self, limit: usize) -> StoreResult<Vec<Page>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT id, canonical_key, explored, bugged, discovered_at FROM pages
                 WHERE explored = 0 AND bugged = 0
                 ORDER BY id ASC LIMIT ?1",
            )?;
            let pages = stmt
                .query_map(params![limit as i64], page_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(pages)
        })
    }

    /// Number of pages in the frontier, claimed or not
    pub fn len(&self) -> StoreResult<u64> {
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM pages WHERE explored = 0 AND bugged = 0",
                [],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of pages currently held under a live claim
    pub fn claimed_count(&self) -> StoreResult<u64> {
        let expired_before = Utc::now().timestamp_millis() - self.lease_millis();
        self.db.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM pages WHERE claim_token IS NOT NULL AND claimed_at >= ?1",
                params![expired_before],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }

    /// Removes a page from future `next()` results without exploring it
    pub fn mark_bugged(&self, id: PageId) -> StoreResult<()> {
        self.db.pages().mark_bugged(id)
    }

    /// Future resolving the next time the frontier may have grown
    pub fn changed(&self) -> Notified<'_> {
        self.db.signal().notified()
    }

    /// Waits until the frontier is non-empty or `timeout` elapses
    ///
    /// Returns whether the frontier holds pages when the wait ends.
    pub async fn wait_for_entries(&self, timeout: Duration) -> StoreResult<bool> {
        let notified = self.changed();
        if !self.is_empty()? {
            return Ok(true);
        }

        let _ = tokio::time::timeout(timeout, notified).await;
        Ok(!self.is_empty()?)
    }

    fn lease_millis(&self) -> i64 {
        i64::try_from(self.db.settings().claim_lease.as_millis()).unwrap_or(i64::MAX / 2)
    }
}

/// Process-unique claim token: creation time in microseconds plus a sequence number
fn next_token() -> i64 {
    let seq = CLAIM_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    Utc::now()
        .timestamp_micros()
        .wrapping_mul(1024)
        .wrapping_add(seq.rem_euclid(1024))
}
