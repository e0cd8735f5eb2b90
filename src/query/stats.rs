//! Statistics generation from the crawl database

use crate::state::CrawlStatus;
use crate::storage::{Database, StoreResult};
use std::collections::HashMap;
use std::fmt;

/// Crawl statistics summary
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlStatistics {
    /// Total number of pages discovered
    pub total_pages: u64,

    /// Pages explored, including bugged pages recovered by a retry
    pub explored: u64,

    /// Pages that failed at least once
    pub bugged: u64,

    /// Pages waiting to be explored
    pub frontier: u64,

    /// Frontier pages currently under a live claim
    pub claimed: u64,

    pub aliases: u64,
    pub links: u64,

    /// Count of pages by status; statuses without pages are absent
    pub pages_by_status: HashMap<CrawlStatus, u64>,
}

impl CrawlStatistics {
    pub fn count(&self, status: CrawlStatus) -> u64 {
        self.pages_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Loads statistics from the database
///
/// # Arguments
///
/// * `db` - The database to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StoreError)` - Failed to query statistics
pub fn load_statistics(db: &Database) -> StoreResult<CrawlStatistics> {
    let rows: Vec<(bool, bool, i64)> = db.with_conn(|conn| {
        let mut stmt = conn.prepare_cached(
            "SELECT explored, bugged, COUNT(*) FROM pages GROUP BY explored, bugged",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })?;

    let mut stats = CrawlStatistics::default();
    for (explored, bugged, count) in rows {
        let count = count as u64;
        let status = CrawlStatus::from_flags(explored, bugged);

        stats.total_pages += count;
        if status.is_explored() {
            stats.explored += count;
        }
        if bugged {
            stats.bugged += count;
        }
        if status.is_frontier() {
            stats.frontier += count;
        }
        *stats.pages_by_status.entry(status).or_insert(0) += count;
    }

    stats.claimed = db.frontier().claimed_count()?;
    stats.aliases = db.aliases().count()?;
    stats.links = db.links().count()?;

    Ok(stats)
}

/// Progress summary, in the form logged at the start and end of a crawl
impl fmt::Display for CrawlStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "explored {} pages (with {} bugged)",
            self.explored, self.bugged
        )?;
        writeln!(f, "found {} pages", self.total_pages)?;
        writeln!(f, "listed {} links", self.links)?;
        write!(
            f,
            "{} aliases, {} pages in frontier ({} claimed)",
            self.aliases, self.frontier, self.claimed
        )
    }
}
