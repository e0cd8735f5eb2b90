//! Crawler module: drives page exploration over the frontier
//!
//! This module contains:
//! - The [`PageSource`] seam through which pages are fetched and parsed
//! - The [`Driver`] worker pool
//! - Seeding and interrupt handling for a crawl

mod driver;
mod source;

pub use driver::{ClaimGuard, Driver, DriverReport};
pub use source::{DiscoveredLink, Exploration, PageSource};

use crate::config::SeedEntry;
use crate::key::CanonicalKey;
use crate::storage::{Database, PageId};
use crate::Result;
use tokio::sync::watch;

/// Inserts the seed pages a crawl starts from
///
/// Seeds with an `id` are stored under that id. Re-running with the same seeds
/// is a no-op.
///
/// # Arguments
///
/// * `db` - Database to seed
/// * `seeds` - Seed entries, usually the `[[seed]]` tables of the config
///
/// # Returns
///
/// * `Ok(Vec<PageId>)` - Ids of the seed pages, in input order
/// * `Err(WikicrawlError)` - A seed key is invalid or conflicts with stored pages
pub fn bootstrap(db: &Database, seeds: &[SeedEntry]) -> Result<Vec<PageId>> {
    let pages = db.pages();
    let mut ids = Vec::with_capacity(seeds.len());

    for seed in seeds {
        let key = CanonicalKey::parse(&seed.key)?;
        let upserted = match seed.id {
            Some(id) => pages.upsert_with_id(&key, PageId(id))?,
            None => pages.upsert(&key)?,
        };

        if upserted.created {
            tracing::info!("Seeded page {} ({})", upserted.id, key);
        } else {
            tracing::debug!("Seed {} already present as page {}", key, upserted.id);
        }
        ids.push(upserted.id);
    }

    Ok(ids)
}

/// Turns Ctrl-C into a shutdown signal for [`Driver::run`]
///
/// The first interrupt asks workers to stop (claims in flight are given back);
/// a second one exits the process immediately. Must be called from within a
/// tokio runtime.
pub fn shutdown_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!("Could not listen for Ctrl-C: {}", err);
            return;
        }
        tracing::warn!("Interrupt received, waiting for workers to stop (Ctrl-C again to force)");
        let _ = tx.send(true);

        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received again, forcing exit");
            std::process::exit(130);
        }
    });

    rx
}
