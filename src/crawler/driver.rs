//! Crawl driver - worker pool over the frontier
//!
//! Each worker repeatedly claims one frontier page, asks the [`PageSource`] to
//! explore it, and records what came back:
//! - aliases of the page itself
//! - target pages of its links (created on first sight)
//! - the links
//! before marking the page explored. Pages the source cannot explore are
//! marked bugged. Pages whose exploration times out, is cancelled, or hits a
//! busy store go back to the frontier.

use crate::config::{Config, DriverConfig};
use crate::crawler::source::{Exploration, PageSource};
use crate::key::KeyRules;
use crate::query::load_statistics;
use crate::storage::{Claim, Database, EdgeOutcome, Frontier, Page, PageId, StoreError, StoreResult};
use crate::{Result, WikicrawlError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Pages between progress log lines
const PROGRESS_INTERVAL: u64 = 100;

/// What a driver pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverReport {
    /// Pages marked explored
    pub explored: u64,

    /// Pages marked bugged
    pub bugged: u64,

    /// Claims given back to the frontier (timeout, cancellation, busy store)
    pub released: u64,

    pub pages_created: u64,
    pub links_added: u64,
}

impl DriverReport {
    fn merge(self, other: DriverReport) -> DriverReport {
        DriverReport {
            explored: self.explored + other.explored,
            bugged: self.bugged + other.bugged,
            released: self.released + other.released,
            pages_created: self.pages_created + other.pages_created,
            links_added: self.links_added + other.links_added,
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    explored: AtomicU64,
    bugged: AtomicU64,
    released: AtomicU64,
    pages_created: AtomicU64,
    links_added: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> DriverReport {
        DriverReport {
            explored: self.explored.load(Ordering::Relaxed),
            bugged: self.bugged.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            pages_created: self.pages_created.load(Ordering::Relaxed),
            links_added: self.links_added.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pass {
    Frontier,
    Bugged,
}

/// State shared by the workers of one pass
#[derive(Debug)]
struct Shared {
    counters: Counters,
    abort: AtomicBool,

    /// Highest page id handed out during a bugged pass; held while claiming
    cursor: Mutex<PageId>,
    started: Instant,
}

/// Holds a claim and gives it back on drop unless the page was settled
///
/// Covers every way a worker can leave a page behind: errors, task
/// cancellation and panics.
#[derive(Debug)]
pub struct ClaimGuard {
    frontier: Frontier,
    claim: Claim,
    settled: bool,
}

impl ClaimGuard {
    pub fn new(frontier: Frontier, claim: Claim) -> Self {
        Self {
            frontier,
            claim,
            settled: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.claim.page_id
    }

    /// The page was marked explored or bugged; nothing to give back
    pub fn settle(mut self) {
        self.settled = true;
    }

    /// Gives the page back to the frontier now
    pub fn release(mut self) -> StoreResult<bool> {
        self.settled = true;
        self.frontier.release(&self.claim)
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Err(err) = self.frontier.release(&self.claim) {
            tracing::warn!(
                "Could not release claim on page {} (it will expire): {}",
                self.claim.page_id,
                err
            );
        }
    }
}

/// Runs workers over the frontier of a database
pub struct Driver<S> {
    db: Database,
    source: Arc<S>,
    rules: Arc<KeyRules>,
    config: DriverConfig,
}

impl<S: PageSource + 'static> Driver<S> {
    pub fn new(db: Database, source: S, rules: KeyRules, config: DriverConfig) -> Self {
        Self {
            db,
            source: Arc::new(source),
            rules: Arc::new(rules),
            config,
        }
    }

    /// Creates a driver from the `[driver]` and `[keys]` sections
    pub fn from_config(db: Database, source: S, config: &Config) -> Self {
        Self::new(
            db,
            source,
            KeyRules::new(&config.keys),
            config.driver.clone(),
        )
    }

    /// Crawls until the frontier is exhausted or `shutdown` turns true
    ///
    /// Expired claims left by an earlier run are recovered first. With
    /// `retry-bugged` enabled, a retry pass over bugged pages follows each
    /// frontier pass, and pages found by recovered pages are crawled in turn
    /// until a retry pass discovers nothing new.
    ///
    /// # Returns
    ///
    /// * `Ok(DriverReport)` - What the run did
    /// * `Err(WikicrawlError)` - A worker hit a store error that is not transient
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<DriverReport> {
        self.db.frontier().release_expired()?;

        tracing::info!(
            "Starting crawl with {} workers\n{}",
            self.config.workers,
            load_statistics(&self.db)?
        );

        let mut report = DriverReport::default();
        loop {
            report = report.merge(self.run_pass(Pass::Frontier, shutdown.clone()).await?);
            if !self.config.retry_bugged || *shutdown.borrow() {
                break;
            }

            let retry = self.run_pass(Pass::Bugged, shutdown.clone()).await?;
            report = report.merge(retry);
            if retry.pages_created == 0 || *shutdown.borrow() {
                break;
            }
        }

        tracing::info!("Crawl finished\n{}", load_statistics(&self.db)?);
        Ok(report)
    }

    /// Gives every bugged, never explored page one more attempt
    ///
    /// Pages failing again stay bugged; each page is attempted at most once per call.
    pub async fn retry_bugged(&self, shutdown: watch::Receiver<bool>) -> Result<DriverReport> {
        self.run_pass(Pass::Bugged, shutdown).await
    }

    async fn run_pass(&self, pass: Pass, shutdown: watch::Receiver<bool>) -> Result<DriverReport> {
        let shared = Arc::new(Shared {
            counters: Counters::default(),
            abort: AtomicBool::new(false),
            cursor: Mutex::new(PageId(i64::MIN)),
            started: Instant::now(),
        });

        let mut handles = Vec::with_capacity(self.config.workers as usize);
        for id in 0..self.config.workers {
            let worker = Worker {
                id,
                pass,
                db: self.db.clone(),
                source: Arc::clone(&self.source),
                rules: Arc::clone(&self.rules),
                shared: Arc::clone(&shared),
                fetch_timeout: Duration::from_secs(self.config.fetch_timeout_secs),
                idle_poll: Duration::from_millis(self.config.idle_poll_ms),
            };
            handles.push(tokio::spawn(worker.run(shutdown.clone())));
        }

        let mut first_error = None;
        for handle in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(join_err) => Err(WikicrawlError::Worker(join_err.to_string())),
            };
            if let Err(err) = outcome {
                shared.abort.store(true, Ordering::SeqCst);
                first_error.get_or_insert(err);
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        let report = shared.counters.snapshot();
        tracing::info!(
            "{:?} pass done in {:?}: {} explored, {} bugged, {} released, {} new pages, {} new links",
            pass,
            shared.started.elapsed(),
            report.explored,
            report.bugged,
            report.released,
            report.pages_created,
            report.links_added
        );
        Ok(report)
    }
}

struct Worker<S> {
    id: u32,
    pass: Pass,
    db: Database,
    source: Arc<S>,
    rules: Arc<KeyRules>,
    shared: Arc<Shared>,
    fetch_timeout: Duration,
    idle_poll: Duration,
}

impl<S: PageSource + 'static> Worker<S> {
    async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let frontier = self.db.frontier();

        loop {
            if *shutdown.borrow() || self.shared.abort.load(Ordering::SeqCst) {
                tracing::debug!("Worker {} stopping", self.id);
                return Ok(());
            }

            // Subscribe before looking so a page created in between still wakes us
            let changed = frontier.changed();

            let claim = match self.claim_one(&frontier) {
                Ok(claim) => claim,
                Err(err) if err.is_transient() => {
                    tracing::debug!("Worker {}: store busy while claiming: {}", self.id, err);
                    tokio::time::sleep(self.idle_poll).await;
                    continue;
                }
                Err(err) => return Err(self.abort(err)),
            };

            let Some(claim) = claim else {
                if self.pass == Pass::Bugged {
                    return Ok(());
                }
                match frontier.is_empty() {
                    Ok(true) => {
                        tracing::debug!("Worker {}: frontier exhausted", self.id);
                        return Ok(());
                    }
                    Ok(false) => {}
                    Err(err) if err.is_transient() => {}
                    Err(err) => return Err(self.abort(err)),
                }

                // Pages remain but are claimed by others; they may release them or add more
                tokio::select! {
                    _ = changed => {}
                    _ = tokio::time::sleep(self.idle_poll) => {}
                    _ = wait_for_shutdown(&mut shutdown) => {}
                }
                continue;
            };
            drop(changed);

            let guard = ClaimGuard::new(frontier.clone(), claim);
            if let Err(err) = self.process(guard, &mut shutdown).await {
                return Err(self.abort(err));
            }
        }
    }

    fn claim_one(&self, frontier: &Frontier) -> StoreResult<Option<Claim>> {
        match self.pass {
            Pass::Frontier => Ok(frontier.next(1)?.into_iter().next()),
            Pass::Bugged => {
                let mut cursor = self
                    .shared
                    .cursor
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner);
                let claim = frontier.next_bugged_after(*cursor, 1)?.into_iter().next();
                if let Some(claim) = &claim {
                    *cursor = claim.page_id;
                }
                Ok(claim)
            }
        }
    }

    async fn process(
        &self,
        guard: ClaimGuard,
        shutdown: &mut watch::Receiver<bool>,
    ) -> StoreResult<()> {
        let page = match self.db.pages().get(guard.page_id()) {
            Ok(page) => page,
            Err(err) if err.is_transient() => return self.give_back(guard),
            Err(err) => return Err(err),
        };

        tracing::debug!("Worker {} exploring {}", self.id, page);

        let outcome = tokio::select! {
            _ = wait_for_shutdown(shutdown) => None,
            result = tokio::time::timeout(self.fetch_timeout, self.source.explore(&page)) => Some(result),
        };

        let exploration = match outcome {
            None => {
                tracing::debug!("Shutdown while exploring {}", page);
                return self.give_back(guard);
            }
            Some(Err(_elapsed)) => {
                tracing::warn!("Timed out after {:?} exploring {}", self.fetch_timeout, page);
                return self.give_back(guard);
            }
            Some(Ok(Err(err))) => {
                tracing::warn!("Failed to explore {}: {:#}", page, err);
                return match self.db.pages().mark_bugged(page.id) {
                    Ok(()) => {
                        guard.settle();
                        self.shared.counters.bugged.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    }
                    Err(err) if err.is_transient() => self.give_back(guard),
                    Err(err) => Err(err),
                };
            }
            Some(Ok(Ok(exploration))) => exploration,
        };

        match self.record(&page, &exploration) {
            Ok((created, added)) => {
                guard.settle();
                let counters = &self.shared.counters;
                counters.pages_created.fetch_add(created, Ordering::Relaxed);
                counters.links_added.fetch_add(added, Ordering::Relaxed);
                let explored = counters.explored.fetch_add(1, Ordering::Relaxed) + 1;

                tracing::trace!(
                    "Explored {}: {} links, {} new pages",
                    page,
                    exploration.links.len(),
                    created
                );

                if explored % PROGRESS_INTERVAL == 0 {
                    let elapsed = self.shared.started.elapsed();
                    tracing::info!(
                        "Progress: {} pages explored, {} new pages, {:.2} pages/sec",
                        explored,
                        counters.pages_created.load(Ordering::Relaxed),
                        explored as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
                    );
                }
                Ok(())
            }
            Err(err) if err.is_transient() => {
                tracing::debug!("Store busy while recording {}: {}", page, err);
                self.give_back(guard)
            }
            Err(err) => Err(err),
        }
    }

    /// Writes the result of exploring `page` and marks it explored
    ///
    /// Returns the number of pages created and links added. Safe to repeat
    /// after a partial failure: every write is idempotent.
    fn record(&self, page: &Page, exploration: &Exploration) -> StoreResult<(u64, u64)> {
        let pages = self.db.pages();
        let aliases = self.db.aliases();
        let links = self.db.links();

        for raw in &exploration.aliases {
            let alias = match self.rules.admit(raw) {
                Ok(Some(alias)) => alias,
                Ok(None) => continue,
                Err(err) => {
                    tracing::debug!("Skipping invalid alias '{}' of {}: {}", raw, page, err);
                    continue;
                }
            };
            if alias.as_str() == page.canonical_key {
                continue;
            }

            match aliases.add_alias(&alias, page.id) {
                Ok(_) => {}
                Err(StoreError::Conflict { existing, .. }) => {
                    tracing::warn!(
                        "Alias '{}' of {} already names page {}",
                        alias,
                        page,
                        existing
                    );
                }
                Err(err) => return Err(err),
            }
        }

        let mut created = 0;
        let mut added = 0;

        for link in &exploration.links {
            let key = match self.rules.admit(&link.target) {
                Ok(Some(key)) => key,
                Ok(None) => {
                    tracing::trace!("Skipping excluded link '{}'", link.target);
                    continue;
                }
                Err(err) => {
                    tracing::debug!("Skipping invalid link '{}' on {}: {}", link.target, page, err);
                    continue;
                }
            };

            let target = match aliases.lookup(&key)? {
                Some(id) => id,
                None => {
                    let upserted = pages.upsert(&key)?;
                    if upserted.created {
                        created += 1;
                    }
                    upserted.id
                }
            };

            if links.add_edge(page.id, target, link.display.as_deref())? == EdgeOutcome::Inserted {
                added += 1;
            }
        }

        pages.mark_explored(page.id)?;
        Ok((created, added))
    }

    fn give_back(&self, guard: ClaimGuard) -> StoreResult<()> {
        let page_id = guard.page_id();
        match guard.release() {
            Ok(true) => {
                self.shared.counters.released.fetch_add(1, Ordering::Relaxed);
            }
            Ok(false) => {
                tracing::debug!("Claim on page {} was already gone", page_id);
            }
            Err(err) => {
                tracing::warn!(
                    "Could not release claim on page {} (it will expire): {}",
                    page_id,
                    err
                );
            }
        }
        Ok(())
    }

    fn abort(&self, err: StoreError) -> WikicrawlError {
        self.shared.abort.store(true, Ordering::SeqCst);
        if err.is_fatal() {
            tracing::error!("Worker {}: store is unusable, aborting crawl: {}", self.id, err);
        } else {
            tracing::error!("Worker {}: unexpected store error, aborting crawl: {}", self.id, err);
        }
        err.into()
    }
}

/// Resolves once shutdown is requested; never resolves if the sender is gone
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
