//! SQLite database handle
//!
//! A [`Database`] owns one SQLite connection behind a mutex and is cheap to
//! clone; every component ([`PageStore`], [`AliasIndex`], [`LinkGraph`],
//! [`Frontier`]) is a thin view over a clone of it.

use crate::config::{Config, EdgeIdentity, FrontierConfig, StoreConfig};
use crate::storage::error::{is_busy, StoreError, StoreResult};
use crate::storage::frontier::FrontierSignal;
use crate::storage::schema::initialize_schema;
use crate::storage::{AliasIndex, Frontier, LinkGraph, PageStore};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::{Handle, RuntimeFlavor};

/// Settings shared by all components of one database handle
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub edge_identity: EdgeIdentity,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub claim_lease: Duration,
}

impl Settings {
    fn new(store: &StoreConfig, frontier: &FrontierConfig) -> Self {
        Self {
            edge_identity: store.edge_identity,
            max_retries: store.max_retries,
            retry_backoff: Duration::from_millis(store.retry_backoff_ms),
            claim_lease: Duration::from_secs(frontier.claim_lease_secs),
        }
    }
}

/// Shared handle to the crawl database
#[derive(Debug, Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    settings: Arc<Settings>,
    signal: Arc<FrontierSignal>,
}

impl Database {
    /// Opens (or creates) the database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    /// * `store` - Storage settings (edge identity, retries, busy timeout)
    /// * `frontier` - Frontier settings (claim lease)
    ///
    /// # Returns
    ///
    /// * `Ok(Database)` - Successfully opened/created database
    /// * `Err(StoreError)` - Failed to open the file or install the schema
    pub fn open(path: &Path, store: &StoreConfig, frontier: &FrontierConfig) -> StoreResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_millis(store.busy_timeout_ms))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        Self::from_connection(conn, store, frontier)
    }

    /// Opens the database described by a full configuration
    pub fn open_with_config(config: &Config) -> StoreResult<Self> {
        Self::open(
            Path::new(&config.store.database_path),
            &config.store,
            &config.frontier,
        )
    }

    /// Creates an in-memory database
    pub fn open_in_memory(store: &StoreConfig, frontier: &FrontierConfig) -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Self::from_connection(conn, store, frontier)
    }

    fn from_connection(
        conn: Connection,
        store: &StoreConfig,
        frontier: &FrontierConfig,
    ) -> StoreResult<Self> {
        initialize_schema(&conn, store.edge_identity)?;

        tracing::debug!(
            "Database ready (edge identity: {})",
            store.edge_identity.to_db_string()
        );

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            settings: Arc::new(Settings::new(store, frontier)),
            signal: Arc::new(FrontierSignal::default()),
        })
    }

    pub fn pages(&self) -> PageStore {
        PageStore::new(self.clone())
    }

    pub fn aliases(&self) -> AliasIndex {
        AliasIndex::new(self.clone())
    }

    pub fn links(&self) -> LinkGraph {
        LinkGraph::new(self.clone())
    }

    pub fn frontier(&self) -> Frontier {
        Frontier::new(self.clone())
    }

    /// Edge identity this database was created with
    pub fn edge_identity(&self) -> EdgeIdentity {
        self.settings.edge_identity
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn signal(&self) -> &FrontierSignal {
        &self.signal
    }

    /// Runs `op` against the connection, retrying lock contention with backoff
    ///
    /// The mutex is released between attempts. `op` must be safe to re-run: any
    /// transaction it opened has been rolled back when it returned an error.
    pub(crate) fn with_conn<T, F>(&self, mut op: F) -> StoreResult<T>
    where
        F: FnMut(&mut Connection) -> StoreResult<T>,
    {
        let mut attempt: u32 = 0;
        loop {
            let result = {
                let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
                op(&mut conn)
            };

            match result {
                Err(StoreError::Sqlite(err)) if is_busy(&err) => {
                    if attempt >= self.settings.max_retries {
                        return Err(StoreError::Transient {
                            attempts: attempt + 1,
                            source: err,
                        });
                    }

                    let backoff = self
                        .settings
                        .retry_backoff
                        .saturating_mul(1u32 << attempt.min(10));
                    tracing::debug!(
                        "Database busy (attempt {}), retrying in {:?}",
                        attempt + 1,
                        backoff
                    );
                    pause(backoff);
                    attempt += 1;
                }
                other => return other,
            }
        }
    }
}

/// Blocking sleep between busy retries
///
/// Store calls are synchronous and often made from async workers; on a
/// multi-threaded runtime the worker thread hands its other tasks off first.
fn pause(backoff: Duration) {
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| std::thread::sleep(backoff))
        }
        _ => std::thread::sleep(backoff),
    }
}
