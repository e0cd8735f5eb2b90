use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use wikicrawl::config::{DriverConfig, FrontierConfig, StoreConfig};
use wikicrawl::crawler::{DiscoveredLink, Exploration, PageSource};
use wikicrawl::{CanonicalKey, Database, Page};

/// Opens a database file inside `dir`
pub fn open_db(dir: &TempDir) -> Database {
    Database::open(
        &dir.path().join("crawl.db"),
        &StoreConfig::default(),
        &FrontierConfig::default(),
    )
    .expect("open database")
}

pub fn driver_config(workers: u32) -> DriverConfig {
    DriverConfig {
        workers,
        fetch_timeout_secs: 5,
        idle_poll_ms: 5,
        retry_bugged: false,
    }
}

pub fn key(raw: &str) -> CanonicalKey {
    CanonicalKey::parse(raw).expect("valid key")
}

/// How a [`MockSource`] treats one page
#[derive(Debug, Clone)]
pub enum Behavior {
    Links(Vec<DiscoveredLink>),

    /// Fails this many times, then serves the links
    FailTimes(usize, Vec<DiscoveredLink>),

    /// Never completes
    Hang,
}

/// Page source serving a fixed graph
#[derive(Debug, Default)]
pub struct MockSource {
    pages: HashMap<String, Behavior>,
    aliases: HashMap<String, Vec<String>>,
    attempts: Mutex<HashMap<String, usize>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a page linking to `targets`, each with its own title as anchor text
    pub fn page(mut self, title: &str, targets: &[&str]) -> Self {
        let links = targets
            .iter()
            .map(|t| DiscoveredLink::with_display(format!("/wiki/{}", t.replace(' ', "_")), *t))
            .collect();
        self.pages.insert(key(title).into_string(), Behavior::Links(links));
        self
    }

    pub fn behavior(mut self, title: &str, behavior: Behavior) -> Self {
        self.pages.insert(key(title).into_string(), behavior);
        self
    }

    pub fn alias(mut self, title: &str, alias: &str) -> Self {
        self.aliases
            .entry(key(title).into_string())
            .or_default()
            .push(alias.to_string());
        self
    }
}

impl PageSource for MockSource {
    async fn explore(&self, page: &Page) -> anyhow::Result<Exploration> {
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(page.canonical_key.clone()).or_insert(0);
            *count += 1;
            *count
        };

        let links = match self.pages.get(&page.canonical_key) {
            None => anyhow::bail!("page not found: {}", page.canonical_key),
            Some(Behavior::Links(links)) => links.clone(),
            Some(Behavior::FailTimes(failures, links)) => {
                if attempt <= *failures {
                    anyhow::bail!("attempt {} failed", attempt);
                }
                links.clone()
            }
            Some(Behavior::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Vec::new()
            }
        };

        Ok(Exploration {
            links,
            aliases: self
                .aliases
                .get(&page.canonical_key)
                .cloned()
                .unwrap_or_default(),
        })
    }
}
