use serde::Deserialize;

/// Main configuration structure for Wikicrawl
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub frontier: FrontierConfig,
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub keys: KeyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub seed: Vec<SeedEntry>,
}

/// How edges between the same two pages are told apart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EdgeIdentity {
    /// One edge per (linker, linked); the first recorded display text wins
    #[default]
    PairOnly,

    /// One edge per (linker, linked, display)
    PairPlusDisplay,
}

impl EdgeIdentity {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::PairOnly => "pair-only",
            Self::PairPlusDisplay => "pair-plus-display",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pair-only" => Some(Self::PairOnly),
            "pair-plus-display" => Some(Self::PairPlusDisplay),
            _ => None,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Edge identity used by the link graph; fixed when the database is created
    #[serde(rename = "edge-identity")]
    pub edge_identity: EdgeIdentity,

    /// SQLite busy timeout (milliseconds)
    #[serde(rename = "busy-timeout-ms")]
    pub busy_timeout_ms: u64,

    /// Number of retries for transient storage failures
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base backoff between retries (milliseconds), doubled on each attempt
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: "./wikicrawl.db".to_string(),
            edge_identity: EdgeIdentity::PairOnly,
            busy_timeout_ms: 5000,
            max_retries: 5,
            retry_backoff_ms: 20,
        }
    }
}

/// Frontier configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrontierConfig {
    /// Seconds after which an unreleased claim is considered abandoned
    #[serde(rename = "claim-lease-secs")]
    pub claim_lease_secs: u64,
}

impl Default for FrontierConfig {
    fn default() -> Self {
        Self {
            claim_lease_secs: 300,
        }
    }
}

/// Crawler driver configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Number of concurrent exploring workers
    pub workers: u32,

    /// Maximum time a single page exploration may take (seconds)
    #[serde(rename = "fetch-timeout-secs")]
    pub fetch_timeout_secs: u64,

    /// How long an idle worker waits for new frontier entries (milliseconds)
    #[serde(rename = "idle-poll-ms")]
    pub idle_poll_ms: u64,

    /// Run a retry pass over bugged pages after the main crawl
    #[serde(rename = "retry-bugged")]
    pub retry_bugged: bool,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            fetch_timeout_secs: 30,
            idle_poll_ms: 200,
            retry_bugged: false,
        }
    }
}

/// Canonical key rules
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Namespace prefixes whose pages are never recorded (e.g. "catégorie:")
    #[serde(rename = "excluded-prefixes")]
    pub excluded_prefixes: Vec<String>,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            excluded_prefixes: default_excluded_prefixes(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub filter: String,

    /// Include the event target in log lines
    #[serde(rename = "with-target")]
    pub with_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "wikicrawl=info,warn".to_string(),
            with_target: false,
        }
    }
}

/// Seed page used to bootstrap a fresh crawl
#[derive(Debug, Clone, Deserialize)]
pub struct SeedEntry {
    /// Title or URL of the seed page
    pub key: String,

    /// Externally assigned page id (e.g. a Wikipedia page id)
    #[serde(default)]
    pub id: Option<i64>,
}

/// French Wikipedia namespaces, which hold no article content
pub fn default_excluded_prefixes() -> Vec<String> {
    [
        "média:",
        "spécial:",
        "discussion:",
        "utilisateur:",
        "discussion utilisateur:",
        "wikipédia:",
        "discussion wikipédia:",
        "fichier:",
        "discussion fichier:",
        "mediawiki:",
        "discussion mediawiki:",
        "modèle:",
        "discussion modèle:",
        "aide:",
        "discussion aide:",
        "catégorie:",
        "discussion catégorie:",
        "portail:",
        "discussion portail:",
        "projet:",
        "discussion projet:",
        "référence:",
        "discussion référence:",
        "timedtext:",
        "timedtext talk:",
        "module:",
        "discussion module:",
        "sujet:",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}
