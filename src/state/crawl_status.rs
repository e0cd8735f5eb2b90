//! Crawl status definitions derived from a page's `explored`/`bugged` flags

use std::fmt;

/// Represents where a page stands in the crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlStatus {
    /// Known but not yet explored; part of the frontier
    Pending,

    /// Explored successfully
    Explored,

    /// Could not be fetched or parsed; excluded from the frontier until retried
    Bugged,

    /// Bugged once, then explored by a retry pass
    Recovered,
}

impl CrawlStatus {
    /// Builds the status from the persisted flags
    pub fn from_flags(explored: bool, bugged: bool) -> Self {
        match (explored, bugged) {
            (false, false) => Self::Pending,
            (true, false) => Self::Explored,
            (false, true) => Self::Bugged,
            (true, true) => Self::Recovered,
        }
    }

    /// Returns the `(explored, bugged)` flags for this status
    pub fn flags(&self) -> (bool, bool) {
        match self {
            Self::Pending => (false, false),
            Self::Explored => (true, false),
            Self::Bugged => (false, true),
            Self::Recovered => (true, true),
        }
    }

    /// Returns true if the page is served by `Frontier::next`
    pub fn is_frontier(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Returns true if the page has been explored, whatever its history
    pub fn is_explored(&self) -> bool {
        matches!(self, Self::Explored | Self::Recovered)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Explored => "explored",
            Self::Bugged => "bugged",
            Self::Recovered => "recovered",
        }
    }

    /// Returns all possible statuses
    pub fn all() -> [Self; 4] {
        [Self::Pending, Self::Explored, Self::Bugged, Self::Recovered]
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
