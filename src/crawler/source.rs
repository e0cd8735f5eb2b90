//! Page sources: where explored pages get their links from

use crate::storage::Page;
use std::future::Future;

/// A link found on an explored page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredLink {
    /// Raw reference to the target (title, `/wiki/...` path or URL)
    pub target: String,

    /// Anchor text, if any
    pub display: Option<String>,
}

impl DiscoveredLink {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            display: None,
        }
    }

    pub fn with_display(target: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            display: Some(display.into()),
        }
    }
}

/// Everything learned from exploring one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Exploration {
    pub links: Vec<DiscoveredLink>,

    /// Alternate names of the explored page itself (redirect titles)
    pub aliases: Vec<String>,
}

/// Fetches and parses pages for the driver
///
/// An `Err` means the page could not be explored; the driver marks it bugged.
/// Implementations should not retry internally for longer than the configured
/// fetch timeout, after which the driver gives the page back to the frontier.
pub trait PageSource: Send + Sync {
    fn explore(&self, page: &Page) -> impl Future<Output = anyhow::Result<Exploration>> + Send;
}
