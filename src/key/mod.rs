//! Canonical keys for page identity
//!
//! Every page, alias and seed is identified by a [`CanonicalKey`]: the
//! normalized form of a title or URL. Two references that normalize to the same
//! key are the same page.

mod normalize;

use crate::config::KeyConfig;
use crate::KeyResult;
use std::fmt;
use std::str::FromStr;

pub use normalize::normalize_key;

/// A normalized, non-empty page key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalKey(String);

impl CanonicalKey {
    /// Normalizes `raw` into a canonical key
    ///
    /// ```
    /// use wikicrawl::CanonicalKey;
    ///
    /// let a = CanonicalKey::parse("French_Republic").unwrap();
    /// let b = CanonicalKey::parse("https://fr.wikipedia.org/wiki/French_Republic").unwrap();
    /// assert_eq!(a, b);
    /// ```
    pub fn parse(raw: &str) -> KeyResult<Self> {
        normalize_key(raw).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CanonicalKey {
    type Err = crate::KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Namespace rules deciding which discovered keys are worth recording
#[derive(Debug, Clone, Default)]
pub struct KeyRules {
    excluded_prefixes: Vec<String>,
}

impl KeyRules {
    pub fn new(config: &KeyConfig) -> Self {
        let excluded_prefixes = config
            .excluded_prefixes
            .iter()
            .map(|prefix| normalize::fold(prefix))
            .filter(|prefix| !prefix.is_empty())
            .collect();

        Self { excluded_prefixes }
    }

    /// Returns true if the key lives in an excluded namespace
    pub fn is_excluded(&self, key: &CanonicalKey) -> bool {
        self.excluded_prefixes
            .iter()
            .any(|prefix| key.as_str().starts_with(prefix.as_str()))
    }

    /// Normalizes `raw` and filters out excluded namespaces
    ///
    /// Returns `Ok(None)` for keys that parse but are excluded.
    pub fn admit(&self, raw: &str) -> KeyResult<Option<CanonicalKey>> {
        let key = CanonicalKey::parse(raw)?;
        if self.is_excluded(&key) {
            return Ok(None);
        }
        Ok(Some(key))
    }
}
