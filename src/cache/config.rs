//! Cache configuration.
//!
//! [`CacheConfig`] sizes the process-wide store; [`CachePolicy`] describes how a
//! single route's responses are cached.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_MAX_ENTRIES: usize = 300;

/// Response cache configuration from `pawnstats.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of entries kept before LRU eviction.
    pub max_entries: usize,
    /// Serve the diagnostic `/api/cache/status` route.
    pub expose_status: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            expose_status: false,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            max_entries: settings.max_entries.get(),
            expose_status: settings.expose_status,
        }
    }
}

impl CacheConfig {
    /// Returns the entry limit as NonZeroUsize, clamping to 1 if zero.
    pub fn max_entries_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.max_entries).unwrap_or(NonZeroUsize::MIN)
    }
}

/// Per-request caching rules: the key, freshness windows and invalidation tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub key: String,
    pub max_age_seconds: u64,
    pub stale_while_revalidate_seconds: Option<u64>,
    pub tags: BTreeSet<String>,
}

impl CachePolicy {
    pub fn new(key: impl Into<String>, max_age_seconds: u64) -> Self {
        Self {
            key: key.into(),
            max_age_seconds,
            stale_while_revalidate_seconds: None,
            tags: BTreeSet::new(),
        }
    }

    pub fn stale_while_revalidate(mut self, seconds: u64) -> Self {
        self.stale_while_revalidate_seconds = Some(seconds);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    /// Stale window in seconds; an unset window means entries expire at `max-age`.
    pub fn stale_window_seconds(&self) -> u64 {
        self.stale_while_revalidate_seconds.unwrap_or(0)
    }

    pub(crate) fn cache_control(&self) -> String {
        format!(
            "public, max-age={}, stale-while-revalidate={}",
            self.max_age_seconds,
            self.stale_window_seconds()
        )
    }
}
