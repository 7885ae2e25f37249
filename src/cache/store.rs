//! Bounded response cache storage.
//!
//! Entries live in an [`LruCache`] keyed by cache key. A `get` promotes the
//! entry to most-recently-used; inserting past capacity evicts the least
//! recently used entry. Freshness is not interpreted here.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use metrics::{counter, gauge};
use serde::Serialize;
use tracing::debug;

use super::config::CacheConfig;
use super::entry::{CacheEntry, Freshness};
use super::lock::mutex_lock;

const SOURCE: &str = "cache::store";
const METRIC_CACHE_EVICT_TOTAL: &str = "pawnstats_cache_evict_total";
const METRIC_CACHE_ENTRIES: &str = "pawnstats_cache_entries";

/// Entry counts by freshness at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub fresh: usize,
    pub stale: usize,
}

pub struct CacheStore {
    entries: Mutex<LruCache<String, Arc<CacheEntry>>>,
}

impl CacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(config.max_entries_non_zero())),
        }
    }

    /// Look up an entry and mark it most recently used.
    pub fn get(&self, key: &str) -> Option<Arc<CacheEntry>> {
        mutex_lock(&self.entries, SOURCE, "get").get(key).cloned()
    }

    /// Insert or wholesale replace an entry, returning the key evicted to make room.
    pub fn set(&self, entry: CacheEntry) -> Option<String> {
        let key = entry.key.clone();
        let mut entries = mutex_lock(&self.entries, SOURCE, "set");

        let evicted = entries
            .push(key.clone(), Arc::new(entry))
            .map(|(evicted_key, _)| evicted_key)
            .filter(|evicted_key| *evicted_key != key);
        gauge!(METRIC_CACHE_ENTRIES).set(entries.len() as f64);
        drop(entries);

        if let Some(evicted_key) = evicted.as_ref() {
            counter!(METRIC_CACHE_EVICT_TOTAL).increment(1);
            debug!(cache_key = %evicted_key, "evicted least recently used entry");
        }

        evicted
    }

    /// Remove every entry carrying at least one of `tags`. Returns the number removed.
    pub fn invalidate_tags<I, S>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let wanted: BTreeSet<String> = tags.into_iter().map(Into::into).collect();
        if wanted.is_empty() {
            return 0;
        }

        let mut entries = mutex_lock(&self.entries, SOURCE, "invalidate_tags");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.has_any_tag(&wanted))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &doomed {
            entries.pop(key);
        }
        gauge!(METRIC_CACHE_ENTRIES).set(entries.len() as f64);

        doomed.len()
    }

    /// Counts entries by freshness at `now`; expired entries are in neither bucket.
    pub fn stats(&self, now: u64) -> CacheStats {
        let entries = mutex_lock(&self.entries, SOURCE, "stats");

        let mut fresh = 0;
        let mut stale = 0;
        for (_, entry) in entries.iter() {
            match entry.freshness(now) {
                Freshness::Fresh => fresh += 1,
                Freshness::Stale => stale += 1,
                Freshness::Expired => {}
            }
        }

        CacheStats {
            entries: entries.len(),
            fresh,
            stale,
        }
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "capacity").cap().get()
    }
}
