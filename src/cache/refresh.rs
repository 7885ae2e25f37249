//! Background refresh bookkeeping.
//!
//! At most one background refresh may run per cache key. [`RefreshCoordinator::try_begin`]
//! checks and marks a key in a single step, and the returned [`RefreshGuard`]
//! clears the mark when dropped, whether the refresh succeeded, failed or panicked.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Tracks cache keys that currently have a background refresh in flight.
#[derive(Default, Clone)]
pub struct RefreshCoordinator {
    keys: Arc<DashMap<String, ()>>,
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            keys: Arc::new(DashMap::new()),
        }
    }

    pub fn is_refreshing(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    /// Idempotently set or clear the in-flight mark for `key`.
    pub fn mark_refreshing(&self, key: &str, refreshing: bool) {
        if refreshing {
            self.keys.insert(key.to_string(), ());
        } else {
            self.keys.remove(key);
        }
    }

    /// Claim the refresh slot for `key`, or `None` if another refresh holds it.
    pub fn try_begin(&self, key: &str) -> Option<RefreshGuard> {
        match self.keys.entry(key.to_string()) {
            Entry::Vacant(vacant) => {
                vacant.insert(());
                Some(RefreshGuard {
                    key: key.to_string(),
                    keys: Arc::clone(&self.keys),
                })
            }
            Entry::Occupied(_) => None,
        }
    }

    /// Number of refreshes currently in flight.
    pub fn in_flight(&self) -> usize {
        self.keys.len()
    }
}

#[must_use = "dropping the guard ends the refresh immediately"]
pub struct RefreshGuard {
    key: String,
    keys: Arc<DashMap<String, ()>>,
}

impl RefreshGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.keys.remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_claim_is_refused_while_first_is_held() {
        let coordinator = RefreshCoordinator::new();

        let guard = coordinator.try_begin("stats-summary").expect("first claim");
        assert_eq!(guard.key(), "stats-summary");
        assert!(coordinator.is_refreshing("stats-summary"));
        assert!(coordinator.try_begin("stats-summary").is_none());

        // other keys are independent
        let other = coordinator.try_begin("games-list").expect("independent key");
        assert_eq!(coordinator.in_flight(), 2);

        drop(guard);
        drop(other);
        assert!(!coordinator.is_refreshing("stats-summary"));
        assert_eq!(coordinator.in_flight(), 0);
        assert!(coordinator.try_begin("stats-summary").is_some());
    }

    #[test]
    fn mark_refreshing_is_idempotent() {
        let coordinator = RefreshCoordinator::new();

        coordinator.mark_refreshing("k", true);
        coordinator.mark_refreshing("k", true);
        assert!(coordinator.is_refreshing("k"));
        assert_eq!(coordinator.in_flight(), 1);
        assert!(coordinator.try_begin("k").is_none());

        coordinator.mark_refreshing("k", false);
        coordinator.mark_refreshing("k", false);
        assert!(!coordinator.is_refreshing("k"));
    }

    #[test]
    fn guard_clears_mark_on_panic() {
        let coordinator = RefreshCoordinator::new();
        let cloned = coordinator.clone();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = cloned.try_begin("k").expect("claim");
            panic!("producer blew up");
        }));

        assert!(result.is_err());
        assert!(!coordinator.is_refreshing("k"));
    }

    #[test]
    fn concurrent_claims_yield_a_single_winner() {
        let coordinator = RefreshCoordinator::new();
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = coordinator.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    coordinator.try_begin("hot-key").map(std::mem::forget).is_some()
                })
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|handle| handle.join().expect("thread completes"))
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert!(coordinator.is_refreshing("hot-key"));
    }
}
