//! Pawnstats response cache.
//!
//! A single-process, in-memory stale-while-revalidate cache for JSON
//! responses:
//!
//! - **Keys**: deterministic fingerprints of route + params + query + extras
//! - **Store**: LRU-bounded map of immutable entries with tag invalidation
//! - **Refreshes**: at most one background refresh per key
//! - **Responses**: HIT / STALE / MISS decisions, caching headers and `304`s
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! max_entries = 300
//! expose_status = false
//! ```

mod clock;
mod config;
mod entry;
mod error;
mod keys;
mod lock;
mod refresh;
mod response;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CacheConfig, CachePolicy};
pub use entry::{CacheEntry, Freshness, build_entry, compute_etag};
pub use error::CacheError;
pub use keys::{CacheKeyBuilder, KeyPairs, KeyValue, build_key, query_pairs};
pub use refresh::{RefreshCoordinator, RefreshGuard};
pub use response::{CacheStatus, ResponseCache, X_CACHE};
pub use store::{CacheStats, CacheStore};
