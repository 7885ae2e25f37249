//! Stale-while-revalidate JSON responses.
//!
//! [`ResponseCache::cached_json_response`] decides per request whether the
//! stored entry is fresh (HIT), stale (STALE, served while one background
//! refresh runs) or missing/expired (MISS, producer awaited inline), and
//! renders the caching headers and conditional-GET short circuit.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use metrics::counter;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::clock::{Clock, SystemClock};
use super::config::{CacheConfig, CachePolicy};
use super::entry::{CacheEntry, Freshness, build_entry};
use super::error::CacheError;
use super::refresh::{RefreshCoordinator, RefreshGuard};
use super::store::{CacheStats, CacheStore};

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

const METRIC_CACHE_HIT_TOTAL: &str = "pawnstats_cache_hit_total";
const METRIC_CACHE_STALE_TOTAL: &str = "pawnstats_cache_stale_total";
const METRIC_CACHE_MISS_TOTAL: &str = "pawnstats_cache_miss_total";
const METRIC_CACHE_NOT_MODIFIED_TOTAL: &str = "pawnstats_cache_not_modified_total";
const METRIC_CACHE_REFRESH_STARTED_TOTAL: &str = "pawnstats_cache_refresh_started_total";
const METRIC_CACHE_REFRESH_FAILED_TOTAL: &str = "pawnstats_cache_refresh_failed_total";

/// Value of the `X-Cache` response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Stale,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Stale => "STALE",
            CacheStatus::Miss => "MISS",
        }
    }
}

/// Shared handle over the entry store, the refresh coordinator and the clock.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<CacheStore>,
    refreshes: RefreshCoordinator,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store: Arc::new(CacheStore::new(config)),
            refreshes: RefreshCoordinator::new(),
            clock,
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn refreshes(&self) -> &RefreshCoordinator {
        &self.refreshes
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    /// Drop every entry tagged with any of `tags`. Called after writes upstream of the cache.
    pub fn invalidate_tags<I, S>(&self, tags: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let removed = self.store.invalidate_tags(tags);
        debug!(removed, "invalidated tagged cache entries");
        removed
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats(self.clock.now_millis())
    }

    /// Serve `policy.key` from cache, producing it when needed.
    ///
    /// Background refresh failures are logged at `warn`.
    pub async fn cached_json_response<T, E, F, Fut>(
        &self,
        request_headers: &HeaderMap,
        policy: &CachePolicy,
        producer: F,
    ) -> Result<Response, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + Send + 'static,
        E: From<CacheError> + Display + Send + 'static,
    {
        let key = policy.key.clone();
        self.cached_json_response_with(request_headers, policy, producer, move |error: E| {
            warn!(cache_key = %key, error = %error, "background refresh failed");
        })
        .await
    }

    /// Like [`Self::cached_json_response`], routing background refresh failures
    /// to `on_background_error` instead of the default log line.
    ///
    /// A producer error on the MISS path is returned to the caller and nothing
    /// is stored.
    #[instrument(skip_all, fields(cache_key = %policy.key))]
    pub async fn cached_json_response_with<T, E, F, Fut, R>(
        &self,
        request_headers: &HeaderMap,
        policy: &CachePolicy,
        producer: F,
        on_background_error: R,
    ) -> Result<Response, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + Send + 'static,
        E: From<CacheError> + Send + 'static,
        R: FnOnce(E) + Send + 'static,
    {
        let now = self.clock.now_millis();

        if let Some(entry) = self.store.get(&policy.key) {
            match entry.freshness(now) {
                Freshness::Fresh => {
                    counter!(METRIC_CACHE_HIT_TOTAL).increment(1);
                    debug!(outcome = "hit", "serving fresh entry");
                    return Ok(render_entry(
                        &entry,
                        CacheStatus::Hit,
                        policy,
                        Some(request_headers),
                        now,
                    ));
                }
                Freshness::Stale => {
                    counter!(METRIC_CACHE_STALE_TOTAL).increment(1);
                    match self.claim_refresh(&policy.key) {
                        Some(guard) => {
                            debug!(outcome = "stale", "serving stale entry, refreshing");
                            self.spawn_refresh(guard, policy, producer(), on_background_error);
                        }
                        None => {
                            debug!(outcome = "stale", "serving stale entry, no refresh needed");
                        }
                    }
                    return Ok(render_entry(
                        &entry,
                        CacheStatus::Stale,
                        policy,
                        Some(request_headers),
                        now,
                    ));
                }
                Freshness::Expired => {}
            }
        }

        counter!(METRIC_CACHE_MISS_TOTAL).increment(1);
        debug!(outcome = "miss", "producing entry");

        let payload = producer().await?;
        let created_at = self.clock.now_millis();
        let entry = build_entry(
            &policy.key,
            &payload,
            policy.max_age_seconds,
            policy.stale_window_seconds(),
            &policy.tags,
            created_at,
        )?;

        // MISS never answers 304.
        let response = render_entry(&entry, CacheStatus::Miss, policy, None, created_at);
        self.store.set(entry);
        Ok(response)
    }

    /// Claims the refresh slot for `key` unless another refresh holds it or
    /// one has already stored a fresh entry.
    fn claim_refresh(&self, key: &str) -> Option<RefreshGuard> {
        let guard = self.refreshes.try_begin(key)?;
        let now = self.clock.now_millis();
        match self.store.get(key) {
            Some(entry) if entry.freshness(now) == Freshness::Fresh => None,
            _ => Some(guard),
        }
    }

    fn spawn_refresh<T, E, Fut, R>(
        &self,
        guard: RefreshGuard,
        policy: &CachePolicy,
        refresh: Fut,
        on_error: R,
    ) where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Serialize + Send + 'static,
        E: From<CacheError> + Send + 'static,
        R: FnOnce(E) + Send + 'static,
    {
        counter!(METRIC_CACHE_REFRESH_STARTED_TOTAL).increment(1);

        let store = Arc::clone(&self.store);
        let clock = Arc::clone(&self.clock);
        let policy = policy.clone();

        tokio::spawn(async move {
            let _guard = guard;

            let outcome = match refresh.await {
                Ok(payload) => build_entry(
                    &policy.key,
                    &payload,
                    policy.max_age_seconds,
                    policy.stale_window_seconds(),
                    &policy.tags,
                    clock.now_millis(),
                )
                .map_err(E::from),
                Err(error) => Err(error),
            };

            match outcome {
                Ok(entry) => {
                    store.set(entry);
                    debug!(cache_key = %policy.key, "background refresh stored new entry");
                }
                Err(error) => {
                    counter!(METRIC_CACHE_REFRESH_FAILED_TOTAL).increment(1);
                    on_error(error);
                }
            }
        });
    }
}

fn render_entry(
    entry: &CacheEntry,
    status: CacheStatus,
    policy: &CachePolicy,
    conditional: Option<&HeaderMap>,
    now: u64,
) -> Response {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&policy.cache_control()) {
        headers.insert(header::CACHE_CONTROL, value);
    }
    if let Ok(value) = HeaderValue::from_str(&entry.etag) {
        headers.insert(header::ETAG, value);
    }
    headers.insert(header::VARY, HeaderValue::from_static("Accept-Encoding"));
    headers.insert(X_CACHE, HeaderValue::from_static(status.as_str()));
    headers.insert(header::AGE, HeaderValue::from(entry.age_seconds(now)));

    let not_modified = conditional
        .and_then(if_none_match)
        .is_some_and(|candidate| candidate == entry.etag);
    if not_modified {
        counter!(METRIC_CACHE_NOT_MODIFIED_TOTAL).increment(1);
        return (StatusCode::NOT_MODIFIED, headers).into_response();
    }

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_CONTENT_TYPE),
    );
    (StatusCode::OK, headers, Body::from(entry.body.clone())).into_response()
}

/// First validator of `If-None-Match`, trimmed.
fn if_none_match(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::IF_NONE_MATCH)?
        .to_str()
        .ok()?
        .split(',')
        .next()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
