//! Cache entries and their construction from producer payloads.

use std::collections::BTreeSet;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use bytes::Bytes;
use serde::Serialize;
use sha2::{Digest, Sha256};

use super::error::CacheError;

const MILLIS_PER_SECOND: u64 = 1_000;

/// A serialized response body and its freshness window.
///
/// Entries are immutable; a refresh builds a new entry and replaces the old
/// one in the store. `created_at <= expires_at <= stale_until` always holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub body: Bytes,
    pub etag: String,
    pub created_at: u64,
    pub expires_at: u64,
    pub stale_until: u64,
    pub tags: BTreeSet<String>,
}

/// Temporal state of an entry relative to a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Expired,
}

impl CacheEntry {
    pub fn freshness(&self, now: u64) -> Freshness {
        if now < self.expires_at {
            Freshness::Fresh
        } else if now < self.stale_until {
            Freshness::Stale
        } else {
            Freshness::Expired
        }
    }

    /// Whole seconds elapsed since creation, never negative.
    pub fn age_seconds(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at) / MILLIS_PER_SECOND
    }

    pub fn has_any_tag(&self, tags: &BTreeSet<String>) -> bool {
        !self.tags.is_disjoint(tags)
    }
}

/// Serialize `payload` and stamp a new entry created at `now`.
pub fn build_entry<T: Serialize + ?Sized>(
    key: &str,
    payload: &T,
    max_age_seconds: u64,
    stale_window_seconds: u64,
    tags: &BTreeSet<String>,
    now: u64,
) -> Result<CacheEntry, CacheError> {
    let body = serde_json::to_vec(payload)?;
    let etag = compute_etag(&body);

    let expires_at = now.saturating_add(max_age_seconds.saturating_mul(MILLIS_PER_SECOND));
    let stale_until =
        expires_at.saturating_add(stale_window_seconds.saturating_mul(MILLIS_PER_SECOND));

    Ok(CacheEntry {
        key: key.to_string(),
        body: Bytes::from(body),
        etag,
        created_at: now,
        expires_at,
        stale_until,
        tags: tags.clone(),
    })
}

/// Strong, content-addressed validator: quoted base64url SHA-256 of the body.
pub fn compute_etag(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("\"{}\"", URL_SAFE_NO_PAD.encode(&digest[..]))
}
