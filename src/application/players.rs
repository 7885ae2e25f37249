//! Cached player queries against chess.com.

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::response::Response;

use crate::{
    cache::{CacheKeyBuilder, CachePolicy, ResponseCache},
    upstream::ChessComClient,
};

use super::error::AppError;

/// Tags a completed data sync must invalidate.
pub const SYNC_INVALIDATION_TAGS: [&str; 3] = ["stats", "games", "sync-status"];

pub const TAG_PLAYER: &str = "player";
pub const TAG_STATS: &str = "stats";
pub const TAG_GAMES: &str = "games";

/// Trimmed, lowercased chess.com username.
pub fn normalize_username(raw: &str) -> Result<String, AppError> {
    let username = raw.trim().to_lowercase();
    if username.is_empty() {
        return Err(AppError::validation("username must not be empty"));
    }
    Ok(username)
}

/// Parse an archive month from its path segments.
pub fn parse_archive_month(year: &str, month: &str) -> Result<(i32, u32), AppError> {
    let year: i32 = year
        .trim()
        .parse()
        .map_err(|_| AppError::validation(format!("invalid year `{year}`")))?;
    let month: u32 = month
        .trim()
        .parse()
        .map_err(|_| AppError::validation(format!("invalid month `{month}`")))?;
    if !(1..=12).contains(&month) {
        return Err(AppError::validation("month must be between 1 and 12"));
    }
    Ok((year, month))
}

pub fn profile_policy(username: &str, raw_query: Option<&str>) -> CachePolicy {
    let key = CacheKeyBuilder::new("player-profile")
        .param("username", username)
        .raw_query(raw_query)
        .build();
    CachePolicy::new(key, 60)
        .stale_while_revalidate(120)
        .tags([TAG_PLAYER])
}

pub fn stats_policy(username: &str, raw_query: Option<&str>) -> CachePolicy {
    let key = CacheKeyBuilder::new("player-stats")
        .param("username", username)
        .raw_query(raw_query)
        .build();
    CachePolicy::new(key, 20)
        .stale_while_revalidate(120)
        .tags([TAG_STATS])
}

pub fn archives_policy(username: &str, raw_query: Option<&str>) -> CachePolicy {
    let key = CacheKeyBuilder::new("player-archives")
        .param("username", username)
        .raw_query(raw_query)
        .build();
    CachePolicy::new(key, 20)
        .stale_while_revalidate(60)
        .tags([TAG_GAMES])
}

pub fn games_policy(username: &str, year: i32, month: u32, raw_query: Option<&str>) -> CachePolicy {
    let key = CacheKeyBuilder::new("player-games")
        .param("username", username)
        .param("year", year)
        .param("month", month)
        .raw_query(raw_query)
        .build();
    CachePolicy::new(key, 60)
        .stale_while_revalidate(120)
        .tags([TAG_GAMES])
}

/// Player endpoints served through the response cache.
#[derive(Clone)]
pub struct PlayerQueries {
    cache: ResponseCache,
    upstream: Arc<ChessComClient>,
}

impl PlayerQueries {
    pub fn new(cache: ResponseCache, upstream: Arc<ChessComClient>) -> Self {
        Self { cache, upstream }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub async fn profile(
        &self,
        headers: &HeaderMap,
        username: String,
        raw_query: Option<&str>,
    ) -> Result<Response, AppError> {
        let policy = profile_policy(&username, raw_query);
        let upstream = Arc::clone(&self.upstream);
        self.cache
            .cached_json_response(headers, &policy, move || async move {
                upstream.get_player(&username).await.map_err(AppError::from)
            })
            .await
    }

    pub async fn stats(
        &self,
        headers: &HeaderMap,
        username: String,
        raw_query: Option<&str>,
    ) -> Result<Response, AppError> {
        let policy = stats_policy(&username, raw_query);
        let upstream = Arc::clone(&self.upstream);
        self.cache
            .cached_json_response(headers, &policy, move || async move {
                upstream.get_stats(&username).await.map_err(AppError::from)
            })
            .await
    }

    pub async fn archives(
        &self,
        headers: &HeaderMap,
        username: String,
        raw_query: Option<&str>,
    ) -> Result<Response, AppError> {
        let policy = archives_policy(&username, raw_query);
        let upstream = Arc::clone(&self.upstream);
        self.cache
            .cached_json_response(headers, &policy, move || async move {
                upstream
                    .get_archives(&username)
                    .await
                    .map(|archives| serde_json::json!({ "archives": archives }))
                    .map_err(AppError::from)
            })
            .await
    }

    pub async fn monthly_games(
        &self,
        headers: &HeaderMap,
        username: String,
        year: i32,
        month: u32,
        raw_query: Option<&str>,
    ) -> Result<Response, AppError> {
        let policy = games_policy(&username, year, month, raw_query);
        let upstream = Arc::clone(&self.upstream);
        self.cache
            .cached_json_response(headers, &policy, move || async move {
                upstream
                    .get_monthly_games(&username, year, month)
                    .await
                    .map_err(AppError::from)
            })
            .await
    }
}
