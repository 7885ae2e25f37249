use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{application::error::AppError, cache::CacheStats};

use super::{HttpState, bypass};

#[derive(Debug, Deserialize)]
pub(super) struct InvalidateRequest {
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct InvalidateResponse {
    invalidated: usize,
    tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    stats: CacheStats,
    capacity: usize,
    refreshing: usize,
}

pub(super) async fn invalidate(
    State(state): State<HttpState>,
    payload: Result<Json<InvalidateRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) =
        payload.map_err(|err| AppError::validation(format!("invalid request body: {err}")))?;

    let mut tags: Vec<String> = request
        .tags
        .into_iter()
        .map(|tag| tag.trim().to_string())
        .filter(|tag| !tag.is_empty())
        .collect();
    tags.sort();
    tags.dedup();

    if tags.is_empty() {
        return Err(AppError::validation("at least one tag is required"));
    }

    let invalidated = state.cache.invalidate_tags(tags.iter().cloned());
    info!(invalidated, tags = ?tags, "cache tags invalidated");

    Ok(bypass(
        Json(InvalidateResponse { invalidated, tags }).into_response(),
    ))
}

pub(super) async fn status(State(state): State<HttpState>) -> Response {
    let body = StatusResponse {
        stats: state.cache.stats(),
        capacity: state.cache.store().capacity(),
        refreshing: state.cache.refreshes().in_flight(),
    };
    bypass(Json(body).into_response())
}
