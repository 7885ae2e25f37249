//! HTTP surface: router, shared state and request middleware.

mod cache_admin;
mod middleware;
mod players;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::{HeaderValue, header::CACHE_CONTROL},
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::json;

use crate::{
    application::players::PlayerQueries,
    cache::{ResponseCache, X_CACHE},
    upstream::ChessComClient,
};

pub use middleware::RequestContext;

#[derive(Clone)]
pub struct HttpState {
    pub cache: ResponseCache,
    pub upstream: Arc<ChessComClient>,
    pub expose_cache_status: bool,
}

impl HttpState {
    pub fn players(&self) -> PlayerQueries {
        PlayerQueries::new(self.cache.clone(), Arc::clone(&self.upstream))
    }
}

pub fn build_router(state: HttpState) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/api/players/{username}", get(players::profile))
        .route("/api/players/{username}/stats", get(players::stats))
        .route("/api/players/{username}/archives", get(players::archives))
        .route(
            "/api/players/{username}/games/{year}/{month}",
            get(players::monthly_games),
        )
        .route("/api/cache/invalidate", post(cache_admin::invalidate));

    if state.expose_cache_status {
        router = router.route("/api/cache/status", get(cache_admin::status));
    }

    router
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::log_responses))
        .layer(axum_middleware::from_fn(middleware::set_request_context))
}

async fn health() -> Response {
    Json(json!({ "ok": true })).into_response()
}

/// Mark a response as never cacheable and outside the response cache.
fn bypass(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(X_CACHE, HeaderValue::from_static("BYPASS"));
    response
}
