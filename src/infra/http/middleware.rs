use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;
use crate::cache::X_CACHE;

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let request_id = request
        .extensions()
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default();

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    let cache = cache_status(&response);

    if status.is_client_error() || status.is_server_error() {
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());

        if status.is_server_error() {
            error!(
                target: "pawnstats::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms,
                cache,
                source,
                detail = %detail,
                chain = ?messages,
                request_id = %request_id,
                "request failed",
            );
        } else {
            warn!(
                target: "pawnstats::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms,
                cache,
                source,
                detail = %detail,
                chain = ?messages,
                request_id = %request_id,
                "client request error",
            );
        }
    } else {
        debug!(
            target: "pawnstats::http::response",
            status = status.as_u16(),
            method = %method,
            path = %uri.path(),
            elapsed_ms,
            cache,
            request_id = %request_id,
            "request completed",
        );
    }

    response
}

/// `X-Cache` outcome of a response, `"NONE"` for uncached routes.
fn cache_status(response: &Response) -> &'static str {
    match response
        .headers()
        .get(X_CACHE)
        .and_then(|value| value.to_str().ok())
    {
        Some("HIT") => "HIT",
        Some("STALE") => "STALE",
        Some("MISS") => "MISS",
        Some("BYPASS") => "BYPASS",
        _ => "NONE",
    }
}
