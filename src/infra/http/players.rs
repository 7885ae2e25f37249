use axum::{
    extract::{Path, State},
    http::{HeaderMap, Uri},
    response::Response,
};

use crate::application::{
    error::AppError,
    players::{normalize_username, parse_archive_month},
};

use super::HttpState;

pub(super) async fn profile(
    State(state): State<HttpState>,
    Path(username): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    let username = normalize_username(&username)?;
    state.players().profile(&headers, username, uri.query()).await
}

pub(super) async fn stats(
    State(state): State<HttpState>,
    Path(username): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    let username = normalize_username(&username)?;
    state.players().stats(&headers, username, uri.query()).await
}

pub(super) async fn archives(
    State(state): State<HttpState>,
    Path(username): Path<String>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    let username = normalize_username(&username)?;
    state.players().archives(&headers, username, uri.query()).await
}

pub(super) async fn monthly_games(
    State(state): State<HttpState>,
    Path((username, year, month)): Path<(String, String, String)>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Response, AppError> {
    let username = normalize_username(&username)?;
    let (year, month) = parse_archive_month(&year, &month)?;
    state
        .players()
        .monthly_games(&headers, username, year, month, uri.query())
        .await
}
