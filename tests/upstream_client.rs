use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use pawnstats::config::UpstreamSettings;
use pawnstats::upstream::{ChessComClient, UpstreamError};
use serde_json::json;
use tokio::net::TcpListener;
use url::Url;

#[derive(Clone, Default)]
struct MockState {
    flaky_calls: Arc<AtomicUsize>,
    broken_calls: Arc<AtomicUsize>,
    missing_calls: Arc<AtomicUsize>,
    user_agents: Arc<std::sync::Mutex<Vec<String>>>,
}

async fn player(
    State(state): State<MockState>,
    Path(username): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(agent) = headers.get(header::USER_AGENT).and_then(|v| v.to_str().ok()) {
        state
            .user_agents
            .lock()
            .expect("agents lock")
            .push(agent.to_string());
    }

    match username.as_str() {
        "flaky" => {
            let call = state.flaky_calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                (StatusCode::SERVICE_UNAVAILABLE, "try later").into_response()
            } else {
                Json(json!({ "username": "flaky", "followers": 3 })).into_response()
            }
        }
        "broken" => {
            state.broken_calls.fetch_add(1, Ordering::SeqCst);
            (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
        }
        "throttled" => {
            let call = state.flaky_calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, "1")],
                    "slow down",
                )
                    .into_response()
            } else {
                Json(json!({ "username": "throttled" })).into_response()
            }
        }
        "overloaded" => {
            let call = state.flaky_calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, "1e20")],
                    "slow down",
                )
                    .into_response()
            } else {
                Json(json!({ "username": "overloaded" })).into_response()
            }
        }
        _ => {
            state.missing_calls.fetch_add(1, Ordering::SeqCst);
            (StatusCode::NOT_FOUND, "{\"message\":\"not found\"}").into_response()
        }
    }
}

async fn archives(Path(username): Path<String>) -> Response {
    if username == "empty" {
        return Json(json!({})).into_response();
    }
    Json(json!({
        "archives": [format!("https://api.chess.com/pub/player/{username}/games/2024/03")]
    }))
    .into_response()
}

async fn monthly_games(Path((username, year, month)): Path<(String, String, String)>) -> Response {
    Json(json!({
        "games": [{
            "url": format!("https://www.chess.com/game/live/{username}-{year}-{month}"),
            "end_time": 1_709_251_200,
            "white": { "username": username, "rating": 1500, "result": "win" },
            "black": { "username": "opponent", "rating": 1480, "result": "checkmated" }
        }]
    }))
    .into_response()
}

async fn spawn_mock() -> (Url, MockState) {
    let state = MockState::default();
    let app = Router::new()
        .route("/pub/player/{username}", get(player))
        .route("/pub/player/{username}/games/archives", get(archives))
        .route(
            "/pub/player/{username}/games/{year}/{month}",
            get(monthly_games),
        )
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let base = Url::parse(&format!("http://{addr}/pub")).expect("mock url");
    (base, state)
}

fn settings(base: Url, rate_limit_ms: u64) -> UpstreamSettings {
    UpstreamSettings {
        base_url: base,
        user_agent: "pawnstats-tests (contact: tests@example.com)".to_string(),
        concurrency: NonZeroUsize::new(1).expect("non-zero"),
        rate_limit_ms,
        max_attempts: NonZeroU32::new(4).expect("non-zero"),
    }
}

#[tokio::test]
async fn retries_transient_failures_then_succeeds() {
    let (base, state) = spawn_mock().await;
    let client = ChessComClient::new(&settings(base, 0)).expect("client");

    let profile = client.get_player("flaky").await.expect("second attempt succeeds");

    assert_eq!(profile.username, "flaky");
    assert_eq!(profile.followers, Some(3));
    assert_eq!(state.flaky_calls.load(Ordering::SeqCst), 2);
    let agents = state.user_agents.lock().expect("agents lock").clone();
    assert!(
        agents
            .iter()
            .all(|agent| agent == "pawnstats-tests (contact: tests@example.com)")
    );
}

#[tokio::test]
async fn not_found_is_not_retried() {
    let (base, state) = spawn_mock().await;
    let client = ChessComClient::new(&settings(base, 0)).expect("client");

    let error = client
        .get_player("nobody")
        .await
        .expect_err("missing player");

    assert!(error.is_not_found());
    assert_eq!(error.body(), Some("{\"message\":\"not found\"}"));
    assert_eq!(state.missing_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn persistent_server_errors_fail_after_max_attempts() {
    let (base, state) = spawn_mock().await;
    let client = ChessComClient::new(&settings(base, 0)).expect("client");

    let error = client.get_player("broken").await.expect_err("always 500");

    match error {
        UpstreamError::Http { status, body, .. } => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, "boom");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(state.broken_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn retry_after_header_delays_the_next_attempt() {
    let (base, _state) = spawn_mock().await;
    let client = ChessComClient::new(&settings(base, 0)).expect("client");

    let started = Instant::now();
    let profile = client.get_player("throttled").await.expect("retried");

    assert_eq!(profile.username, "throttled");
    assert!(started.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn unrepresentable_retry_after_falls_back_to_backoff() {
    let (base, state) = spawn_mock().await;
    let client = ChessComClient::new(&settings(base, 0)).expect("client");

    let profile = tokio::time::timeout(Duration::from_secs(5), client.get_player("overloaded"))
        .await
        .expect("retry is not delayed by the oversized header")
        .expect("second attempt succeeds");

    assert_eq!(profile.username, "overloaded");
    assert_eq!(state.flaky_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn archives_and_monthly_games_are_fetched() {
    let (base, _state) = spawn_mock().await;
    let client = ChessComClient::new(&settings(base.clone(), 0)).expect("client");

    let archives = client.get_archives("hikaru").await.expect("archives");
    assert_eq!(
        archives,
        vec!["https://api.chess.com/pub/player/hikaru/games/2024/03".to_string()]
    );
    assert!(client.get_archives("empty").await.expect("archives").is_empty());

    let games = client
        .get_monthly_games("hikaru", 2024, 3)
        .await
        .expect("games");
    assert_eq!(games.games.len(), 1);
    assert_eq!(
        games.games[0].url,
        "https://www.chess.com/game/live/hikaru-2024-03"
    );

    let by_url = format!("{base}/player/hikaru/games/2024/03");
    let games = client
        .get_monthly_games_by_url(&by_url)
        .await
        .expect("games by url");
    assert_eq!(games.games[0].white.username.as_deref(), Some("hikaru"));
}

#[tokio::test]
async fn request_starts_are_spaced_by_the_rate_limit() {
    let (base, _state) = spawn_mock().await;
    let client = Arc::new(ChessComClient::new(&settings(base, 100)).expect("client"));

    let started = Instant::now();
    let tasks: Vec<_> = (0..3)
        .map(|_| {
            let client = Arc::clone(&client);
            tokio::spawn(async move { client.get_archives("hikaru").await })
        })
        .collect();
    for task in tasks {
        task.await.expect("task").expect("archives");
    }

    // three starts need at least two full intervals between them
    assert!(started.elapsed() >= Duration::from_millis(200));
}
