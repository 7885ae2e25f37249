use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode, header};
use metrics_util::debugging::DebuggingRecorder;
use pawnstats::application::error::AppError;
use pawnstats::cache::{CacheConfig, CachePolicy, ManualClock, ResponseCache};
use pawnstats::infra::telemetry;
use serde_json::json;

async fn wait_for_refreshes(cache: &ResponseCache) {
    for _ in 0..200 {
        if cache.refreshes().in_flight() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("background refresh did not finish");
}

#[tokio::test]
async fn cache_paths_emit_expected_metric_keys() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");
    telemetry::describe_metrics();

    let clock = Arc::new(ManualClock::new(0));
    let config = CacheConfig {
        max_entries: 1,
        ..Default::default()
    };
    let cache = ResponseCache::with_clock(&config, clock.clone());
    let no_headers = HeaderMap::new();

    let first = CachePolicy::new("player-stats|username=one", 20)
        .stale_while_revalidate(120)
        .tags(["stats"]);
    let second = CachePolicy::new("player-stats|username=two", 20)
        .stale_while_revalidate(120)
        .tags(["stats"]);

    // miss, then hit
    let response = cache
        .cached_json_response(&no_headers, &first, || async {
            Ok::<_, AppError>(json!({ "rating": 1500 }))
        })
        .await
        .expect("miss response");
    let etag = response
        .headers()
        .get(header::ETAG)
        .cloned()
        .expect("etag header");
    cache
        .cached_json_response(&no_headers, &first, || async {
            Ok::<_, AppError>(json!({ "rating": 1500 }))
        })
        .await
        .expect("hit response");

    // not modified
    let mut conditional = HeaderMap::new();
    conditional.insert(header::IF_NONE_MATCH, etag);
    let response = cache
        .cached_json_response(&conditional, &first, || async {
            Ok::<_, AppError>(json!({ "rating": 1500 }))
        })
        .await
        .expect("conditional response");
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);

    // stale with a failing refresh
    clock.advance(Duration::from_secs(30));
    cache
        .cached_json_response(&no_headers, &first, || async {
            Err::<serde_json::Value, _>(AppError::unexpected("upstream down"))
        })
        .await
        .expect("stale response");
    wait_for_refreshes(&cache).await;

    // eviction at capacity one
    cache
        .cached_json_response(&no_headers, &second, || async {
            Ok::<_, AppError>(json!({ "rating": 1600 }))
        })
        .await
        .expect("second miss");

    let names: HashSet<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect();

    let expected = [
        "pawnstats_cache_hit_total",
        "pawnstats_cache_stale_total",
        "pawnstats_cache_miss_total",
        "pawnstats_cache_not_modified_total",
        "pawnstats_cache_evict_total",
        "pawnstats_cache_refresh_started_total",
        "pawnstats_cache_refresh_failed_total",
        "pawnstats_cache_entries",
    ];

    for metric in expected {
        assert!(names.contains(metric), "missing metric: {metric}");
    }
}
