use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "pawnstats_cache_hit_total",
            Unit::Count,
            "Responses served from a fresh cache entry."
        );
        describe_counter!(
            "pawnstats_cache_stale_total",
            Unit::Count,
            "Responses served from a stale entry inside its revalidation window."
        );
        describe_counter!(
            "pawnstats_cache_miss_total",
            Unit::Count,
            "Responses produced inline because no usable entry existed."
        );
        describe_counter!(
            "pawnstats_cache_not_modified_total",
            Unit::Count,
            "Conditional requests answered with 304 Not Modified."
        );
        describe_counter!(
            "pawnstats_cache_evict_total",
            Unit::Count,
            "Entries evicted because the cache reached capacity."
        );
        describe_counter!(
            "pawnstats_cache_refresh_started_total",
            Unit::Count,
            "Background refreshes started for stale entries."
        );
        describe_counter!(
            "pawnstats_cache_refresh_failed_total",
            Unit::Count,
            "Background refreshes whose producer failed."
        );
        describe_gauge!(
            "pawnstats_cache_entries",
            Unit::Count,
            "Current number of cached responses."
        );
        describe_counter!(
            "pawnstats_upstream_retry_total",
            Unit::Count,
            "Upstream requests retried after a retriable status."
        );
    });
}
