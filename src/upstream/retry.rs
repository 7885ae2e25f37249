//! Retry classification and backoff for upstream responses.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;

/// Upper bound on an honoured `Retry-After`.
pub const MAX_RETRY_AFTER: Duration = Duration::from_secs(300);

/// Statuses worth retrying: rate limiting and transient server failures.
pub fn is_retriable(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

/// `Retry-After` in delta-seconds, capped at [`MAX_RETRY_AFTER`].
///
/// HTTP-date values and values no `Duration` can hold are ignored.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
        .and_then(|seconds| Duration::try_from_secs_f64(seconds).ok())
        .map(|delay| delay.min(MAX_RETRY_AFTER))
}

/// Delay before the retry that follows zero-based `attempt`.
///
/// A positive `Retry-After` wins; otherwise `rate_limit * 2^(attempt + 1)`.
pub fn backoff_delay(rate_limit: Duration, attempt: u32, retry_after: Option<Duration>) -> Duration {
    match retry_after {
        Some(delay) if !delay.is_zero() => delay,
        _ => {
            let factor = 2_u32.saturating_pow(attempt.saturating_add(1));
            rate_limit.saturating_mul(factor)
        }
    }
}
