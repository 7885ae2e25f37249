use std::time::Duration;

use metrics::counter;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::UpstreamSettings;

use super::error::UpstreamError;
use super::limiter::{ConcurrencyLimiter, RateGate};
use super::retry::{backoff_delay, is_retriable, parse_retry_after};
use super::types::{ArchivesResponse, MonthlyGames, PlayerProfile, PlayerStats};

/// Client for the chess.com published-data API.
///
/// Requests run inside a FIFO concurrency limiter; every attempt, retries
/// included, first waits for a start slot on the rate gate.
#[derive(Debug)]
pub struct ChessComClient {
    http: Client,
    base: Url,
    limiter: ConcurrencyLimiter,
    gate: RateGate,
    rate_limit: Duration,
    max_attempts: u32,
}

impl ChessComClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, UpstreamError> {
        let http = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .build()?;
        Ok(Self::with_client(http, settings))
    }

    pub fn with_client(http: Client, settings: &UpstreamSettings) -> Self {
        let rate_limit = Duration::from_millis(settings.rate_limit_ms);
        Self {
            http,
            base: settings.base_url.clone(),
            limiter: ConcurrencyLimiter::new(settings.concurrency.get()),
            gate: RateGate::new(rate_limit),
            rate_limit,
            max_attempts: settings.max_attempts.get(),
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub async fn get_player(&self, username: &str) -> Result<PlayerProfile, UpstreamError> {
        let url = self.endpoint(&["player", username])?;
        self.request_json(url).await
    }

    pub async fn get_stats(&self, username: &str) -> Result<PlayerStats, UpstreamError> {
        let url = self.endpoint(&["player", username, "stats"])?;
        self.request_json(url).await
    }

    /// Monthly archive URLs, oldest first. A payload without a list yields none.
    pub async fn get_archives(&self, username: &str) -> Result<Vec<String>, UpstreamError> {
        let url = self.endpoint(&["player", username, "games", "archives"])?;
        let response: ArchivesResponse = self.request_json(url).await?;
        Ok(response.archives)
    }

    pub async fn get_monthly_games(
        &self,
        username: &str,
        year: i32,
        month: u32,
    ) -> Result<MonthlyGames, UpstreamError> {
        let year = year.to_string();
        let month = format!("{month:02}");
        let url = self.endpoint(&["player", username, "games", &year, &month])?;
        self.request_json(url).await
    }

    /// Fetch a month using an archive URL as returned by [`Self::get_archives`].
    pub async fn get_monthly_games_by_url(&self, url: &str) -> Result<MonthlyGames, UpstreamError> {
        let url = Url::parse(url).map_err(|err| UpstreamError::InvalidUrl(format!("{url}: {err}")))?;
        self.request_json(url).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    #[instrument(skip_all, fields(url = %url))]
    async fn request_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, UpstreamError> {
        self.limiter.run(self.send_with_retries(&url)).await
    }

    async fn send_with_retries<T: DeserializeOwned>(&self, url: &Url) -> Result<T, UpstreamError> {
        for attempt in 0..self.max_attempts {
            self.gate.wait().await;

            let response = self.http.get(url.clone()).send().await?;
            let status = response.status();
            if status.is_success() {
                debug!(attempt, status = status.as_u16(), "upstream request succeeded");
                return Ok(response.json::<T>().await?);
            }

            let retry_after = parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();

            if is_retriable(status) && attempt + 1 < self.max_attempts {
                let delay = backoff_delay(self.rate_limit, attempt, retry_after);
                counter!("pawnstats_upstream_retry_total").increment(1);
                warn!(
                    attempt,
                    status = status.as_u16(),
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "retrying upstream request"
                );
                tokio::time::sleep(delay).await;
                continue;
            }

            return Err(http_error(status, url, body));
        }

        Err(UpstreamError::RetriesExhausted {
            url: url.to_string(),
        })
    }
}

fn http_error(status: StatusCode, url: &Url, body: String) -> UpstreamError {
    UpstreamError::Http {
        status,
        url: url.to_string(),
        body,
    }
}
