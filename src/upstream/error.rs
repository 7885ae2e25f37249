use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("chess.com request failed ({status}) for {url}")]
    Http {
        status: StatusCode,
        url: String,
        body: String,
    },
    #[error("request retries exhausted for {url}")]
    RetriesExhausted { url: String },
    #[error("http transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid upstream url: {0}")]
    InvalidUrl(String),
    #[error("upstream concurrency limiter closed")]
    LimiterClosed,
}

impl UpstreamError {
    /// Status code reported by the upstream, when it answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            UpstreamError::Http { status, .. } => Some(*status),
            UpstreamError::Transport(error) => error.status(),
            _ => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            UpstreamError::Http { body, .. } => Some(body),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}
