//! Rate-limited client for the chess.com published-data API.

mod client;
mod error;
mod limiter;
mod retry;
mod types;

pub use client::ChessComClient;
pub use error::UpstreamError;
pub use limiter::{ConcurrencyLimiter, RateGate};
pub use retry::{DEFAULT_MAX_ATTEMPTS, MAX_RETRY_AFTER, backoff_delay, is_retriable, parse_retry_after};
pub use types::{
    Accuracies, Accuracy, ArchivesResponse, Game, GamePlayer, MonthlyGames, PlayerProfile,
    PlayerStats,
};
