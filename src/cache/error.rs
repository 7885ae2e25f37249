use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to serialize cached payload: {0}")]
    Serialize(#[from] serde_json::Error),
}
