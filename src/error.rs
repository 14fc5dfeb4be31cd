use thiserror::Error;

use crate::cache_key::CacheKey;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("no derivable cached solution for {query}")]
    NoDerivableCandidate { query: CacheKey },
    #[error("solution tuned for {tuned} cannot serve {key}")]
    UnderivableKey { key: CacheKey, tuned: CacheKey },
    #[error("malformed cache record: {0}")]
    MalformedCacheRecord(String),
    #[error("kernel cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("kernel cache json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

impl CacheError {
    pub(crate) fn malformed(what: impl Into<String>) -> Self {
        CacheError::MalformedCacheRecord(what.into())
    }
}
