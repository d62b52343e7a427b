use thiserror::Error;

/// Failure of a single gateway call. Only two kinds matter to callers:
/// a rate-limit signal (retry later) and everything else (give up on the unit).
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited(_))
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;
