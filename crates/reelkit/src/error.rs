use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("request timed out after {0} ms")]
    Timeout(u64),
    #[error("request cancelled")]
    Cancelled,
    #[error("unexpected status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("session expired or rate limited (status {status})")]
    SessionExpired { status: u16 },
    #[error("no session available for subject {0}")]
    MissingSession(String),
    #[error("extraction error: {0}")]
    Extraction(String),
    #[error("deobfuscation error: {0}")]
    Deobfuscation(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration error: {0}")]
    Config(String),
}

impl ScrapeError {
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction(msg.into())
    }

    pub fn deobfuscation(msg: impl Into<String>) -> Self {
        Self::Deobfuscation(msg.into())
    }

    /// Session invalidation signals that warrant a fresh initialization and another attempt.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
