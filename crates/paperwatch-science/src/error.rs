use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScienceError {
    #[error("invalid arXiv ID: {0}")]
    InvalidArxivId(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("API error from {0}: {1}")]
    ApiError(String, String),

    #[error("rate limit from {0}, retry after {1}s")]
    RateLimit(String, u64),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] paperwatch_core::PaperwatchError),
}

impl ScienceError {
    /// Worth retrying on a later pass without any local change.
    ///
    /// Timeouts, rate limits, connection problems and server-side errors are
    /// transient. A definitive "no such paper" is not.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            Self::NotFound(_) | Self::InvalidArxivId(_) | Self::Core(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScienceError>;
