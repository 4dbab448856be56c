use thiserror::Error;

/// Failure of a single storage call.
///
/// None of these reach the dashboard; the chain logs them and moves on to
/// the next backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The request never got a response (connection refused, DNS, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// The backend answered with a non-2xx status.
    #[error("backend returned HTTP {0}")]
    Status(u16),

    /// The request exceeded the client timeout.
    #[error("request timed out")]
    Timeout,

    /// The client-side request budget for the collector is spent.
    #[error("collector rate limit reached (100 requests per 15 minutes)")]
    RateLimited,

    /// A response body could not be read.
    #[error("unreadable response: {0}")]
    Response(String),

    /// The payload could not be encoded or a stored payload decoded.
    #[error("could not encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// The local SQLite buffer rejected the write or read.
    #[error("local buffer error: {0}")]
    Buffer(#[from] rusqlite::Error),

    #[error("local buffer lock poisoned")]
    LockPoisoned,
}

// Timeouts and statuses get their own variants so the chain can log them apart.
impl From<reqwest::Error> for StorageError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            StorageError::Timeout
        } else if let Some(status) = e.status() {
            StorageError::Status(status.as_u16())
        } else if e.is_decode() {
            StorageError::Response(e.to_string())
        } else {
            StorageError::Network(e.to_string())
        }
    }
}

/// Missing or malformed backend settings.
///
/// A backend with a `ConfigError` is left out of the chain; it never stops
/// the session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required key for a partially configured backend is absent.
    #[error("{backend} backend is missing {key}")]
    Missing { backend: &'static str, key: &'static str },

    /// A key is present but unusable.
    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}
