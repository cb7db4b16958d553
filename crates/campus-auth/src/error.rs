//! Error types for session and auth endpoint operations

/// Errors from session storage and auth endpoint interactions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("credentials rejected: {0}")]
    Rejected(String),

    #[error("invalid auth response: {0}")]
    InvalidResponse(String),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, Error>;
