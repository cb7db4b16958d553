//! Renewal failure modes
//!
//! `Clone` because one renewal outcome fans out to every queued waiter.

/// Errors from credential renewal.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("renewal timed out: {0}")]
    Timeout(String),

    #[error("renewal rejected: {0}")]
    Rejected(String),

    #[error("invalid renewal response: {0}")]
    InvalidResponse(String),

    #[error("no refresh credential in storage")]
    NoRefreshCredential,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("internal renewal error: {0}")]
    Internal(String),
}

/// Result alias for renewal operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<campus_auth::Error> for Error {
    fn from(e: campus_auth::Error) -> Self {
        match e {
            campus_auth::Error::Http(msg) => Error::Http(msg),
            campus_auth::Error::Timeout(msg) => Error::Timeout(msg),
            campus_auth::Error::Rejected(msg) => Error::Rejected(msg),
            campus_auth::Error::InvalidResponse(msg) => Error::InvalidResponse(msg),
            campus_auth::Error::Storage(msg) => Error::Storage(msg),
        }
    }
}
