//! Errors surfaced by the request pipeline

/// Errors a platform call can surface to the application.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("session error: {0}")]
    Session(#[from] campus_auth::Error),

    #[error("credential renewal failed: {0}")]
    Renewal(#[from] campus_renewal::Error),
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
