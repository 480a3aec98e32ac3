//! Error types for token acquisition

/// Errors from the token endpoint.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error(transparent)]
    Request(#[from] requester::Error),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
