//! Error types for outbound requests

/// Errors from sending a request or reading its response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Retry timeout exceeded after {attempts} attempts (last status {last_status})")]
    RetryTimeoutExceeded { attempts: u32, last_status: u16 },

    #[error("invalid response body: {0}")]
    Decode(String),
}

/// Result alias for request operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_timeout_message_is_stable() {
        let err = Error::RetryTimeoutExceeded {
            attempts: 3,
            last_status: 500,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Retry timeout exceeded"), "got: {msg}");
        assert!(msg.contains("500"));
    }
}
