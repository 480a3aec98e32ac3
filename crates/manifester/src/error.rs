//! Error types for the manifest workflow

/// Errors from allocation, reconciliation and export operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Request(#[from] requester::Error),

    #[error(transparent)]
    Auth(#[from] rhsm_auth::Error),

    #[error(
        "received HTTP {status} from {url}; ensure the request is properly formatted and authorized for a valid endpoint"
    )]
    Http { status: u16, url: String },

    #[error("adding entitlements from pool {pool_id} failed with HTTP {status}: {body}")]
    EntitlementAttach {
        pool_id: String,
        status: u16,
        body: String,
    },

    #[error("no pool can supply {quantity} of {subscription} ({candidates} pools with that name)")]
    NoEligiblePool {
        subscription: String,
        quantity: u32,
        candidates: usize,
    },

    #[error("entitlements for {subscription} did not converge after {rounds} rounds ({remaining} still missing)")]
    ReconcileExhausted {
        subscription: String,
        rounds: u32,
        remaining: u32,
    },

    #[error("quantity for {0} must be greater than zero")]
    InvalidQuantity(String),

    #[error("Export timeout exceeded after {attempts} status checks")]
    ExportTimeout { attempts: u32 },

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("no subscription allocation has been created")]
    NoAllocation,

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("inventory error: {0}")]
    Inventory(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for manifest operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_timeout_passes_through_unchanged() {
        let err: Error = requester::Error::RetryTimeoutExceeded {
            attempts: 8,
            last_status: 504,
        }
        .into();
        assert!(err.to_string().starts_with("Retry timeout exceeded"), "got: {err}");
    }

    #[test]
    fn attach_error_surfaces_status() {
        let err = Error::EntitlementAttach {
            pool_id: "8a85f9".into(),
            status: 409,
            body: "conflict".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("409"), "got: {msg}");
        assert!(msg.contains("8a85f9"), "got: {msg}");
    }

    #[test]
    fn export_timeout_message() {
        let err = Error::ExportTimeout { attempts: 501 };
        assert!(err.to_string().starts_with("Export timeout exceeded"));
    }
}
