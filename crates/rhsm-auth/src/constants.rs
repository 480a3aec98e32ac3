//! Subscription API client constants
//!
//! Public client identifiers and default endpoints. These are not secrets; the
//! offline token supplied through settings is.

/// Public OAuth client ID accepted by the SSO realm for the subscription API
pub const CLIENT_ID: &str = "rhsm-api";

/// Grant type used to trade an offline token for an access token
pub const GRANT_TYPE: &str = "refresh_token";

/// Default SSO token endpoint
pub const TOKEN_REQUEST_URL: &str =
    "https://sso.redhat.com/auth/realms/redhat-external/protocol/openid-connect/token";

/// Default subscription allocations endpoint
pub const ALLOCATIONS_URL: &str = "https://api.access.redhat.com/management/v1/allocations";
