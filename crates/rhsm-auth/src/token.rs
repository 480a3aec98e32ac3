//! Offline token exchange
//!
//! POSTs a `refresh_token` grant to the SSO token endpoint. The endpoint
//! signals failure with an `error` field in the JSON body (usually alongside a
//! 400 or 401), which maps to `Error::Auth` with no retry. Transient 429/500/504
//! responses are retried by the request executor before they get here.

use common::Secret;
use requester::{ApiRequest, Requester, RetryPolicy, send_with_retry};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{CLIENT_ID, GRANT_TYPE};
use crate::error::{Error, Result};

/// Body returned by the token endpoint.
///
/// Success and failure share one shape: either `access_token` or `error` is
/// present.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    /// Seconds until the access token expires
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Trade an offline token for a bearer access token.
pub async fn request_access_token<R: Requester + ?Sized>(
    requester: &R,
    policy: &RetryPolicy,
    token_request_url: &str,
    offline_token: &Secret<String>,
) -> Result<Secret<String>> {
    debug!(url = token_request_url, "generating access token");
    let request = ApiRequest::post(token_request_url)
        .form("grant_type", GRANT_TYPE)
        .form("client_id", CLIENT_ID)
        .form("refresh_token", offline_token.expose().as_str());

    let response = send_with_retry(requester, &request, policy).await?;
    let status = response.status();

    let token: TokenResponse = match response.json() {
        Ok(token) => token,
        Err(_) if !response.is_success() => {
            return Err(Error::Auth(format!(
                "token endpoint returned {status}: {}",
                response.text()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(error) = token.error {
        let description = token.error_description.unwrap_or_default();
        return Err(Error::Auth(format!(
            "token endpoint returned {status} {error}: {description}"
        )));
    }

    match token.access_token {
        Some(access) if !access.is_empty() => {
            debug!(expires_in = ?token.expires_in, "access token acquired");
            Ok(Secret::new(access))
        }
        _ => Err(Error::Auth(format!(
            "token endpoint returned {status} without an access token"
        ))),
    }
}
