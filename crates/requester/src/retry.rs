//! Retrying request executor
//!
//! Wraps one outbound call with exponential backoff on transient server
//! statuses. The executor never reads response bodies: any status outside
//! `RETRY_STATUS_CODES` is handed back to the caller as-is.
//!
//! Backoff schedule: wait `initial_backoff`, then double. Before each wait the
//! executor checks whether the *next* wait would exceed `max_backoff`; if so it
//! gives up with `RetryTimeoutExceeded`. With the defaults (1s start, 240s
//! ceiling) that is up to eight attempts and 127s of sleeping.

use std::time::Duration;

use metrics::counter;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::{ApiRequest, ApiResponse, Requester};

/// Statuses treated as transient.
pub const RETRY_STATUS_CODES: [u16; 3] = [429, 500, 504];

/// Backoff bounds for `send_with_retry`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(240),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_backoff(mut self, max_backoff: Duration) -> Self {
        self.max_backoff = max_backoff;
        self
    }

    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }
}

/// Whether a status code should be retried.
pub fn is_retryable(status: u16) -> bool {
    RETRY_STATUS_CODES.contains(&status)
}

/// Send `request`, retrying transient statuses with exponential backoff.
///
/// Transport errors are returned immediately; only status codes drive retries.
pub async fn send_with_retry<R: Requester + ?Sized>(
    requester: &R,
    request: &ApiRequest,
    policy: &RetryPolicy,
) -> Result<ApiResponse> {
    let mut wait = policy.initial_backoff;
    let mut attempt: u32 = 1;

    loop {
        debug!(method = %request.method, url = %request.url, attempt, "sending request");
        let response = requester.send(request).await?;
        let status = response.status();
        debug!(url = %request.url, status, attempt, "response status");
        counter!("manifester_http_requests_total", "status" => status.to_string()).increment(1);

        if !is_retryable(status) {
            return Ok(response);
        }

        let next_wait = wait * 2;
        if next_wait > policy.max_backoff {
            warn!(
                url = %request.url,
                status,
                attempts = attempt,
                max_backoff_secs = policy.max_backoff.as_secs(),
                "retry ceiling reached"
            );
            return Err(Error::RetryTimeoutExceeded {
                attempts: attempt,
                last_status: status,
            });
        }

        debug!(url = %request.url, status, wait_secs = wait.as_secs_f64(), "transient status, retrying");
        counter!("manifester_http_retries_total").increment(1);
        tokio::time::sleep(wait).await;
        wait = next_wait;
        attempt += 1;
    }
}
