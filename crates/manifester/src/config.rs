//! Runtime configuration for one manifest session
//!
//! These types are what the workflow consumes. Loading them from a settings
//! file (and overlaying environment variables) is the binary's job.

use std::path::PathBuf;
use std::time::Duration;

use common::Secret;
use requester::RetryPolicy;

use crate::model::{ContentAccess, DesiredSubscription};

/// Connection and storage settings for a `Manifester`.
#[derive(Debug, Clone)]
pub struct ManifesterConfig {
    pub offline_token: Secret<String>,
    /// Prefix for generated allocation names; also scopes allocation listings.
    pub username_prefix: String,
    pub token_request_url: String,
    /// Base URL of the allocations API, without a trailing slash.
    pub allocations_url: String,
    pub inventory_path: PathBuf,
    pub manifest_dir: PathBuf,
    pub tuning: Tuning,
}

impl ManifesterConfig {
    pub fn new(offline_token: Secret<String>, username_prefix: impl Into<String>) -> Self {
        Self {
            offline_token,
            username_prefix: username_prefix.into(),
            token_request_url: rhsm_auth::TOKEN_REQUEST_URL.to_string(),
            allocations_url: rhsm_auth::ALLOCATIONS_URL.to_string(),
            inventory_path: PathBuf::from("manifester_inventory.yaml"),
            manifest_dir: PathBuf::from("manifests"),
            tuning: Tuning::default(),
        }
    }
}

/// Timing and paging knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tuning {
    pub retry: RetryPolicy,
    pub allocations_page_size: usize,
    pub pools_page_size: usize,
    /// Upper bound on attach/verify rounds per subscription
    pub max_reconcile_rounds: u32,
    /// Pause before re-fetching pools after an ambiguous attach
    pub reconcile_delay: Duration,
    pub export_max_attempts: u32,
    pub export_poll_interval: Duration,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            allocations_page_size: 100,
            pools_page_size: 50,
            max_reconcile_rounds: 10,
            reconcile_delay: Duration::from_secs(1),
            export_max_attempts: 500,
            export_poll_interval: Duration::from_millis(500),
        }
    }
}

/// What to put into a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestSpec {
    /// Explicit allocation name; generated from the prefix when absent.
    pub allocation_name: Option<String>,
    pub sat_version: String,
    pub content_access: ContentAccess,
    pub subscriptions: Vec<DesiredSubscription>,
}

impl ManifestSpec {
    pub fn new(sat_version: impl Into<String>) -> Self {
        Self {
            allocation_name: None,
            sat_version: sat_version.into(),
            content_access: ContentAccess::default(),
            subscriptions: Vec::new(),
        }
    }

    pub fn with_subscription(mut self, name: impl Into<String>, quantity: u32) -> Self {
        self.subscriptions.push(DesiredSubscription::new(name, quantity));
        self
    }

    pub fn with_content_access(mut self, content_access: ContentAccess) -> Self {
        self.content_access = content_access;
        self
    }

    pub fn with_allocation_name(mut self, name: impl Into<String>) -> Self {
        self.allocation_name = Some(name.into());
        self
    }
}
