//! Allocation lifecycle
//!
//! `Manifester` owns everything that lives for one allocation session: the
//! cached access token, the allocation it created, the pool listing snapshot
//! and the pools it has drawn from. Nothing is shared between instances.
//!
//! ```text
//! Uninitialized → TokenAcquired → AllocationCreated → EntitlementsReconciled → Exported
//!                                        ↓                       ↓                 ↓
//!                                     Deleted  ←─────────────────┴─────────────────┘
//! ```
//!
//! Every create, delete, satisfied subscription and export rewrites the local
//! inventory from a fresh allocation listing.

use std::sync::Arc;

use common::Secret;
use rand::RngExt;
use requester::{ApiRequest, ApiResponse, Requester, send_with_retry};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::{ManifestSpec, ManifesterConfig};
use crate::error::{Error, Result};
use crate::inventory::Inventory;
use crate::model::{
    Allocation, AllocationRecord, AllocationRequest, ContentAccess, Manifest, Pool,
};
use crate::paginate::{fetch_paginated, filter_by_prefix};
use crate::version::normalize_version;

/// Where a session is in the allocation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    TokenAcquired,
    AllocationCreated,
    EntitlementsReconciled,
    Exported,
    Deleted,
}

impl LifecycleState {
    /// State label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            LifecycleState::Uninitialized => "uninitialized",
            LifecycleState::TokenAcquired => "token_acquired",
            LifecycleState::AllocationCreated => "allocation_created",
            LifecycleState::EntitlementsReconciled => "entitlements_reconciled",
            LifecycleState::Exported => "exported",
            LifecycleState::Deleted => "deleted",
        }
    }
}

#[derive(Deserialize)]
struct Versions {
    #[serde(default)]
    body: Vec<VersionEntry>,
}

#[derive(Deserialize)]
struct VersionEntry {
    value: String,
}

#[derive(Deserialize)]
struct Created {
    body: CreatedBody,
}

#[derive(Deserialize)]
struct CreatedBody {
    uuid: String,
}

/// Build `<prefix>-<8 random ASCII letters>`.
pub fn generate_allocation_name(prefix: &str) -> String {
    const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
    let mut rng = rand::rng();
    let suffix: String = (0..8)
        .map(|_| LETTERS[rng.random_range(0..LETTERS.len())] as char)
        .collect();
    format!("{prefix}-{suffix}")
}

/// Client for one allocation session.
pub struct Manifester {
    pub(crate) config: ManifesterConfig,
    pub(crate) requester: Arc<dyn Requester>,
    pub(crate) inventory: Inventory,
    access_token: Option<Secret<String>>,
    pub(crate) allocation: Option<Allocation>,
    pool_cache: Option<Vec<Pool>>,
    pub(crate) active_pools: Vec<Pool>,
    pub(crate) state: LifecycleState,
}

impl Manifester {
    pub fn new(config: ManifesterConfig, requester: Arc<dyn Requester>) -> Self {
        let inventory = Inventory::new(config.inventory_path.clone());
        Self {
            config,
            requester,
            inventory,
            access_token: None,
            allocation: None,
            pool_cache: None,
            active_pools: Vec::new(),
            state: LifecycleState::Uninitialized,
        }
    }

    pub fn config(&self) -> &ManifesterConfig {
        &self.config
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn allocation(&self) -> Option<&Allocation> {
        self.allocation.as_ref()
    }

    /// Pools drawn from so far, one per satisfied subscription name.
    pub fn active_pools(&self) -> &[Pool] {
        &self.active_pools
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    /// Cached bearer token, fetched on first use.
    pub async fn access_token(&mut self) -> Result<Secret<String>> {
        if let Some(token) = &self.access_token {
            return Ok(token.clone());
        }
        let token = rhsm_auth::request_access_token(
            self.requester.as_ref(),
            &self.config.tuning.retry,
            &self.config.token_request_url,
            &self.config.offline_token,
        )
        .await?;
        self.access_token = Some(token.clone());
        if self.state == LifecycleState::Uninitialized {
            self.state = LifecycleState::TokenAcquired;
        }
        Ok(token)
    }

    /// Drop the cached token so the next call mints a new one.
    pub fn invalidate_token(&mut self) {
        self.access_token = None;
    }

    /// Send `request` with the bearer token through the retry executor.
    pub(crate) async fn send(&mut self, request: ApiRequest) -> Result<ApiResponse> {
        let token = self.access_token().await?;
        let request = request.bearer(&token);
        Ok(send_with_retry(self.requester.as_ref(), &request, &self.config.tuning.retry).await?)
    }

    pub(crate) fn allocation_url(&self) -> Result<String> {
        let allocation = self.allocation.as_ref().ok_or(Error::NoAllocation)?;
        Ok(format!("{}/{}", self.config.allocations_url, allocation.uuid))
    }

    /// Version labels the API accepts for new allocations.
    pub async fn valid_versions(&mut self) -> Result<Vec<String>> {
        let url = format!("{}/versions", self.config.allocations_url);
        let response = self.send(ApiRequest::get(&url)).await?;
        if !response.is_success() {
            return Err(Error::Http {
                status: response.status(),
                url,
            });
        }
        let versions: Versions = response.json()?;
        Ok(versions.body.into_iter().map(|v| v.value).collect())
    }

    /// Allocations in the account whose name carries the configured prefix.
    pub async fn subscription_allocations(&mut self) -> Result<Vec<AllocationRecord>> {
        let token = self.access_token().await?;
        let records = fetch_paginated(
            self.requester.as_ref(),
            &self.config.tuning.retry,
            &token,
            &self.config.allocations_url,
            self.config.tuning.allocations_page_size,
        )
        .await?;
        Ok(filter_by_prefix(records, &self.config.username_prefix))
    }

    /// Rewrite the local inventory from a fresh allocation listing.
    pub async fn refresh_inventory(&mut self) -> Result<Vec<AllocationRecord>> {
        let records = self.subscription_allocations().await?;
        self.inventory.replace(&records).await?;
        Ok(records)
    }

    /// Pools available to the current allocation, fetched once until invalidated.
    pub async fn subscription_pools(&mut self) -> Result<Vec<Pool>> {
        if let Some(pools) = &self.pool_cache {
            return Ok(pools.clone());
        }
        let url = format!("{}/pools", self.allocation_url()?);
        let token = self.access_token().await?;
        let pools: Vec<Pool> = fetch_paginated(
            self.requester.as_ref(),
            &self.config.tuning.retry,
            &token,
            &url,
            self.config.tuning.pools_page_size,
        )
        .await?;
        debug!(pools = pools.len(), "fetched subscription pools");
        self.pool_cache = Some(pools.clone());
        Ok(pools)
    }

    /// Mark the pool snapshot stale.
    pub fn invalidate_pools(&mut self) {
        self.pool_cache = None;
    }

    /// Request for a new allocation built from `spec`, naming it if needed.
    pub fn allocation_request(&self, spec: &ManifestSpec) -> AllocationRequest {
        AllocationRequest {
            name: spec
                .allocation_name
                .clone()
                .unwrap_or_else(|| generate_allocation_name(&self.config.username_prefix)),
            version: spec.sat_version.clone(),
            content_access: spec.content_access,
        }
    }

    /// Create an allocation and make it current.
    ///
    /// `request.version` is normalized against a freshly fetched version list.
    pub async fn create_allocation(&mut self, request: AllocationRequest) -> Result<Allocation> {
        let valid = self.valid_versions().await?;
        if valid.is_empty() {
            return Err(Error::InvalidVersion(format!(
                "the API offered no versions to match {}",
                request.version
            )));
        }
        let version = normalize_version(&request.version, &valid);

        let url = self.config.allocations_url.clone();
        let response = self
            .send(
                ApiRequest::post(&url)
                    .query("name", &request.name)
                    .query("version", &version)
                    .query("simpleContentAccess", request.content_access),
            )
            .await?;
        if !response.is_success() {
            return Err(Error::Http {
                status: response.status(),
                url,
            });
        }
        let created: Created = response.json()?;
        let allocation = Allocation {
            uuid: created.body.uuid,
            name: request.name,
            version,
            content_access: request.content_access,
        };
        self.allocation = Some(allocation.clone());
        self.pool_cache = None;
        self.active_pools.clear();
        self.state = LifecycleState::AllocationCreated;

        if allocation.content_access == ContentAccess::Disabled {
            let target = format!("{url}/{}", allocation.uuid);
            let response = self
                .send(
                    ApiRequest::put(&target)
                        .json(json!({ "simpleContentAccess": ContentAccess::Disabled.as_str() })),
                )
                .await?;
            if !response.is_success() {
                return Err(Error::Http {
                    status: response.status(),
                    url: target,
                });
            }
        }

        info!(
            name = %allocation.name,
            uuid = %allocation.uuid,
            version = %allocation.version,
            "subscription allocation created"
        );
        self.refresh_inventory().await?;
        Ok(allocation)
    }

    /// Delete `uuid`, or the current allocation when `None`.
    ///
    /// Always mints a fresh token first and always refreshes the inventory,
    /// even when the delete fails. A successful delete clears the current
    /// allocation before any inventory error is returned. Returns the
    /// response status.
    pub async fn delete_allocation(&mut self, uuid: Option<&str>) -> Result<u16> {
        let target = match uuid {
            Some(uuid) => uuid.to_string(),
            None => self
                .allocation
                .as_ref()
                .map(|a| a.uuid.clone())
                .ok_or(Error::NoAllocation)?,
        };
        self.invalidate_token();

        let url = format!("{}/{target}", self.config.allocations_url);
        let outcome = self
            .send(ApiRequest::delete(&url).query("force", "true"))
            .await;
        let refreshed = self.refresh_inventory().await;

        let response = outcome?;
        if !response.is_success() {
            return Err(Error::Http {
                status: response.status(),
                url,
            });
        }

        info!(uuid = %target, status = response.status(), "subscription allocation deleted");
        if self.allocation.as_ref().is_some_and(|a| a.uuid == target) {
            self.allocation = None;
            self.pool_cache = None;
            self.state = LifecycleState::Deleted;
        }
        refreshed?;
        Ok(response.status())
    }

    /// Create an allocation, attach every subscription in `spec`, and export.
    pub async fn get_manifest(&mut self, spec: &ManifestSpec) -> Result<Manifest> {
        let request = self.allocation_request(spec);
        self.create_allocation(request).await?;
        let mut subscriptions = spec.subscriptions.clone();
        self.reconcile_all(&mut subscriptions).await?;
        self.export_manifest().await
    }

    /// `get_manifest`, deleting the allocation if any step after creation fails.
    ///
    /// The original error is returned; a failed cleanup is only logged.
    pub async fn get_manifest_with_cleanup(&mut self, spec: &ManifestSpec) -> Result<Manifest> {
        match self.get_manifest(spec).await {
            Ok(manifest) => Ok(manifest),
            Err(err) => {
                if let Some(uuid) = self.allocation.as_ref().map(|a| a.uuid.clone()) {
                    warn!(
                        uuid = %uuid,
                        state = self.state.label(),
                        error = %err,
                        "manifest generation failed, deleting allocation"
                    );
                    if let Err(cleanup) = self.delete_allocation(Some(&uuid)).await {
                        warn!(uuid = %uuid, error = %cleanup, "cleanup delete failed");
                    }
                }
                Err(err)
            }
        }
    }
}
