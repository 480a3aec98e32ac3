//! Entitlement reconciliation
//!
//! Attaches one desired subscription to the current allocation. The attach
//! endpoint is not reliable about what it reports: a 404, 429, 500 or 504 may
//! arrive after some or all of the entitlements were attached. Those statuses
//! are resolved by reading the allocation's attached entitlements back and
//! trying again for whatever is still missing, against a freshly fetched pool
//! listing.
//!
//! Each round:
//! 1. Fetch pools (cached until the previous attach invalidated them)
//! 2. Pick the first pool, in server order, named after the subscription with
//!    more than `quantity` entitlements available (or unlimited)
//! 3. POST one attach for `quantity`; the call is not retried, since a
//!    duplicate attach would over-allocate
//! 4. 200 → done. 404/429/500/504 → verify. Anything else → error.
//!
//! Rounds are capped by `Tuning::max_reconcile_rounds`.

use requester::ApiRequest;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::lifecycle::{LifecycleState, Manifester};
use crate::metrics::record_attach;
use crate::model::{AttachedEntitlement, DesiredSubscription, Pool};

/// Attach statuses that may hide a partial success.
const AMBIGUOUS_ATTACH_STATUSES: [u16; 4] = [404, 429, 500, 504];

#[derive(Deserialize)]
struct AllocationDetail {
    body: DetailBody,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailBody {
    #[serde(default)]
    entitlements_attached: Option<EntitlementList>,
}

#[derive(Deserialize)]
struct EntitlementList {
    #[serde(default)]
    value: Vec<AttachedEntitlement>,
}

/// First pool in `pools` that can supply `desired`.
pub fn select_pool<'a>(pools: &'a [Pool], desired: &DesiredSubscription) -> Option<&'a Pool> {
    pools
        .iter()
        .filter(|p| p.subscription_name == desired.name)
        .find(|p| p.can_supply(desired.quantity))
}

impl Manifester {
    /// Attach every subscription in order, stopping at the first failure.
    pub async fn reconcile_all(&mut self, subscriptions: &mut [DesiredSubscription]) -> Result<()> {
        for desired in subscriptions.iter_mut() {
            self.reconcile_subscription(desired).await?;
        }
        self.state = LifecycleState::EntitlementsReconciled;
        Ok(())
    }

    /// Attach `desired.quantity` entitlements of `desired.name`.
    ///
    /// On a partial attach `desired.quantity` is lowered to the amount still
    /// missing. Returns the pool recorded as active for the subscription.
    pub async fn reconcile_subscription(&mut self, desired: &mut DesiredSubscription) -> Result<Pool> {
        if desired.quantity == 0 {
            return Err(Error::InvalidQuantity(desired.name.clone()));
        }
        let requested = desired.quantity;
        let max_rounds = self.config.tuning.max_reconcile_rounds.max(1);
        let delay = self.config.tuning.reconcile_delay;

        for round in 1..=max_rounds {
            if round > 1 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let pools = self.subscription_pools().await?;
            let Some(pool) = select_pool(&pools, desired).cloned() else {
                let candidates = pools
                    .iter()
                    .filter(|p| p.subscription_name == desired.name)
                    .count();
                warn!(
                    subscription = %desired.name,
                    quantity = desired.quantity,
                    candidates,
                    "no pool can supply subscription"
                );
                return Err(Error::NoEligiblePool {
                    subscription: desired.name.clone(),
                    quantity: desired.quantity,
                    candidates,
                });
            };
            debug!(
                subscription = %desired.name,
                pool_id = %pool.id,
                available = pool.entitlements_available,
                quantity = desired.quantity,
                round,
                "attaching entitlements"
            );

            let response = self.attach_entitlements(&pool.id, desired.quantity).await?;
            self.invalidate_pools();
            let status = response.status();

            if status == 200 {
                record_attach("attached");
                self.activate(pool.clone()).await?;
                info!(subscription = %desired.name, quantity = desired.quantity, "entitlements attached");
                return Ok(pool);
            }

            if !AMBIGUOUS_ATTACH_STATUSES.contains(&status) {
                record_attach("failed");
                return Err(Error::EntitlementAttach {
                    pool_id: pool.id,
                    status,
                    body: response.text(),
                });
            }

            let attached = self.attached_quantity(&desired.name).await?;
            if attached >= requested {
                if attached > requested {
                    warn!(
                        subscription = %desired.name,
                        attached,
                        requested,
                        "more entitlements attached than requested"
                    );
                }
                record_attach("verified");
                self.activate(pool.clone()).await?;
                info!(subscription = %desired.name, attached, status, "entitlements verified after error status");
                return Ok(pool);
            }

            record_attach("retry");
            desired.quantity = requested - attached;
            debug!(
                subscription = %desired.name,
                status,
                attached,
                remaining = desired.quantity,
                "attach incomplete, refreshing pools"
            );
        }

        warn!(subscription = %desired.name, rounds = max_rounds, remaining = desired.quantity, "reconciliation did not converge");
        Err(Error::ReconcileExhausted {
            subscription: desired.name.clone(),
            rounds: max_rounds,
            remaining: desired.quantity,
        })
    }

    async fn attach_entitlements(&mut self, pool_id: &str, quantity: u32) -> Result<requester::ApiResponse> {
        let url = format!("{}/entitlements", self.allocation_url()?);
        let token = self.access_token().await?;
        let request = ApiRequest::post(url)
            .bearer(&token)
            .query("pool", pool_id)
            .query("quantity", quantity);
        Ok(self.requester.send(&request).await?)
    }

    /// Total entitlements of `subscription_name` on the current allocation.
    async fn attached_quantity(&mut self, subscription_name: &str) -> Result<u32> {
        let url = self.allocation_url()?;
        let response = self
            .send(ApiRequest::get(&url).query("include", "entitlements"))
            .await?;
        if !response.is_success() {
            return Err(Error::Http {
                status: response.status(),
                url,
            });
        }
        let detail: AllocationDetail = response.json()?;
        let attached = detail
            .body
            .entitlements_attached
            .map(|list| list.value)
            .unwrap_or_default()
            .iter()
            .filter(|e| e.subscription_name == subscription_name)
            .map(|e| e.entitlement_quantity)
            .sum();
        Ok(attached)
    }

    /// Record `pool` as the active pool for its subscription.
    async fn activate(&mut self, pool: Pool) -> Result<()> {
        self.active_pools
            .retain(|p| p.subscription_name != pool.subscription_name);
        self.active_pools.push(pool);
        self.refresh_inventory().await?;
        Ok(())
    }
}
