//! Subscription manifest generation
//!
//! Drives the subscription allocation API from an offline token to a
//! downloaded manifest archive:
//!
//! 1. Exchange the offline token for a bearer token (cached per session)
//! 2. Create an allocation, normalizing the requested Satellite version
//! 3. Attach each desired subscription from a matching pool, verifying
//!    ambiguous attach responses against the allocation's entitlements
//! 4. Export the allocation and download the manifest zip
//!
//! All network access goes through `requester::Requester`, so the whole flow
//! runs unchanged against `MockRequester` in tests. Each mutating step
//! rewrites the local YAML inventory of allocations owned by the configured
//! name prefix.

pub mod config;
pub mod error;
pub mod export;
pub mod inventory;
pub mod lifecycle;
pub mod metrics;
pub mod model;
pub mod paginate;
pub mod reconcile;
#[cfg(test)]
mod test_support;
pub mod version;

pub use config::{ManifestSpec, ManifesterConfig, Tuning};
pub use error::{Error, Result};
pub use inventory::Inventory;
pub use lifecycle::{LifecycleState, Manifester, generate_allocation_name};
pub use model::{
    Allocation, AllocationRecord, AllocationRequest, AttachedEntitlement, ContentAccess,
    DesiredSubscription, Manifest, Pool,
};
pub use paginate::{fetch_paginated, filter_by_prefix};
pub use reconcile::select_pool;
pub use version::normalize_version;
