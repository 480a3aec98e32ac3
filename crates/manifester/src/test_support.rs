//! In-memory stand-in for the allocation API and token endpoint.

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use requester::{ApiRequest, ApiResponse, Method, MockRequester};
use serde::Serialize;
use serde_json::json;

use crate::config::ManifesterConfig;
use crate::model::{AllocationRecord, Pool};

pub const TOKEN_URL: &str =
    "https://sso.example.test/auth/realms/redhat-external/protocol/openid-connect/token";
pub const ALLOCATIONS_URL: &str = "https://api.example.test/management/v1/allocations";
pub const DOWNLOAD_URL: &str = "https://download.example.test/manifests/4311/download";
pub const MANIFEST_BYTES: &[u8] = b"PK\x03\x04consumer_export";
const EXPORT_JOB_ID: &str = "4311";

/// Config aimed at the stub, with no waits between rounds or polls.
pub fn test_config(dir: &Path) -> ManifesterConfig {
    let mut config = ManifesterConfig::new("offline-token".into(), "qe");
    config.token_request_url = TOKEN_URL.to_string();
    config.allocations_url = ALLOCATIONS_URL.to_string();
    config.inventory_path = dir.join("manifester_inventory.yaml");
    config.manifest_dir = dir.join("manifests");
    config.tuning.reconcile_delay = Duration::ZERO;
    config.tuning.export_poll_interval = Duration::ZERO;
    config
}

/// Scripted outcome of one attach call: the status returned and the total
/// quantity the allocation reports for that subscription afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Attach {
    pub status: u16,
    pub attached: u32,
}

#[derive(Debug, Clone, Copy)]
pub enum ExportJobs {
    /// Answer 202 this many times, then 200
    PendingFor(u32),
    Never,
}

pub struct RhsmStub {
    versions: Vec<String>,
    pools: Vec<Pool>,
    attach: Option<Vec<Attach>>,
    export_jobs: ExportJobs,
}

impl RhsmStub {
    pub fn new() -> Self {
        Self {
            versions: ["sat-6.12", "sat-6.13", "sat-6.14"]
                .iter()
                .map(|v| v.to_string())
                .collect(),
            pools: Vec::new(),
            attach: None,
            export_jobs: ExportJobs::PendingFor(0),
        }
    }

    pub fn versions(mut self, versions: &[&str]) -> Self {
        self.versions = versions.iter().map(|v| v.to_string()).collect();
        self
    }

    pub fn pool(mut self, id: &str, subscription_name: &str, available: i64) -> Self {
        self.pools.push(Pool {
            id: id.to_string(),
            subscription_name: subscription_name.to_string(),
            entitlements_available: available,
        });
        self
    }

    /// Attach outcomes in order; the last one repeats.
    pub fn attach_script(mut self, script: Vec<Attach>) -> Self {
        self.attach = Some(script);
        self
    }

    pub fn attach_statuses(self, statuses: &[u16]) -> Self {
        let script = statuses
            .iter()
            .map(|&status| Attach {
                status,
                attached: 0,
            })
            .collect();
        self.attach_script(script)
    }

    pub fn export_jobs(mut self, export_jobs: ExportJobs) -> Self {
        self.export_jobs = export_jobs;
        self
    }

    pub fn build(self) -> Arc<MockRequester> {
        let mut state = StubState {
            versions: self.versions,
            pools: self.pools,
            attach: self.attach.map(VecDeque::from),
            export_jobs: self.export_jobs,
            allocations: vec![
                record("11111111-aaaa", "other-team-manifest"),
                record("22222222-bbbb", "qe-Existing1"),
                record("33333333-cccc", "satellite-ci"),
            ],
            attached: HashMap::new(),
            export_polls: 0,
            tokens_issued: 0,
        };
        Arc::new(MockRequester::new(move |req| state.handle(req)))
    }
}

fn record(uuid: &str, name: &str) -> AllocationRecord {
    AllocationRecord {
        uuid: uuid.to_string(),
        name: name.to_string(),
        allocation_type: Some("Satellite".into()),
        version: Some("sat-6.13".into()),
        entitlements_attached_quantity: Some(0),
        simple_content_access: Some("enabled".into()),
    }
}

struct StubState {
    versions: Vec<String>,
    pools: Vec<Pool>,
    attach: Option<VecDeque<Attach>>,
    export_jobs: ExportJobs,
    allocations: Vec<AllocationRecord>,
    attached: HashMap<String, u32>,
    export_polls: u32,
    tokens_issued: u32,
}

impl StubState {
    fn handle(&mut self, req: &ApiRequest) -> ApiResponse {
        if req.url == TOKEN_URL && req.method == Method::Post {
            self.tokens_issued += 1;
            return ApiResponse::with_json(
                200,
                &json!({"access_token": format!("at-{}", self.tokens_issued), "expires_in": 900}),
            );
        }
        if req.url == DOWNLOAD_URL && req.method == Method::Get {
            return ApiResponse::new(200, MANIFEST_BYTES);
        }

        let Some(rest) = req.url.strip_prefix(ALLOCATIONS_URL) else {
            return ApiResponse::empty(404);
        };
        let parts: Vec<&str> = rest.split('/').filter(|p| !p.is_empty()).collect();

        match (req.method, parts.as_slice()) {
            (Method::Get, []) => page(&self.allocations, req),
            (Method::Post, []) => self.create(req),
            (Method::Get, ["versions"]) => {
                let body: Vec<_> = self.versions.iter().map(|v| json!({"value": v})).collect();
                ApiResponse::with_json(200, &json!({ "body": body }))
            }
            (Method::Put, [uuid]) if self.exists(uuid) => ApiResponse::with_json(200, &json!({})),
            (Method::Delete, [uuid]) if self.exists(uuid) => {
                self.allocations.retain(|a| a.uuid != *uuid);
                ApiResponse::empty(204)
            }
            (Method::Get, [uuid]) if self.exists(uuid) => {
                let value: Vec<_> = self
                    .attached
                    .iter()
                    .map(|(name, qty)| json!({"subscriptionName": name, "entitlementQuantity": qty}))
                    .collect();
                ApiResponse::with_json(
                    200,
                    &json!({"body": {"uuid": uuid, "entitlementsAttached": {"valid": true, "value": value}}}),
                )
            }
            (Method::Get, [uuid, "pools"]) if self.exists(uuid) => page(&self.pools, req),
            (Method::Post, [uuid, "entitlements"]) if self.exists(uuid) => self.attach(req),
            (Method::Get, [uuid, "export"]) if self.exists(uuid) => {
                ApiResponse::with_json(200, &json!({"body": {"exportJobID": EXPORT_JOB_ID}}))
            }
            (Method::Get, [uuid, "exportJob", job]) if self.exists(uuid) && *job == EXPORT_JOB_ID => {
                self.export_polls += 1;
                let ready = match self.export_jobs {
                    ExportJobs::PendingFor(n) => self.export_polls > n,
                    ExportJobs::Never => false,
                };
                if ready {
                    ApiResponse::with_json(200, &json!({"body": {"href": DOWNLOAD_URL}}))
                } else {
                    ApiResponse::empty(202)
                }
            }
            _ => ApiResponse::empty(404),
        }
    }

    fn exists(&self, uuid: &str) -> bool {
        self.allocations.iter().any(|a| a.uuid == uuid)
    }

    fn create(&mut self, req: &ApiRequest) -> ApiResponse {
        let uuid = uuid::Uuid::new_v4().to_string();
        let name = req.query_value("name").unwrap_or_default().to_string();
        self.allocations.push(AllocationRecord {
            uuid: uuid.clone(),
            name: name.clone(),
            allocation_type: Some("Satellite".into()),
            version: req.query_value("version").map(str::to_string),
            entitlements_attached_quantity: Some(0),
            simple_content_access: req.query_value("simpleContentAccess").map(str::to_string),
        });
        ApiResponse::with_json(200, &json!({"body": {"uuid": uuid, "name": name}}))
    }

    fn attach(&mut self, req: &ApiRequest) -> ApiResponse {
        let pool_id = req.query_value("pool").unwrap_or_default();
        let quantity: u32 = req
            .query_value("quantity")
            .and_then(|q| q.parse().ok())
            .unwrap_or(0);
        let Some(name) = self
            .pools
            .iter()
            .find(|p| p.id == pool_id)
            .map(|p| p.subscription_name.clone())
        else {
            return ApiResponse::empty(404);
        };

        let outcome = match self.attach.as_mut() {
            Some(script) if script.len() > 1 => script.pop_front(),
            Some(script) => script.front().copied(),
            None => None,
        };
        match outcome {
            Some(Attach { status, attached }) => {
                self.attached.insert(name, attached);
                ApiResponse::with_json(status, &json!({"status": status}))
            }
            None => {
                *self.attached.entry(name).or_insert(0) += quantity;
                ApiResponse::with_json(200, &json!({"body": [{"pool": pool_id, "quantity": quantity}]}))
            }
        }
    }
}

/// Slice `items` by the request's `offset`/`limit`.
fn page<T: Serialize>(items: &[T], req: &ApiRequest) -> ApiResponse {
    let offset: usize = req
        .query_value("offset")
        .and_then(|o| o.parse().ok())
        .unwrap_or(0);
    let limit: usize = req
        .query_value("limit")
        .and_then(|l| l.parse().ok())
        .unwrap_or(usize::MAX);
    let body: Vec<&T> = items.iter().skip(offset).take(limit).collect();
    ApiResponse::with_json(200, &json!({ "body": body }))
}
