//! Manifest export
//!
//! Exporting is asynchronous on the server: a GET on `/export` starts a job
//! and returns its id, `/exportJob/{id}` answers 200 with a download link once
//! the archive is ready, and the link serves the zip bytes.

use requester::ApiRequest;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::lifecycle::{LifecycleState, Manifester};
use crate::metrics::record_export_poll;
use crate::model::Manifest;

#[derive(Deserialize)]
struct ExportTrigger {
    body: ExportTriggerBody,
}

#[derive(Deserialize)]
struct ExportTriggerBody {
    #[serde(rename = "exportJobID")]
    export_job_id: serde_json::Value,
}

#[derive(Deserialize)]
struct ExportJob {
    body: ExportJobBody,
}

#[derive(Deserialize)]
struct ExportJobBody {
    href: String,
}

fn job_id(value: &serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        other => Err(Error::UnexpectedResponse(format!(
            "export job id is not a string or number: {other}"
        ))),
    }
}

impl Manifester {
    /// Export the current allocation and write the archive to the manifest
    /// directory as `<allocation-name>_manifest.zip`.
    ///
    /// The job status is checked at most `export_max_attempts + 1` times
    /// before failing with `ExportTimeout`.
    pub async fn export_manifest(&mut self) -> Result<Manifest> {
        let allocation = self.allocation.clone().ok_or(Error::NoAllocation)?;
        let base = self.allocation_url()?;
        info!(name = %allocation.name, "triggering manifest export");

        let trigger_url = format!("{base}/export");
        let response = self.send(ApiRequest::get(&trigger_url)).await?;
        if !response.is_success() {
            return Err(Error::Http {
                status: response.status(),
                url: trigger_url,
            });
        }
        let trigger: ExportTrigger = response.json()?;
        let job_id = job_id(&trigger.body.export_job_id)?;

        let job_url = format!("{base}/exportJob/{job_id}");
        let max_attempts = self.config.tuning.export_max_attempts;
        let interval = self.config.tuning.export_poll_interval;

        let mut job = self.send(ApiRequest::get(&job_url)).await?;
        record_export_poll();
        let mut attempts: u32 = 1;
        while job.status() != 200 {
            if attempts > max_attempts {
                warn!(
                    name = %allocation.name,
                    attempts,
                    "export job status check limit exceeded; the subscription service may be degraded"
                );
                return Err(Error::ExportTimeout { attempts });
            }
            debug!(job_id = %job_id, attempts, status = job.status(), "export job not ready");
            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
            job = self.send(ApiRequest::get(&job_url)).await?;
            record_export_poll();
            attempts += 1;
        }

        let job: ExportJob = job.json()?;
        let download = self.send(ApiRequest::get(&job.body.href)).await?;
        if !download.is_success() {
            return Err(Error::Http {
                status: download.status(),
                url: job.body.href,
            });
        }
        let status = download.status();
        let content = download.into_bytes();

        let dir = &self.config.manifest_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| Error::Io(format!("creating manifest directory: {e}")))?;
        let path = dir.join(format!("{}_manifest.zip", allocation.name));
        tokio::fs::write(&path, &content)
            .await
            .map_err(|e| Error::Io(format!("writing manifest {}: {e}", path.display())))?;
        info!(name = %allocation.name, path = %path.display(), bytes = content.len(), "manifest written");

        self.state = LifecycleState::Exported;
        self.refresh_inventory().await?;

        Ok(Manifest {
            allocation_uuid: allocation.uuid,
            allocation_name: allocation.name,
            path,
            status,
            content,
        })
    }
}
