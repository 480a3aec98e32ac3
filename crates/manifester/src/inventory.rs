//! Local inventory of subscription allocations
//!
//! A YAML list of the allocations owned by this user prefix, rewritten after
//! every mutating API call. The CLI reads it to address allocations by index
//! or name. Writes go through a temp file and rename so a crash never leaves a
//! half-written inventory behind.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::AllocationRecord;

/// Handle on the inventory file.
#[derive(Debug, Clone)]
pub struct Inventory {
    path: PathBuf,
}

impl Inventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn has_yaml_suffix(&self) -> bool {
        matches!(
            self.path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        )
    }

    /// Read the inventory.
    ///
    /// A missing file is created empty. A file without a `.yaml`/`.yml`
    /// suffix is logged and treated as empty.
    pub async fn load(&self) -> Result<Vec<AllocationRecord>> {
        if !self.path.is_file() {
            info!(path = %self.path.display(), "inventory file not found, creating it");
            tokio::fs::write(&self.path, b"")
                .await
                .map_err(|e| Error::Io(format!("creating inventory file: {e}")))?;
        }

        if !self.has_yaml_suffix() {
            warn!(
                path = %self.path.display(),
                "invalid inventory file; it must have a .yaml or .yml suffix"
            );
            return Ok(Vec::new());
        }

        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::Io(format!("reading inventory file: {e}")))?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }

        let records: Option<Vec<AllocationRecord>> = serde_yaml::from_str(&contents)
            .map_err(|e| Error::Inventory(format!("parsing {}: {e}", self.path.display())))?;
        Ok(records.unwrap_or_default())
    }

    /// Replace the inventory with `records`.
    pub async fn replace(&self, records: &[AllocationRecord]) -> Result<()> {
        let yaml = if records.is_empty() {
            String::new()
        } else {
            serde_yaml::to_string(records)
                .map_err(|e| Error::Inventory(format!("serializing inventory: {e}")))?
        };

        let dir = self
            .path
            .parent()
            .ok_or_else(|| Error::Io("inventory path has no parent directory".into()))?;
        let file_name = self
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("inventory");
        let tmp_path = dir.join(format!(".{file_name}.tmp.{}", std::process::id()));

        tokio::fs::write(&tmp_path, yaml.as_bytes())
            .await
            .map_err(|e| Error::Io(format!("writing temp inventory file: {e}")))?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(|e| Error::Io(format!("renaming temp inventory file: {e}")))?;

        debug!(path = %self.path.display(), allocations = records.len(), "inventory updated");
        Ok(())
    }
}
