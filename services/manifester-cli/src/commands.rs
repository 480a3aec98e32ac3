//! Command handlers

use std::path::Path;

use anyhow::{Context, Result};
use manifester::{AllocationRecord, ManifestSpec, Manifester};
use tracing::{info, warn};

const BORDER: &str = "--------------------------------------";

/// Run the whole flow for one manifest category; returns the manifest path.
pub async fn get_manifest(manifester: &mut Manifester, spec: &ManifestSpec) -> Result<String> {
    let manifest = manifester
        .get_manifest_with_cleanup(spec)
        .await
        .context("failed to generate manifest")?;
    Ok(manifest.path.display().to_string())
}

/// Inventory entries addressed by index or name, or every entry with `all`.
pub fn select<'a>(
    inventory: &'a [AllocationRecord],
    selectors: &[String],
    all: bool,
) -> Vec<&'a AllocationRecord> {
    inventory
        .iter()
        .enumerate()
        .filter(|(index, record)| {
            all || selectors
                .iter()
                .any(|s| *s == index.to_string() || *s == record.name)
        })
        .map(|(_, record)| record)
        .collect()
}

/// Delete the selected allocations, optionally removing their manifest files.
///
/// Returns the number of allocations deleted.
pub async fn delete(
    manifester: &mut Manifester,
    selectors: &[String],
    all: bool,
    remove_manifest_file: bool,
) -> Result<usize> {
    let inventory = manifester
        .inventory()
        .load()
        .await
        .context("failed to load inventory")?;
    let selected: Vec<AllocationRecord> = select(&inventory, selectors, all)
        .into_iter()
        .cloned()
        .collect();
    if selected.is_empty() {
        warn!(?selectors, "no inventory entries matched");
        return Ok(0);
    }

    let manifest_dir = manifester.config().manifest_dir.clone();
    for record in &selected {
        manifester
            .delete_allocation(Some(&record.uuid))
            .await
            .with_context(|| format!("failed to delete allocation {}", record.name))?;
        if remove_manifest_file {
            remove_manifest(&manifest_dir, &record.name).await;
        }
    }
    Ok(selected.len())
}

async fn remove_manifest(dir: &Path, name: &str) {
    let path = dir.join(format!("{name}_manifest.zip"));
    match tokio::fs::remove_file(&path).await {
        Ok(()) => info!(path = %path.display(), "removed manifest file"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove manifest file"),
    }
}

/// Inventory contents, optionally re-synced from the API first.
pub async fn inventory(manifester: &mut Manifester, sync: bool) -> Result<Vec<AllocationRecord>> {
    if sync {
        manifester
            .refresh_inventory()
            .await
            .context("failed to sync inventory")?;
    }
    manifester
        .inventory()
        .load()
        .await
        .context("failed to load inventory")
}

/// Index/name table.
pub fn render_table(records: &[AllocationRecord]) -> String {
    let mut out = String::new();
    out.push_str(BORDER);
    out.push('\n');
    out.push_str(&format!("| {:<5} | {:<26} |\n", "Index", "Allocation Name"));
    out.push_str(BORDER);
    out.push('\n');
    for (index, record) in records.iter().enumerate() {
        out.push_str(&format!("| {index:<5} | {:<26} |\n", record.name));
        out.push_str(BORDER);
        out.push('\n');
    }
    out
}

/// Every known field of every record.
pub fn render_details(records: &[AllocationRecord]) -> String {
    let mut out = String::new();
    for (index, record) in records.iter().enumerate() {
        out.push_str(&format!("{index}:\n"));
        let mut field = |key: &str, value: Option<String>| {
            if let Some(value) = value {
                out.push_str(&format!("    {key}: {value}\n"));
            }
        };
        field("uuid", Some(record.uuid.clone()));
        field("name", Some(record.name.clone()));
        field("type", record.allocation_type.clone());
        field("version", record.version.clone());
        field(
            "entitlementsAttachedQuantity",
            record.entitlements_attached_quantity.map(|q| q.to_string()),
        );
        field("simpleContentAccess", record.simple_content_access.clone());
    }
    out
}
