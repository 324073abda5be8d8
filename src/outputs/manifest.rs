//! Per-edition JSON manifests.
//!
//! After an edition finishes, its [`EditionReport`] is written next to the
//! downloaded files so downstream tooling can see what was fetched, from
//! where, and what failed, without re-parsing log output.
//!
//! # Output Path
//!
//! ```text
//! <root>/<publication>/<edition>/manifest_<YYYY-MM-DD>.json
//! ```
//!
//! Reruns on the same date replace the manifest.

use crate::error::Result;
use crate::models::EditionReport;
use crate::outputs::files::Store;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, instrument};

/// Manifest filename for a date.
pub fn manifest_name(report: &EditionReport) -> String {
    format!("manifest_{}.json", report.date.format("%Y-%m-%d"))
}

/// Write `report` into its edition folder, returning the manifest path.
#[instrument(level = "info", skip_all, fields(publication = %report.publication, edition = %report.edition))]
pub async fn write_manifest(store: &Store, report: &EditionReport) -> Result<PathBuf> {
    let json = serde_json::to_string_pretty(report)?;
    let dir = store.edition_dir(&report.publication, &report.edition);
    fs::create_dir_all(&dir).await?;

    let path = dir.join(manifest_name(report));
    fs::write(&path, json).await?;
    info!(path = %path.display(), artifacts = report.artifacts.len(), "Wrote edition manifest");
    Ok(path)
}
