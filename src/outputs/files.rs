//! Storage of downloaded assets under `<root>/<publication>/<edition>/`.
//!
//! Files are written to a hidden temporary name in the destination folder and
//! renamed into place, so an interrupted run never leaves a truncated file
//! under its final name. A file that already exists is left alone unless the
//! store was opened with `overwrite`, which makes reruns on the same day cheap.

use crate::error::Result;
use crate::models::SaveOutcome;
use crate::utils::{check_filename, slugify};
use rand::{Rng, rng};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

/// Output root plus the overwrite policy.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    overwrite: bool,
}

/// Where a saved file ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saved {
    pub outcome: SaveOutcome,
    /// Path relative to the store root, `/`-separated.
    pub relative: String,
    pub absolute: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>, overwrite: bool) -> Self {
        Self {
            root: root.into(),
            overwrite,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Folder for one edition of one publication.
    pub fn edition_dir(&self, publication: &str, edition: &str) -> PathBuf {
        self.root.join(slugify(publication)).join(slugify(edition))
    }

    /// Whether the target file already exists and would be skipped.
    pub async fn would_skip(&self, publication: &str, edition: &str, filename: &str) -> bool {
        !self.overwrite
            && fs::try_exists(self.edition_dir(publication, edition).join(filename))
                .await
                .unwrap_or(false)
    }

    /// Save `bytes` as `filename` in the edition folder.
    #[instrument(level = "debug", skip(self, bytes), fields(bytes = bytes.len()))]
    pub async fn save(
        &self,
        publication: &str,
        edition: &str,
        filename: &str,
        bytes: &[u8],
    ) -> Result<Saved> {
        check_filename(filename)?;
        let dir = self.edition_dir(publication, edition);
        let absolute = dir.join(filename);
        let relative = format!("{}/{}/{}", slugify(publication), slugify(edition), filename);

        if !self.overwrite && fs::try_exists(&absolute).await? {
            debug!(path = %absolute.display(), "File exists; skipping");
            return Ok(Saved {
                outcome: SaveOutcome::Skipped,
                relative,
                absolute,
            });
        }

        fs::create_dir_all(&dir).await?;
        let suffix: u32 = rng().random();
        let temp = dir.join(format!(".{filename}.part-{suffix:08x}"));
        if let Err(e) = fs::write(&temp, bytes).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp, &absolute).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(path = %absolute.display(), "Saved file");
        Ok(Saved {
            outcome: SaveOutcome::Written,
            relative,
            absolute,
        })
    }
}
