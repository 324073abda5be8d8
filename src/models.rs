//! Data models for harvested files and per-run reports.
//!
//! This module defines the structures that flow out of a harvest:
//! - [`Artifact`]: one file written (or found already present) on disk
//! - [`EditionReport`]: everything that happened for one edition on one date
//! - [`PublicationReport`]: all editions of a publication plus any fatal error
//! - [`ArticleDigest`]: OCR text, title and summary of one article clip
//!
//! Edition reports are serialized verbatim as the per-edition manifest.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An edition resolved for this run, from the catalogue or discovered on
/// the publisher's index page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edition {
    pub name: String,
    /// Value substituted for `{code}` in URL templates.
    pub code: String,
    /// Edition landing page, when discovered from an index.
    pub url: Option<String>,
}

impl Edition {
    pub fn new(name: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            url: None,
        }
    }
}

/// What an asset represents within an edition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// The complete edition as a single file.
    Edition,
    /// One full page.
    Page,
    /// A clipped article from a page.
    Article,
}

/// Detected file format of a downloaded asset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetFormat {
    Pdf,
    Png,
    Jpg,
    Gif,
    Webp,
    Html,
    Other(String),
}

impl AssetFormat {
    /// File extension written to disk.
    pub fn extension(&self) -> &str {
        match self {
            AssetFormat::Pdf => "pdf",
            AssetFormat::Png => "png",
            AssetFormat::Jpg => "jpg",
            AssetFormat::Gif => "gif",
            AssetFormat::Webp => "webp",
            AssetFormat::Html => "html",
            AssetFormat::Other(ext) => ext,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(
            self,
            AssetFormat::Png | AssetFormat::Jpg | AssetFormat::Gif | AssetFormat::Webp
        )
    }
}

impl fmt::Display for AssetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Whether a file was written in this run or left as it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveOutcome {
    Written,
    Skipped,
}

/// A single file produced for an edition.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Artifact {
    pub kind: AssetKind,
    /// Page number (absent for whole-edition files).
    pub page: Option<u32>,
    /// Article number within the page, starting at 1.
    pub article: Option<u32>,
    /// Where the bytes came from.
    pub url: String,
    /// Path relative to the output root.
    pub path: String,
    pub bytes: u64,
    pub format: AssetFormat,
    pub outcome: SaveOutcome,
}

/// Result of harvesting one edition of one publication on one date.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EditionReport {
    pub publication: String,
    pub edition: String,
    pub date: NaiveDate,
    pub source: String,
    pub artifacts: Vec<Artifact>,
    /// Non-fatal problems (skipped assets) plus the fatal one, if any.
    pub errors: Vec<String>,
    /// Set when the edition stopped early because of an error.
    pub aborted: bool,
    /// Digest files written or kept for article clips, relative to the
    /// output root.
    #[serde(default)]
    pub digests: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl EditionReport {
    pub fn new(publication: &str, edition: &str, date: NaiveDate, source: &str) -> Self {
        Self {
            publication: publication.to_string(),
            edition: edition.to_string(),
            date,
            source: source.to_string(),
            artifacts: Vec::new(),
            errors: Vec::new(),
            aborted: false,
            digests: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record a problem that stopped this edition.
    pub fn abort(&mut self, reason: impl Into<String>) {
        self.errors.push(reason.into());
        self.aborted = true;
    }

    pub fn finish(&mut self) {
        if self.artifacts.is_empty() && !self.aborted {
            self.abort("no assets found");
        }
        self.finished_at = Some(Utc::now());
    }

    pub fn written(&self) -> usize {
        self.count(SaveOutcome::Written)
    }

    pub fn skipped(&self) -> usize {
        self.count(SaveOutcome::Skipped)
    }

    /// Number of artifacts of the given kind.
    pub fn kind_count(&self, kind: AssetKind) -> usize {
        self.artifacts.iter().filter(|a| a.kind == kind).count()
    }

    pub fn is_success(&self) -> bool {
        !self.artifacts.is_empty() && !self.aborted
    }

    fn count(&self, outcome: SaveOutcome) -> usize {
        self.artifacts.iter().filter(|a| a.outcome == outcome).count()
    }
}

/// An article clip after OCR and summary.
///
/// The chat model fills `title`, `clean_text` and `summary`; the other
/// fields are added once its reply parses. Saved next to the clip as
/// `<clip>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ArticleDigest {
    /// The clip, relative to the output root (added after parsing).
    #[serde(default)]
    pub image: Option<String>,
    /// Model that wrote the digest (added after parsing).
    #[serde(default)]
    pub model: Option<String>,
    /// The headline, when the model found one.
    #[serde(default)]
    pub title: Option<String>,
    /// Article body with recognition noise repaired.
    #[serde(default)]
    pub clean_text: String,
    /// A few sentences on what the article says.
    #[serde(default)]
    pub summary: String,
    /// Cleaned OCR output the model was given (added after parsing).
    #[serde(default)]
    pub ocr_text: Option<String>,
}

/// All editions harvested for a publication in one run.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublicationReport {
    pub name: String,
    pub editions: Vec<EditionReport>,
    /// Error that prevented edition resolution entirely.
    pub fatal: Option<String>,
}

impl PublicationReport {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            editions: Vec::new(),
            fatal: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.fatal.is_none()
            && !self.editions.is_empty()
            && self.editions.iter().all(EditionReport::is_success)
    }

    pub fn artifact_count(&self) -> usize {
        self.editions.iter().map(|e| e.artifacts.len()).sum()
    }
}
