//! Markdown index of every harvested date.
//!
//! `INDEX.md` at the output root lists, per date, each publication/edition
//! that ran and how many files it has:
//!
//! ```text
//! # E-paper Downloads
//!
//! - [**2025-05-30**]
//!     - sakal / mumbai: 12 files
//!     - dharitri / bhubaneswar: 1 file (incomplete)
//! ```
//!
//! # Replace vs Append
//!
//! Multiple runs on the same date update the existing entry for an edition
//! instead of appending a duplicate; editions not seen before are appended to
//! the date's block. Date blocks are kept newest first, so a backfill run for
//! an older `--date` lands below the dates already listed.

use crate::error::Result;
use crate::models::{EditionReport, PublicationReport};
use crate::utils::slugify;
use chrono::NaiveDate;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

const INDEX_FILE: &str = "INDEX.md";
const INDEX_HEADER: &str = "# E-paper Downloads";
const ENTRY_INDENT: &str = "    - ";

fn date_heading(date: NaiveDate) -> String {
    format!("- [**{}**]", date.format("%Y-%m-%d"))
}

fn parse_heading(line: &str) -> Option<NaiveDate> {
    let date = line.trim().strip_prefix("- [**")?.strip_suffix("**]")?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

fn entry_key(report: &EditionReport) -> String {
    format!(
        "{ENTRY_INDENT}{} / {}:",
        slugify(&report.publication),
        slugify(&report.edition)
    )
}

fn entry_line(report: &EditionReport) -> String {
    let n = report.artifacts.len();
    let noun = if n == 1 { "file" } else { "files" };
    let status = if report.is_success() { "" } else { " (incomplete)" };
    format!("{} {n} {noun}{status}", entry_key(report))
}

/// Merge the editions of `reports` into the index text for `date`.
pub fn merge_index(existing: Option<&str>, date: NaiveDate, reports: &[PublicationReport]) -> String {
    let mut lines: Vec<String> = match existing {
        Some(text) => text.lines().map(str::to_string).collect(),
        None => vec![INDEX_HEADER.to_string()],
    };

    if !lines.iter().any(|l| l.starts_with(INDEX_HEADER)) {
        lines.insert(0, INDEX_HEADER.to_string());
    }

    let heading = date_heading(date);
    let heading_pos = match lines.iter().position(|l| l.trim() == heading) {
        Some(pos) => pos,
        None => {
            // Blocks are newest first: go in front of the first older date.
            match lines
                .iter()
                .position(|l| parse_heading(l).is_some_and(|d| d < date))
            {
                Some(older) => {
                    lines.insert(older, heading.clone());
                    lines.insert(older + 1, String::new());
                    older
                }
                None => {
                    while lines.last().is_some_and(|l| l.trim().is_empty()) {
                        lines.pop();
                    }
                    lines.push(String::new());
                    lines.push(heading.clone());
                    lines.len() - 1
                }
            }
        }
    };

    for report in reports.iter().flat_map(|r| r.editions.iter()) {
        let key = entry_key(report);
        let line = entry_line(report);

        let mut end = heading_pos + 1;
        let mut replaced = false;
        while end < lines.len() && lines[end].starts_with(ENTRY_INDENT) {
            if lines[end].starts_with(&key) {
                lines[end] = line.clone();
                replaced = true;
                break;
            }
            end += 1;
        }
        if !replaced {
            lines.insert(end, line);
        }
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Update `<root>/INDEX.md` with this run's editions.
#[instrument(level = "info", skip_all, fields(root = %root.display(), %date))]
pub async fn update_run_index(root: &Path, date: NaiveDate, reports: &[PublicationReport]) -> Result<()> {
    let index_path = root.join(INDEX_FILE);
    let existing = if fs::try_exists(&index_path).await? {
        Some(fs::read_to_string(&index_path).await?)
    } else {
        None
    };

    let merged = merge_index(existing.as_deref(), date, reports);
    fs::write(&index_path, merged).await?;
    info!(path = %index_path.display(), "Updated INDEX.md");
    Ok(())
}
