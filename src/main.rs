//! # epaper_harvest
//!
//! Downloads the day's newspaper e-paper editions (full-edition PDFs, page
//! images, and clipped articles) for every publication in a YAML catalogue.
//!
//! ## Features
//!
//! - One engine for many sites: URL templates, page-index walking, galleries,
//!   "next page" viewers, dated edition indexes, and JSON page services
//! - Article clips downloaded from viewer overlays
//! - Optional headless Chromium for viewers that only render with JavaScript
//! - Idempotent reruns: files already on disk are skipped unless `--force`
//! - Per-edition JSON manifests and a Markdown index of every run
//! - Optional article digests: OCR of each clip, summarised by an Ollama model
//!
//! ## Usage
//!
//! ```sh
//! epaper_harvest -c publications.yaml -o downloads
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Loading**: Parse and validate the publication catalogue
//! 2. **Resolving**: Work out each publication's editions for the date
//! 3. **Walking**: Visit pages and clips, downloading every asset (publications
//!    run concurrently, pages within an edition serially)
//! 4. **Digesting** (optional): OCR and summarise the article clips
//! 5. **Output**: Edition manifests plus an update to `INDEX.md`
//!
//! ## Exit status
//!
//! `0` when every selected publication succeeded, `2` when any of them failed
//! or produced nothing, `1` on a fatal start-up error.

use chrono::Local;
use clap::Parser;
use futures::stream::{self, StreamExt};
use std::error::Error;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration as StdDuration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod cli;
mod config;
mod digest;
mod download;
mod error;
mod fetch;
mod models;
mod outputs;
mod scrapers;
mod template;
mod utils;

use cli::Cli;
use config::{Catalogue, Defaults, Publication};
use digest::Digester;
use fetch::build_fetcher;
use models::PublicationReport;
use outputs::files::Store;
use outputs::indexes;
use utils::ensure_writable_dir;

/// Exit status for a partially failed run.
const EXIT_PARTIAL: u8 = 2;

#[tokio::main]
#[instrument]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("epaper_harvest starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    // ---- Load catalogue ----
    let catalogue = match config::load_catalogue(&args.config).await {
        Ok(catalogue) => catalogue,
        Err(e) => {
            error!(path = %args.config, error = %e, "Cannot load publication catalogue");
            return Err(e.into());
        }
    };

    if args.list {
        print!("{}", render_listing(&catalogue));
        return Ok(ExitCode::SUCCESS);
    }

    let selected = catalogue.select(&args.publications).inspect_err(|e| {
        error!(error = %e, "Invalid --publication selection");
    })?;
    let date = args.date.unwrap_or_else(|| Local::now().date_naive());
    let concurrency = args
        .concurrency
        .map(usize::from)
        .unwrap_or(catalogue.defaults.concurrency);
    info!(%date, publications = selected.len(), concurrency, force = args.force, "Harvest plan");

    // Early check: ensure the output dir is writable
    let output_dir = Path::new(&args.output_dir);
    if let Err(e) = ensure_writable_dir(output_dir).await {
        error!(
            path = %args.output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e.into());
    }

    let fetcher = build_fetcher(&catalogue.defaults)?;
    let store = Store::new(output_dir, args.force);
    let page_delay = StdDuration::from_millis(catalogue.defaults.page_delay_ms);

    let digester = match (&catalogue.digest, args.skip_digest) {
        (Some(digest), false) => {
            // Chat requests get the (longer) digest timeout
            let chat = build_fetcher(&Defaults {
                timeout_secs: digest.timeout_secs,
                ..catalogue.defaults.clone()
            })?;
            info!(model = %digest.model, url = %digest.ollama_url, "Article digests enabled");
            Some(Digester::new(chat, digest))
        }
        _ => None,
    };

    // ---- Harvest publications in parallel ----
    let reports: Vec<PublicationReport> = stream::iter(selected)
        .map(|publication: &Publication| {
            let fetcher = &fetcher;
            let store = &store;
            let digester = digester.as_ref();
            async move {
                let mut report =
                    scrapers::harvest_publication(fetcher, store, publication, date, page_delay).await;
                if let Some(digester) = digester {
                    digester.digest_publication(store, publication, &mut report).await;
                }
                if report.is_success() {
                    info!(publication = %report.name, files = report.artifact_count(), "Publication done");
                } else {
                    warn!(
                        publication = %report.name,
                        files = report.artifact_count(),
                        fatal = report.fatal.as_deref().unwrap_or("-"),
                        "Publication incomplete"
                    );
                }
                report
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    // ---- Index update ----
    if let Err(e) = indexes::update_run_index(output_dir, date, &reports).await {
        error!(error = %e, "Failed to update INDEX.md");
    }

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    let files: usize = reports.iter().map(PublicationReport::artifact_count).sum();
    let elapsed = start_time.elapsed();
    info!(
        publications = reports.len(),
        failed,
        files,
        elapsed_secs = elapsed.as_secs_f64(),
        "epaper_harvest finished"
    );

    Ok(ExitCode::from(exit_status(&reports)))
}

/// `0` when every publication succeeded, [`EXIT_PARTIAL`] otherwise.
fn exit_status(reports: &[PublicationReport]) -> u8 {
    if reports.iter().all(PublicationReport::is_success) {
        0
    } else {
        EXIT_PARTIAL
    }
}

/// One line per publication: name, strategy, editions.
fn render_listing(catalogue: &Catalogue) -> String {
    catalogue
        .publications
        .iter()
        .map(|p| {
            let editions = if p.editions.is_empty() {
                match p.source {
                    config::SourceConfig::EditionIndex { .. } => "(discovered)".to_string(),
                    _ => "main".to_string(),
                }
            } else {
                p.editions
                    .iter()
                    .map(|e| e.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            format!("{}\t{}\t{}\n", p.name, p.source.kind(), editions)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EditionReport;
    use chrono::NaiveDate;

    const CATALOGUE: &str = r#"
publications:
  - name: western_times
    editions:
      - name: english
        code: en
      - name: gujarati
        code: ah
    source:
      kind: direct
      url: "https://westerntimesnews.in/{date:%d%m%Y}{code}.pdf"
  - name: dharitri
    source:
      kind: edition_index
      url: "https://dharitriepaper.in/"
      edition_selector: "a.epost-image"
      download_selector: ".btn-group a"
  - name: sakal
    source:
      kind: page_sequence
      url: "https://cdn.example.com/{page}.jpg"
"#;

    #[test]
    fn test_render_listing() {
        let catalogue = config::parse_catalogue(CATALOGUE).unwrap();
        assert_eq!(
            render_listing(&catalogue),
            "western_times\tdirect\tenglish, gujarati\n\
             dharitri\tedition_index\t(discovered)\n\
             sakal\tpage_sequence\tmain\n"
        );
    }

    #[test]
    fn test_exit_code() {
        let date = NaiveDate::from_ymd_opt(2025, 5, 30).unwrap();
        let mut failed = PublicationReport::new("a");
        let mut edition = EditionReport::new("a", "main", date, "direct");
        edition.finish();
        failed.editions.push(edition);

        assert_eq!(exit_status(&[]), 0);
        assert_eq!(exit_status(&[failed]), EXIT_PARTIAL);
    }
}
