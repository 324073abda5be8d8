//! Edition discovery and page walking strategies.
//!
//! Every publication in the catalogue names one source strategy. Each
//! strategy follows the same two-phase pattern:
//!
//! 1. **Resolving**: work out which editions exist for the date (static
//!    editions from the catalogue, or discovered on an index page)
//! 2. **Walking**: visit the edition's pages in order and hand every asset
//!    (full edition, page, or article clip) to the [`Downloader`]
//!
//! # Strategies
//!
//! | Kind | Module | Discovery | Typical site |
//! |------|--------|-----------|--------------|
//! | `direct` | [`direct`] | URL template | one PDF per day |
//! | `page_sequence` | [`page_sequence`] | `{page}` index until missing | numbered JPEG/PDF pages |
//! | `page_gallery` | [`page_gallery`] | all assets on one HTML page | thumbnail galleries |
//! | `paginated` | [`paginated`] | "next" control | viewer with page buttons |
//! | `edition_index` | [`edition_index`] | links or `<option>`s on an index page | dated archives |
//! | `json_api` | [`json_api`] | JSON endpoint | ASP.NET page services |
//!
//! # Common Patterns
//!
//! - Pages within an edition are processed serially, in page order
//! - A failed asset is logged, recorded in the edition report, and skipped
//! - A failed edition is recorded and the next edition still runs
//! - Asset URLs are deduplicated within an edition

pub mod direct;
pub mod edition_index;
pub mod html;
pub mod json_api;
pub mod page_gallery;
pub mod page_sequence;
pub mod paginated;
pub mod viewer;

use crate::config::{Publication, SourceConfig};
use crate::download::{AssetTarget, Downloader};
use crate::error::{HarvestError, Result};
use crate::fetch::{Fetch, FetchRequest, Fetched};
use crate::models::{AssetKind, Edition, EditionReport, PublicationReport};
use crate::outputs::files::Store;
use crate::outputs::manifest::write_manifest;
use crate::template::{Template, TemplateContext, Vars};
use chrono::NaiveDate;
use std::collections::HashSet;
use std::time::Duration as StdDuration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

/// Everything a strategy needs to talk to the outside world for one
/// publication on one date.
pub struct HarvestContext<'a, F> {
    pub fetcher: &'a F,
    pub publication: &'a Publication,
    pub date: NaiveDate,
    page_delay: StdDuration,
    downloader: Downloader<'a, F>,
}

impl<'a, F> HarvestContext<'a, F>
where
    F: Fetch,
{
    /// # Arguments
    ///
    /// * `fetcher` - Fetcher used for documents and assets (normally retrying)
    /// * `store` - Output root the downloader saves into
    /// * `publication` - Catalogue entry being harvested
    /// * `date` - Edition date substituted into every template
    /// * `page_delay` - Pause between consecutive page requests
    ///
    /// Fails only when the publication's filename templates do not parse.
    pub fn new(
        fetcher: &'a F,
        store: &'a Store,
        publication: &'a Publication,
        date: NaiveDate,
        page_delay: StdDuration,
    ) -> Result<Self> {
        Ok(Self {
            fetcher,
            publication,
            date,
            page_delay,
            downloader: Downloader::new(fetcher, store, publication, date)?,
        })
    }

    /// Template variables for `edition`.
    pub fn vars<'e>(&'e self, edition: &'e Edition) -> Vars<'e> {
        Vars::new(&self.publication.name, &edition.name, &edition.code, self.date)
    }

    /// Render a catalogue URL template for `edition`.
    pub fn render_url(&self, template: &str, edition: &Edition) -> Result<String> {
        Template::parse(template, TemplateContext::Url)?.render(&self.vars(edition))
    }

    /// Fetch an HTML document, through the browser if the publication needs one.
    pub async fn document(&self, url: &str) -> Result<Fetched> {
        let request = FetchRequest::document(url).rendered(self.publication.render);
        self.fetcher.fetch(&request).await
    }

    /// Politeness delay between page requests.
    pub async fn pause(&self) {
        if !self.page_delay.is_zero() {
            sleep(self.page_delay).await;
        }
    }

    /// "No edition for this date", the error strategies raise when the
    /// first thing they look for is missing.
    pub fn not_found(&self) -> HarvestError {
        HarvestError::EditionNotFound {
            publication: self.publication.name.clone(),
            date: self.date.format("%Y-%m-%d").to_string(),
        }
    }

    /// Map a "missing" error on the entry document to [`Self::not_found`].
    pub fn missing_as_not_found(&self, e: HarvestError) -> HarvestError {
        if e.is_missing() { self.not_found() } else { e }
    }
}

/// State of one edition while its pages are walked.
#[derive(Debug)]
pub struct EditionRun {
    edition: Edition,
    report: EditionReport,
    seen: HashSet<String>,
}

impl EditionRun {
    pub fn new(publication: &Publication, edition: Edition, date: NaiveDate) -> Self {
        let report = EditionReport::new(&publication.name, &edition.name, date, publication.source.kind());
        Self {
            edition,
            report,
            seen: HashSet::new(),
        }
    }

    pub fn edition(&self) -> &Edition {
        &self.edition
    }

    /// Download `target` unless its URL was already handled in this edition.
    ///
    /// Returns `Ok(false)` for a duplicate URL.
    pub async fn download<F: Fetch>(
        &mut self,
        ctx: &HarvestContext<'_, F>,
        target: &AssetTarget,
    ) -> Result<bool> {
        if !self.seen.insert(target.url.clone()) {
            debug!(url = %target.url, "Asset already handled in this edition");
            return Ok(false);
        }
        let artifact = ctx.downloader.download(&self.edition, target).await?;
        self.report.artifacts.push(artifact);
        Ok(true)
    }

    /// Like [`Self::download`], but a failure is logged and recorded instead
    /// of returned. Returns whether an artifact was added.
    pub async fn download_or_skip<F: Fetch>(
        &mut self,
        ctx: &HarvestContext<'_, F>,
        target: &AssetTarget,
    ) -> bool {
        match self.download(ctx, target).await {
            Ok(added) => added,
            Err(e) => {
                warn!(url = %target.url, page = ?target.page, article = ?target.article, error = %e, "Asset failed; skipping");
                self.record_error(e.to_string());
                false
            }
        }
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.report.errors.push(message.into());
    }

    pub fn artifact_count(&self) -> usize {
        self.report.artifacts.len()
    }

    /// Close the report, marking it failed if `result` is an error.
    pub fn finish(mut self, result: Result<()>) -> EditionReport {
        if let Err(e) = result {
            self.report.abort(e.to_string());
        }
        self.report.finish();
        self.report
    }
}

/// Resolve the editions of `ctx.publication` for the date.
async fn resolve_editions<F: Fetch>(ctx: &HarvestContext<'_, F>) -> Result<Vec<Edition>> {
    match &ctx.publication.source {
        SourceConfig::EditionIndex { .. } => edition_index::discover(ctx).await,
        _ => Ok(ctx
            .publication
            .static_editions()
            .iter()
            .map(|e| Edition::new(e.name.clone(), e.code()))
            .collect()),
    }
}

/// Walk one edition with the publication's strategy.
async fn walk_edition<F: Fetch>(ctx: &HarvestContext<'_, F>, run: &mut EditionRun) -> Result<()> {
    match &ctx.publication.source {
        SourceConfig::Direct { url } => direct::harvest(ctx, run, url).await,
        SourceConfig::PageSequence {
            url,
            start_page,
            max_pages,
            viewer,
        } => page_sequence::harvest(ctx, run, url, *start_page, *max_pages, viewer.as_ref()).await,
        SourceConfig::PageGallery {
            url,
            asset_selector,
            asset_attr,
        } => page_gallery::harvest(ctx, run, url, asset_selector, asset_attr).await,
        SourceConfig::Paginated {
            url,
            viewer,
            next_selector,
            next_attr,
            disabled_class,
            max_pages,
        } => {
            let next = paginated::NextControl {
                selector: next_selector,
                attr: next_attr,
                disabled_class: disabled_class.as_deref(),
            };
            paginated::harvest(ctx, run, url, viewer, &next, *max_pages).await
        }
        SourceConfig::EditionIndex {
            download_selector,
            download_attr,
            link_text_contains,
            ..
        } => {
            edition_index::harvest_edition(
                ctx,
                run,
                download_selector,
                download_attr,
                link_text_contains.as_deref(),
            )
            .await
        }
        SourceConfig::JsonApi { .. } => json_api::harvest(ctx, run).await,
    }
}

/// Harvest every edition of `publication` for `date`.
///
/// Never fails: problems end up in the returned report. Each finished
/// edition gets its manifest written next to its files.
#[instrument(level = "info", skip_all, fields(publication = %publication.name, kind = publication.source.kind()))]
pub async fn harvest_publication<F: Fetch>(
    fetcher: &F,
    store: &Store,
    publication: &Publication,
    date: NaiveDate,
    page_delay: StdDuration,
) -> PublicationReport {
    let mut report = PublicationReport::new(&publication.name);

    let ctx = match HarvestContext::new(fetcher, store, publication, date, page_delay) {
        Ok(ctx) => ctx,
        Err(e) => {
            error!(error = %e, "Cannot prepare publication");
            report.fatal = Some(e.to_string());
            return report;
        }
    };

    let editions = match resolve_editions(&ctx).await {
        Ok(editions) => editions,
        Err(e) => {
            error!(error = %e, "Edition resolution failed");
            report.fatal = Some(e.to_string());
            return report;
        }
    };
    info!(count = editions.len(), "Resolved editions");

    for edition in editions {
        let name = edition.name.clone();
        let mut run = EditionRun::new(publication, edition, date);
        let result = walk_edition(&ctx, &mut run).await;
        if let Err(e) = &result {
            error!(edition = %name, error = %e, "Edition failed");
        }
        let edition_report = run.finish(result);

        if let Err(e) = write_manifest(store, &edition_report).await {
            warn!(edition = %name, error = %e, "Failed to write edition manifest");
        }
        info!(
            edition = %name,
            pages = edition_report.kind_count(AssetKind::Page),
            articles = edition_report.kind_count(AssetKind::Article),
            written = edition_report.written(),
            skipped = edition_report.skipped(),
            errors = edition_report.errors.len(),
            success = edition_report.is_success(),
            "Finished edition"
        );
        report.editions.push(edition_report);
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_catalogue;
    use crate::fetch::testing::{Reply, ScriptedFetcher};
    use crate::models::SaveOutcome;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, 30).unwrap()
    }

    fn western_times() -> Publication {
        let raw = r#"
publications:
  - name: western_times
    expect: pdf
    editions:
      - name: english
        code: en
      - name: gujarati
        code: ah
    source:
      kind: direct
      url: "https://westerntimesnews.in/wp-content/uploads/{date:%Y}/{date:%m}/{date:%d%m%Y}{code}.pdf"
"#;
        parse_catalogue(raw).unwrap().publications.remove(0)
    }

    #[tokio::test]
    async fn test_one_failed_edition_does_not_stop_the_next() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::new(tmp.path(), false);
        let publication = western_times();
        let fetcher = ScriptedFetcher::new()
            .route(
                "https://westerntimesnews.in/wp-content/uploads/2025/05/30052025en.pdf",
                Reply::Status(404),
            )
            .pdf("https://westerntimesnews.in/wp-content/uploads/2025/05/30052025ah.pdf");

        let report =
            harvest_publication(&fetcher, &store, &publication, date(), StdDuration::ZERO).await;
        assert!(report.fatal.is_none());
        assert_eq!(report.editions.len(), 2);
        assert!(!report.editions[0].is_success());
        assert!(report.editions[0].errors[0].contains("no edition found"));
        assert!(report.editions[1].is_success());
        assert!(!report.is_success());

        assert!(tmp.path().join("western_times/english/manifest_2025-05-30.json").exists());
        assert!(
            tmp.path()
                .join("western_times/gujarati/western_times_20250530.pdf")
                .exists()
        );
    }

    #[tokio::test]
    async fn test_edition_run_dedupes_urls() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::new(tmp.path(), false);
        let publication = western_times();
        let fetcher = ScriptedFetcher::new().pdf("https://cdn.example.com/a.pdf");
        let ctx =
            HarvestContext::new(&fetcher, &store, &publication, date(), StdDuration::ZERO).unwrap();
        let mut run = EditionRun::new(&publication, Edition::new("english", "en"), date());

        let target = AssetTarget::edition("https://cdn.example.com/a.pdf");
        assert!(run.download(&ctx, &target).await.unwrap());
        assert!(!run.download(&ctx, &target).await.unwrap());
        assert_eq!(fetcher.count("https://cdn.example.com/a.pdf"), 1);

        let report = run.finish(Ok(()));
        assert_eq!(report.artifacts.len(), 1);
        assert_eq!(report.artifacts[0].outcome, SaveOutcome::Written);
    }

    #[tokio::test]
    async fn test_download_or_skip_records_error() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::new(tmp.path(), false);
        let publication = western_times();
        let fetcher = ScriptedFetcher::new().jpeg("https://cdn.example.com/a.jpg");
        let ctx =
            HarvestContext::new(&fetcher, &store, &publication, date(), StdDuration::ZERO).unwrap();
        let mut run = EditionRun::new(&publication, Edition::new("english", "en"), date());

        let added = run
            .download_or_skip(&ctx, &AssetTarget::page(1, "https://cdn.example.com/a.jpg"))
            .await;
        assert!(!added);
        let report = run.finish(Ok(()));
        assert_eq!(report.errors.len(), 2);
        assert!(report.errors[0].contains("where pdf was expected"));
        assert_eq!(report.errors[1], "no assets found");
    }
}
