//! Pages addressed by a running index in the URL.
//!
//! The most common e-paper layout: page `n` of the day's edition lives at a
//! URL that only differs in `n`. The walker substitutes `{page}` from
//! `start_page` upwards and stops at the first page that does not exist.
//! Publishers signal "no such page" either with a 404/410 or with a `200 OK`
//! HTML error page, so both end the sequence.
//!
//! # URL Pattern
//!
//! ```text
//! https://cdn.example.com/Sakal/{date:%Y/%m/%d}/Mumbai/{page:03}.jpg
//! https://epaper.example.com/view/{date:%d-%m-%Y}/{code}/page-{page}
//! ```
//!
//! With a `viewer`, every URL is an HTML viewer page and the asset (and
//! article clips) are extracted from it instead.

use super::{EditionRun, HarvestContext, viewer};
use crate::config::Viewer;
use crate::download::AssetTarget;
use crate::error::Result;
use crate::fetch::Fetch;
use crate::template::{Template, TemplateContext};
use tracing::{debug, info, instrument, warn};

/// Walk pages `start_page..start_page + max_pages` until one is missing.
///
/// # Arguments
///
/// * `url` - URL template with a `{page}` placeholder
/// * `start_page` - First page number tried
/// * `max_pages` - Upper bound on pages visited
/// * `viewer` - When set, each URL is an HTML viewer page to extract from
///
/// # Errors
///
/// [`crate::error::HarvestError::EditionNotFound`] when not a single page
/// exists; the first page's own error when it fails for another reason.
/// Failures on later pages are recorded on `run` and skipped.
#[instrument(level = "info", skip_all, fields(edition = %run.edition().name, start_page = start_page, max_pages = max_pages))]
pub async fn harvest<F: Fetch>(
    ctx: &HarvestContext<'_, F>,
    run: &mut EditionRun,
    url: &str,
    start_page: u32,
    max_pages: u32,
    viewer: Option<&Viewer>,
) -> Result<()> {
    let template = Template::parse(url, TemplateContext::Url)?;
    let mut pages = 0u32;

    for page in (start_page..).take(max_pages as usize) {
        if page > start_page {
            ctx.pause().await;
        }
        let page_url = template.render(&ctx.vars(run.edition()).with_page(page))?;

        let found = match viewer {
            None => run
                .download(ctx, &AssetTarget::page(page, &page_url))
                .await
                .map(|_| true),
            Some(viewer) => match ctx.document(&page_url).await {
                Ok(doc) => viewer::harvest_page(ctx, run, viewer, page, &doc)
                    .await
                    .map(|p| p.found()),
                Err(e) => Err(e),
            },
        };

        match found {
            Ok(true) => {
                pages += 1;
                debug!(page, url = %page_url, "Page done");
            }
            Ok(false) => {
                info!(page, url = %page_url, "Viewer page is empty; end of edition");
                break;
            }
            Err(e) if e.is_missing() => {
                info!(page, url = %page_url, reason = %e, "Page missing; end of edition");
                break;
            }
            Err(e) if pages == 0 && page == start_page => return Err(e),
            Err(e) => {
                warn!(page, url = %page_url, error = %e, "Page failed; skipping");
                run.record_error(e.to_string());
            }
        }
    }

    if pages == 0 && run.artifact_count() == 0 {
        return Err(ctx.not_found());
    }
    if pages == max_pages {
        warn!(max_pages, "Stopped at max_pages; edition may be longer");
    }
    info!(pages, "Walked page sequence");
    Ok(())
}
