//! Page viewers navigated with a "next page" control.
//!
//! The walker starts at the edition's first viewer page and keeps following
//! the next control until it disappears, is disabled, loops back to a page
//! already seen, or `max_pages` pages have been visited.

use super::{EditionRun, HarvestContext, html, viewer};
use crate::config::Viewer;
use crate::error::Result;
use crate::fetch::Fetch;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// How to find the "next page" control on a viewer page.
#[derive(Debug, Clone, Copy)]
pub struct NextControl<'a> {
    pub selector: &'a str,
    pub attr: &'a str,
    pub disabled_class: Option<&'a str>,
}

impl NextControl<'_> {
    /// URL of the next page, or `None` at the end of the edition.
    pub fn next_url(&self, body: &str, base: &str) -> Result<Option<String>> {
        let Some(control) = html::first_candidate(body, self.selector, self.attr)? else {
            debug!("No next control");
            return Ok(None);
        };
        let disabled_by_class = self
            .disabled_class
            .is_some_and(|class| control.classes.iter().any(|c| c == class));
        if control.disabled || disabled_by_class {
            debug!("Next control is disabled");
            return Ok(None);
        }
        Ok(html::resolve(base, &control.value))
    }
}

/// Follow the "next" control from `url` until it runs out.
///
/// # Arguments
///
/// * `url` - URL template of the first viewer page
/// * `viewer` - Extraction rules for the page asset and clips
/// * `next` - How to find the "next page" control
/// * `max_pages` - Upper bound on pages visited
///
/// # Errors
///
/// [`crate::error::HarvestError::EditionNotFound`] when the first page is
/// missing or empty. A failed later page is recorded on `run` and ends the
/// walk.
#[instrument(level = "info", skip_all, fields(edition = %run.edition().name, max_pages = max_pages))]
pub async fn harvest<F: Fetch>(
    ctx: &HarvestContext<'_, F>,
    run: &mut EditionRun,
    url: &str,
    viewer: &Viewer,
    next: &NextControl<'_>,
    max_pages: u32,
) -> Result<()> {
    let mut current = Some(ctx.render_url(url, run.edition())?);
    let mut visited: HashSet<String> = HashSet::new();
    let mut page = 0u32;

    while let Some(page_url) = current.take() {
        if page >= max_pages {
            warn!(max_pages, "Stopped at max_pages; edition may be longer");
            break;
        }
        if !visited.insert(page_url.clone()) {
            info!(url = %page_url, "Next control loops back; end of edition");
            break;
        }
        if page > 0 {
            ctx.pause().await;
        }
        page += 1;

        let doc = match ctx.document(&page_url).await {
            Ok(doc) => doc,
            Err(e) if page == 1 => return Err(ctx.missing_as_not_found(e)),
            Err(e) => {
                warn!(page, url = %page_url, error = %e, "Viewer page failed; stopping");
                run.record_error(e.to_string());
                break;
            }
        };
        visited.insert(doc.url.clone());

        let found = viewer::harvest_page(ctx, run, viewer, page, &doc).await?;
        if !found.found() {
            if page == 1 {
                return Err(ctx.not_found());
            }
            info!(page, url = %doc.url, "Viewer page is empty; end of edition");
            break;
        }
        current = next.next_url(&doc.text(), &doc.url)?;
    }

    info!(pages = page, "Walked paginated viewer");
    Ok(())
}
