//! Extraction from HTML page viewers: the page asset and its article clips.
//!
//! A viewer page shows one newspaper page, usually as a large `<img>` (or a
//! link to the page PDF), with clickable article overlays on top. Each
//! overlay leads to a clip page whose main image is the article cut out of
//! the page:
//!
//! ```text
//! viewer page ──asset_selector──▶ page asset
//!     └─ clips.link_selector ──▶ clip page ──clips.image_selector──▶ article n
//! ```

use super::{EditionRun, HarvestContext, html};
use crate::config::{Clips, Viewer};
use crate::download::AssetTarget;
use crate::error::Result;
use crate::fetch::{Fetch, Fetched};
use tracing::{debug, instrument, warn};

/// What one viewer page yielded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewerPage {
    /// The page asset was located (whether or not it downloaded).
    pub asset_found: bool,
    /// Article clip links found on the page.
    pub clips_found: usize,
    /// Articles downloaded (or already on disk).
    pub articles: usize,
}

impl ViewerPage {
    /// Whether the page looked like a real page rather than an empty shell.
    pub fn found(&self) -> bool {
        self.asset_found || self.clips_found > 0
    }
}

/// Download the page asset and every article clip of a viewer page.
///
/// Individual asset failures are recorded on `run`; only selector errors
/// are returned.
#[instrument(level = "debug", skip_all, fields(page = page, url = %doc.url))]
pub async fn harvest_page<F: Fetch>(
    ctx: &HarvestContext<'_, F>,
    run: &mut EditionRun,
    viewer: &Viewer,
    page: u32,
    doc: &Fetched,
) -> Result<ViewerPage> {
    let body = doc.text();
    let asset = match &viewer.asset_selector {
        Some(css) => html::first_attr(&body, &doc.url, css, &viewer.asset_attr)?,
        None => None,
    };
    let clip_links = match &viewer.clips {
        Some(clips) => html::attr_values(&body, &doc.url, &clips.link_selector, &clips.link_attr)?,
        None => Vec::new(),
    };

    let mut outcome = ViewerPage {
        asset_found: asset.is_some(),
        clips_found: clip_links.len(),
        articles: 0,
    };
    if let Some(asset) = asset {
        run.download_or_skip(ctx, &AssetTarget::page(page, asset)).await;
    } else if viewer.asset_selector.is_some() {
        debug!(page, "No page asset on viewer page");
    }

    if let Some(clips) = &viewer.clips {
        outcome.articles = harvest_clips(ctx, run, clips, page, &clip_links).await?;
    }
    Ok(outcome)
}

/// Visit each clip page and download its article image as article `1..n`.
///
/// Article numbers follow link order, so a failed clip leaves a gap rather
/// than renumbering the rest.
async fn harvest_clips<F: Fetch>(
    ctx: &HarvestContext<'_, F>,
    run: &mut EditionRun,
    clips: &Clips,
    page: u32,
    links: &[String],
) -> Result<usize> {
    let mut articles = 0;
    for (i, link) in links.iter().enumerate() {
        let article = i as u32 + 1;
        ctx.pause().await;

        let clip_page = match ctx.document(link).await {
            Ok(doc) => doc,
            Err(e) => {
                warn!(page, article, url = %link, error = %e, "Clip page failed; skipping");
                run.record_error(e.to_string());
                continue;
            }
        };
        let image = html::first_attr(
            &clip_page.text(),
            &clip_page.url,
            &clips.image_selector,
            &clips.image_attr,
        )?;
        match image {
            Some(image) => {
                if run.download_or_skip(ctx, &AssetTarget::article(page, article, image)).await {
                    articles += 1;
                }
            }
            None => {
                warn!(page, article, url = %link, "No article image on clip page");
                run.record_error(format!("no article image on {link}"));
            }
        }
    }
    debug!(page, articles, "Finished clips");
    Ok(articles)
}
