//! Editions published as a single HTML page listing every page asset.

use super::{EditionRun, HarvestContext, html};
use crate::download::AssetTarget;
use crate::error::Result;
use crate::fetch::Fetch;
use tracing::{info, instrument, warn};

/// Download every distinct `asset_selector` match of the gallery page as
/// pages `1..n`, in document order.
#[instrument(level = "info", skip_all, fields(edition = %run.edition().name))]
pub async fn harvest<F: Fetch>(
    ctx: &HarvestContext<'_, F>,
    run: &mut EditionRun,
    url: &str,
    asset_selector: &str,
    asset_attr: &str,
) -> Result<()> {
    let url = ctx.render_url(url, run.edition())?;
    let doc = ctx
        .document(&url)
        .await
        .map_err(|e| ctx.missing_as_not_found(e))?;
    let assets = html::attr_values(&doc.text(), &doc.url, asset_selector, asset_attr)?;
    if assets.is_empty() {
        warn!(%url, selector = asset_selector, "Gallery lists no page assets");
        return Err(ctx.not_found());
    }
    info!(count = assets.len(), %url, "Indexed gallery pages");

    for (i, asset) in assets.into_iter().enumerate() {
        if i > 0 {
            ctx.pause().await;
        }
        run.download_or_skip(ctx, &AssetTarget::page(i as u32 + 1, asset))
            .await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_catalogue;
    use crate::fetch::testing::{Reply, ScriptedFetcher};
    use crate::models::Edition;
    use crate::outputs::files::Store;
    use chrono::NaiveDate;
    use std::time::Duration;

    const CATALOGUE: &str = r#"
publications:
  - name: gomantak
    expect: image
    editions:
      - name: goa
    source:
      kind: page_gallery
      url: "https://epaper.example.com/{edition}/{date:%d%m%Y}"
      asset_selector: "div.thumbs img"
      asset_attr: data-full
"#;

    const GALLERY: &str = r#"<div class="thumbs">
        <img data-full="https://cdn.example.com/g/1.jpg">
        <img data-full="//cdn.example.com/g/2.jpg">
        <img data-full="https://cdn.example.com/g/1.jpg">
        <img data-full="https://cdn.example.com/g/3.jpg">
        <img src="logo.png">
    </div>"#;

    #[tokio::test]
    async fn test_gallery_pages_numbered_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::new(tmp.path(), false);
        let publication = parse_catalogue(CATALOGUE).unwrap().publications.remove(0);
        let date = NaiveDate::from_ymd_opt(2025, 5, 30).unwrap();
        let fetcher = ScriptedFetcher::new()
            .html("https://epaper.example.com/goa/30052025", GALLERY)
            .jpeg("https://cdn.example.com/g/1.jpg")
            .route("https://cdn.example.com/g/2.jpg", Reply::Status(500))
            .jpeg("https://cdn.example.com/g/3.jpg");
        let ctx = HarvestContext::new(&fetcher, &store, &publication, date, Duration::ZERO).unwrap();
        let mut run = EditionRun::new(&publication, Edition::new("goa", "goa"), date);

        harvest(
            &ctx,
            &mut run,
            "https://epaper.example.com/{edition}/{date:%d%m%Y}",
            "div.thumbs img",
            "data-full",
        )
        .await
        .unwrap();

        let report = run.finish(Ok(()));
        let pages: Vec<Option<u32>> = report.artifacts.iter().map(|a| a.page).collect();
        assert_eq!(pages, vec![Some(1), Some(3)]);
        assert_eq!(report.errors.len(), 1);
        assert!(!report.aborted);
    }

    #[tokio::test]
    async fn test_empty_gallery_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = Store::new(tmp.path(), false);
        let publication = parse_catalogue(CATALOGUE).unwrap().publications.remove(0);
        let date = NaiveDate::from_ymd_opt(2025, 5, 30).unwrap();
        let fetcher = ScriptedFetcher::new().html("https://epaper.example.com/goa/30052025", "<p>Coming soon</p>");
        let ctx = HarvestContext::new(&fetcher, &store, &publication, date, Duration::ZERO).unwrap();
        let mut run = EditionRun::new(&publication, Edition::new("goa", "goa"), date);

        let err = harvest(&ctx, &mut run, "https://epaper.example.com/{edition}/{date:%d%m%Y}", "div.thumbs img", "data-full")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no edition found"));
    }
}
