//! Editions discovered on an index page.
//!
//! Many publishers link the day's city editions from a landing page, either
//! as thumbnails (`<a href="/edition/bhubaneswar">`) or as a `<select>` of
//! edition ids. Each edition page then offers one "download full PDF" link.
//!
//! # Discovery
//!
//! 1. Every `edition_selector` match with a non-empty `value_attr` is a
//!    candidate, optionally filtered by `value_contains` and by the date
//!    (`date_match`, a chrono format looked for in the text or value)
//! 2. The edition is named from `name_attr`, else the value's last path
//!    segment, else the element text, and slugified; names with no Latin
//!    letters or digits fall back to the value. Links to an edition page
//!    already seen are dropped and clashing names get the value appended
//! 3. The edition page is `edition_url` with `{code}` = value, or the value
//!    resolved against the index page
//! 4. With static `editions` configured, only those are kept

use super::{EditionRun, HarvestContext, html};
use crate::config::SourceConfig;
use crate::download::AssetTarget;
use crate::error::{HarvestError, Result};
use crate::fetch::Fetch;
use crate::models::Edition;
use crate::template::{Template, TemplateContext, Vars};
use crate::utils::{slugify, try_slugify};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

/// Name for a candidate without a `name_attr`.
fn derive_name(value: &str, text: &str) -> String {
    if value.contains('/') {
        let path = value.split(['?', '#']).next().unwrap_or_default();
        if let Some(segment) = path.trim_end_matches('/').rsplit('/').next().filter(|s| !s.is_empty()) {
            return segment.to_string();
        }
    }
    if !text.is_empty() {
        return text.to_string();
    }
    value.to_string()
}

/// Folder-safe edition name: `name_attr`, else the derived name, else the
/// value itself (non-Latin link text slugs to nothing).
fn edition_name(candidate: &html::Candidate) -> String {
    candidate
        .extra
        .as_deref()
        .and_then(try_slugify)
        .or_else(|| try_slugify(&derive_name(&candidate.value, &candidate.text)))
        .or_else(|| try_slugify(&derive_name(&candidate.value, "")))
        .unwrap_or_else(|| slugify(&candidate.value))
}

/// Claim `name`, suffixing it with the edition code (then a counter) when
/// another edition already took it.
fn unique_name(taken: &mut HashSet<String>, name: String, code: &str) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let base = format!("{name}_{}", slugify(code));
    let mut candidate = base.clone();
    let mut n = 2;
    while !taken.insert(candidate.clone()) {
        candidate = format!("{base}_{n}");
        n += 1;
    }
    warn!(%name, renamed = %candidate, "Edition name already taken");
    candidate
}

/// Discover the editions published on the index page for the date.
///
/// # Returns
///
/// The editions in index order, each with its landing page in
/// [`Edition::url`] and the raw candidate value as [`Edition::code`].
///
/// # Errors
///
/// [`HarvestError::EditionNotFound`] when the index page is missing or no
/// candidate survives the filters; selector and template errors as-is.
#[instrument(level = "info", skip_all, fields(publication = %ctx.publication.name))]
pub async fn discover<F: Fetch>(ctx: &HarvestContext<'_, F>) -> Result<Vec<Edition>> {
    let SourceConfig::EditionIndex {
        url,
        edition_selector,
        value_attr,
        name_attr,
        value_contains,
        date_match,
        edition_url,
        ..
    } = &ctx.publication.source
    else {
        return Err(HarvestError::Config(format!(
            "publication `{}` has no edition index",
            ctx.publication.name
        )));
    };

    let index_vars = Vars::new(&ctx.publication.name, "", "", ctx.date);
    let index_url = Template::parse(url, TemplateContext::Url)?.render(&index_vars)?;
    let doc = ctx
        .document(&index_url)
        .await
        .map_err(|e| ctx.missing_as_not_found(e))?;

    let candidates = html::candidates(&doc.text(), edition_selector, value_attr, name_attr.as_deref())?;
    let date_text = date_match.as_ref().map(|fmt| ctx.date.format(fmt).to_string());
    let page_template = edition_url
        .as_deref()
        .map(|t| Template::parse(t, TemplateContext::Url))
        .transpose()?;
    debug!(candidates = candidates.len(), url = %doc.url, "Scanned index page");

    let mut editions: Vec<Edition> = Vec::new();
    let mut pages = HashSet::new();
    let mut names = HashSet::new();
    for candidate in candidates {
        if value_contains.as_deref().is_some_and(|needle| !candidate.value.contains(needle)) {
            continue;
        }
        if let Some(date_text) = &date_text {
            if !candidate.text.contains(date_text.as_str()) && !candidate.value.contains(date_text.as_str()) {
                continue;
            }
        }

        let name = edition_name(&candidate);
        let page_url = match &page_template {
            Some(template) => Some(template.render(&Vars::new(&ctx.publication.name, &name, &candidate.value, ctx.date))?),
            None => html::resolve(&doc.url, &candidate.value),
        };
        let Some(page_url) = page_url else {
            debug!(value = %candidate.value, "Unresolvable edition link");
            continue;
        };
        if !pages.insert(page_url.clone()) {
            continue;
        }
        let name = unique_name(&mut names, name, &candidate.value);
        editions.push(Edition {
            name,
            code: candidate.value,
            url: Some(page_url),
        });
    }

    if !ctx.publication.editions.is_empty() {
        editions = keep_configured(ctx, editions);
    }
    if editions.is_empty() {
        warn!(url = %index_url, "No editions on index page");
        return Err(ctx.not_found());
    }
    info!(count = editions.len(), "Discovered editions");
    Ok(editions)
}

/// Keep the discovered editions matching a configured name or code, named
/// after the configured edition.
fn keep_configured<F: Fetch>(ctx: &HarvestContext<'_, F>, discovered: Vec<Edition>) -> Vec<Edition> {
    discovered
        .into_iter()
        .filter_map(|mut edition| {
            let configured = ctx.publication.editions.iter().find(|c| {
                slugify(&c.name) == edition.name || slugify(c.code()) == edition.name
            })?;
            edition.name = configured.name.clone();
            Some(edition)
        })
        .collect()
}

/// Download the first matching download link of the edition page.
///
/// # Arguments
///
/// * `ctx` - Shared fetcher, downloader and publication settings
/// * `run` - The edition being walked; must carry a page URL from [`discover`]
/// * `download_selector` - CSS selector of the download links
/// * `download_attr` - Attribute holding the link target
/// * `link_text_contains` - Only links whose text contains this are considered
#[instrument(level = "info", skip_all, fields(edition = %run.edition().name))]
pub async fn harvest_edition<F: Fetch>(
    ctx: &HarvestContext<'_, F>,
    run: &mut EditionRun,
    download_selector: &str,
    download_attr: &str,
    link_text_contains: Option<&str>,
) -> Result<()> {
    let page_url = run
        .edition()
        .url
        .clone()
        .ok_or_else(|| HarvestError::Config(format!("edition `{}` has no page URL", run.edition().name)))?;
    let doc = ctx
        .document(&page_url)
        .await
        .map_err(|e| ctx.missing_as_not_found(e))?;

    let link = html::candidates(&doc.text(), download_selector, download_attr, None)?
        .into_iter()
        .filter(|c| link_text_contains.is_none_or(|needle| c.text.contains(needle)))
        .find_map(|c| html::resolve(&doc.url, &c.value));
    let Some(link) = link else {
        warn!(url = %page_url, selector = download_selector, "No download link on edition page");
        return Err(ctx.not_found());
    };

    debug!(%link, "Found edition download link");
    run.download(ctx, &AssetTarget::edition(&link)).await?;
    Ok(())
}
