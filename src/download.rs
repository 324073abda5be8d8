//! Asset download, format sniffing, and storage.
//!
//! E-paper CDNs are sloppy about content types (`application/octet-stream`
//! for PDFs, `text/plain` for JPEGs) and routinely answer a missing page with
//! a `200 OK` HTML error page. The [`Downloader`] therefore trusts magic bytes
//! first, the `Content-Type` header second, and the URL extension last, and
//! never accepts HTML as an asset.

use crate::config::{Expect, Publication};
use crate::error::{HarvestError, Result};
use crate::fetch::{Fetch, FetchRequest};
use crate::models::{Artifact, AssetFormat, AssetKind, Edition, SaveOutcome};
use crate::outputs::files::Store;
use crate::template::{Template, TemplateContext, Vars};
use crate::utils::check_filename;
use chrono::NaiveDate;
use tracing::{debug, info, instrument};

/// One asset to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetTarget {
    pub kind: AssetKind,
    pub page: Option<u32>,
    pub article: Option<u32>,
    pub url: String,
}

impl AssetTarget {
    pub fn edition(url: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Edition,
            page: None,
            article: None,
            url: url.into(),
        }
    }

    pub fn page(page: u32, url: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Page,
            page: Some(page),
            article: None,
            url: url.into(),
        }
    }

    pub fn article(page: u32, article: u32, url: impl Into<String>) -> Self {
        Self {
            kind: AssetKind::Article,
            page: Some(page),
            article: Some(article),
            url: url.into(),
        }
    }
}

fn sniff(body: &[u8]) -> Option<AssetFormat> {
    if body.starts_with(b"%PDF") {
        Some(AssetFormat::Pdf)
    } else if body.starts_with(b"\x89PNG") {
        Some(AssetFormat::Png)
    } else if body.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some(AssetFormat::Jpg)
    } else if body.starts_with(b"GIF8") {
        Some(AssetFormat::Gif)
    } else if body.len() >= 12 && body.starts_with(b"RIFF") && &body[8..12] == b"WEBP" {
        Some(AssetFormat::Webp)
    } else if body.trim_ascii_start().starts_with(b"<") {
        Some(AssetFormat::Html)
    } else {
        None
    }
}

fn from_content_type(content_type: &str) -> Option<AssetFormat> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "application/pdf" | "application/x-pdf" => Some(AssetFormat::Pdf),
        "image/png" => Some(AssetFormat::Png),
        "image/jpeg" | "image/jpg" | "image/pjpeg" => Some(AssetFormat::Jpg),
        "image/gif" => Some(AssetFormat::Gif),
        "image/webp" => Some(AssetFormat::Webp),
        "text/html" | "application/xhtml+xml" => Some(AssetFormat::Html),
        other => other
            .strip_prefix("image/")
            .map(|sub| AssetFormat::Other(sub.to_string())),
    }
}

/// Format implied by the extension of the URL's last path segment.
pub fn format_from_url(url: &str) -> Option<AssetFormat> {
    let path = url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.split(['?', '#']).next().unwrap_or_default().to_string());
    let last = path.rsplit('/').next()?;
    let (_, ext) = last.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(AssetFormat::Pdf),
        "png" => Some(AssetFormat::Png),
        "jpg" | "jpeg" => Some(AssetFormat::Jpg),
        "gif" => Some(AssetFormat::Gif),
        "webp" => Some(AssetFormat::Webp),
        "htm" | "html" | "aspx" | "php" | "jsp" => Some(AssetFormat::Html),
        e if !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()) => {
            Some(AssetFormat::Other(e.to_string()))
        }
        _ => None,
    }
}

/// Decide the format of a response body.
pub fn detect_format(content_type: Option<&str>, body: &[u8], url: &str) -> AssetFormat {
    sniff(body)
        .or_else(|| content_type.and_then(from_content_type))
        .or_else(|| format_from_url(url))
        .unwrap_or_else(|| AssetFormat::Other("bin".to_string()))
}

/// Check a detected format against what the publication accepts.
pub fn validate(format: &AssetFormat, expect: Expect, body: &[u8], url: &str) -> Result<()> {
    let unexpected = |found: &str| HarvestError::UnexpectedContent {
        url: url.to_string(),
        expected: expect.to_string(),
        found: found.to_string(),
    };
    if body.is_empty() {
        return Err(unexpected("an empty body"));
    }
    let ok = match (expect, format) {
        (_, AssetFormat::Html) => false,
        (Expect::Pdf, f) => *f == AssetFormat::Pdf,
        (Expect::Image, f) => f.is_image(),
        (Expect::Any, _) => true,
    };
    if ok {
        Ok(())
    } else {
        Err(unexpected(format.extension()))
    }
}

/// Parsed filename templates of a publication.
#[derive(Debug, Clone)]
pub struct FilenameTemplates {
    edition: Template,
    page: Template,
    article: Template,
}

impl FilenameTemplates {
    pub fn for_publication(publication: &Publication) -> Result<Self> {
        Ok(Self {
            edition: Template::parse(&publication.filenames.edition, TemplateContext::EditionFile)?,
            page: Template::parse(&publication.filenames.page, TemplateContext::PageFile)?,
            article: Template::parse(&publication.filenames.article, TemplateContext::ArticleFile)?,
        })
    }

    fn for_kind(&self, kind: AssetKind) -> &Template {
        match kind {
            AssetKind::Edition => &self.edition,
            AssetKind::Page => &self.page,
            AssetKind::Article => &self.article,
        }
    }
}

/// Downloads assets of one publication into the [`Store`].
pub struct Downloader<'a, F> {
    fetcher: &'a F,
    store: &'a Store,
    publication: &'a Publication,
    date: NaiveDate,
    filenames: FilenameTemplates,
}

impl<'a, F> Downloader<'a, F>
where
    F: Fetch,
{
    pub fn new(
        fetcher: &'a F,
        store: &'a Store,
        publication: &'a Publication,
        date: NaiveDate,
    ) -> Result<Self> {
        Ok(Self {
            fetcher,
            store,
            publication,
            date,
            filenames: FilenameTemplates::for_publication(publication)?,
        })
    }

    fn filename(&self, edition: &Edition, target: &AssetTarget, ext: &str) -> Result<String> {
        let mut vars = Vars::new(&self.publication.name, &edition.name, &edition.code, self.date)
            .with_ext(ext);
        if let Some(page) = target.page {
            vars = vars.with_page(page);
        }
        if let Some(article) = target.article {
            vars = vars.with_article(article);
        }
        let name = self.filenames.for_kind(target.kind).render(&vars)?;
        check_filename(&name)?;
        Ok(name)
    }

    /// Fetch, validate, and store one asset.
    ///
    /// When the URL's extension already tells the format and the target file
    /// exists, the request is skipped altogether.
    #[instrument(level = "info", skip_all, fields(publication = %self.publication.name, edition = %edition.name, url = %target.url))]
    pub async fn download(&self, edition: &Edition, target: &AssetTarget) -> Result<Artifact> {
        if let Some(guessed) = format_from_url(&target.url).filter(|f| *f != AssetFormat::Html) {
            let filename = self.filename(edition, target, guessed.extension())?;
            if self
                .store
                .would_skip(&self.publication.name, &edition.name, &filename)
                .await
            {
                let dir = self.store.edition_dir(&self.publication.name, &edition.name);
                let bytes = tokio::fs::metadata(dir.join(&filename)).await?.len();
                debug!(%filename, "Already downloaded");
                return Ok(self.artifact(edition, target, &filename, bytes, guessed, SaveOutcome::Skipped));
            }
        }

        let fetched = self.fetcher.fetch(&FetchRequest::asset(&target.url)).await?;
        let format = detect_format(fetched.content_type.as_deref(), &fetched.body, &fetched.url);
        debug!(
            status = fetched.status,
            content_type = fetched.content_type.as_deref().unwrap_or("-"),
            %format,
            "Fetched asset"
        );
        validate(&format, self.publication.expect, &fetched.body, &target.url)?;

        let filename = self.filename(edition, target, format.extension())?;
        let saved = self
            .store
            .save(&self.publication.name, &edition.name, &filename, &fetched.body)
            .await?;
        info!(path = %saved.relative, bytes = fetched.body.len(), outcome = ?saved.outcome, "Stored asset");
        Ok(self.artifact(
            edition,
            target,
            &filename,
            fetched.body.len() as u64,
            format,
            saved.outcome,
        ))
    }

    fn artifact(
        &self,
        edition: &Edition,
        target: &AssetTarget,
        filename: &str,
        bytes: u64,
        format: AssetFormat,
        outcome: SaveOutcome,
    ) -> Artifact {
        let dir = self.store.edition_dir(&self.publication.name, &edition.name);
        let relative = dir
            .strip_prefix(self.store.root())
            .map(|p| p.join(filename))
            .unwrap_or_else(|_| dir.join(filename));
        Artifact {
            kind: target.kind,
            page: target.page,
            article: target.article,
            url: target.url.clone(),
            path: relative.to_string_lossy().replace('\\', "/"),
            bytes,
            format,
            outcome,
        }
    }
}
