//! Publication catalogue.
//!
//! The catalogue is a YAML file describing every e-paper to harvest: where
//! its edition lives, how pages are discovered, which CSS selectors locate
//! page assets and article clips, and how output files are named. Site
//! specifics live here as data; the engine in [`crate::scrapers`] only knows
//! the handful of strategies publishers actually use.
//!
//! # Example
//!
//! ```yaml
//! defaults:
//!   timeout_secs: 30
//!   max_retries: 3
//! publications:
//!   - name: ahmedabad_express
//!     expect: pdf
//!     editions:
//!       - name: ahmedabad
//!     source:
//!       kind: direct
//!       url: "https://www.ahmedabadexpress.com/newspaper-pdf/{date}.pdf"
//! ```

use crate::error::{HarvestError, Result};
use crate::template::{Template, TemplateContext};
use crate::utils::slugify;
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, instrument};

/// Chrome on Windows; several publishers refuse the default reqwest agent.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub const DEFAULT_EDITION_FILENAME: &str = "{pub}_{date:%Y%m%d}.{ext}";
pub const DEFAULT_PAGE_FILENAME: &str = "{pub}_{date:%Y%m%d}_{page:02}.{ext}";
pub const DEFAULT_ARTICLE_FILENAME: &str = "{pub}_{date:%Y%m%d}_{page:02}_article{article:02}.{ext}";

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_DIGEST_MODEL: &str = "gemma3:1b";

/// Top-level catalogue file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Catalogue {
    #[serde(default)]
    pub defaults: Defaults,
    /// Article digests; absent means clips are only downloaded.
    #[serde(default)]
    pub digest: Option<DigestConfig>,
    pub publications: Vec<Publication>,
}

/// Network and scheduling settings shared by every publication.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Defaults {
    pub user_agent: String,
    pub timeout_secs: u64,
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    pub page_delay_ms: u64,
    pub concurrency: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            page_delay_ms: 0,
            concurrency: 4,
        }
    }
}

/// OCR and summary of downloaded article clips.
///
/// Clips are read with `tesseract`, and the text is sent to an Ollama server
/// that answers with a title, a cleaned body and a summary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DigestConfig {
    /// Base URL of the Ollama server.
    pub ollama_url: String,
    /// Model name passed to `/api/chat`.
    pub model: String,
    /// Tesseract binary, looked up on `PATH` unless absolute.
    pub tesseract_bin: String,
    /// Upper bound for one OCR run and for one chat request.
    pub timeout_secs: u64,
    /// Tesseract language(s) for publications that do not set `ocr_lang`.
    pub ocr_lang: String,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            ollama_url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_DIGEST_MODEL.to_string(),
            tesseract_bin: "tesseract".to_string(),
            timeout_secs: 120,
            ocr_lang: "eng".to_string(),
        }
    }
}

/// How HTML documents for a publication are obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Render {
    #[default]
    Http,
    Chrome,
}

/// Which downloaded formats count as a valid asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expect {
    Pdf,
    Image,
    #[default]
    Any,
}

impl std::fmt::Display for Expect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Expect::Pdf => "pdf",
            Expect::Image => "image",
            Expect::Any => "a non-HTML file",
        };
        f.write_str(s)
    }
}

/// One newspaper.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Publication {
    pub name: String,
    #[serde(default)]
    pub render: Render,
    #[serde(default)]
    pub expect: Expect,
    #[serde(default)]
    pub editions: Vec<EditionConfig>,
    #[serde(default)]
    pub filenames: Filenames,
    /// Tesseract language(s) for this publication's clips, e.g. `guj+eng`.
    #[serde(default)]
    pub ocr_lang: Option<String>,
    pub source: SourceConfig,
}

impl Publication {
    /// Statically configured editions, or a single `main` edition.
    pub fn static_editions(&self) -> Vec<EditionConfig> {
        if self.editions.is_empty() {
            vec![EditionConfig {
                name: "main".to_string(),
                code: None,
            }]
        } else {
            self.editions.clone()
        }
    }
}

/// A city or regional variant of a publication.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EditionConfig {
    pub name: String,
    #[serde(default)]
    pub code: Option<String>,
}

impl EditionConfig {
    /// The value substituted for `{code}`; falls back to the edition name.
    pub fn code(&self) -> &str {
        self.code.as_deref().unwrap_or(&self.name)
    }
}

/// Output filename templates per asset kind.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Filenames {
    pub edition: String,
    pub page: String,
    pub article: String,
}

impl Default for Filenames {
    fn default() -> Self {
        Self {
            edition: DEFAULT_EDITION_FILENAME.to_string(),
            page: DEFAULT_PAGE_FILENAME.to_string(),
            article: DEFAULT_ARTICLE_FILENAME.to_string(),
        }
    }
}

/// Edition/page discovery strategy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    /// One URL per edition pointing straight at the full edition file.
    Direct { url: String },
    /// A URL with a `{page}` index, walked until the first missing page.
    PageSequence {
        url: String,
        #[serde(default = "default_start_page")]
        start_page: u32,
        #[serde(default = "default_max_pages")]
        max_pages: u32,
        #[serde(default)]
        viewer: Option<Viewer>,
    },
    /// One HTML page listing every page asset.
    PageGallery {
        url: String,
        asset_selector: String,
        #[serde(default = "default_src")]
        asset_attr: String,
    },
    /// A page viewer with a "next page" control.
    Paginated {
        url: String,
        viewer: Viewer,
        next_selector: String,
        #[serde(default = "default_href")]
        next_attr: String,
        #[serde(default)]
        disabled_class: Option<String>,
        #[serde(default = "default_max_pages")]
        max_pages: u32,
    },
    /// An index page linking (or listing in a dropdown) the day's editions.
    EditionIndex {
        url: String,
        edition_selector: String,
        #[serde(default = "default_href")]
        value_attr: String,
        #[serde(default)]
        name_attr: Option<String>,
        #[serde(default)]
        value_contains: Option<String>,
        #[serde(default)]
        date_match: Option<String>,
        #[serde(default)]
        edition_url: Option<String>,
        download_selector: String,
        #[serde(default = "default_href")]
        download_attr: String,
        #[serde(default)]
        link_text_contains: Option<String>,
    },
    /// A JSON endpoint returning the page list of an edition.
    JsonApi {
        url: String,
        #[serde(default)]
        method: HttpMethod,
        #[serde(default)]
        body: Option<serde_json::Value>,
        pointer: String,
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        split: Option<String>,
        asset_url: String,
    },
}

impl SourceConfig {
    /// Short strategy name used in logs, manifests, and `--list`.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Direct { .. } => "direct",
            SourceConfig::PageSequence { .. } => "page_sequence",
            SourceConfig::PageGallery { .. } => "page_gallery",
            SourceConfig::Paginated { .. } => "paginated",
            SourceConfig::EditionIndex { .. } => "edition_index",
            SourceConfig::JsonApi { .. } => "json_api",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Extraction rules for an HTML page viewer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Viewer {
    #[serde(default)]
    pub asset_selector: Option<String>,
    #[serde(default = "default_src")]
    pub asset_attr: String,
    #[serde(default)]
    pub clips: Option<Clips>,
}

/// Article overlays on a page and the clipped image behind each one.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Clips {
    pub link_selector: String,
    #[serde(default = "default_href")]
    pub link_attr: String,
    pub image_selector: String,
    #[serde(default = "default_src")]
    pub image_attr: String,
}

fn default_start_page() -> u32 {
    1
}

fn default_max_pages() -> u32 {
    60
}

fn default_src() -> String {
    "src".to_string()
}

fn default_href() -> String {
    "href".to_string()
}

/// Parse a CSS selector, mapping the parser's borrowed error into ours.
pub fn parse_selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| HarvestError::Selector(css.to_string()))
}

/// Load and validate a catalogue from disk.
#[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
pub async fn load_catalogue(path: impl AsRef<Path>) -> Result<Catalogue> {
    let raw = tokio::fs::read_to_string(path.as_ref()).await?;
    let catalogue = parse_catalogue(&raw)?;
    info!(
        publications = catalogue.publications.len(),
        "Loaded publication catalogue"
    );
    Ok(catalogue)
}

/// Parse and validate catalogue YAML.
pub fn parse_catalogue(raw: &str) -> Result<Catalogue> {
    let catalogue: Catalogue = serde_yaml::from_str(raw)?;
    catalogue.validate()?;
    Ok(catalogue)
}

impl Catalogue {
    /// Check names, templates, selectors and bounds up front.
    pub fn validate(&self) -> Result<()> {
        if self.defaults.concurrency == 0 {
            return Err(HarvestError::Config("defaults.concurrency must be at least 1".into()));
        }
        if self.defaults.timeout_secs == 0 {
            return Err(HarvestError::Config("defaults.timeout_secs must be at least 1".into()));
        }

        if let Some(digest) = &self.digest {
            digest.validate()?;
        }

        let mut seen = HashMap::new();
        for publication in &self.publications {
            let name = publication.name.trim();
            if name.is_empty() {
                return Err(HarvestError::Config("publication with empty name".into()));
            }
            if let Some(other) = seen.insert(slugify(name), name) {
                return Err(HarvestError::Config(format!(
                    "duplicate publication `{name}` (same output folder as `{other}`)"
                )));
            }
            publication
                .validate()
                .map_err(|e| HarvestError::Config(format!("publication `{name}`: {e}")))?;
            debug!(publication = name, kind = publication.source.kind(), "Validated publication");
        }
        Ok(())
    }

    /// Publications matching `names`, or all of them when `names` is empty.
    pub fn select(&self, names: &[String]) -> Result<Vec<&Publication>> {
        if names.is_empty() {
            return Ok(self.publications.iter().collect());
        }
        let by_name: BTreeMap<&str, &Publication> = self
            .publications
            .iter()
            .map(|p| (p.name.as_str(), p))
            .collect();
        names
            .iter()
            .map(|n| {
                by_name
                    .get(n.as_str())
                    .copied()
                    .ok_or_else(|| HarvestError::Config(format!("unknown publication `{n}`")))
            })
            .collect()
    }
}

impl Publication {
    fn validate(&self) -> Result<()> {
        let mut edition_dirs = HashMap::new();
        for edition in &self.editions {
            if edition.name.trim().is_empty() {
                return Err(HarvestError::Config("edition with empty name".into()));
            }
            if let Some(other) = edition_dirs.insert(slugify(&edition.name), edition.name.as_str()) {
                return Err(HarvestError::Config(format!(
                    "duplicate edition `{}` (same output folder as `{other}`)",
                    edition.name
                )));
            }
        }

        if let Some(lang) = &self.ocr_lang {
            check_ocr_lang(lang)?;
        }

        Template::parse(&self.filenames.edition, TemplateContext::EditionFile)?;
        Template::parse(&self.filenames.page, TemplateContext::PageFile)?;
        Template::parse(&self.filenames.article, TemplateContext::ArticleFile)?;

        match &self.source {
            SourceConfig::Direct { url } => {
                Template::parse(url, TemplateContext::Url)?;
            }
            SourceConfig::PageSequence {
                url,
                start_page: _,
                max_pages,
                viewer,
            } => {
                let t = Template::parse(url, TemplateContext::Url)?;
                if !t.uses_page() {
                    return Err(HarvestError::Config(format!(
                        "page_sequence url `{url}` has no {{page}} placeholder"
                    )));
                }
                check_max_pages(*max_pages)?;
                if let Some(viewer) = viewer {
                    viewer.validate()?;
                }
            }
            SourceConfig::PageGallery {
                url,
                asset_selector,
                ..
            } => {
                Template::parse(url, TemplateContext::Url)?;
                parse_selector(asset_selector)?;
            }
            SourceConfig::Paginated {
                url,
                viewer,
                next_selector,
                max_pages,
                ..
            } => {
                Template::parse(url, TemplateContext::Url)?;
                viewer.validate()?;
                parse_selector(next_selector)?;
                check_max_pages(*max_pages)?;
            }
            SourceConfig::EditionIndex {
                url,
                edition_selector,
                date_match,
                edition_url,
                download_selector,
                ..
            } => {
                Template::parse(url, TemplateContext::Url)?;
                parse_selector(edition_selector)?;
                parse_selector(download_selector)?;
                if let Some(fmt) = date_match {
                    Template::parse(&format!("{{date:{fmt}}}"), TemplateContext::Url)?;
                }
                if let Some(edition_url) = edition_url {
                    Template::parse(edition_url, TemplateContext::Url)?;
                }
            }
            SourceConfig::JsonApi {
                url,
                body,
                pointer,
                asset_url,
                ..
            } => {
                Template::parse(url, TemplateContext::Url)?;
                Template::parse(asset_url, TemplateContext::Url)?;
                if !pointer.is_empty() && !pointer.starts_with('/') {
                    return Err(HarvestError::Config(format!(
                        "json pointer `{pointer}` must be empty or start with `/`"
                    )));
                }
                if let Some(body) = body {
                    validate_body(body)?;
                }
            }
        }
        Ok(())
    }
}

impl DigestConfig {
    fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.ollama_url)
            .map_err(|e| HarvestError::Config(format!("digest.ollama_url `{}`: {e}", self.ollama_url)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(HarvestError::Config(format!(
                "digest.ollama_url `{}` must be http or https",
                self.ollama_url
            )));
        }
        if self.model.trim().is_empty() {
            return Err(HarvestError::Config("digest.model is empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(HarvestError::Config("digest.timeout_secs must be at least 1".into()));
        }
        check_ocr_lang(&self.ocr_lang)
    }
}

/// Tesseract language lists look like `eng` or `guj+eng`.
fn check_ocr_lang(lang: &str) -> Result<()> {
    let ok = !lang.is_empty()
        && lang
            .split('+')
            .all(|l| !l.is_empty() && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if ok {
        Ok(())
    } else {
        Err(HarvestError::Config(format!("invalid ocr_lang `{lang}`")))
    }
}

impl Viewer {
    fn validate(&self) -> Result<()> {
        if self.asset_selector.is_none() && self.clips.is_none() {
            return Err(HarvestError::Config(
                "viewer needs an asset_selector, clips, or both".into(),
            ));
        }
        if let Some(css) = &self.asset_selector {
            parse_selector(css)?;
        }
        if let Some(clips) = &self.clips {
            parse_selector(&clips.link_selector)?;
            parse_selector(&clips.image_selector)?;
        }
        Ok(())
    }
}

fn check_max_pages(max_pages: u32) -> Result<()> {
    if max_pages == 0 {
        return Err(HarvestError::Config("max_pages must be at least 1".into()));
    }
    Ok(())
}

fn validate_body(body: &serde_json::Value) -> Result<()> {
    match body {
        serde_json::Value::String(s) => {
            Template::parse(s, TemplateContext::Text)?;
        }
        serde_json::Value::Array(items) => items.iter().try_for_each(validate_body)?,
        serde_json::Value::Object(map) => map.values().try_for_each(validate_body)?,
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
defaults:
  timeout_secs: 10
publications:
  - name: ahmedabad_express
    expect: pdf
    editions:
      - name: ahmedabad
    source:
      kind: direct
      url: "https://www.ahmedabadexpress.com/newspaper-pdf/{date}.pdf"
  - name: western_times
    editions:
      - name: english
        code: en
      - name: gujarati
        code: ah
    source:
      kind: direct
      url: "https://westerntimesnews.in/wp-content/uploads/{date:%Y}/{date:%m}/{date:%d%m%Y}{code}.pdf"
  - name: sakal
    source:
      kind: page_sequence
      url: "https://cdn.example.com/Sakal_{date:%Y_%m_%d}_{page:03}.jpg"
  - name: echo_of_india
    source:
      kind: json_api
      url: "http://www.echoofindia.com/WebService/Master.asmx/GetPdfDocument"
      method: post
      body: { company_key: 1, edition_key: "{code}" }
      pointer: /d
      field: PDF_DOCUMENT
      split: "|"
      asset_url: "http://www.echoofindia.com/Documents/PDF/{value}"
"#;

    #[test]
    fn test_parse_sample() {
        let catalogue = parse_catalogue(SAMPLE).unwrap();
        assert_eq!(catalogue.publications.len(), 4);
        assert_eq!(catalogue.defaults.timeout_secs, 10);
        assert_eq!(catalogue.defaults.max_retries, 3);
        assert_eq!(catalogue.publications[0].expect, Expect::Pdf);
        assert_eq!(catalogue.publications[1].editions[0].code(), "en");
        assert_eq!(catalogue.publications[0].editions[0].code(), "ahmedabad");
        assert_eq!(catalogue.publications[3].source.kind(), "json_api");
    }

    #[test]
    fn test_page_sequence_defaults() {
        let catalogue = parse_catalogue(SAMPLE).unwrap();
        match &catalogue.publications[2].source {
            SourceConfig::PageSequence {
                start_page,
                max_pages,
                viewer,
                ..
            } => {
                assert_eq!(*start_page, 1);
                assert_eq!(*max_pages, 60);
                assert!(viewer.is_none());
            }
            other => panic!("unexpected source {other:?}"),
        }
    }

    #[test]
    fn test_static_editions_default_to_main() {
        let catalogue = parse_catalogue(SAMPLE).unwrap();
        let editions = catalogue.publications[2].static_editions();
        assert_eq!(editions.len(), 1);
        assert_eq!(editions[0].name, "main");
    }

    #[test]
    fn test_duplicate_publication_rejected() {
        let raw = r#"
publications:
  - name: a
    source: { kind: direct, url: "https://a.example.com/{date}.pdf" }
  - name: a
    source: { kind: direct, url: "https://a.example.com/{date}.pdf" }
"#;
        let err = parse_catalogue(raw).unwrap_err();
        assert!(err.to_string().contains("duplicate publication"));
    }

    #[test]
    fn test_names_sharing_an_output_folder_rejected() {
        let raw = r#"
publications:
  - name: Sakal
    source: { kind: direct, url: "https://a.example.com/{date}.pdf" }
  - name: "sakal "
    source: { kind: direct, url: "https://a.example.com/{date}.pdf" }
"#;
        let err = parse_catalogue(raw).unwrap_err();
        assert!(err.to_string().contains("same output folder as `Sakal`"));

        let raw = r#"
publications:
  - name: western_times
    editions:
      - name: Ahmedabad City
      - name: ahmedabad-city
      - name: ahmedabad_city
    source: { kind: direct, url: "https://a.example.com/{date}{code}.pdf" }
"#;
        let err = parse_catalogue(raw).unwrap_err();
        assert!(err.to_string().contains("duplicate edition `ahmedabad_city`"));
    }

    #[test]
    fn test_shipped_catalogue_loads() {
        let catalogue = parse_catalogue(include_str!("../publications.yaml")).unwrap();
        let kinds: Vec<&str> = catalogue.publications.iter().map(|p| p.source.kind()).collect();
        for kind in ["direct", "page_sequence", "page_gallery", "edition_index", "json_api"] {
            assert!(kinds.contains(&kind), "no {kind} publication in publications.yaml");
        }
    }

    #[test]
    fn test_digest_section_defaults() {
        let catalogue = parse_catalogue(SAMPLE).unwrap();
        assert!(catalogue.digest.is_none());

        let raw = r#"
digest:
  model: llama3.2:3b
publications:
  - name: gujarat_samachar
    ocr_lang: guj+eng
    source: { kind: direct, url: "https://a.example.com/{date}.pdf" }
"#;
        let catalogue = parse_catalogue(raw).unwrap();
        let digest = catalogue.digest.unwrap();
        assert_eq!(digest.ollama_url, DEFAULT_OLLAMA_URL);
        assert_eq!(digest.model, "llama3.2:3b");
        assert_eq!(digest.tesseract_bin, "tesseract");
        assert_eq!(digest.ocr_lang, "eng");
        assert_eq!(catalogue.publications[0].ocr_lang.as_deref(), Some("guj+eng"));
    }

    #[test]
    fn test_bad_digest_settings_rejected() {
        let raw = r#"
digest:
  ollama_url: "ftp://localhost:11434"
publications: []
"#;
        assert!(parse_catalogue(raw).unwrap_err().to_string().contains("http or https"));

        let raw = r#"
publications:
  - name: sandesh
    ocr_lang: "guj+; rm"
    source: { kind: direct, url: "https://a.example.com/{date}.pdf" }
"#;
        assert!(parse_catalogue(raw).unwrap_err().to_string().contains("invalid ocr_lang"));
    }

    #[test]
    fn test_page_sequence_requires_page_placeholder() {
        let raw = r#"
publications:
  - name: a
    source: { kind: page_sequence, url: "https://a.example.com/{date}.pdf" }
"#;
        assert!(parse_catalogue(raw).is_err());
    }

    #[test]
    fn test_bad_selector_rejected() {
        let raw = r#"
publications:
  - name: a
    source:
      kind: page_gallery
      url: "https://a.example.com/"
      asset_selector: "div[[["
"#;
        let err = parse_catalogue(raw).unwrap_err();
        assert!(err.to_string().contains("div[[["));
    }

    #[test]
    fn test_viewer_needs_something_to_extract() {
        let raw = r#"
publications:
  - name: a
    source:
      kind: paginated
      url: "https://a.example.com/"
      next_selector: "a.next"
      viewer: {}
"#;
        assert!(parse_catalogue(raw).is_err());
    }

    #[test]
    fn test_bad_filename_template_rejected() {
        let raw = r#"
publications:
  - name: a
    filenames:
      edition: "{pub}_{page}.{ext}"
    source: { kind: direct, url: "https://a.example.com/{date}.pdf" }
"#;
        assert!(parse_catalogue(raw).is_err());
    }

    #[test]
    fn test_body_templates_validated() {
        let raw = r#"
publications:
  - name: a
    source:
      kind: json_api
      url: "https://a.example.com/api"
      body: { when: "{date:%d/%m/%Y}", bad: "{oops}" }
      pointer: /d
      asset_url: "{value}"
"#;
        assert!(parse_catalogue(raw).is_err());
    }

    #[test]
    fn test_select_publications() {
        let catalogue = parse_catalogue(SAMPLE).unwrap();
        assert_eq!(catalogue.select(&[]).unwrap().len(), 4);
        let picked = catalogue.select(&["sakal".to_string()]).unwrap();
        assert_eq!(picked[0].name, "sakal");
        assert!(catalogue.select(&["missing".to_string()]).is_err());
    }
}
