//! Article digests: OCR plus a chat-model summary of every clipped article.
//!
//! Runs after a publication has been harvested, when the catalogue has a
//! `digest` section. Each image clip is read with `tesseract`, the text is
//! tidied by [`clean_ocr_text`], and an Ollama server is asked for a title, a
//! repaired body and a short summary. The answer is saved next to the clip as
//! `<clip>.json` and listed in the edition manifest.
//!
//! # Reply Handling
//!
//! - The chat request goes through the same [`Fetch`] stack as downloads, so
//!   transient server errors are retried with backoff
//! - A reply cut off mid-JSON is asked for once more
//! - A digest already on disk is kept unless the store overwrites
//! - A failed clip is recorded in the edition report and the next one runs

use crate::config::{DigestConfig, HttpMethod, Publication};
use crate::error::{HarvestError, Result};
use crate::fetch::{Fetch, FetchRequest};
use crate::models::{ArticleDigest, Artifact, AssetKind, EditionReport, PublicationReport};
use crate::outputs::files::Store;
use crate::outputs::manifest::write_manifest;
use crate::utils::{looks_truncated, truncate_for_log};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::{Duration as StdDuration, Instant};
use tracing::{debug, info, instrument, warn};

static STRAY_MARKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[|_]+").expect("static stray-mark regex"));
static BROKEN_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\S)-\n(\S)").expect("static hyphenation regex"));
static NEWLINE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n+").expect("static newline regex"));
static SPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s{2,}").expect("static space regex"));

/// Tidy raw OCR output before it is sent to the model.
///
/// Drops column rules (`|`) and underscores, joins words hyphenated across a
/// line break, collapses blank lines and runs of whitespace, and trims.
pub fn clean_ocr_text(raw: &str) -> String {
    let text = STRAY_MARKS.replace_all(raw, "");
    let text = BROKEN_WORD.replace_all(&text, "${1}${2}");
    let text = NEWLINE_RUNS.replace_all(&text, "\n");
    let text = SPACE_RUNS.replace_all(&text, " ");
    text.trim().to_string()
}

/// Runs the `tesseract` CLI on one image.
#[derive(Debug, Clone)]
pub struct Tesseract {
    binary: String,
    timeout: StdDuration,
}

impl Tesseract {
    pub fn new(binary: impl Into<String>, timeout: StdDuration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    /// Recognise the text in `image`.
    ///
    /// # Arguments
    ///
    /// * `image` - Image file to read
    /// * `lang` - Tesseract language list, e.g. `guj+eng`
    ///
    /// # Returns
    ///
    /// Whatever tesseract printed, uncleaned.
    #[instrument(level = "debug", skip_all, fields(image = %image.display(), %lang))]
    pub async fn recognize(&self, image: &Path, lang: &str) -> Result<String> {
        let ocr_err = |reason: String| HarvestError::Ocr {
            path: image.display().to_string(),
            reason,
        };
        let result = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.binary)
                .arg(image)
                .args([
                    "stdout",
                    "-l",
                    lang,
                    "--oem",
                    "1",
                    "--psm",
                    "4",
                    "-c",
                    "preserve_interword_spaces=1",
                ])
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let output = match result {
            Err(_) => return Err(ocr_err(format!("timed out after {:?}", self.timeout))),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HarvestError::Config(format!(
                    "OCR binary `{}` not found (set digest.tesseract_bin)",
                    self.binary
                )));
            }
            Ok(Err(e)) => return Err(ocr_err(format!("launch failed: {e}"))),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ocr_err(format!(
                "exited with {}: {}",
                output.status,
                truncate_for_log(stderr.trim(), 300)
            )));
        }
        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(chars = text.chars().count(), "Recognised text");
        Ok(text)
    }
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

/// OCR plus chat-model summary for article clips.
pub struct Digester<F> {
    fetcher: F,
    tesseract: Tesseract,
    chat_url: String,
    model: String,
    default_lang: String,
}

impl<F> Digester<F>
where
    F: Fetch,
{
    /// # Arguments
    ///
    /// * `fetcher` - Used for the chat requests; normally a [`crate::fetch::RetryFetch`]
    ///   built with the digest timeout
    /// * `config` - The catalogue's `digest` section
    pub fn new(fetcher: F, config: &DigestConfig) -> Self {
        Self {
            fetcher,
            tesseract: Tesseract::new(
                config.tesseract_bin.clone(),
                StdDuration::from_secs(config.timeout_secs),
            ),
            chat_url: format!("{}/api/chat", config.ollama_url.trim_end_matches('/')),
            model: config.model.clone(),
            default_lang: config.ocr_lang.clone(),
        }
    }

    /// Digest the article clips of every edition in `report`.
    ///
    /// Editions that had clips get their manifest rewritten so it lists the
    /// digests and any digest errors.
    #[instrument(level = "info", skip_all, fields(publication = %publication.name))]
    pub async fn digest_publication(
        &self,
        store: &Store,
        publication: &Publication,
        report: &mut PublicationReport,
    ) {
        let lang = publication.ocr_lang.as_deref().unwrap_or(&self.default_lang);
        for edition in &mut report.editions {
            if self.digest_edition(store, lang, edition).await == 0 {
                continue;
            }
            if let Err(e) = write_manifest(store, edition).await {
                warn!(edition = %edition.edition, error = %e, "Failed to rewrite edition manifest");
            }
        }
    }

    /// Digest every image clip of one edition, recording each result on the
    /// report. Returns the number of clips looked at.
    pub async fn digest_edition(&self, store: &Store, lang: &str, edition: &mut EditionReport) -> usize {
        let clips: Vec<Artifact> = edition
            .artifacts
            .iter()
            .filter(|a| a.kind == AssetKind::Article && a.format.is_image())
            .cloned()
            .collect();

        for clip in &clips {
            let result = self
                .digest_clip(store, lang, &edition.publication, &edition.edition, clip)
                .await;
            match result {
                Ok(path) => edition.digests.push(path),
                Err(e) => {
                    warn!(clip = %clip.path, error = %e, "Digest failed; skipping");
                    edition.errors.push(e.to_string());
                }
            }
        }
        if !clips.is_empty() {
            info!(
                edition = %edition.edition,
                clips = clips.len(),
                digests = edition.digests.len(),
                "Digested article clips"
            );
        }
        clips.len()
    }

    async fn digest_clip(
        &self,
        store: &Store,
        lang: &str,
        publication: &str,
        edition: &str,
        clip: &Artifact,
    ) -> Result<String> {
        let filename = digest_filename(&clip.path);
        if store.would_skip(publication, edition, &filename).await {
            debug!(clip = %clip.path, "Digest exists; skipping");
            return Ok(sibling_path(&clip.path, &filename));
        }

        let raw = self.tesseract.recognize(&store.root().join(&clip.path), lang).await?;
        let text = clean_ocr_text(&raw);
        if text.is_empty() {
            return Err(HarvestError::Ocr {
                path: clip.path.clone(),
                reason: "no text recognised".to_string(),
            });
        }

        let mut digest = self.summarise(&text).await?;
        digest.image = Some(clip.path.clone());
        digest.model = Some(self.model.clone());
        digest.ocr_text = Some(text);

        let bytes = serde_json::to_vec_pretty(&digest)?;
        let saved = store.save(publication, edition, &filename, &bytes).await?;
        Ok(saved.relative)
    }

    /// Ask the chat model for a digest of `text`.
    ///
    /// # Returns
    ///
    /// The model's title, repaired body and summary. A reply that stops
    /// mid-JSON is asked for once more before giving up.
    ///
    /// # Errors
    ///
    /// [`HarvestError::Summary`] when the reply is not a chat message, does
    /// not parse as a digest, or has neither body nor summary. Request
    /// errors come back as-is.
    #[instrument(level = "debug", skip_all, fields(model = %self.model, chars = text.len()))]
    pub async fn summarise(&self, text: &str) -> Result<ArticleDigest> {
        let request = FetchRequest::document(&self.chat_url)
            .with_method(HttpMethod::Post)
            .with_json_body(json!({
                "model": self.model,
                "messages": [{ "role": "user", "content": prompt(text) }],
                "stream": false,
                "format": "json",
            }));

        let t0 = Instant::now();
        let content = self.ask(&request).await?;
        let mut parsed = parse_digest(&content);

        // If the parse failed due to EOF (truncation), re-ask ONCE
        if let Err(ref e) = parsed {
            if looks_truncated(e) {
                warn!(error = %e, "EOF while parsing digest; re-asking once");
                let again = self.ask(&request).await?;
                parsed = parse_digest(&again);
            }
        }

        let digest = parsed.map_err(|e| {
            self.unusable(format!("{e}; reply was {}", truncate_for_log(&content, 200)))
        })?;
        if digest.clean_text.trim().is_empty() && digest.summary.trim().is_empty() {
            return Err(self.unusable("reply has neither clean_text nor summary".to_string()));
        }
        debug!(elapsed_ms = t0.elapsed().as_millis(), "Digest received");
        Ok(digest)
    }

    async fn ask(&self, request: &FetchRequest) -> Result<String> {
        let fetched = self.fetcher.fetch(request).await?;
        let reply: ChatReply = serde_json::from_slice(&fetched.body)
            .map_err(|e| self.unusable(format!("not a chat reply: {e}")))?;
        Ok(reply.message.content)
    }

    fn unusable(&self, reason: String) -> HarvestError {
        HarvestError::Summary {
            url: self.chat_url.clone(),
            reason,
        }
    }
}

fn prompt(text: &str) -> String {
    format!(
        "The text below was read by OCR from a clipped newspaper article and is noisy.\n\
         Find the headline if there is one, repair the formatting and recognition errors, \
         and write a short summary.\n\
         Answer with one JSON object with the fields title, clean_text and summary.\n\n\
         OCR TEXT:\n{text}"
    )
}

fn parse_digest(content: &str) -> serde_json::Result<ArticleDigest> {
    serde_json::from_str(strip_fences(content))
}

/// Models sometimes wrap JSON in a Markdown code fence.
fn strip_fences(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// `pub/ed/clip.jpg` -> `clip.json`
fn digest_filename(clip_path: &str) -> String {
    let name = clip_path.rsplit('/').next().unwrap_or(clip_path);
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    format!("{stem}.json")
}

fn sibling_path(clip_path: &str, filename: &str) -> String {
    match clip_path.rsplit_once('/') {
        Some((dir, _)) => format!("{dir}/{filename}"),
        None => filename.to_string(),
    }
}
