//! Error taxonomy for the harvest pipeline.
//!
//! Every fallible operation below `main` returns [`HarvestError`]. The retry
//! layer in [`crate::fetch`] consults [`HarvestError::is_retryable`] to decide
//! whether another attempt is worthwhile; everything else is reported once and
//! the pipeline moves on to the next asset, edition, or publication.

use thiserror::Error;

/// Errors produced while resolving editions and downloading assets.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("request to {url} failed with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("headless browser failed for {url}: {reason}")]
    Browser { url: String, reason: String },

    #[error("{url} returned {found} where {expected} was expected")]
    UnexpectedContent {
        url: String,
        expected: String,
        found: String,
    },

    #[error("no edition found for {publication} on {date}")]
    EditionNotFound { publication: String, date: String },

    #[error("invalid CSS selector `{0}`")]
    Selector(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("JSON pointer {pointer} did not resolve in response from {url}")]
    JsonShape { url: String, pointer: String },

    #[error("OCR failed for {path}: {reason}")]
    Ocr { path: String, reason: String },

    #[error("unusable digest from {url}: {reason}")]
    Summary { url: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl HarvestError {
    /// Whether a fresh attempt at the same request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            HarvestError::Status { status, .. } => {
                matches!(*status, 408 | 425 | 429) || (500..=599).contains(status)
            }
            HarvestError::Http { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_body() || source.is_request()
            }
            HarvestError::Browser { .. } => true,
            _ => false,
        }
    }

    /// Whether the error means the requested resource does not exist (yet).
    ///
    /// Page-index loops treat this as "no more pages" rather than a failure.
    pub fn is_missing(&self) -> bool {
        match self {
            HarvestError::Status { status, .. } => matches!(*status, 404 | 410),
            HarvestError::UnexpectedContent { .. } => true,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, HarvestError>;
