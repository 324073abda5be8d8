//! Fetching documents and assets with exponential backoff retry.
//!
//! This module provides the one seam through which every byte enters the
//! harvester:
//! - [`Fetch`]: core trait for a single request/response exchange
//! - [`HttpFetcher`]: `reqwest` client, plus headless Chromium for documents
//!   of publications that only render their viewer with JavaScript
//! - [`RetryFetch`]: decorator that retries transient failures
//!
//! # Retry Strategy
//!
//! - Only errors where [`HarvestError::is_retryable`] holds are retried
//! - Exponential backoff starting at the catalogue's base delay
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added so parallel publications don't retry in lockstep

use crate::config::{Defaults, HttpMethod, Render};
use crate::error::{HarvestError, Result};
use crate::utils::truncate_for_log;
use rand::{Rng, rng};
use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, instrument, warn};

/// What a request is for; only documents are ever rendered in a browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose {
    Document,
    Asset,
}

/// A single request.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub method: HttpMethod,
    pub body: Option<serde_json::Value>,
    pub purpose: Purpose,
    pub render: Render,
}

impl FetchRequest {
    /// GET an HTML or JSON document.
    pub fn document(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Get,
            body: None,
            purpose: Purpose::Document,
            render: Render::Http,
        }
    }

    /// GET a downloadable page, edition, or clip file.
    pub fn asset(url: impl Into<String>) -> Self {
        Self {
            purpose: Purpose::Asset,
            ..Self::document(url)
        }
    }

    /// Render the document through `render` instead of plain HTTP.
    pub fn rendered(mut self, render: Render) -> Self {
        self.render = render;
        self
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_json_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

/// A successful (2xx) response.
#[derive(Debug, Clone)]
pub struct Fetched {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Fetched {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Trait for async fetching.
///
/// Implementors return `Ok` only for 2xx responses; any other status is a
/// [`HarvestError::Status`]. This abstraction lets the retry decorator and
/// the offline test fetcher stand in for the real client.
pub trait Fetch {
    /// Perform `request` once.
    ///
    /// # Returns
    ///
    /// The final URL, status, content type and body of a 2xx response, or
    /// the error that prevented one.
    async fn fetch(&self, request: &FetchRequest) -> Result<Fetched>;
}

/// Wrapper that adds exponential backoff retry logic to any [`Fetch`] implementation.
///
/// # Backoff Strategy
///
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
///
/// Only [`HarvestError::is_retryable`] failures are retried; a 404 or a
/// wrong content type is returned on the first attempt.
pub struct RetryFetch<T> {
    /// The underlying fetcher to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
    /// Upper bound of the random jitter added to every delay.
    max_jitter: StdDuration,
}

impl<T> RetryFetch<T>
where
    T: Fetch,
{
    /// Create a new retry wrapper around an existing [`Fetch`] implementation.
    ///
    /// # Arguments
    ///
    /// * `inner` - The underlying fetcher to wrap
    /// * `max_retries` - Retries after the first attempt (`defaults.max_retries`)
    /// * `base_delay` - Delay before the first retry (`defaults.retry_base_delay_ms`)
    ///
    /// # Example
    ///
    /// ```ignore
    /// let http = HttpFetcher::new(&catalogue.defaults)?;
    /// let fetcher = RetryFetch::new(http, 3, Duration::from_secs(1));
    /// ```
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
            max_jitter: StdDuration::from_millis(250),
        }
    }

    /// Override the jitter ceiling.
    #[cfg(test)]
    pub fn with_max_jitter(mut self, max_jitter: StdDuration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    fn delay_for(&self, attempt: usize) -> StdDuration {
        let shift = (attempt.saturating_sub(1)).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=self.max_jitter.as_millis() as u64);
        delay + StdDuration::from_millis(jitter_ms)
    }
}

impl<T> fmt::Debug for RetryFetch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryFetch")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

impl<T> Fetch for RetryFetch<T>
where
    T: Fetch,
{
    #[instrument(level = "debug", skip_all, fields(url = %request.url))]
    async fn fetch(&self, request: &FetchRequest) -> Result<Fetched> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.fetch(request).await {
                Ok(resp) => return Ok(resp),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis(),
                            elapsed_ms_total = total_dt.as_millis(),
                            error = %e,
                            "fetch exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis(),
                        elapsed_ms_total = total_dt.as_millis(),
                        ?delay,
                        error = %e,
                        "fetch attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Plain HTTP fetching, with documents optionally rendered by headless Chromium.
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    chrome: ChromeRenderer,
}

impl HttpFetcher {
    /// Build the shared client from catalogue defaults.
    pub fn new(defaults: &Defaults) -> Result<Self> {
        let timeout = StdDuration::from_secs(defaults.timeout_secs);
        let client = reqwest::Client::builder()
            .user_agent(defaults.user_agent.clone())
            .timeout(timeout)
            .build()
            .map_err(|e| HarvestError::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            chrome: ChromeRenderer::from_env(timeout),
        })
    }

    async fn fetch_http(&self, request: &FetchRequest) -> Result<Fetched> {
        let t0 = Instant::now();
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let http_err = |source: reqwest::Error| HarvestError::Http {
            url: request.url.clone(),
            source,
        };
        let resp = builder.send().await.map_err(http_err)?;
        let status = resp.status();
        if !status.is_success() {
            debug!(url = %request.url, status = status.as_u16(), "Non-success status");
            return Err(HarvestError::Status {
                url: request.url.clone(),
                status: status.as_u16(),
            });
        }

        let url = resp.url().to_string();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes().await.map_err(http_err)?.to_vec();

        debug!(
            %url,
            status = status.as_u16(),
            content_type = content_type.as_deref().unwrap_or("-"),
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis(),
            "Fetched"
        );
        Ok(Fetched {
            url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Fetched> {
        let use_chrome = request.purpose == Purpose::Document
            && request.render == Render::Chrome
            && request.method == HttpMethod::Get;
        if use_chrome {
            self.chrome.render(&request.url).await
        } else {
            self.fetch_http(request).await
        }
    }
}

/// Renders a page with `chromium --headless --dump-dom`.
#[derive(Debug, Clone)]
pub struct ChromeRenderer {
    binary: String,
    timeout: StdDuration,
}

impl ChromeRenderer {
    /// Binary from `CHROME_BIN`, defaulting to `chromium`.
    pub fn from_env(timeout: StdDuration) -> Self {
        let binary = std::env::var("CHROME_BIN").unwrap_or_else(|_| "chromium".to_string());
        Self { binary, timeout }
    }

    #[instrument(level = "info", skip_all, fields(%url, fetcher = "chrome"))]
    pub async fn render(&self, url: &str) -> Result<Fetched> {
        let parsed = url::Url::parse(url)?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(HarvestError::Browser {
                url: url.to_string(),
                reason: format!("only http/https URLs can be rendered, got {}", parsed.scheme()),
            });
        }

        let browser_err = |reason: String| HarvestError::Browser {
            url: url.to_string(),
            reason,
        };
        let profile = tempfile::tempdir()?;
        let result = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(&self.binary)
                .args([
                    "--headless",
                    "--no-sandbox",
                    "--disable-gpu",
                    "--disable-dev-shm-usage",
                    &format!("--user-data-dir={}", profile.path().display()),
                    "--dump-dom",
                    url,
                ])
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let output = match result {
            Err(_) => return Err(browser_err(format!("timed out after {:?}", self.timeout))),
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HarvestError::Config(format!(
                    "browser binary `{}` not found (set CHROME_BIN)",
                    self.binary
                )));
            }
            Ok(Err(e)) => return Err(browser_err(format!("launch failed: {e}"))),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(browser_err(format!(
                "exited with {}: {}",
                output.status,
                truncate_for_log(stderr.trim(), 300)
            )));
        }
        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Err(browser_err("empty DOM".to_string()));
        }

        debug!(bytes = output.stdout.len(), "Rendered document");
        Ok(Fetched {
            url: url.to_string(),
            status: 200,
            content_type: Some("text/html".to_string()),
            body: output.stdout,
        })
    }
}

/// Build the production fetcher stack described by the catalogue defaults.
pub fn build_fetcher(defaults: &Defaults) -> Result<RetryFetch<HttpFetcher>> {
    let http = HttpFetcher::new(defaults)?;
    Ok(RetryFetch::new(
        http,
        defaults.max_retries,
        StdDuration::from_millis(defaults.retry_base_delay_ms),
    ))
}

/// In-memory [`Fetch`] implementation for exercising scrapers offline.
#[cfg(test)]
pub mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// A canned reply; sequences are consumed in order and the last one repeats.
    #[derive(Debug, Clone)]
    pub enum Reply {
        Body {
            content_type: Option<String>,
            body: Vec<u8>,
        },
        Status(u16),
        Browser,
    }

    impl Reply {
        pub fn html(body: &str) -> Self {
            Reply::Body {
                content_type: Some("text/html; charset=utf-8".to_string()),
                body: body.as_bytes().to_vec(),
            }
        }

        pub fn pdf() -> Self {
            Reply::Body {
                content_type: Some("application/pdf".to_string()),
                body: b"%PDF-1.4\n%fake page\n".to_vec(),
            }
        }

        pub fn jpeg() -> Self {
            Reply::Body {
                content_type: Some("image/jpeg".to_string()),
                body: vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F'],
            }
        }

        pub fn json(value: serde_json::Value) -> Self {
            Reply::Body {
                content_type: Some("application/json".to_string()),
                body: value.to_string().into_bytes(),
            }
        }
    }

    #[derive(Debug, Default)]
    pub struct ScriptedFetcher {
        routes: Mutex<HashMap<String, Vec<Reply>>>,
        calls: Mutex<Vec<FetchRequest>>,
    }

    impl ScriptedFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn route(self, url: &str, reply: Reply) -> Self {
            self.sequence(url, vec![reply])
        }

        pub fn sequence(self, url: &str, replies: Vec<Reply>) -> Self {
            self.routes
                .lock()
                .unwrap()
                .insert(url.to_string(), replies);
            self
        }

        pub fn html(self, url: &str, body: &str) -> Self {
            self.route(url, Reply::html(body))
        }

        pub fn pdf(self, url: &str) -> Self {
            self.route(url, Reply::pdf())
        }

        pub fn jpeg(self, url: &str) -> Self {
            self.route(url, Reply::jpeg())
        }

        /// Every request seen so far, in order.
        pub fn calls(&self) -> Vec<FetchRequest> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, url: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.url == url)
                .count()
        }
    }

    impl Fetch for ScriptedFetcher {
        async fn fetch(&self, request: &FetchRequest) -> Result<Fetched> {
            self.calls.lock().unwrap().push(request.clone());
            let reply = {
                let mut routes = self.routes.lock().unwrap();
                match routes.get_mut(&request.url) {
                    Some(replies) if replies.len() > 1 => Some(replies.remove(0)),
                    Some(replies) => replies.first().cloned(),
                    None => None,
                }
            };
            match reply {
                Some(Reply::Body { content_type, body }) => Ok(Fetched {
                    url: request.url.clone(),
                    status: 200,
                    content_type,
                    body,
                }),
                Some(Reply::Status(status)) => Err(HarvestError::Status {
                    url: request.url.clone(),
                    status,
                }),
                Some(Reply::Browser) => Err(HarvestError::Browser {
                    url: request.url.clone(),
                    reason: "scripted failure".to_string(),
                }),
                None => Err(HarvestError::Status {
                    url: request.url.clone(),
                    status: 404,
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Reply, ScriptedFetcher};
    use super::*;

    fn retrying(inner: ScriptedFetcher, retries: usize) -> RetryFetch<ScriptedFetcher> {
        RetryFetch::new(inner, retries, StdDuration::from_millis(1))
            .with_max_jitter(StdDuration::ZERO)
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_errors() {
        let url = "https://epaper.example.com/p1.pdf";
        let inner = ScriptedFetcher::new().sequence(
            url,
            vec![Reply::Status(503), Reply::Status(502), Reply::pdf()],
        );
        let fetcher = retrying(inner, 3);
        let resp = fetcher.fetch(&FetchRequest::asset(url)).await.unwrap();
        assert!(resp.body.starts_with(b"%PDF"));
        assert_eq!(fetcher.inner.count(url), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_retries() {
        let url = "https://epaper.example.com/p1.pdf";
        let inner = ScriptedFetcher::new().route(url, Reply::Status(500));
        let fetcher = retrying(inner, 2);
        let err = fetcher.fetch(&FetchRequest::asset(url)).await.unwrap_err();
        assert!(matches!(err, HarvestError::Status { status: 500, .. }));
        assert_eq!(fetcher.inner.count(url), 3);
    }

    #[tokio::test]
    async fn test_retry_does_not_retry_fatal_errors() {
        let url = "https://epaper.example.com/missing.pdf";
        let inner = ScriptedFetcher::new().route(url, Reply::Status(404));
        let fetcher = retrying(inner, 5);
        let err = fetcher.fetch(&FetchRequest::asset(url)).await.unwrap_err();
        assert!(err.is_missing());
        assert_eq!(fetcher.inner.count(url), 1);
    }

    #[tokio::test]
    async fn test_browser_failures_are_retried() {
        let url = "https://epaper.example.com/";
        let inner = ScriptedFetcher::new().sequence(
            url,
            vec![Reply::Browser, Reply::html("<html><body>ok</body></html>")],
        );
        let fetcher = retrying(inner, 1);
        let req = FetchRequest::document(url).rendered(Render::Chrome);
        let resp = fetcher.fetch(&req).await.unwrap();
        assert!(resp.text().contains("ok"));
    }

    fn chrome(binary: &str) -> ChromeRenderer {
        ChromeRenderer {
            binary: binary.to_string(),
            timeout: StdDuration::from_secs(10),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_chrome_nonzero_exit_is_retryable() {
        let err = chrome("false").render("https://epaper.example.com/").await.unwrap_err();
        assert!(matches!(&err, HarvestError::Browser { reason, .. } if reason.starts_with("exited with")));
        assert!(err.is_retryable());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_chrome_empty_dom_is_retryable() {
        let err = chrome("true").render("https://epaper.example.com/").await.unwrap_err();
        assert!(matches!(&err, HarvestError::Browser { reason, .. } if reason == "empty DOM"));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_chrome_missing_binary_is_reported() {
        let err = chrome("/nonexistent/bin/chromium-epaper")
            .render("https://epaper.example.com/")
            .await
            .unwrap_err();
        assert!(matches!(&err, HarvestError::Config(msg) if msg.contains("CHROME_BIN")));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_chrome_refuses_non_http_urls() {
        let err = chrome("true").render("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(&err, HarvestError::Browser { reason, .. } if reason.contains("file")));
    }

    #[test]
    fn test_backoff_is_capped() {
        let fetcher = RetryFetch::new(ScriptedFetcher::new(), 10, StdDuration::from_secs(1))
            .with_max_jitter(StdDuration::ZERO);
        assert_eq!(fetcher.delay_for(1), StdDuration::from_secs(1));
        assert_eq!(fetcher.delay_for(2), StdDuration::from_secs(2));
        assert_eq!(fetcher.delay_for(4), StdDuration::from_secs(8));
        assert_eq!(fetcher.delay_for(9), StdDuration::from_secs(30));
    }

    #[test]
    fn test_request_builders() {
        let req = FetchRequest::asset("https://a.example.com/x.pdf");
        assert_eq!(req.purpose, Purpose::Asset);
        assert_eq!(req.method, HttpMethod::Get);
        let req = FetchRequest::document("https://a.example.com/api")
            .with_method(HttpMethod::Post)
            .with_json_body(serde_json::json!({"edition_key": "1"}));
        assert_eq!(req.method, HttpMethod::Post);
        assert!(req.body.is_some());
    }
}
