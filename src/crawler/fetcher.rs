//! HTTP fetcher implementation
//!
//! This module handles all HTTP traffic with the register, including:
//! - Building the HTTP client and per-request headers
//! - GET requests for listing and detail pages, through the response cache
//! - Retry with exponential backoff, jitter and advisory `Retry-After` delays
//! - Politeness pauses after every successful request
//! - Streamed file downloads with atomic rename and a raw-page fallback

use crate::cache::{CachePolicy, ResponseCache};
use crate::config::FetchConfig;
use crate::crawler::parser::{DocumentListing, LovdataMarkup, RegistryMarkup};
use crate::output::{html_fallback_path, partial_path, target_path};
use crate::url::{full_document_url, is_full_document_url};
use crate::{CrawlError, FetchError, FetchResult};
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONNECTION, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

/// Browser user agents rotated across requests
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.1 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:109.0) Gecko/20100101 Firefox/109.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/109.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:108.0) Gecko/20100101 Firefox/108.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:108.0) Gecko/20100101 Firefox/108.0",
];

const ACCEPT_LANGUAGE_VALUE: &str = "nb,en;q=0.8";
const XML_ACCEPT_VALUE: &str = "application/xml, text/xml;q=0.9, */*;q=0.8";

/// Attempts after which a failing structured download gives way to the
/// raw-page fallback
const FALLBACK_AFTER_ATTEMPTS: u32 = 3;

/// Upper bound for a computed backoff delay
const MAX_BACKOFF: Duration = Duration::from_secs(600);

/// Builds the HTTP client shared by all requests
///
/// Idle connections are not kept and responses are never transparently
/// decompressed, which keeps partial-decode failures out of the picture.
///
/// # Arguments
///
/// * `settings` - Timeouts are taken from here
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(settings: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .connect_timeout(settings.connect_timeout())
        .timeout(settings.request_timeout())
        .pool_max_idle_per_host(0)
        .build()
}

/// Polite, retrying client for the register
pub struct Fetcher {
    client: Client,
    settings: FetchConfig,
    cache: Option<ResponseCache>,
    markup: Box<dyn RegistryMarkup>,
    output_root: PathBuf,
    overwrite: bool,
}

impl Fetcher {
    /// Creates a fetcher writing downloads below `output_root`
    ///
    /// Caching is off and existing files are kept until configured otherwise.
    pub fn new(settings: FetchConfig, output_root: impl Into<PathBuf>) -> Result<Self, CrawlError> {
        Ok(Self {
            client: build_http_client(&settings)?,
            settings,
            cache: None,
            markup: Box::new(LovdataMarkup::new()?),
            output_root: output_root.into(),
            overwrite: false,
        })
    }

    pub fn with_cache(mut self, cache: Option<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_markup(mut self, markup: Box<dyn RegistryMarkup>) -> Self {
        self.markup = markup;
        self
    }

    pub fn markup(&self) -> &dyn RegistryMarkup {
        self.markup.as_ref()
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn settings(&self) -> &FetchConfig {
        &self.settings
    }

    /// GETs `url` and returns its body
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | 408, 425, 429, 5xx gateway errors | Retry after backoff or `Retry-After` |
    /// | Any other HTTP error status | Fail immediately |
    /// | Transport error (connect, reset, truncated body) | Retry after backoff |
    /// | Attempts exhausted | Fail with the last error |
    ///
    /// A successful fetch is followed by a short randomized politeness pause.
    pub async fn get(&self, url: &str) -> FetchResult<String> {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.try_get(url).await {
                Ok(body) => {
                    self.pause(self.settings.delay_range).await;
                    return Ok(body);
                }
                Err(e) => {
                    let retriable = match &e {
                        FetchError::Status { .. } => e.is_retriable_status(),
                        FetchError::Transport { .. } => true,
                        FetchError::Io { .. } => false,
                    };
                    if !retriable || attempt >= max_attempts {
                        return Err(e);
                    }

                    let delay = self.retry_delay(attempt, e.retry_after());
                    tracing::warn!(
                        "Attempt {}/{} failed: {}; retrying in {:.2}s",
                        attempt,
                        max_attempts,
                        e,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn try_get(&self, url: &str) -> FetchResult<String> {
        tracing::debug!("GET {}", url);
        let response = self
            .request(url)
            .send()
            .await
            .map_err(|source| transport(url, source))?;
        let response = check_status(url, response)?;

        // Read the whole body here so a truncated stream is retried
        response.text().await.map_err(|source| transport(url, source))
    }

    /// Returns the body of `url`, served from the cache when fresh
    ///
    /// `bypass_cache` forces a live fetch; the result is cached either way.
    pub async fn cached_text(
        &self,
        url: &str,
        policy: &CachePolicy,
        bypass_cache: bool,
    ) -> FetchResult<String> {
        self.fetch_cached(url, policy, bypass_cache)
            .await
            .map(|(text, _)| text)
    }

    /// Like `cached_text`, also telling whether the cache answered
    async fn fetch_cached(
        &self,
        url: &str,
        policy: &CachePolicy,
        bypass_cache: bool,
    ) -> FetchResult<(String, bool)> {
        if let Some(cache) = &self.cache {
            if !bypass_cache {
                if let Some(text) = cache.read(policy, url) {
                    return Ok((text, true));
                }
            }
        }

        let text = self.get(url).await?;
        if let Some(cache) = &self.cache {
            cache.write(policy, url, &text);
        }
        Ok((text, false))
    }

    /// Fetches a listing page under the listing cache policy
    pub async fn listing_page(&self, url: &str, bypass_cache: bool) -> FetchResult<String> {
        self.cached_text(url, &CachePolicy::listing(url), bypass_cache)
            .await
    }

    /// Fetches a detail page, switching to its full variant when the page
    /// only shows part of the document
    pub async fn document_html(&self, url: &str) -> FetchResult<String> {
        self.fetch_document(url).await.map(|(html, _)| html)
    }

    async fn fetch_document(&self, url: &str) -> FetchResult<(String, bool)> {
        let (html, from_cache) = self
            .fetch_cached(url, &CachePolicy::document(url), false)
            .await?;
        if !self.markup.is_truncated(&html) || is_full_document_url(url) {
            return Ok((html, from_cache));
        }

        let full_url = full_document_url(url);
        tracing::debug!("{} is truncated, fetching {}", url, full_url);
        self.fetch_cached(&full_url, &CachePolicy::document(&full_url), false)
            .await
    }

    /// Structured-file links of a document's detail page
    pub async fn file_links(&self, document: &DocumentListing) -> FetchResult<Vec<String>> {
        let html = self.document_html(&document.document_url).await?;
        Ok(self.markup.file_links(&html, &document.document_url))
    }

    /// Downloads every URL in `urls` and returns the paths written
    ///
    /// Existing files are skipped unless overwrite is on, as is an existing
    /// raw-page capture when `fallback_url` is given. Each file streams into
    /// a `.part` sibling that is renamed into place once complete.
    ///
    /// With a `fallback_url`, a file that keeps failing is replaced after
    /// min(max retries, 3) attempts by a trimmed capture of that page, stored
    /// beside the destination with an `.html` extension.
    ///
    /// # Returns
    ///
    /// * `Ok(Vec<PathBuf>)` - One path per URL, in order
    /// * `Err(CrawlError)` - A download failed for good or its path is invalid
    pub async fn download(
        &self,
        urls: &[String],
        fallback_url: Option<&str>,
    ) -> Result<Vec<PathBuf>, CrawlError> {
        let mut saved = Vec::with_capacity(urls.len());

        for url in urls {
            let destination = target_path(&self.output_root, url)?;
            let html_destination = html_fallback_path(&destination);

            if !self.overwrite && destination.exists() {
                tracing::debug!("{} already exists, skipping", destination.display());
                saved.push(destination);
                continue;
            }
            if fallback_url.is_some() && !self.overwrite && html_destination.exists() {
                tracing::debug!("{} already exists, skipping", html_destination.display());
                saved.push(html_destination);
                continue;
            }

            saved.push(self.download_one(url, &destination, fallback_url).await?);
        }

        Ok(saved)
    }

    async fn download_one(
        &self,
        url: &str,
        destination: &Path,
        fallback_url: Option<&str>,
    ) -> FetchResult<PathBuf> {
        let max_attempts = self.max_attempts();
        let fallback_after = max_attempts.min(FALLBACK_AFTER_ATTEMPTS);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let error = match self.stream_to_file(url, destination).await {
                Ok(()) => {
                    self.pause(self.settings.download_delay_range).await;
                    return Ok(destination.to_path_buf());
                }
                Err(e @ FetchError::Io { .. }) => return Err(e),
                Err(e) => e,
            };

            if let Some(fallback_url) = fallback_url {
                if attempt >= fallback_after {
                    tracing::warn!(
                        "Download of {} failed {} times ({}); capturing {} instead",
                        url,
                        attempt,
                        error,
                        fallback_url
                    );
                    return self.capture_fallback(fallback_url, url, destination).await;
                }
            }

            let retriable = match &error {
                FetchError::Status { .. } => error.is_retriable_status(),
                _ => true,
            };
            if !retriable || attempt >= max_attempts {
                return Err(error);
            }

            let delay = self
                .retry_delay(attempt, error.retry_after())
                .max(Duration::from_secs_f64(self.settings.download_retry_min));
            tracing::warn!(
                "Download attempt {}/{} failed: {}; retrying in {:.2}s",
                attempt,
                max_attempts,
                error,
                delay.as_secs_f64()
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Streams `url` into the destination's `.part` file and renames it into
    /// place; the partial file is removed on any failure
    async fn stream_to_file(&self, url: &str, destination: &Path) -> FetchResult<()> {
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }

        let partial = partial_path(destination);
        let result = self.stream_body(url, &partial, destination).await;
        if result.is_err() {
            let _ = tokio::fs::remove_file(&partial).await;
        }
        result
    }

    async fn stream_body(&self, url: &str, partial: &Path, destination: &Path) -> FetchResult<()> {
        tracing::debug!("Downloading {}", url);
        let response = self
            .request(url)
            .header(ACCEPT, XML_ACCEPT_VALUE)
            .send()
            .await
            .map_err(|source| transport(url, source))?;
        let mut response = check_status(url, response)?;

        let mut file = tokio::fs::File::create(partial)
            .await
            .map_err(|source| io_error(partial, source))?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|source| transport(url, source))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|source| io_error(partial, source))?;
        }
        file.flush()
            .await
            .map_err(|source| io_error(partial, source))?;
        drop(file);

        tokio::fs::rename(partial, destination)
            .await
            .map_err(|source| io_error(destination, source))
    }

    /// Saves the main content of `fallback_url` in place of a structured file
    ///
    /// # Arguments
    ///
    /// * `fallback_url` - Detail page to capture
    /// * `file_url` - The structured file that could not be downloaded
    /// * `destination` - Where that file would have been written
    pub async fn capture_fallback(
        &self,
        fallback_url: &str,
        file_url: &str,
        destination: &Path,
    ) -> FetchResult<PathBuf> {
        let html_destination = html_fallback_path(destination);
        let (html, from_cache) = self.fetch_document(fallback_url).await?;
        let trimmed = self.markup.main_content(&html);

        if let Some(parent) = html_destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }
        let partial = partial_path(&html_destination);
        tokio::fs::write(&partial, trimmed)
            .await
            .map_err(|source| io_error(&partial, source))?;
        tokio::fs::rename(&partial, &html_destination)
            .await
            .map_err(|source| io_error(&html_destination, source))?;

        tracing::warn!(
            "Falling back to HTML after repeated XML failures for {} -> {}",
            file_url,
            html_destination.display()
        );
        if !from_cache {
            self.pause(self.settings.download_delay_range).await;
        }
        Ok(html_destination)
    }

    fn request(&self, url: &str) -> RequestBuilder {
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        self.client
            .get(url)
            .header(USER_AGENT, user_agent)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE)
            .header(CONNECTION, "close")
            .header(ACCEPT_ENCODING, "identity")
    }

    fn max_attempts(&self) -> u32 {
        self.settings.max_retries.max(1)
    }

    /// Delay before the next attempt
    ///
    /// An advisory delay from the server is used as is. Otherwise the delay
    /// is `backoff_factor * 2^(attempt-1)` plus up to half of that as jitter.
    fn retry_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(delay) = retry_after {
            return delay;
        }
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let base = (self.settings.backoff_factor * 2f64.powi(exponent))
            .min(MAX_BACKOFF.as_secs_f64());
        let jitter = if base > 0.0 {
            rand::thread_rng().gen_range(0.0..=base / 2.0)
        } else {
            0.0
        };
        Duration::try_from_secs_f64(base + jitter)
            .map_or(MAX_BACKOFF, |delay| delay.min(MAX_BACKOFF))
    }

    /// Sleeps for a random duration within `[lower, upper]` seconds
    async fn pause(&self, [lower, upper]: [f64; 2]) {
        let wait = if upper > lower {
            rand::thread_rng().gen_range(lower..=upper)
        } else {
            lower
        };
        if let Ok(wait) = Duration::try_from_secs_f64(wait) {
            if !wait.is_zero() {
                tokio::time::sleep(wait).await;
            }
        }
    }
}

fn check_status(url: &str, response: Response) -> FetchResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    Err(FetchError::Status {
        url: url.to_string(),
        status: status.as_u16(),
        retry_after: response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after),
    })
}

/// Parses a `Retry-After` value given in seconds
fn parse_retry_after(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

fn transport(url: &str, source: reqwest::Error) -> FetchError {
    FetchError::Transport {
        url: url.to_string(),
        source,
    }
}

fn io_error(path: &Path, source: std::io::Error) -> FetchError {
    FetchError::Io {
        path: path.to_path_buf(),
        source,
    }
}
