use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Register index used when no base URL is configured
pub const DEFAULT_BASE_URL: &str = "https://lovdata.no/register/lovtidend";

/// First publication year covered by the register
pub const DEFAULT_FIRST_YEAR: i32 = 1982;

/// Main configuration structure for the crawler
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetch: FetchConfig,
    pub output: OutputConfig,
}

/// What to crawl
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Listing index of the register
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// First publication year to crawl
    #[serde(rename = "start-year")]
    pub start_year: i32,

    /// Last publication year to crawl (current year when unset)
    #[serde(rename = "end-year")]
    pub end_year: Option<i32>,

    /// Maximum number of listing pages per run
    #[serde(rename = "max-pages")]
    pub max_pages: Option<usize>,

    /// Maximum number of listed documents per run
    pub limit: Option<usize>,

    /// Re-download files that already exist on disk
    pub overwrite: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            start_year: DEFAULT_FIRST_YEAR,
            end_year: None,
            max_pages: None,
            limit: None,
            overwrite: false,
        }
    }
}

/// Retry, backoff and pacing behaviour of the fetcher
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Attempts per request, including the first one
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Base of the exponential backoff (seconds)
    #[serde(rename = "backoff-factor")]
    pub backoff_factor: f64,

    /// Politeness delay after each page fetch (seconds, lower/upper)
    #[serde(rename = "delay-range")]
    pub delay_range: [f64; 2],

    /// Politeness delay after each streamed download (seconds, lower/upper)
    #[serde(rename = "download-delay-range")]
    pub download_delay_range: [f64; 2],

    /// Lower bound for the delay between download attempts (seconds)
    #[serde(rename = "download-retry-min")]
    pub download_retry_min: f64,

    /// Connection timeout (seconds)
    #[serde(rename = "connect-timeout")]
    pub connect_timeout: f64,

    /// Whole-request timeout (seconds)
    #[serde(rename = "request-timeout")]
    pub request_timeout: f64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            backoff_factor: 0.65,
            delay_range: [0.35, 0.85],
            download_delay_range: [0.9, 1.8],
            download_retry_min: 1.5,
            connect_timeout: 15.0,
            request_timeout: 90.0,
        }
    }
}

impl FetchConfig {
    /// Configuration without any pacing, backoff or retry floor
    pub fn without_delays() -> Self {
        Self {
            backoff_factor: 0.0,
            delay_range: [0.0, 0.0],
            download_delay_range: [0.0, 0.0],
            download_retry_min: 0.0,
            ..Self::default()
        }
    }

    /// Connection timeout; out-of-range values saturate instead of panicking
    pub fn connect_timeout(&self) -> Duration {
        seconds(self.connect_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        seconds(self.request_timeout)
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(if value > 0.0 {
        Duration::MAX
    } else {
        Duration::ZERO
    })
}

/// Where results, cache and checkpoint live
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Root directory for downloaded files
    #[serde(rename = "output-dir")]
    pub output_dir: PathBuf,

    /// Response cache directory; caching is disabled when unset
    #[serde(rename = "cache-dir")]
    pub cache_dir: Option<PathBuf>,

    /// Checkpoint file for resume support
    #[serde(rename = "checkpoint-path")]
    pub checkpoint_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data/xml"),
            cache_dir: Some(PathBuf::from("data/http_cache")),
            checkpoint_path: PathBuf::from("data/lovtidend_checkpoint.json"),
        }
    }
}
