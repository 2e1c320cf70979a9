//! Lovtidend crawler: a resumable harvester for a paginated legal-gazette register
//!
//! This crate walks the register's listing pages year by year, resolves the
//! structured (XML) rendition of every listed document and stores it on disk,
//! keeping a checkpoint so an interrupted crawl continues where it stopped.

pub mod cache;
pub mod checkpoint;
pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod url;

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Main error type for crawler operations
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Malformed source data: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Checkpoint(#[from] checkpoint::CheckpointError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Unexpected file path outside output directory: {0}")]
    OutsideOutput(String),
}

/// Errors raised while talking to the register
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status {
        url: String,
        status: u16,
        /// Advisory delay sent by the server, if any
        retry_after: Option<Duration>,
    },

    #[error("Transport error for {url}: {source}")]
    Transport { url: String, source: reqwest::Error },

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// HTTP statuses worth another attempt
pub const RETRIABLE_STATUSES: [u16; 7] = [408, 425, 429, 500, 502, 503, 504];

impl FetchError {
    /// Returns the HTTP status for status errors
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for an HTTP status the source may recover from
    pub fn is_retriable_status(&self) -> bool {
        self.status()
            .is_some_and(|status| RETRIABLE_STATUSES.contains(&status))
    }

    /// Returns the server's advisory retry delay, if one was sent
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Errors raised when a listing page does not have the expected shape
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Expected a single pagination summary on {url}, found {found} paragraphs")]
    MissingSummary { url: String, found: usize },

    #[error("Could not parse pagination summary {text:?} on {url}")]
    UnparseableSummary { url: String, text: String },

    #[error("Listing page {url} reported {expected} documents but parsed {parsed}")]
    CountMismatch {
        url: String,
        expected: usize,
        parsed: usize,
    },

    #[error("Invalid selector {0}")]
    Selector(String),
}

/// Result type alias for crawler operations
pub type Result<T> = std::result::Result<T, CrawlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

/// Result type alias for fetch operations
pub type FetchResult<T> = std::result::Result<T, FetchError>;

// Re-export commonly used types
pub use cache::{CachePolicy, ResponseCache};
pub use checkpoint::{CheckpointLedger, CheckpointState};
pub use config::Config;
pub use crawler::{Coordinator, DocumentListing, Fetcher, ListingPage, PageWalker};
