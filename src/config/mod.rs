//! Configuration module for the crawler
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every key has a default, so running without a file is the common case.
//!
//! # Example
//!
//! ```no_run
//! use lovtidend_crawler::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("lovtidend.toml")).unwrap();
//! println!("Crawling from year {}", config.crawler.start_year);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, FetchConfig, OutputConfig, DEFAULT_BASE_URL, DEFAULT_FIRST_YEAR,
};

// Re-export parser functions
pub use parser::{load_config, parse_config};
pub use validation::validate;
