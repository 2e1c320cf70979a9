//! Crawler module for the register
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry, backoff and pacing
//! - Markup extraction for listing and detail pages
//! - Pagination over listing pages with loop detection
//! - Overall crawl coordination and checkpointing

mod coordinator;
mod fetcher;
mod parser;
mod walker;

pub use coordinator::{resolve_year_sequence, Coordinator, RunOptions, RunOutcome, RunReport};
pub use fetcher::{build_http_client, Fetcher};
pub use parser::{
    DocumentListing, ListingMarkup, LovdataMarkup, PaginationSummary, RegistryMarkup,
    NO_RESULTS_TEXT, TRUNCATION_SENTINEL,
};
pub use walker::{select_next_url, ListingPage, PageWalker, StopReason, WalkStep};
