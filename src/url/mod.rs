//! Locator handling for the register
//!
//! Listing pages are addressed by URLs whose query string carries the
//! filters, the publication year and a numeric `offset` cursor. This module
//! reads and rewrites those parameters and guesses which year a URL belongs to.

mod query;
mod year;

// Re-export main functions
pub use query::{
    build_offset_url, extract_offset, extract_year_from_url, make_start_url, merge_listing_query,
    normalize_listing_url, year_url,
};
pub use year::{full_document_url, guess_year, is_full_document_url, year_from_fragment};

pub(crate) use query::parse;
