use crate::url::guess_year;
use chrono::Datelike;
use std::time::Duration;

const DAY: u64 = 60 * 60 * 24;

/// Listing pages of the current year change as new entries are announced
pub const LISTING_TTL_CURRENT: Duration = Duration::from_secs(4 * DAY);

/// Detail pages of the current year may still receive corrections
pub const DOCUMENT_TTL_CURRENT: Duration = Duration::from_secs(20 * DAY);

/// Archival content is treated as immutable
pub const ARCHIVE_TTL: Duration = Duration::from_secs(2000 * DAY);

/// How long a cached response in a namespace stays fresh
///
/// A zero TTL makes every read a miss.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub namespace: String,
    pub ttl: Duration,
}

impl CachePolicy {
    pub fn new(namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            namespace: namespace.into(),
            ttl,
        }
    }

    /// Policy for a listing page, scoped by the year the URL names
    pub fn listing(url: &str) -> Self {
        Self::scoped("listing", guess_year(url), current_year(), LISTING_TTL_CURRENT)
    }

    /// Policy for a document detail page, scoped by the year the URL names
    pub fn document(url: &str) -> Self {
        Self::scoped("document", guess_year(url), current_year(), DOCUMENT_TTL_CURRENT)
    }

    /// Builds a year-scoped policy
    ///
    /// An unknown year counts as current, so it gets the short TTL.
    fn scoped(category: &str, year: Option<i32>, current_year: i32, current_ttl: Duration) -> Self {
        let namespace = match year {
            Some(year) => format!("{}/{}", category, year),
            None => format!("{}/unknown", category),
        };
        let ttl = match year {
            Some(year) if year < current_year => ARCHIVE_TTL,
            _ => current_ttl,
        };
        Self { namespace, ttl }
    }
}

pub(crate) fn current_year() -> i32 {
    chrono::Local::now().year()
}
