//! Pagination over the register's listing pages
//!
//! Each listing page carries two hints about where the next page is: the
//! source's own "showing first - last of total" summary, and an explicit
//! "next" control. They sometimes disagree, and cached snapshots can lag
//! behind the requested offset. [`PageWalker`] reconciles the hints into one
//! forward-only decision, refuses to visit a locator or offset twice, and
//! hands pages to the caller one at a time.

use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::{DocumentListing, ListingMarkup};
use crate::url::{build_offset_url, extract_offset, merge_listing_query, normalize_listing_url};
use crate::Result;
use std::collections::HashSet;
use std::fmt;

/// One listing page, ready for processing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    /// 1-based position of this page within the walk
    pub number: usize,
    pub documents: Vec<DocumentListing>,
    pub current_url: String,
    pub next_url: Option<String>,
    /// Where to continue after this page: the page itself when it was cut
    /// short by the item limit, otherwise the next page
    pub resume_url: Option<String>,
    /// True when the item limit cut this page short
    pub truncated: bool,
    pub description: Option<String>,
    pub first_index: Option<u64>,
    pub last_index: Option<u64>,
    pub total_count: Option<u64>,
}

/// Why a walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// No further page
    Exhausted,
    /// The item limit cut the last page short
    Truncated,
    /// The page budget is used up
    PageBudget,
    /// The item limit was reached on a page boundary
    LimitReached,
    /// A locator came up a second time
    RepeatedLocator,
    /// A numeric offset came up a second time
    RepeatedOffset,
    /// A page repeated the previous page's summary at the same offset
    RepeatedSummary,
}

impl StopReason {
    /// Returns true for stops caused by inconsistent pagination signals
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            Self::RepeatedLocator | Self::RepeatedOffset | Self::RepeatedSummary
        )
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Exhausted => "no further pages",
            Self::Truncated => "page truncated by limit",
            Self::PageBudget => "page budget exhausted",
            Self::LimitReached => "document limit reached",
            Self::RepeatedLocator => "listing page repeated",
            Self::RepeatedOffset => "listing offset repeated",
            Self::RepeatedSummary => "pagination summary repeated",
        };
        f.write_str(text)
    }
}

/// Result of one pagination step
#[derive(Debug)]
pub enum WalkStep {
    Yield(ListingPage),
    Stop(StopReason),
}

/// Pull-based iterator over listing pages
pub struct PageWalker<'a> {
    fetcher: &'a Fetcher,
    current_url: Option<String>,
    max_pages: Option<usize>,
    limit: Option<usize>,
    processed: usize,
    leading_skip: usize,
    page_number: usize,
    visited: HashSet<String>,
    seen_offsets: HashSet<u64>,
    last_description: Option<String>,
    last_offset: Option<u64>,
    stopped: Option<StopReason>,
}

impl<'a> PageWalker<'a> {
    /// Starts a walk at `start_url`
    pub fn new(fetcher: &'a Fetcher, start_url: &str) -> Result<Self> {
        Ok(Self {
            fetcher,
            current_url: Some(normalize_listing_url(start_url)?),
            max_pages: None,
            limit: None,
            processed: 0,
            leading_skip: 0,
            page_number: 0,
            visited: HashSet::new(),
            seen_offsets: HashSet::new(),
            last_description: None,
            last_offset: None,
            stopped: None,
        })
    }

    /// Yields at most `max_pages` pages
    pub fn with_max_pages(mut self, max_pages: Option<usize>) -> Self {
        self.max_pages = max_pages;
        self
    }

    /// Yields at most `limit` documents in total, truncating the last page
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    /// Marks the first `count` documents of the first page as already
    /// handled; they are yielded but not counted against the limit
    pub fn with_leading_skip(mut self, count: usize) -> Self {
        self.leading_skip = count;
        self
    }

    /// Why the walk ended, once it has
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stopped
    }

    /// Returns the next page, or None once the walk has ended
    ///
    /// # Errors
    ///
    /// Fetch failures and malformed listing pages are returned as errors;
    /// the walker never guesses past them.
    pub async fn next_page(&mut self) -> Result<Option<ListingPage>> {
        match self.step().await? {
            WalkStep::Yield(page) => Ok(Some(page)),
            WalkStep::Stop(reason) => {
                tracing::debug!("Pagination stopped: {}", reason);
                Ok(None)
            }
        }
    }

    /// Advances the walk by one page
    pub async fn step(&mut self) -> Result<WalkStep> {
        if let Some(reason) = self.stopped {
            return Ok(WalkStep::Stop(reason));
        }
        if self.max_pages.is_some_and(|max| self.page_number >= max) {
            return Ok(self.stop(StopReason::PageBudget));
        }
        if self.limit.is_some_and(|limit| self.processed >= limit) {
            return Ok(self.stop(StopReason::LimitReached));
        }
        let Some(current_url) = self.current_url.take() else {
            return Ok(self.stop(StopReason::Exhausted));
        };

        if !self.visited.insert(current_url.clone()) {
            tracing::warn!(
                "Detected repeated listing page {}; stopping to avoid pagination loops",
                current_url
            );
            return Ok(self.stop(StopReason::RepeatedLocator));
        }
        let offset = extract_offset(&current_url);
        if let Some(offset) = offset {
            if !self.seen_offsets.insert(offset) {
                tracing::warn!(
                    "Listing offset {} already processed; stopping to avoid repeated work",
                    offset
                );
                return Ok(self.stop(StopReason::RepeatedOffset));
            }
        }

        self.page_number += 1;
        let markup = self.fetch_listing(&current_url, offset).await?;
        markup.validate_count(&current_url)?;
        let next_url = resolve_next_url(&current_url, &markup)?;

        let mut documents = markup.documents;
        let skipped = std::mem::take(&mut self.leading_skip).min(documents.len());
        let mut truncated = false;
        if let Some(limit) = self.limit {
            let keep = skipped + limit.saturating_sub(self.processed);
            if keep < documents.len() {
                documents.truncate(keep);
                truncated = true;
            }
        }

        let description = markup.summary.text;
        if !truncated {
            if let Some(text) = &description {
                if self.last_description.as_ref() == Some(text)
                    && (offset.is_none() || offset == self.last_offset)
                {
                    tracing::warn!(
                        "Pagination summary {:?} repeated on {}; stopping to avoid loops",
                        text,
                        current_url
                    );
                    return Ok(self.stop(StopReason::RepeatedSummary));
                }
                self.last_description = Some(text.clone());
                self.last_offset = offset;
            }
        }

        self.processed += documents.len() - skipped;
        let resume_url = if truncated {
            Some(current_url.clone())
        } else {
            next_url.clone()
        };

        self.stopped = if truncated {
            Some(StopReason::Truncated)
        } else if self.max_pages.is_some_and(|max| self.page_number >= max) {
            Some(StopReason::PageBudget)
        } else {
            match &next_url {
                None => Some(StopReason::Exhausted),
                Some(next) if self.visited.contains(next) => {
                    tracing::warn!(
                        "Next page {} was already seen; stopping pagination early",
                        next
                    );
                    Some(StopReason::RepeatedLocator)
                }
                Some(next) => {
                    self.current_url = Some(next.clone());
                    None
                }
            }
        };

        Ok(WalkStep::Yield(ListingPage {
            number: self.page_number,
            documents,
            current_url,
            next_url,
            resume_url,
            truncated,
            description,
            first_index: markup.summary.first_index,
            last_index: markup.summary.last_index,
            total_count: markup.summary.total_count,
        }))
    }

    /// Fetches and parses a listing page, refetching it live once when the
    /// cached copy starts at or before the requested offset
    async fn fetch_listing(&self, url: &str, offset: Option<u64>) -> Result<ListingMarkup> {
        let markup = self.fetcher.markup();
        let html = self.fetcher.listing_page(url, false).await?;
        let parsed = markup.parse_listing(&html, url)?;

        let stale = match (offset, parsed.summary.first_index) {
            (Some(offset), Some(first)) => offset > 0 && first <= offset,
            _ => false,
        };
        if !stale {
            return Ok(parsed);
        }

        tracing::warn!(
            "Listing page {} returned entries starting at {}; bypassing cache and retrying",
            url,
            parsed.summary.first_index.unwrap_or_default()
        );
        let html = self.fetcher.listing_page(url, true).await?;
        Ok(markup.parse_listing(&html, url)?)
    }

    fn stop(&mut self, reason: StopReason) -> WalkStep {
        self.stopped = Some(reason);
        WalkStep::Stop(reason)
    }
}

/// Derives both next-page candidates of a parsed page and picks one
fn resolve_next_url(current_url: &str, markup: &ListingMarkup) -> Result<Option<String>> {
    let summary_next = match (markup.summary.total_count, markup.summary.last_index) {
        (Some(total), Some(last)) if total > last => Some(build_offset_url(current_url, last)?),
        _ => None,
    };
    let anchor_next = markup
        .anchor_next
        .as_deref()
        .map(|anchor| merge_listing_query(current_url, anchor))
        .transpose()?;

    Ok(select_next_url(current_url, summary_next, anchor_next))
}

/// Chooses the next page out of the summary-derived and anchor-derived
/// candidates
///
/// The summary candidate is considered first. A candidate wins if it has no
/// numeric offset, or if its offset is strictly beyond the current page's
/// (any offset wins when the current page has none). Without such a
/// candidate there is no forward progress.
pub fn select_next_url(
    page_url: &str,
    summary_next: Option<String>,
    anchor_next: Option<String>,
) -> Option<String> {
    let current_offset = extract_offset(page_url);

    let mut candidates: Vec<String> = Vec::with_capacity(2);
    candidates.extend(summary_next);
    if let Some(anchor) = anchor_next {
        if !candidates.contains(&anchor) {
            candidates.push(anchor);
        }
    }

    candidates
        .into_iter()
        .find(|candidate| match extract_offset(candidate) {
            None => true,
            Some(offset) => current_offset.map_or(true, |current| offset > current),
        })
}
