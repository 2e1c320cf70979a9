//! Crawler coordinator - main crawl orchestration logic
//!
//! This module drives a crawl across a range of publication years:
//! - Loading the checkpoint and aligning the start point with a year
//! - Walking each year's listing pages
//! - Resolving and downloading every document's files
//! - Advancing the checkpoint document by document while progress is contiguous
//! - Handling interrupts and reporting the run

use crate::cache::{current_year, ResponseCache};
use crate::checkpoint::CheckpointLedger;
use crate::config::{Config, DEFAULT_FIRST_YEAR};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::DocumentListing;
use crate::crawler::walker::{ListingPage, PageWalker};
use crate::output::{describe_document, describe_files, display_paths, SessionStats};
use crate::state::{PageProgress, RunTotals};
use crate::url::{extract_year_from_url, merge_listing_query, year_url};
use crate::{CrawlError, FetchError, Result};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Per-run inputs that are not part of the configuration file
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Explicit first listing page; overrides the checkpoint
    pub start_url: Option<String>,
    /// First year of the range (default 1982)
    pub start_year: Option<i32>,
    /// Last year of the range (default: current year)
    pub end_year: Option<i32>,
    /// Maximum number of listing pages this run
    pub max_pages: Option<usize>,
    /// Maximum number of listed documents this run
    pub limit: Option<usize>,
}

impl RunOptions {
    /// Options carrying the crawl bounds from the configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            start_url: None,
            start_year: Some(config.crawler.start_year),
            end_year: config.crawler.end_year,
            max_pages: config.crawler.max_pages,
            limit: config.crawler.limit,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every year in the range was fully processed
    Completed,
    /// A limit, the page budget or a gap on a page ended the run early
    Stopped,
    /// The cancellation flag was raised
    Interrupted,
    /// A document's files could not be downloaded
    DownloadFailed { document: String, error: String },
}

impl RunOutcome {
    /// Returns true for outcomes that should end the process with an error
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::DownloadFailed { .. })
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub session: SessionStats,
    /// Cumulative counters, including earlier runs when resuming
    pub totals: RunTotals,
}

/// What happened to one document
enum DocumentOutcome {
    Saved(Vec<PathBuf>),
    NoLinks,
    LinksUnavailable(FetchError),
    DownloadFailed(CrawlError),
}

/// Main crawler coordinator structure
pub struct Coordinator {
    fetcher: Fetcher,
    ledger: CheckpointLedger,
    base_url: String,
    cancel: Arc<AtomicBool>,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `fetcher` - Client used for listing pages, detail pages and downloads
    /// * `ledger` - Checkpoint access; use a disabled ledger to run without resume
    /// * `base_url` - Listing index the year URLs are derived from
    pub fn new(fetcher: Fetcher, ledger: CheckpointLedger, base_url: impl Into<String>) -> Self {
        Self {
            fetcher,
            ledger,
            base_url: base_url.into(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Builds a coordinator from configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `resume` - Whether to load and write the checkpoint
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(CrawlError)` - Failed to build the HTTP client or selectors
    pub fn from_config(config: &Config, resume: bool) -> Result<Self> {
        let fetcher = Fetcher::new(config.fetch.clone(), &config.output.output_dir)?
            .with_cache(config.output.cache_dir.as_ref().map(ResponseCache::new))
            .with_overwrite(config.crawler.overwrite);

        let checkpoint_path = config.output.checkpoint_path.clone();
        let ledger = if resume {
            CheckpointLedger::new(checkpoint_path)
        } else {
            CheckpointLedger::disabled(checkpoint_path)
        };

        Ok(Self::new(fetcher, ledger, config.crawler.base_url.clone()))
    }

    /// Shares an externally owned cancellation flag
    pub fn with_cancellation(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Flag that stops the run at the next year, page or document boundary
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Runs the crawl
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - The run ended; see `outcome` for how
    /// * `Err(CrawlError)` - A corrupt checkpoint, a listing page that could
    ///   not be fetched, or a malformed listing page stopped the run
    pub async fn run(&self, options: RunOptions) -> Result<RunReport> {
        let mut totals = RunTotals::default();
        let mut session = SessionStats::default();
        let mut start_url = options.start_url.clone();
        let mut pending_resume_index = 0;

        if let Some(state) = self.ledger.load()? {
            if start_url.is_some() {
                tracing::info!(
                    "Ignoring checkpoint stored in {} because a start URL was provided",
                    self.ledger.path().display()
                );
            } else {
                tracing::info!(
                    "Resuming from checkpoint {} stored in {}",
                    state,
                    self.ledger.path().display()
                );
                pending_resume_index = state.resume_index;
                totals = state.totals;
                start_url = Some(state.resume_url);
            }
        }

        let mut years = resolve_year_sequence(options.start_year, options.end_year);
        let (start, mut year_index) = self.align_start(start_url.as_deref(), &mut years)?;
        let mut current_start = Some(start);
        let mut remaining_limit = options.limit;
        let mut remaining_pages = options.max_pages;

        let outcome = 'years: loop {
            if year_index >= years.len() {
                break RunOutcome::Completed;
            }
            if self.cancelled() {
                break RunOutcome::Interrupted;
            }
            if remaining_limit == Some(0) || remaining_pages == Some(0) {
                break RunOutcome::Stopped;
            }

            let year = years[year_index];
            let start = match current_start.take() {
                Some(url) if extract_year_from_url(&url) == Some(year) => url,
                _ => {
                    pending_resume_index = 0;
                    year_url(&self.base_url, year)?
                }
            };
            tracing::info!("Crawling year {} from {}", year, start);

            let mut resume_index = std::mem::take(&mut pending_resume_index);
            let mut walker = PageWalker::new(&self.fetcher, &start)?
                .with_max_pages(remaining_pages)
                .with_limit(remaining_limit)
                .with_leading_skip(resume_index);

            loop {
                if self.cancelled() {
                    break 'years RunOutcome::Interrupted;
                }
                let Some(page) = walker.next_page().await? else {
                    break;
                };

                let progress =
                    PageProgress::new(page.documents.len(), std::mem::take(&mut resume_index));
                let progress = match self
                    .process_page(&page, progress, &mut totals, &mut session)
                    .await?
                {
                    PageResult::Processed(progress) => progress,
                    PageResult::Interrupted => break 'years RunOutcome::Interrupted,
                    PageResult::DownloadFailed { document, error } => {
                        break 'years RunOutcome::DownloadFailed { document, error };
                    }
                };

                self.commit_page(&page, &progress, &totals)?;

                if !progress.is_complete() {
                    tracing::warn!(
                        "Page {} has unprocessed documents; stopping so the next run retries from document {}",
                        page.current_url,
                        progress.resume_index()
                    );
                    break 'years RunOutcome::Stopped;
                }

                if let Some(limit) = remaining_limit.as_mut() {
                    *limit = limit.saturating_sub(page.documents.len() - progress.skipped());
                }
                if let Some(pages) = remaining_pages.as_mut() {
                    *pages = pages.saturating_sub(1);
                }
                if remaining_limit == Some(0) || remaining_pages == Some(0) {
                    // A finished year is still handed over before stopping
                    if page.resume_url.is_none() && !page.truncated {
                        break;
                    }
                    break 'years RunOutcome::Stopped;
                }
            }

            if let Some(reason) = walker.stop_reason().filter(|r| r.is_anomaly()) {
                tracing::warn!("Pagination for {} ended early: {}", year, reason);
            }

            year_index += 1;
            match years.get(year_index) {
                Some(&next_year) => {
                    let next = year_url(&self.base_url, next_year)?;
                    self.ledger.save(&next, 0, &totals)?;
                    current_start = Some(next);
                }
                None => {
                    self.ledger.clear()?;
                    break RunOutcome::Completed;
                }
            }
        };

        if outcome == RunOutcome::Interrupted {
            tracing::warn!("Interrupted by user");
        }
        session.log_summary(self.ledger.is_enabled().then_some(&totals));

        Ok(RunReport {
            outcome,
            session,
            totals,
        })
    }

    /// Processes the documents of one page not handled by an earlier run
    async fn process_page(
        &self,
        page: &ListingPage,
        mut progress: PageProgress,
        totals: &mut RunTotals,
        session: &mut SessionStats,
    ) -> Result<PageResult> {
        tracing::debug!(
            "Page {} ({}): {} documents, skipping {}",
            page.number,
            page.description.as_deref().unwrap_or("no summary"),
            page.documents.len(),
            progress.skipped()
        );
        self.ledger
            .save(&page.current_url, progress.resume_index(), totals)?;

        for (index, document) in page.documents.iter().enumerate() {
            if progress.should_skip(index) {
                continue;
            }
            if self.cancelled() {
                return Ok(PageResult::Interrupted);
            }

            match self.process_document(document, session).await {
                DocumentOutcome::Saved(written) => {
                    totals.record_document(written.len());
                    session.record_saved(written.len());
                    tracing::info!(
                        "Saved {} {} for {} -> {}",
                        written.len(),
                        describe_files(&written),
                        describe_document(document),
                        display_paths(&written, self.fetcher.output_root())
                    );
                    if progress.record_success(index) {
                        self.ledger
                            .save(&page.current_url, progress.resume_index(), totals)?;
                    }
                }
                DocumentOutcome::NoLinks => {
                    tracing::warn!("No XML link found for {}", describe_document(document));
                    self.record_gap(page, &mut progress, index, totals)?;
                }
                DocumentOutcome::LinksUnavailable(e) => {
                    tracing::warn!(
                        "Failed to fetch XML links for {}: {}",
                        describe_document(document),
                        e
                    );
                    self.record_gap(page, &mut progress, index, totals)?;
                }
                DocumentOutcome::DownloadFailed(e) => {
                    tracing::error!(
                        "Failed to download XML for {}: {}",
                        describe_document(document),
                        e
                    );
                    self.record_gap(page, &mut progress, index, totals)?;
                    return Ok(PageResult::DownloadFailed {
                        document: describe_document(document).to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(PageResult::Processed(progress))
    }

    async fn process_document(
        &self,
        document: &DocumentListing,
        session: &mut SessionStats,
    ) -> DocumentOutcome {
        let links = match self.fetcher.file_links(document).await {
            Ok(links) => links,
            Err(e) => return DocumentOutcome::LinksUnavailable(e),
        };
        if links.is_empty() {
            return DocumentOutcome::NoLinks;
        }

        session.downloads_attempted += 1;
        match self
            .fetcher
            .download(&links, Some(&document.document_url))
            .await
        {
            Ok(written) => DocumentOutcome::Saved(written),
            Err(e) => {
                session.downloads_failed += 1;
                DocumentOutcome::DownloadFailed(e)
            }
        }
    }

    /// Freezes the page's resume point at the first gap
    fn record_gap(
        &self,
        page: &ListingPage,
        progress: &mut PageProgress,
        index: usize,
        totals: &RunTotals,
    ) -> Result<()> {
        if progress.record_gap(index) {
            self.ledger.save(&page.current_url, index, totals)?;
        }
        Ok(())
    }

    /// Writes the checkpoint for the end of a page
    ///
    /// A page that was cut short or has a gap is re-entered at its resume
    /// index. A finished page hands over to the next page; on the last page
    /// of a year the checkpoint stays on that page until the year is closed.
    fn commit_page(
        &self,
        page: &ListingPage,
        progress: &PageProgress,
        totals: &RunTotals,
    ) -> Result<()> {
        let resume_url = page
            .resume_url
            .as_deref()
            .filter(|_| progress.is_complete() && !page.truncated);
        match resume_url {
            Some(next) => self.ledger.save(next, 0, totals)?,
            None => self
                .ledger
                .save(&page.current_url, progress.resume_index(), totals)?,
        }
        Ok(())
    }

    /// Maps the start URL onto a year of the range
    ///
    /// The URL is laid over that year's listing URL so the default filters
    /// are present. A year outside the range is added to it.
    fn align_start(
        &self,
        start_url: Option<&str>,
        years: &mut Vec<i32>,
    ) -> Result<(String, usize)> {
        let Some(start_url) = start_url else {
            return Ok((year_url(&self.base_url, years[0])?, 0));
        };

        match extract_year_from_url(start_url) {
            Some(year) => {
                let index = ensure_year(years, year);
                let url = merge_listing_query(&year_url(&self.base_url, year)?, start_url)?;
                Ok((url, index))
            }
            None => {
                let url = merge_listing_query(&year_url(&self.base_url, years[0])?, start_url)?;
                Ok((url, 0))
            }
        }
    }
}

enum PageResult {
    Processed(PageProgress),
    Interrupted,
    DownloadFailed { document: String, error: String },
}

/// Years to crawl, in ascending order
///
/// Defaults to 1982 through the current year; a reversed range is swapped.
pub fn resolve_year_sequence(start_year: Option<i32>, end_year: Option<i32>) -> Vec<i32> {
    let first = start_year.unwrap_or(DEFAULT_FIRST_YEAR);
    let last = end_year.unwrap_or_else(current_year);
    let (first, last) = if last < first { (last, first) } else { (first, last) };
    (first..=last).collect()
}

/// Position of `year` in the sequence, inserting it if missing
fn ensure_year(years: &mut Vec<i32>, year: i32) -> usize {
    match years.binary_search(&year) {
        Ok(index) => index,
        Err(index) => {
            years.insert(index, year);
            index
        }
    }
}
