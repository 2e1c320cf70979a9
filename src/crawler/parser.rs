//! Markup extraction for the register's HTML
//!
//! The crawl engine only sees the narrow [`RegistryMarkup`] capability:
//! list the documents and pagination signals of a listing page, list the
//! structured-file links of a detail page, and trim a detail page down to its
//! main content. [`LovdataMarkup`] implements it with CSS selectors over the
//! `scraper` crate.

use crate::ParseError;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Text shown instead of a pagination summary when a listing is empty
pub const NO_RESULTS_TEXT: &str = "Ingen dokumenter å vise";

/// Link text on detail pages whose body has been cut short
pub const TRUNCATION_SENTINEL: &str = "Vis hele dokumentet";

/// Extension of the structured files the crawler collects
const STRUCTURED_EXTENSION: &str = ".xml";

/// A document entry on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentListing {
    /// Stable key assigned by the source, may be empty
    pub identifier: String,
    pub title: String,
    /// Absolute URL of the detail page
    pub document_url: String,
}

/// The source's own "showing first - last of total" counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationSummary {
    pub text: Option<String>,
    pub first_index: Option<u64>,
    pub last_index: Option<u64>,
    pub total_count: Option<u64>,
}

impl PaginationSummary {
    fn no_results(text: Option<String>) -> Self {
        Self {
            text: Some(text.unwrap_or_else(|| NO_RESULTS_TEXT.to_string())),
            first_index: None,
            last_index: None,
            total_count: Some(0),
        }
    }
}

/// Everything extracted from one listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingMarkup {
    pub documents: Vec<DocumentListing>,
    pub summary: PaginationSummary,
    /// Target of the explicit "next" control, resolved against the page URL
    pub anchor_next: Option<String>,
}

impl ListingMarkup {
    /// Checks that the summary's range matches the number of parsed entries
    pub fn validate_count(&self, page_url: &str) -> Result<(), ParseError> {
        if let (Some(first), Some(last)) = (self.summary.first_index, self.summary.last_index) {
            let expected = (last + 1).saturating_sub(first) as usize;
            if expected != self.documents.len() {
                return Err(ParseError::CountMismatch {
                    url: page_url.to_string(),
                    expected,
                    parsed: self.documents.len(),
                });
            }
        }
        Ok(())
    }
}

/// Capability the crawl engine needs from the register's markup
pub trait RegistryMarkup {
    /// Extracts documents and pagination signals from a listing page
    fn parse_listing(&self, html: &str, page_url: &str) -> Result<ListingMarkup, ParseError>;

    /// Absolute structured-file links on a detail page, deduplicated in
    /// encounter order
    fn file_links(&self, html: &str, page_url: &str) -> Vec<String>;

    /// Returns true if the detail page only shows part of the document
    fn is_truncated(&self, html: &str) -> bool;

    /// The most relevant part of a detail page, for raw-page captures
    fn main_content(&self, html: &str) -> String;
}

/// Selectors for lovdata.no's register pages
#[derive(Debug)]
pub struct LovdataMarkup {
    summary: Selector,
    article: Selector,
    article_link: Selector,
    next_link: Selector,
    any_link: Selector,
    content: Vec<Selector>,
    body: Selector,
    summary_pattern: Regex,
}

impl LovdataMarkup {
    /// Compiles all selectors
    ///
    /// # Returns
    ///
    /// * `Ok(LovdataMarkup)` - Ready to parse pages
    /// * `Err(ParseError::Selector)` - A selector or pattern failed to compile
    pub fn new() -> Result<Self, ParseError> {
        Ok(Self {
            summary: selector("main section p.center-align")?,
            article: selector("article[aria-labelledby]")?,
            article_link: selector("h3 a[href]")?,
            next_link: selector(".footer-pagination .pager .next a[href]")?,
            any_link: selector("a[href]")?,
            content: vec![
                selector("main article")?,
                selector("article")?,
                selector("main")?,
            ],
            body: selector("body")?,
            summary_pattern: Regex::new(r"(?i)Viser\s+(\d+)\s*-\s*(\d+)\s+av\s+(\d+)")
                .map_err(|e| ParseError::Selector(e.to_string()))?,
        })
    }

    fn parse_summary(
        &self,
        document: &Html,
        html: &str,
        page_url: &str,
    ) -> Result<PaginationSummary, ParseError> {
        let paragraphs: Vec<ElementRef> = document.select(&self.summary).collect();
        if paragraphs.len() != 1 {
            if html.contains(NO_RESULTS_TEXT) {
                return Ok(PaginationSummary::no_results(None));
            }
            return Err(ParseError::MissingSummary {
                url: page_url.to_string(),
                found: paragraphs.len(),
            });
        }

        let text = stripped_text(paragraphs[0]);
        if let Some(captures) = self.summary_pattern.captures(&text) {
            let number = |i: usize| captures.get(i).and_then(|m| m.as_str().parse::<u64>().ok());
            if let (Some(first), Some(last), Some(total)) = (number(1), number(2), number(3)) {
                return Ok(PaginationSummary {
                    text: Some(text).filter(|t| !t.is_empty()),
                    first_index: Some(first),
                    last_index: Some(last),
                    total_count: Some(total),
                });
            }
        }

        if html.contains(NO_RESULTS_TEXT) {
            return Ok(PaginationSummary::no_results(
                Some(text).filter(|t| !t.is_empty()),
            ));
        }

        Err(ParseError::UnparseableSummary {
            url: page_url.to_string(),
            text,
        })
    }

    fn parse_documents(&self, document: &Html, base: Option<&Url>) -> Vec<DocumentListing> {
        let mut documents = Vec::new();

        for article in document.select(&self.article) {
            let Some(anchor) = article.select(&self.article_link).next() else {
                continue;
            };
            let Some(document_url) = anchor
                .value()
                .attr("href")
                .and_then(|href| resolve(base, href))
            else {
                continue;
            };

            let identifier = [article.value().attr("aria-labelledby"), anchor.value().attr("id")]
                .into_iter()
                .flatten()
                .find(|value| !value.is_empty())
                .unwrap_or_default()
                .to_string();

            documents.push(DocumentListing {
                identifier,
                title: stripped_text(anchor),
                document_url,
            });
        }

        documents
    }
}

impl RegistryMarkup for LovdataMarkup {
    fn parse_listing(&self, html: &str, page_url: &str) -> Result<ListingMarkup, ParseError> {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();

        let summary = self.parse_summary(&document, html, page_url)?;
        let documents = self.parse_documents(&document, base.as_ref());
        let anchor_next = document
            .select(&self.next_link)
            .next()
            .and_then(|anchor| anchor.value().attr("href"))
            .and_then(|href| resolve(base.as_ref(), href));

        Ok(ListingMarkup {
            documents,
            summary,
            anchor_next,
        })
    }

    fn file_links(&self, html: &str, page_url: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();
        let mut links: Vec<String> = Vec::new();

        for anchor in document.select(&self.any_link) {
            let href = anchor.value().attr("href").unwrap_or_default().trim();
            if href.is_empty() || !href.to_lowercase().ends_with(STRUCTURED_EXTENSION) {
                continue;
            }
            if let Some(absolute) = resolve(base.as_ref(), href) {
                if !links.contains(&absolute) {
                    links.push(absolute);
                }
            }
        }

        links
    }

    fn is_truncated(&self, html: &str) -> bool {
        html.contains(TRUNCATION_SENTINEL)
    }

    fn main_content(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        self.content
            .iter()
            .chain(std::iter::once(&self.body))
            .find_map(|selector| document.select(selector).next())
            .map(|element| element.html())
            .unwrap_or_else(|| html.to_string())
    }
}

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector(format!("{}: {}", css, e)))
}

/// Text nodes of an element, trimmed and joined by single spaces
fn stripped_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    match base {
        Some(base) => base.join(href).ok().map(|url| url.to_string()),
        None => Url::parse(href).ok().map(|url| url.to_string()),
    }
}
