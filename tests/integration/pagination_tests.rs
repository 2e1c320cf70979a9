//! Listing page walks against a mock register

use crate::common::{articles, listing_html, mount_first_listing, register_url, OffsetParam};
use lovtidend_crawler::cache::{CachePolicy, ResponseCache};
use lovtidend_crawler::config::FetchConfig;
use lovtidend_crawler::crawler::{Fetcher, ListingPage, PageWalker, StopReason};
use lovtidend_crawler::url::{build_offset_url, extract_offset, year_url};
use lovtidend_crawler::{CrawlError, FetchError, ParseError};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(dir: &TempDir) -> Fetcher {
    Fetcher::new(FetchConfig::without_delays(), dir.path().join("xml"))
        .expect("Failed to build fetcher")
}

async fn mount_offset_listing(server: &MockServer, offset: &'static str, body: String, calls: u64) {
    Mock::given(method("GET"))
        .and(path("/register"))
        .and(OffsetParam(Some(offset)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(calls)
        .mount(server)
        .await;
}

async fn collect(walker: &mut PageWalker<'_>) -> Vec<ListingPage> {
    let mut pages = Vec::new();
    while let Some(page) = walker.next_page().await.expect("Walk failed") {
        pages.push(page);
    }
    pages
}

#[tokio::test]
async fn test_summary_offset_wins_over_anchor() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_first_listing(
        &server,
        listing_html("Viser 1 - 2 av 4", &articles(1..=2), Some("?offset=1#doclistheader")),
    )
    .await;
    mount_offset_listing(&server, "1", listing_html("Viser 2 - 3 av 4", "", None), 0).await;
    mount_offset_listing(
        &server,
        "2",
        listing_html("Viser 3 - 4 av 4", &articles(3..=4), Some("?offset=0")),
        1,
    )
    .await;

    let fetcher = fetcher(&dir);
    let start = year_url(&register_url(&server), 1982).unwrap();
    let mut walker = PageWalker::new(&fetcher, &start).unwrap();
    let pages = collect(&mut walker).await;

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].number, 1);
    assert_eq!(extract_offset(&pages[0].current_url), None);
    assert_eq!(pages[0].next_url.as_deref().and_then(extract_offset), Some(2));
    assert_eq!(pages[0].resume_url, pages[0].next_url);
    assert!(pages[0].next_url.as_deref().unwrap().contains("year=1982"));
    assert!(!pages[0].next_url.as_deref().unwrap().contains('#'));

    assert_eq!(extract_offset(&pages[1].current_url), Some(2));
    assert_eq!(pages[1].first_index, Some(3));
    assert_eq!(pages[1].next_url, None);
    assert_eq!(pages[1].documents[1].identifier, "doc-4");
    assert_eq!(walker.stop_reason(), Some(StopReason::Exhausted));
}

#[tokio::test]
async fn test_stale_cached_listing_is_refetched_once() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let start = build_offset_url(&year_url(&register_url(&server), 1982).unwrap(), 2).unwrap();
    let policy = CachePolicy::listing(&start);
    let cache = ResponseCache::new(dir.path().join("cache"));
    cache.write(
        &policy,
        &start,
        &listing_html("Viser 1 - 2 av 4", &articles(1..=2), None),
    );

    mount_offset_listing(
        &server,
        "2",
        listing_html("Viser 3 - 4 av 4", &articles(3..=4), None),
        1,
    )
    .await;

    let fetcher = fetcher(&dir).with_cache(Some(ResponseCache::new(dir.path().join("cache"))));
    let mut walker = PageWalker::new(&fetcher, &start).unwrap();
    let page = walker.next_page().await.unwrap().expect("Expected a page");

    assert_eq!(page.first_index, Some(3));
    assert_eq!(page.documents[0].identifier, "doc-3");
    let refreshed = cache.read(&policy, &start).expect("Cache entry missing");
    assert!(refreshed.contains("Viser 3 - 4 av 4"));
}

#[tokio::test]
async fn test_page_budget_stops_walk() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_first_listing(&server, listing_html("Viser 1 - 2 av 4", &articles(1..=2), None)).await;
    mount_offset_listing(&server, "2", listing_html("Viser 3 - 4 av 4", &articles(3..=4), None), 0)
        .await;

    let fetcher = fetcher(&dir);
    let start = year_url(&register_url(&server), 1982).unwrap();
    let mut walker = PageWalker::new(&fetcher, &start)
        .unwrap()
        .with_max_pages(Some(1));
    let pages = collect(&mut walker).await;

    assert_eq!(pages.len(), 1);
    assert!(pages[0].next_url.is_some());
    assert_eq!(walker.stop_reason(), Some(StopReason::PageBudget));
}

#[tokio::test]
async fn test_limit_truncates_page() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_first_listing(&server, listing_html("Viser 1 - 3 av 6", &articles(1..=3), None)).await;

    let fetcher = fetcher(&dir);
    let start = year_url(&register_url(&server), 1982).unwrap();
    let mut walker = PageWalker::new(&fetcher, &start).unwrap().with_limit(Some(2));
    let pages = collect(&mut walker).await;

    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].documents.len(), 2);
    assert!(pages[0].truncated);
    assert_eq!(pages[0].resume_url.as_deref(), Some(pages[0].current_url.as_str()));
    assert_eq!(walker.stop_reason(), Some(StopReason::Truncated));
}

#[tokio::test]
async fn test_listing_retries_then_fails() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(503))
        .expect(5)
        .mount(&server)
        .await;

    let fetcher = fetcher(&dir);
    let start = year_url(&register_url(&server), 1982).unwrap();
    let mut walker = PageWalker::new(&fetcher, &start).unwrap();

    let result = walker.next_page().await;
    assert!(matches!(
        result,
        Err(CrawlError::Fetch(FetchError::Status { status: 503, .. }))
    ));
}

#[tokio::test]
async fn test_count_mismatch_is_an_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_first_listing(&server, listing_html("Viser 1 - 3 av 3", &articles(1..=2), None)).await;

    let fetcher = fetcher(&dir);
    let start = year_url(&register_url(&server), 1982).unwrap();
    let mut walker = PageWalker::new(&fetcher, &start).unwrap();

    let result = walker.next_page().await;
    assert!(matches!(
        result,
        Err(CrawlError::Parse(ParseError::CountMismatch {
            expected: 3,
            parsed: 2,
            ..
        }))
    ));
}

async fn mount_page_param(server: &MockServer, page: &'static str, body: String) {
    Mock::given(method("GET"))
        .and(path("/register"))
        .and(query_param("page", page))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_repeated_summary_stops_walk() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page_param(
        &server,
        "1",
        listing_html("Viser 1 - 2 av 2", &articles(1..=2), Some("?page=2")),
    )
    .await;
    mount_page_param(
        &server,
        "2",
        listing_html("Viser 1 - 2 av 2", &articles(1..=2), Some("?page=3")),
    )
    .await;

    let fetcher = fetcher(&dir);
    let start = format!("{}&page=1", year_url(&register_url(&server), 1982).unwrap());
    let mut walker = PageWalker::new(&fetcher, &start).unwrap();
    let pages = collect(&mut walker).await;

    assert_eq!(pages.len(), 1);
    assert_eq!(walker.stop_reason(), Some(StopReason::RepeatedSummary));
}

#[tokio::test]
async fn test_next_page_seen_before_stops_walk() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page_param(
        &server,
        "1",
        listing_html("Viser 1 - 2 av 2", &articles(1..=2), Some("?page=2")),
    )
    .await;
    mount_page_param(
        &server,
        "2",
        listing_html("Ingen dokumenter å vise", "", Some("?page=1")),
    )
    .await;

    let fetcher = fetcher(&dir);
    let start = format!("{}&page=1", year_url(&register_url(&server), 1982).unwrap());
    let mut walker = PageWalker::new(&fetcher, &start).unwrap();
    let pages = collect(&mut walker).await;

    assert_eq!(pages.len(), 2);
    assert!(pages[1].documents.is_empty());
    assert_eq!(pages[1].total_count, Some(0));
    assert_eq!(pages[1].next_url.as_deref(), Some(pages[0].current_url.as_str()));
    assert_eq!(walker.stop_reason(), Some(StopReason::RepeatedLocator));
    assert!(walker.stop_reason().unwrap().is_anomaly());
}

#[tokio::test]
async fn test_repeated_offset_under_new_locator_stops_walk() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_page_param(
        &server,
        "a",
        listing_html("Viser 3 - 4 av 4", &articles(3..=4), Some("?offset=x&page=b")),
    )
    .await;
    // Its summary points back at offset 2, now with page=b
    mount_page_param(&server, "b", listing_html("Viser 1 - 2 av 4", &articles(1..=2), None)).await;

    let fetcher = fetcher(&dir);
    let start = format!("{}&offset=2&page=a", year_url(&register_url(&server), 1982).unwrap());
    let mut walker = PageWalker::new(&fetcher, &start).unwrap();
    let pages = collect(&mut walker).await;

    assert_eq!(pages.len(), 2);
    assert_eq!(extract_offset(&pages[1].current_url), None);
    let next = pages[1].next_url.as_deref().expect("Expected a next page");
    assert_eq!(extract_offset(next), Some(2));
    assert_ne!(next, pages[0].current_url);
    assert_eq!(walker.stop_reason(), Some(StopReason::RepeatedOffset));
    assert!(walker.stop_reason().unwrap().is_anomaly());
}

#[tokio::test]
async fn test_leading_skip_is_not_counted_against_limit() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_first_listing(&server, listing_html("Viser 1 - 3 av 3", &articles(1..=3), None)).await;

    let fetcher = fetcher(&dir);
    let start = year_url(&register_url(&server), 1982).unwrap();
    let mut walker = PageWalker::new(&fetcher, &start)
        .unwrap()
        .with_limit(Some(1))
        .with_leading_skip(2);
    let pages = collect(&mut walker).await;

    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].documents.len(), 3);
    assert!(!pages[0].truncated);
    assert_eq!(pages[0].resume_url, None);
    assert_eq!(walker.stop_reason(), Some(StopReason::Exhausted));
}
