//! File downloads, raw-page fallback and idempotency

use crate::common::{detail_html, document_path, xml_destination, xml_path};
use lovtidend_crawler::config::FetchConfig;
use lovtidend_crawler::crawler::{Fetcher, RegistryMarkup};
use lovtidend_crawler::{CrawlError, FetchError};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(dir: &TempDir) -> Fetcher {
    Fetcher::new(FetchConfig::without_delays(), dir.path().join("xml"))
        .expect("Failed to build fetcher")
}

#[tokio::test]
async fn test_download_is_idempotent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(xml_path(1)))
        .respond_with(ResponseTemplate::new(200).set_body_string("<dokument/>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&dir);
    let url = format!("{}{}", server.uri(), xml_path(1));
    let expected = xml_destination(fetcher.output_root(), 1);

    let first = fetcher.download(&[url.clone()], None).await.unwrap();
    assert_eq!(first, vec![expected.clone()]);
    assert_eq!(std::fs::read_to_string(&expected).unwrap(), "<dokument/>");

    // Already on disk, so no second request
    let second = fetcher.download(&[url], None).await.unwrap();
    assert_eq!(second, vec![expected]);
}

#[tokio::test]
async fn test_overwrite_downloads_again() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(xml_path(1)))
        .respond_with(ResponseTemplate::new(200).set_body_string("<ny/>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&dir).with_overwrite(true);
    let destination = xml_destination(fetcher.output_root(), 1);
    std::fs::create_dir_all(destination.parent().unwrap()).unwrap();
    std::fs::write(&destination, "<gammel/>").unwrap();

    let url = format!("{}{}", server.uri(), xml_path(1));
    fetcher.download(&[url], None).await.unwrap();
    assert_eq!(std::fs::read_to_string(&destination).unwrap(), "<ny/>");
}

#[tokio::test]
async fn test_fallback_after_three_failed_attempts() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(xml_path(1)))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(document_path(1)))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_html(1)))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&dir);
    let url = format!("{}{}", server.uri(), xml_path(1));
    let fallback = format!("{}{}", server.uri(), document_path(1));

    let saved = fetcher.download(&[url.clone()], Some(&fallback)).await.unwrap();
    let xml = xml_destination(fetcher.output_root(), 1);
    let html = xml.with_extension("html");
    assert_eq!(saved, vec![html.clone()]);
    assert!(!xml.exists());

    let content = std::fs::read_to_string(&html).unwrap();
    assert!(content.starts_with("<article>"));
    assert!(content.contains("Forskrift 1"));
    assert!(!content.contains("Meny"));

    // The capture stands in for the file on the next attempt
    let again = fetcher.download(&[url], Some(&fallback)).await.unwrap();
    assert_eq!(again, vec![html]);
}

#[tokio::test]
async fn test_fatal_status_is_not_retried() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(xml_path(1)))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&dir);
    let url = format!("{}{}", server.uri(), xml_path(1));
    let fallback = format!("{}{}", server.uri(), document_path(1));

    let result = fetcher.download(&[url], Some(&fallback)).await;
    assert!(matches!(
        result,
        Err(CrawlError::Fetch(FetchError::Status { status: 404, .. }))
    ));

    let destination = xml_destination(fetcher.output_root(), 1);
    assert!(!destination.exists());
    assert!(!destination.with_extension("xml.part").exists());
}

#[tokio::test]
async fn test_retriable_status_is_retried_without_fallback() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(xml_path(1)))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(xml_path(1)))
        .respond_with(ResponseTemplate::new(200).set_body_string("<dokument/>"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&dir);
    let url = format!("{}{}", server.uri(), xml_path(1));

    let saved = fetcher.download(&[url], None).await.unwrap();
    assert_eq!(saved, vec![xml_destination(fetcher.output_root(), 1)]);
}

#[tokio::test]
async fn test_truncated_detail_page_uses_full_variant() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(document_path(1)))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><main><a href="/xml/LTI/sf-19820101-0001.xml">XML</a><a href="*">Vis hele dokumentet</a></main></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/*", document_path(1))))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            r#"<html><body><main><a href="/xml/LTI/sf-19820101-0001.xml">XML</a><a href="/xml/LTI/sf-19820101-0001-v2.xml">XML 2</a></main></body></html>"#,
        ))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&dir);
    let url = format!("{}{}", server.uri(), document_path(1));
    let html = fetcher.document_html(&url).await.unwrap();

    let links = fetcher.markup().file_links(&html, &url);
    assert_eq!(links.len(), 2);
    assert!(links[1].ends_with("sf-19820101-0001-v2.xml"));
}

#[tokio::test]
async fn test_oversized_retry_after_falls_back_to_backoff() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path(document_path(1)))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "1e20"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(document_path(1)))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_html(1)))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(&dir);
    let url = format!("{}{}", server.uri(), document_path(1));
    let body = fetcher.get(&url).await.unwrap();
    assert!(body.contains("Forskrift 1"));
}
