//! Shared fixtures for the integration tests

use lovtidend_crawler::config::{Config, FetchConfig};
use std::path::Path;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Match, Mock, MockBuilder, MockServer, Request, ResponseTemplate};

/// Matches on the `offset` query parameter; `None` requires it to be absent
pub struct OffsetParam(pub Option<&'static str>);

impl Match for OffsetParam {
    fn matches(&self, request: &Request) -> bool {
        let offset = request
            .url
            .query_pairs()
            .find(|(key, _)| key == "offset")
            .map(|(_, value)| value.into_owned());
        offset.as_deref() == self.0
    }
}

/// Listing index served by the mock register
pub fn register_url(server: &MockServer) -> String {
    format!("{}/register", server.uri())
}

/// Configuration that crawls 1982 only, without pacing or caching
pub fn test_config(server: &MockServer, dir: &Path) -> Config {
    let mut config = Config::default();
    config.crawler.base_url = register_url(server);
    config.crawler.start_year = 1982;
    config.crawler.end_year = Some(1982);
    config.fetch = FetchConfig::without_delays();
    config.output.output_dir = dir.join("xml");
    config.output.cache_dir = None;
    config.output.checkpoint_path = dir.join("checkpoint.json");
    config
}

pub fn listing_html(summary: &str, articles: &str, next: Option<&str>) -> String {
    let pager = next
        .map(|href| {
            format!(
                r#"<div class="footer-pagination"><ul class="pager"><li class="next"><a href="{}">Neste</a></li></ul></div>"#,
                href
            )
        })
        .unwrap_or_default();
    format!(
        r#"<html><body><main><section><p class="center-align">{}</p>{}</section>{}</main></body></html>"#,
        summary, articles, pager
    )
}

/// Listing entry for document `n` of 1982
pub fn article(n: usize) -> String {
    format!(
        r#"<article aria-labelledby="doc-{n}"><h3><a href="/dokument/LTI/forskrift/1982-01-{n:02}-{n}">Forskrift {n}</a></h3></article>"#
    )
}

pub fn articles(range: std::ops::RangeInclusive<usize>) -> String {
    range.map(article).collect()
}

pub fn document_path(n: usize) -> String {
    format!("/dokument/LTI/forskrift/1982-01-{:02}-{}", n, n)
}

pub fn xml_path(n: usize) -> String {
    format!("/xml/LTI/sf-198201{:02}-{:04}.xml", n, n)
}

/// Where the XML file of document `n` lands under `output_root`
pub fn xml_destination(output_root: &Path, n: usize) -> std::path::PathBuf {
    output_root
        .join("1982")
        .join("LTI")
        .join(format!("sf-198201{:02}-{:04}.xml", n, n))
}

pub fn detail_html(n: usize) -> String {
    format!(
        r#"<html><body><nav>Meny</nav><main><article><h1>Forskrift {n}</h1><a href="{}">XML</a></article></main></body></html>"#,
        xml_path(n)
    )
}

/// Request for a listing page of `year` at `offset`
pub fn listing_request(year: &str, offset: Option<&'static str>) -> MockBuilder {
    Mock::given(method("GET"))
        .and(path("/register"))
        .and(query_param("year", year))
        .and(OffsetParam(offset))
}

/// Serves the first (offset-less) listing page of 1982
pub async fn mount_first_listing(server: &MockServer, body: String) {
    listing_request("1982", None)
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Serves the detail page of document `n`
pub async fn mount_detail(server: &MockServer, n: usize) {
    Mock::given(method("GET"))
        .and(path(document_path(n)))
        .respond_with(ResponseTemplate::new(200).set_body_string(detail_html(n)))
        .mount(server)
        .await;
}

/// Serves the XML file of document `n`
pub async fn mount_xml(server: &MockServer, n: usize) {
    Mock::given(method("GET"))
        .and(path(xml_path(n)))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!("<dokument nr=\"{}\"/>", n)))
        .mount(server)
        .await;
}
