//! Test utilities shared by the integration suite.

use std::sync::Arc;

use mockito::{Mock, Server};
use sitescan::{
    CrawlSummary, Crawler, CrawlerOptions, HttpScraper, NoOpEvents, SqliteArchive,
};
use tempfile::TempDir;

/// Creates a test HTML document with the given title and body.
#[allow(dead_code)]
pub fn create_test_html(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
</head>
<body>
    {body}
</body>
</html>"#
    )
}

/// HTML body consisting of one anchor per (href, text) pair.
#[allow(dead_code)]
pub fn anchors_body(anchors: &[(&str, &str)]) -> String {
    anchors
        .iter()
        .map(|(href, text)| format!(r#"<a href="{href}">{text}</a>"#))
        .collect::<Vec<_>>()
        .join("\n    ")
}

/// Creates a mock endpoint that returns HTML content.
#[allow(dead_code)]
pub async fn create_html_mock(server: &mut Server, path: &str, html: &str) -> Mock {
    server
        .mock("GET", path)
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body(html)
        .create_async()
        .await
}

/// Creates a mock endpoint that returns a redirect.
#[allow(dead_code)]
pub async fn create_redirect_mock(server: &mut Server, from: &str, to: &str, status: usize) -> Mock {
    server
        .mock("GET", from)
        .with_status(status)
        .with_header("location", to)
        .create_async()
        .await
}

/// Creates a mock endpoint that returns an error status.
#[allow(dead_code)]
pub async fn create_error_mock(server: &mut Server, path: &str, status: usize) -> Mock {
    server
        .mock("GET", path)
        .with_status(status)
        .with_header("content-type", "text/html")
        .with_body("Error")
        .create_async()
        .await
}

/// Creates a sample robots.txt body.
#[allow(dead_code)]
pub fn create_robots_txt(disallow_paths: &[&str]) -> String {
    let mut content = String::from("User-agent: *\n");
    for path in disallow_paths {
        content.push_str(&format!("Disallow: {path}\n"));
    }
    content
}

/// Runs a crawl with the bundled HTTP scraper against a tempdir
/// archive. The archive stays readable after the crawl for assertions.
#[allow(dead_code)]
pub async fn crawl_with(options: CrawlerOptions) -> (CrawlSummary, Arc<SqliteArchive>, TempDir) {
    let dir = TempDir::new().expect("tempdir");
    let archive = Arc::new(
        SqliteArchive::create(dir.path().join("site.tar"))
            .await
            .expect("archive"),
    );
    let crawler = Crawler::new(
        options,
        Arc::new(HttpScraper::new().expect("scraper")),
        archive.clone(),
        Arc::new(NoOpEvents),
    )
    .expect("crawler");
    let summary = crawler.run().await.expect("crawl");
    (summary, archive, dir)
}

/// Builds a URL on the mock server.
#[allow(dead_code)]
pub fn test_url(server: &Server, path: &str) -> String {
    format!("{}{}", server.url(), path)
}
