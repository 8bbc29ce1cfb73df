//! Scope credential injection: anchors under an authenticated scope
//! root are dispatched with the scope's userinfo.

mod common;

use common::{anchors_body, crawl_with, create_test_html, test_url};
use sitescan::CrawlerOptions;

// "user:pass"
const BASIC: &str = "Basic dXNlcjpwYXNz";

#[tokio::test]
async fn scope_credentials_flow_into_anchor_fetches() {
    let mut server = mockito::Server::new_async().await;
    let _blog = server
        .mock("GET", "/blog/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(create_test_html(
            "Blog",
            &anchors_body(&[("/blog/post", "Post"), ("/other", "Other")]),
        ))
        .create_async()
        .await;
    let post = server
        .mock("GET", "/blog/post")
        .match_header("authorization", BASIC)
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(create_test_html("Post", ""))
        .create_async()
        .await;
    let other = server
        .mock("GET", "/other")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let authority = server.url().replacen("http://", "", 1);
    let scope = format!("http://user:pass@{authority}/blog");
    let options = CrawlerOptions::builder()
        .seeds([test_url(&server, "/blog/")])
        .scope([scope])
        .build()
        .unwrap();

    let (_, archive, _dir) = crawl_with(options).await;

    // the post was fetched with the scope credentials
    post.assert_async().await;
    let row = archive
        .page(&test_url(&server, "/blog/post"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, 200);
    assert!(row.is_target);

    // /other is outside the scope prefix: external, never fetched
    other.assert_async().await;
    assert!(archive.page(&test_url(&server, "/other")).await.unwrap().is_none());
}
