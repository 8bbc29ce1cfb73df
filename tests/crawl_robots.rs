//! Robots gate integration: denied paths are never dispatched but the
//! links to them remain visible in the referrer table.

mod common;

use common::{anchors_body, crawl_with, create_html_mock, create_robots_txt, create_test_html, test_url};
use sitescan::CrawlerOptions;

#[tokio::test]
async fn disallowed_paths_are_not_dispatched() {
    let mut server = mockito::Server::new_async().await;
    let robots = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body(create_robots_txt(&["/admin/"]))
        .create_async()
        .await;
    let _m1 = create_html_mock(
        &mut server,
        "/",
        &create_test_html(
            "Home",
            &anchors_body(&[("/admin/panel", "Admin"), ("/public", "Public")]),
        ),
    ).await;
    let _m2 = create_html_mock(&mut server, "/public", &create_test_html("Public", "")).await;
    let admin = server
        .mock("GET", "/admin/panel")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let seed = test_url(&server, "/");
    let options = CrawlerOptions::builder()
        .seeds([seed.clone()])
        .scope([seed])
        .build()
        .unwrap();

    let (_, archive, _dir) = crawl_with(options).await;

    robots.assert_async().await;
    admin.assert_async().await;
    let admin_url = test_url(&server, "/admin/panel");
    assert!(archive.page(&admin_url).await.unwrap().is_none());
    // the edge lives on the referrer side even though the target is gated
    assert_eq!(archive.referrers_to(&admin_url).await.unwrap().len(), 1);
    assert!(archive.page(&test_url(&server, "/public")).await.unwrap().is_some());
}

#[tokio::test]
async fn ignore_robots_bypasses_the_gate() {
    let mut server = mockito::Server::new_async().await;
    let robots = server
        .mock("GET", "/robots.txt")
        .with_status(200)
        .with_body(create_robots_txt(&["/"]))
        .expect(0)
        .create_async()
        .await;
    let _m3 = create_html_mock(&mut server, "/", &create_test_html("Home", "")).await;

    let seed = test_url(&server, "/");
    let options = CrawlerOptions::builder()
        .seeds([seed.clone()])
        .scope([seed])
        .ignore_robots(true)
        .build()
        .unwrap();

    let (summary, _, _dir) = crawl_with(options).await;
    assert_eq!(summary.pages, 1);
    robots.assert_async().await;
}
