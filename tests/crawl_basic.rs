//! Core crawl behavior: dedup, scope boundaries, exclusions, and
//! error-status recording.

mod common;

use common::{anchors_body, crawl_with, create_error_mock, create_html_mock, create_test_html, test_url};
use sitescan::CrawlerOptions;

#[tokio::test]
async fn scheme_variants_crawl_once() {
    let mut server = mockito::Server::new_async().await;
    let home = server
        .mock("GET", "/")
        .with_status(200)
        .with_header("content-type", "text/html")
        .with_body(create_test_html("Home", "no links"))
        .expect(1)
        .create_async()
        .await;

    let http_seed = test_url(&server, "/");
    let https_seed = http_seed.replacen("http:", "https:", 1);
    let options = CrawlerOptions::builder()
        .seeds([http_seed.clone(), https_seed])
        .scope([http_seed])
        .build()
        .unwrap();

    let (summary, archive, _dir) = crawl_with(options).await;

    // the second seed shares the protocol-agnostic key: a no-op
    assert_eq!(summary.pages, 1);
    assert_eq!(archive.page_count().await.unwrap(), 1);
    home.assert_async().await;
}

#[tokio::test]
async fn empty_scope_fetches_seed_metadata_only() {
    let mut server = mockito::Server::new_async().await;
    let _m1 = create_html_mock(
        &mut server,
        "/",
        &create_test_html("Home", &anchors_body(&[("/a", "A"), ("/b", "B")])),
    ).await;

    let options = CrawlerOptions::builder()
        .seeds([test_url(&server, "/")])
        .build()
        .unwrap();

    let (summary, archive, _dir) = crawl_with(options).await;

    // exactly one page record for the seed; no anchors followed
    assert_eq!(summary.pages, 1);
    assert_eq!(archive.page_count().await.unwrap(), 1);
    let row = archive.page(&test_url(&server, "/")).await.unwrap().unwrap();
    assert!(row.is_external);
    assert!(!row.is_target);
}

#[tokio::test]
async fn prefix_exclusion_records_edge_but_no_page() {
    let mut server = mockito::Server::new_async().await;
    let _m2 = create_html_mock(
        &mut server,
        "/",
        &create_test_html("Home", &anchors_body(&[("/secret/x", "Secret"), ("/ok", "Ok")])),
    ).await;
    let _m3 = create_html_mock(&mut server, "/ok", &create_test_html("Ok", "")).await;
    let secret = server
        .mock("GET", "/secret/x")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let seed = test_url(&server, "/");
    let options = CrawlerOptions::builder()
        .seeds([seed.clone()])
        .scope([seed])
        .exclude_urls([test_url(&server, "/secret")])
        .build()
        .unwrap();

    let (_, archive, _dir) = crawl_with(options).await;

    let secret_url = test_url(&server, "/secret/x");
    assert!(archive.page(&secret_url).await.unwrap().is_none());
    let edges = archive.referrers_to(&secret_url).await.unwrap();
    assert_eq!(edges.len(), 1);
    assert!(archive.page(&test_url(&server, "/ok")).await.unwrap().is_some());
    secret.assert_async().await;
}

#[tokio::test]
async fn error_statuses_recorded_with_target_flags() {
    let mut server = mockito::Server::new_async().await;
    let _m4 = create_html_mock(
        &mut server,
        "/error/",
        &create_test_html(
            "Errors",
            &anchors_body(&[
                ("/error/not-found", "404"),
                ("/error/server-error", "500"),
                ("/error/forbidden", "403"),
                ("/error/normal", "200"),
            ]),
        ),
    ).await;
    let _m5 = create_error_mock(&mut server, "/error/not-found", 404).await;
    let _m6 = create_error_mock(&mut server, "/error/server-error", 500).await;
    let _m7 = create_error_mock(&mut server, "/error/forbidden", 403).await;
    let _m8 = create_html_mock(&mut server, "/error/normal", &create_test_html("Normal", "")).await;

    let seed = test_url(&server, "/error/");
    let options = CrawlerOptions::builder()
        .seeds([seed.clone()])
        .scope([test_url(&server, "/")])
        .build()
        .unwrap();

    let (_, archive, _dir) = crawl_with(options).await;

    assert_eq!(archive.page_count().await.unwrap(), 5);
    for (path, status) in [
        ("/error/not-found", 404),
        ("/error/server-error", 500),
        ("/error/forbidden", 403),
        ("/error/normal", 200),
    ] {
        let row = archive.page(&test_url(&server, path)).await.unwrap().unwrap();
        assert_eq!(row.status, status, "status for {path}");
        assert_eq!(row.is_target, status == 200, "target flag for {path}");
    }
}

#[tokio::test]
async fn keyword_exclusion_applies() {
    let mut server = mockito::Server::new_async().await;
    let _m9 = create_html_mock(
        &mut server,
        "/",
        &create_test_html("Home", &anchors_body(&[("/logout", "Bye"), ("/stay", "Hi")])),
    ).await;
    let _m10 = create_html_mock(&mut server, "/stay", &create_test_html("Stay", "")).await;

    let seed = test_url(&server, "/");
    let options = CrawlerOptions::builder()
        .seeds([seed.clone()])
        .scope([seed])
        .exclude_keywords(["logout"])
        .build()
        .unwrap();

    let (_, archive, _dir) = crawl_with(options).await;
    assert!(archive.page(&test_url(&server, "/logout")).await.unwrap().is_none());
    assert!(archive.page(&test_url(&server, "/stay")).await.unwrap().is_some());
}

#[tokio::test]
async fn non_recursive_fetches_anchor_metadata() {
    let mut server = mockito::Server::new_async().await;
    let _m11 = create_html_mock(
        &mut server,
        "/",
        &create_test_html("Home", &anchors_body(&[("/leaf", "Leaf")])),
    ).await;
    let _m12 = create_html_mock(
        &mut server,
        "/leaf",
        &create_test_html("Leaf", &anchors_body(&[("/never", "Never")])),
    ).await;

    let seed = test_url(&server, "/");
    let options = CrawlerOptions::builder()
        .seeds([seed.clone()])
        .scope([seed])
        .recursive(false)
        .build()
        .unwrap();

    let (_, archive, _dir) = crawl_with(options).await;

    // the leaf is fetched metadata-only, so its anchors are never seen
    assert!(archive.page(&test_url(&server, "/leaf")).await.unwrap().is_some());
    assert!(archive.page(&test_url(&server, "/never")).await.unwrap().is_none());
}

#[tokio::test]
async fn from_list_never_follows_anchors() {
    let mut server = mockito::Server::new_async().await;
    let _m13 = create_html_mock(
        &mut server,
        "/a",
        &create_test_html("A", &anchors_body(&[("/b", "B")])),
    ).await;
    let _m14 = create_html_mock(&mut server, "/c", &create_test_html("C", "")).await;

    let options = CrawlerOptions::builder()
        .seeds([test_url(&server, "/a"), test_url(&server, "/c")])
        .scope([test_url(&server, "/")])
        .from_list(true)
        .build()
        .unwrap();

    let (summary, archive, _dir) = crawl_with(options).await;
    assert_eq!(summary.pages, 2);
    assert!(archive.page(&test_url(&server, "/b")).await.unwrap().is_none());
}
