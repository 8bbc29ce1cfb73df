//! Pagination prediction end to end: speculative fetches of numbered
//! pages, discarding predictions that run past the end.

mod common;

use common::{anchors_body, crawl_with, create_html_mock, create_test_html, test_url};
use sitescan::CrawlerOptions;

const LAST_PAGE: usize = 10;

#[tokio::test]
async fn numbered_pages_are_predicted_and_overruns_discarded() {
    let mut server = mockito::Server::new_async().await;

    let _m1 = create_html_mock(
        &mut server,
        "/p/",
        &create_test_html("Listing", &anchors_body(&[("/p/page/1", "Page 1")])),
    ).await;
    // each page links to the next; the last page has no next link
    let mut mocks = Vec::new();
    for n in 1..=LAST_PAGE {
        let body = if n < LAST_PAGE {
            anchors_body(&[(format!("/p/page/{}", n + 1).as_str(), "Next")])
        } else {
            String::new()
        };
        mocks.push(create_html_mock(
            &mut server,
            &format!("/p/page/{n}"),
            &create_test_html(&format!("Page {n}"), &body),
        ).await);
    }
    // predictions past the end resolve to 404
    for n in LAST_PAGE + 1..=LAST_PAGE + 6 {
        mocks.push(
            server
                .mock("GET", format!("/p/page/{n}").as_str())
                .with_status(404)
                .create_async()
                .await,
        );
    }

    let seed = test_url(&server, "/p/");
    let options = CrawlerOptions::builder()
        .seeds([seed.clone()])
        .scope([test_url(&server, "/")])
        .parallels(3)
        .build()
        .unwrap();

    let (summary, archive, _dir) = crawl_with(options).await;

    // every real page is persisted
    assert!(archive.page(&seed).await.unwrap().is_some());
    for n in 1..=LAST_PAGE {
        let url = test_url(&server, &format!("/p/page/{n}"));
        let row = archive.page(&url).await.unwrap();
        assert!(row.is_some(), "missing page {n}");
        assert_eq!(row.unwrap().status, 200);
    }

    // predictions that ran past the last page left no records behind
    for n in LAST_PAGE + 1..=LAST_PAGE + 6 {
        let url = test_url(&server, &format!("/p/page/{n}"));
        assert!(
            archive.page(&url).await.unwrap().is_none(),
            "predicted page {n} must be discarded"
        );
    }
    assert!(summary.discarded_predicted >= 1);
    assert_eq!(archive.page_count().await.unwrap() as usize, LAST_PAGE + 1);
}

#[tokio::test]
async fn query_parameter_pagination_is_detected() {
    let mut server = mockito::Server::new_async().await;
    let _m3 = create_html_mock(
        &mut server,
        "/list",
        &create_test_html(
            "Listing",
            &anchors_body(&[("/list?page=1", "First"), ("/list?page=2", "Second")]),
        ),
    ).await;
    let mut mocks = Vec::new();
    for n in 1..=4 {
        mocks.push(
            server
                .mock("GET", "/list")
                .match_query(mockito::Matcher::UrlEncoded("page".into(), n.to_string()))
                .with_status(200)
                .with_header("content-type", "text/html")
                .with_body(create_test_html(&format!("Page {n}"), ""))
                .create_async()
                .await,
        );
    }
    for n in 5..=6 {
        mocks.push(
            server
                .mock("GET", "/list")
                .match_query(mockito::Matcher::UrlEncoded("page".into(), n.to_string()))
                .with_status(404)
                .create_async()
                .await,
        );
    }

    let seed = test_url(&server, "/list");
    let options = CrawlerOptions::builder()
        .seeds([seed.clone()])
        .scope([test_url(&server, "/")])
        .parallels(2)
        .build()
        .unwrap();

    let (_, archive, _dir) = crawl_with(options).await;

    // anchors 1 and 2 trigger predictions 3 and 4 (parallels = 2)
    for n in 1..=4 {
        let url = test_url(&server, &format!("/list?page={n}"));
        assert!(archive.page(&url).await.unwrap().is_some(), "page {n}");
    }
    for n in 5..=6 {
        let url = test_url(&server, &format!("/list?page={n}"));
        assert!(archive.page(&url).await.unwrap().is_none(), "page {n}");
    }
}
