//! HTTP-backed [`Scraper`] implementation.
//!
//! Fetches pages with `reqwest` and extracts anchors and metadata from
//! the returned HTML. Redirects are followed manually so the chain can
//! be reported hop by hop. This scraper performs no sub-requests, so it
//! reports no resources; a browser-backed implementation would.

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION, USER_AGENT};
use scraper::{Html, Selector};

use crate::canonical::CanonicalUrl;

use super::{
    AnchorData, PageData, PageMeta, RedirectHop, ScrapeMode, ScrapeOptions, ScrapeOutcome, Scraper,
};

const MAX_REDIRECTS: usize = 10;

/// Plain HTTP scraper. One instance serves a whole crawl; it holds no
/// per-page state.
pub struct HttpScraper {
    client: reqwest::Client,
}

impl HttpScraper {
    pub fn new() -> Result<Self> {
        // Redirects are disabled so each hop surfaces individually.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("failed to build scrape HTTP client")?;
        Ok(Self { client })
    }

    async fn fetch(
        &self,
        url: &CanonicalUrl,
        mode: ScrapeMode,
        opts: &ScrapeOptions,
    ) -> Result<PageData, ScrapeOutcome> {
        let mut chain: Vec<RedirectHop> = Vec::new();
        let mut current = url.clone();

        loop {
            if chain.len() > MAX_REDIRECTS {
                return Err(ScrapeOutcome::Error {
                    name: "RedirectLoopError".into(),
                    message: format!("more than {MAX_REDIRECTS} redirects from {url}"),
                });
            }

            let mut request = self
                .client
                .get(current.without_hash_and_auth())
                .header(USER_AGENT, opts.user_agent.clone())
                .timeout(opts.timeout);
            if current.has_userinfo() {
                request = request.basic_auth(current.username(), current.password());
            }

            let response = request.send().await.map_err(|e| classify_error(&e))?;
            let status = response.status();

            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .map(ToString::to_string);
                if let Some(location) = location {
                    match current.join(&location, false) {
                        Ok(next) => {
                            debug!(
                                target: "sitescan::scrape",
                                "{} {} -> {}",
                                status.as_u16(),
                                current,
                                next
                            );
                            chain.push(RedirectHop {
                                // credentials are a transport detail;
                                // reported URLs never carry them
                                url: current.without_hash_and_auth(),
                                status: i32::from(status.as_u16()),
                                status_text: reason_of(status),
                            });
                            current = next;
                            continue;
                        }
                        Err(e) => {
                            warn!(target: "sitescan::scrape", "unresolvable Location on {current}: {e}");
                        }
                    }
                }
                // A redirect without a usable Location is terminal.
            }

            let headers = collect_headers(response.headers());
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string);
            let content_length = response
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<i64>().ok());

            let is_html = content_type
                .as_deref()
                .is_some_and(|ct| ct.contains("text/html") || ct.contains("application/xhtml"));

            let mut page = PageData {
                url: current.without_hash_and_auth(),
                redirect_chain: chain,
                status: i32::from(status.as_u16()),
                status_text: reason_of(status),
                content_type,
                content_length,
                headers,
                meta: PageMeta::default(),
                anchors: Vec::new(),
                images: Vec::new(),
                html: None,
            };

            if is_html {
                let body = response.text().await.map_err(|e| classify_error(&e))?;
                match mode {
                    ScrapeMode::Full => {
                        let parsed = parse_document(&body, &current, opts.capture_images);
                        page.meta = parsed.meta;
                        page.anchors = parsed.anchors;
                        page.images = parsed.images;
                        page.html = Some(body);
                    }
                    ScrapeMode::MetadataOnly => {
                        page.meta.title = parse_title(&body);
                    }
                }
            }

            return Ok(page);
        }
    }
}

#[async_trait]
impl Scraper for HttpScraper {
    async fn scrape(
        &self,
        url: &CanonicalUrl,
        mode: ScrapeMode,
        opts: &ScrapeOptions,
    ) -> ScrapeOutcome {
        match self.fetch(url, mode, opts).await {
            Ok(page) => ScrapeOutcome::Success {
                page,
                resources: Vec::new(),
            },
            Err(outcome) => outcome,
        }
    }
}

fn classify_error(e: &reqwest::Error) -> ScrapeOutcome {
    let name = if e.is_timeout() {
        "TimeoutError"
    } else {
        "FetchError"
    };
    ScrapeOutcome::Error {
        name: name.into(),
        message: e.to_string(),
    }
}

fn reason_of(status: reqwest::StatusCode) -> String {
    status.canonical_reason().unwrap_or_default().to_string()
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

struct ParsedDocument {
    meta: PageMeta,
    anchors: Vec<AnchorData>,
    images: Vec<String>,
}

/// Extract anchors, metadata, and (optionally) image URLs.
///
/// Synchronous on purpose: `scraper::Html` is not `Send`, so it must
/// never live across an await point.
fn parse_document(body: &str, base: &CanonicalUrl, capture_images: bool) -> ParsedDocument {
    let doc = Html::parse_document(body);
    let select = |s: &str| Selector::parse(s).expect("static selector");

    let mut anchors = Vec::new();
    for element in doc.select(&select("a[href]")) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if href.is_empty() || href.starts_with('#') {
            continue;
        }
        let Ok(resolved) = base.join(href, false) else {
            continue;
        };
        let text = element.text().collect::<String>().trim().to_string();
        anchors.push(AnchorData {
            href: resolved.without_hash(),
            text,
        });
    }

    let mut meta = PageMeta {
        title: doc
            .select(&select("title"))
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string()),
        lang: doc
            .select(&select("html"))
            .next()
            .and_then(|e| e.value().attr("lang"))
            .map(ToString::to_string),
        ..PageMeta::default()
    };

    for element in doc.select(&select("meta[name][content]")) {
        let (Some(name), Some(content)) =
            (element.value().attr("name"), element.value().attr("content"))
        else {
            continue;
        };
        match name.to_ascii_lowercase().as_str() {
            "description" => meta.description = Some(content.to_string()),
            "robots" => {
                let flags = content.to_ascii_lowercase();
                meta.robots_noindex = flags.contains("noindex");
                meta.robots_nofollow = flags.contains("nofollow");
            }
            _ => {}
        }
    }

    for element in doc.select(&select("meta[property][content]")) {
        let (Some(property), Some(content)) = (
            element.value().attr("property"),
            element.value().attr("content"),
        ) else {
            continue;
        };
        if let Some(key) = property.strip_prefix("og:") {
            meta.og.insert(key.to_string(), content.to_string());
        }
    }

    for element in doc.select(&select("link[rel][href]")) {
        let (Some(rel), Some(href)) = (element.value().attr("rel"), element.value().attr("href"))
        else {
            continue;
        };
        let Ok(resolved) = base.join(href, false) else {
            continue;
        };
        match rel.to_ascii_lowercase().as_str() {
            "canonical" => meta.canonical = Some(resolved.without_hash()),
            "alternate" => meta.alternate.push(resolved.without_hash()),
            _ => {}
        }
    }

    let mut images = Vec::new();
    if capture_images {
        for element in doc.select(&select("img[src]")) {
            let Some(src) = element.value().attr("src") else {
                continue;
            };
            if let Ok(resolved) = base.join(src, false) {
                images.push(resolved.without_hash());
            }
        }
    }

    ParsedDocument {
        meta,
        anchors,
        images,
    }
}

fn parse_title(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    let selector = Selector::parse("title").expect("static selector");
    doc.select(&selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
}
