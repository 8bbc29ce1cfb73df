//! The scrape port: what the crawler asks of a page fetcher.
//!
//! The orchestrator is agnostic about how a page is rendered. Anything
//! that can turn a URL into a [`ScrapeOutcome`] (a headless browser, a
//! plain HTTP client, a test double) plugs in through [`Scraper`].

mod http;

pub use http::HttpScraper;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::canonical::CanonicalUrl;

/// How much of the page to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScrapeMode {
    /// Full fetch: body, anchors, meta, images.
    Full,
    /// Status line, headers, and title only. Used for external pages
    /// and non-recursive crawls.
    MetadataOnly,
}

/// Per-dispatch scrape parameters, derived from the crawler options.
#[derive(Debug, Clone)]
pub struct ScrapeOptions {
    pub user_agent: String,
    pub capture_images: bool,
    /// Path to a browser executable, for scraper implementations that
    /// drive one. The bundled HTTP scraper ignores it.
    pub executable_path: Option<String>,
    pub timeout: Duration,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self {
            user_agent: concat!("sitescan/", env!("CARGO_PKG_VERSION")).to_string(),
            capture_images: false,
            executable_path: None,
            timeout: Duration::from_secs(30),
        }
    }
}

/// One hop of a redirect chain, in traversal order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectHop {
    pub url: String,
    pub status: i32,
    pub status_text: String,
}

/// Document metadata lifted out of the page head.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageMeta {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `og:*` properties, keyed without the prefix.
    pub og: HashMap<String, String>,
    pub robots_noindex: bool,
    pub robots_nofollow: bool,
    pub canonical: Option<String>,
    pub alternate: Vec<String>,
    pub lang: Option<String>,
}

/// An anchor found on a scraped page. The href is already resolved
/// against the page URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorData {
    pub href: String,
    pub text: String,
}

/// The scrape result for one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageData {
    /// Final URL after redirects.
    pub url: String,
    /// Hops traversed before `url`, oldest first. Empty when the
    /// response came straight back.
    pub redirect_chain: Vec<RedirectHop>,
    pub status: i32,
    pub status_text: String,
    pub content_type: Option<String>,
    /// `None` when the server sent no Content-Length; zero means a
    /// genuinely empty body.
    pub content_length: Option<i64>,
    pub headers: HashMap<String, String>,
    pub meta: PageMeta,
    pub anchors: Vec<AnchorData>,
    pub images: Vec<String>,
    /// Raw document, present only for full-mode HTML responses.
    pub html: Option<String>,
}

/// A network sub-request observed while scraping a page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceData {
    pub url: String,
    pub status: i32,
    pub status_text: String,
    pub content_type: Option<String>,
    pub content_length: Option<i64>,
    pub compression: Option<String>,
    pub cdn: Option<String>,
    pub headers: HashMap<String, String>,
}

/// What came back from a scrape dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScrapeOutcome {
    Success {
        page: PageData,
        resources: Vec<ResourceData>,
    },
    /// The scraper declined the page (unsupported content, explicit
    /// skip rule). Not an error.
    Skipped { reason: String },
    Error {
        name: String,
        message: String,
    },
}

/// Capability interface for page fetchers.
#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(
        &self,
        url: &CanonicalUrl,
        mode: ScrapeMode,
        opts: &ScrapeOptions,
    ) -> ScrapeOutcome;
}
