//! Crawler option types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub(crate) const DEFAULT_USER_AGENT: &str =
    concat!("Mozilla/5.0 (compatible; sitescan/", env!("CARGO_PKG_VERSION"), ")");

/// Everything that parameterizes one crawl session.
///
/// Construct through [`CrawlerOptions::builder`]; `seeds` is the only
/// required field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerOptions {
    /// Starting URLs. Always scraped in full.
    pub(crate) seeds: Vec<String>,
    /// Scope roots (may carry userinfo). URLs under a scope root are
    /// fetched fully; everything else is external.
    pub(crate) scope: Vec<String>,
    /// Maximum concurrent scrapes.
    pub(crate) parallels: usize,
    /// Minimum gap between dispatches, in milliseconds.
    pub(crate) interval_ms: u64,
    /// Follow anchors found on scraped pages.
    pub(crate) recursive: bool,
    /// Treat the seeds as the complete URL set; anchors are recorded
    /// but never enqueued.
    pub(crate) from_list: bool,
    /// Fetch metadata for external anchors.
    pub(crate) fetch_external: bool,
    pub(crate) capture_images: bool,
    /// Browser executable for scraper implementations that need one.
    pub(crate) executable_path: Option<String>,
    /// Glob exclusion patterns matched against the normalized URL.
    pub(crate) excludes: Vec<String>,
    /// Substring exclusions.
    pub(crate) exclude_keywords: Vec<String>,
    /// URL-prefix exclusions, protocol-agnostic.
    pub(crate) exclude_urls: Vec<String>,
    /// External anchors discovered deeper than this are not fetched.
    pub(crate) max_excluded_depth: u32,
    /// Retry budget per URL for retriable failures.
    pub(crate) retry: u32,
    /// Strip query strings during canonicalization.
    pub(crate) disable_queries: bool,
    pub(crate) user_agent: String,
    /// Skip the robots.txt gate entirely.
    pub(crate) ignore_robots: bool,
    /// Per-scrape timeout, in seconds.
    pub(crate) scrape_timeout_secs: u64,
}

impl CrawlerOptions {
    #[must_use]
    pub fn seeds(&self) -> &[String] {
        &self.seeds
    }

    #[must_use]
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    #[must_use]
    pub fn parallels(&self) -> usize {
        self.parallels
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    #[must_use]
    pub fn recursive(&self) -> bool {
        self.recursive
    }

    #[must_use]
    pub fn from_list(&self) -> bool {
        self.from_list
    }

    #[must_use]
    pub fn fetch_external(&self) -> bool {
        self.fetch_external
    }

    #[must_use]
    pub fn capture_images(&self) -> bool {
        self.capture_images
    }

    #[must_use]
    pub fn executable_path(&self) -> Option<&str> {
        self.executable_path.as_deref()
    }

    #[must_use]
    pub fn max_excluded_depth(&self) -> u32 {
        self.max_excluded_depth
    }

    #[must_use]
    pub fn retry(&self) -> u32 {
        self.retry
    }

    #[must_use]
    pub fn disable_queries(&self) -> bool {
        self.disable_queries
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn ignore_robots(&self) -> bool {
        self.ignore_robots
    }

    #[must_use]
    pub fn scrape_timeout(&self) -> Duration {
        Duration::from_secs(self.scrape_timeout_secs)
    }
}
