//! Type-safe builder for [`CrawlerOptions`] using the typestate pattern.
//!
//! Seeds are the one required input; the type parameter makes `build`
//! unreachable until they are provided.

use std::marker::PhantomData;

use anyhow::{Result, anyhow};

use super::types::{CrawlerOptions, DEFAULT_USER_AGENT};

pub struct WithSeeds;

pub struct CrawlerOptionsBuilder<State = ()> {
    seeds: Vec<String>,
    scope: Vec<String>,
    parallels: usize,
    interval_ms: u64,
    recursive: bool,
    from_list: bool,
    fetch_external: bool,
    capture_images: bool,
    executable_path: Option<String>,
    excludes: Vec<String>,
    exclude_keywords: Vec<String>,
    exclude_urls: Vec<String>,
    max_excluded_depth: u32,
    retry: u32,
    disable_queries: bool,
    user_agent: String,
    ignore_robots: bool,
    scrape_timeout_secs: u64,
    _phantom: PhantomData<State>,
}

impl Default for CrawlerOptionsBuilder<()> {
    fn default() -> Self {
        Self {
            seeds: Vec::new(),
            scope: Vec::new(),
            parallels: 1,
            interval_ms: 0,
            recursive: true,
            from_list: false,
            fetch_external: false,
            capture_images: false,
            executable_path: None,
            excludes: Vec::new(),
            exclude_keywords: Vec::new(),
            exclude_urls: Vec::new(),
            max_excluded_depth: 1,
            retry: 0,
            disable_queries: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            ignore_robots: false,
            scrape_timeout_secs: 30,
            _phantom: PhantomData,
        }
    }
}

impl CrawlerOptions {
    /// Start building options with a fluent interface.
    #[must_use]
    pub fn builder() -> CrawlerOptionsBuilder<()> {
        CrawlerOptionsBuilder::default()
    }
}

impl CrawlerOptionsBuilder<()> {
    pub fn seeds<I, S>(self, seeds: I) -> CrawlerOptionsBuilder<WithSeeds>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CrawlerOptionsBuilder {
            seeds: seeds.into_iter().map(Into::into).collect(),
            scope: self.scope,
            parallels: self.parallels,
            interval_ms: self.interval_ms,
            recursive: self.recursive,
            from_list: self.from_list,
            fetch_external: self.fetch_external,
            capture_images: self.capture_images,
            executable_path: self.executable_path,
            excludes: self.excludes,
            exclude_keywords: self.exclude_keywords,
            exclude_urls: self.exclude_urls,
            max_excluded_depth: self.max_excluded_depth,
            retry: self.retry,
            disable_queries: self.disable_queries,
            user_agent: self.user_agent,
            ignore_robots: self.ignore_robots,
            scrape_timeout_secs: self.scrape_timeout_secs,
            _phantom: PhantomData,
        }
    }
}

impl CrawlerOptionsBuilder<WithSeeds> {
    pub fn build(self) -> Result<CrawlerOptions> {
        if self.seeds.is_empty() {
            return Err(anyhow!("at least one seed URL is required"));
        }
        if self.parallels == 0 {
            return Err(anyhow!("parallels must be at least 1"));
        }
        Ok(CrawlerOptions {
            seeds: self.seeds,
            scope: self.scope,
            parallels: self.parallels,
            interval_ms: self.interval_ms,
            recursive: self.recursive,
            from_list: self.from_list,
            fetch_external: self.fetch_external,
            capture_images: self.capture_images,
            executable_path: self.executable_path,
            excludes: self.excludes,
            exclude_keywords: self.exclude_keywords,
            exclude_urls: self.exclude_urls,
            max_excluded_depth: self.max_excluded_depth,
            retry: self.retry,
            disable_queries: self.disable_queries,
            user_agent: self.user_agent,
            ignore_robots: self.ignore_robots,
            scrape_timeout_secs: self.scrape_timeout_secs,
        })
    }
}

// Optional knobs, settable in any state.
impl<State> CrawlerOptionsBuilder<State> {
    #[must_use]
    pub fn scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = scope.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn parallels(mut self, parallels: usize) -> Self {
        self.parallels = parallels;
        self
    }

    /// Minimum gap between dispatches, in milliseconds.
    #[must_use]
    pub fn interval_ms(mut self, interval_ms: u64) -> Self {
        self.interval_ms = interval_ms;
        self
    }

    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    #[must_use]
    pub fn from_list(mut self, from_list: bool) -> Self {
        self.from_list = from_list;
        self
    }

    #[must_use]
    pub fn fetch_external(mut self, fetch_external: bool) -> Self {
        self.fetch_external = fetch_external;
        self
    }

    #[must_use]
    pub fn capture_images(mut self, capture_images: bool) -> Self {
        self.capture_images = capture_images;
        self
    }

    #[must_use]
    pub fn executable_path(mut self, path: Option<String>) -> Self {
        self.executable_path = path;
        self
    }

    #[must_use]
    pub fn excludes<I, S>(mut self, globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excludes = globs.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn exclude_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn exclude_urls<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_urls = prefixes.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn max_excluded_depth(mut self, depth: u32) -> Self {
        self.max_excluded_depth = depth;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn disable_queries(mut self, disable_queries: bool) -> Self {
        self.disable_queries = disable_queries;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn ignore_robots(mut self, ignore_robots: bool) -> Self {
        self.ignore_robots = ignore_robots;
        self
    }

    #[must_use]
    pub fn scrape_timeout_secs(mut self, secs: u64) -> Self {
        self.scrape_timeout_secs = secs;
        self
    }
}
