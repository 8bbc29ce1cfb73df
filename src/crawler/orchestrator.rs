//! The crawl control loop.
//!
//! Dispatches up to `parallels` concurrent scrapes off the frontier,
//! paces dispatches by `interval`, fans scrape results out into anchor
//! admission, pagination prediction, resource dedup, and archive
//! writes, and finalizes the archive when the frontier drains. The
//! frontier is the only shared mutable structure; result processing is
//! serialized in this loop, which also makes the archive a single
//! writer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use dashmap::{DashMap, DashSet};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use log::{debug, error, warn};
use tokio::task::JoinHandle;

use crate::admission::Admission;
use crate::archive::{Archive, PageRecord, ResourceRecord};
use crate::canonical::CanonicalUrl;
use crate::config::CrawlerOptions;
use crate::events::{ErrorEvent, EventSink};
use crate::exclude::ExclusionFilter;
use crate::frontier::{
    AddOutcome, Destination, Discovery, LinkEntry, LinkList, ReferrerEdge, RetryDecision,
};
use crate::pagination;
use crate::robots::RobotsGate;
use crate::scope::ScopeSet;
use crate::scrape::{
    PageData, ResourceData, ScrapeMode, ScrapeOptions, ScrapeOutcome, Scraper,
};

use super::types::{CrawlError, CrawlResult, FailureKind, UNKNOWN_ERROR_STATUS, UNKNOWN_ERROR_TEXT};

/// Counters reported when a crawl finishes.
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    /// Page records persisted.
    pub pages: usize,
    /// Distinct resources persisted.
    pub resources: usize,
    /// Non-fatal errors surfaced through the error event.
    pub errors: usize,
    /// Requeues performed.
    pub retries: usize,
    /// Entries the scraper declined.
    pub skipped: usize,
    /// Predicted URLs that resolved badly and were dropped.
    pub discarded_predicted: usize,
    pub cancelled: bool,
    pub duration: Duration,
}

/// Handle for cancelling a running crawl from another task.
#[derive(Clone)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }
}

struct TaskOutput {
    entry: LinkEntry,
    mode: ScrapeMode,
    outcome: ScrapeOutcome,
}

/// One crawl session over a seed set.
///
/// All caches (robots, destinations, seen resources) are owned by the
/// instance, so a fresh `Crawler` always starts from a clean slate.
pub struct Crawler {
    options: CrawlerOptions,
    frontier: Arc<LinkList>,
    scraper: Arc<dyn Scraper>,
    archive: Arc<dyn Archive>,
    events: Arc<dyn EventSink>,
    cancelled: Arc<AtomicBool>,
    /// original URL (without fragment) -> where it actually resolved.
    dest_cache: DashMap<String, Destination>,
    /// resource URLs (without fragment) already persisted.
    seen_resources: DashSet<String>,
    scrape_opts: ScrapeOptions,
}

impl Crawler {
    pub fn new(
        options: CrawlerOptions,
        scraper: Arc<dyn Scraper>,
        archive: Arc<dyn Archive>,
        events: Arc<dyn EventSink>,
    ) -> CrawlResult<Self> {
        let scope = ScopeSet::from_urls(options.scope(), options.disable_queries())
            .map_err(|e| CrawlError::Config(format!("{e:#}")))?;
        let exclude = ExclusionFilter::new(
            &options.excludes,
            &options.exclude_urls,
            &options.exclude_keywords,
        )
        .map_err(|e| CrawlError::Config(format!("{e:#}")))?;
        let robots = Arc::new(
            RobotsGate::new(options.user_agent(), !options.ignore_robots())
                .map_err(|e| CrawlError::Config(format!("{e:#}")))?,
        );
        let admission = Admission::new(scope, exclude, robots, options.max_excluded_depth());
        let frontier = Arc::new(LinkList::new(Arc::new(admission), options.retry()));

        let scrape_opts = ScrapeOptions {
            user_agent: options.user_agent().to_string(),
            capture_images: options.capture_images(),
            executable_path: options.executable_path().map(ToString::to_string),
            timeout: options.scrape_timeout(),
        };

        Ok(Self {
            options,
            frontier,
            scraper,
            archive,
            events,
            cancelled: Arc::new(AtomicBool::new(false)),
            dest_cache: DashMap::new(),
            seen_resources: DashSet::new(),
            scrape_opts,
        })
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(Arc::clone(&self.cancelled))
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn frontier(&self) -> &Arc<LinkList> {
        &self.frontier
    }

    /// Run the crawl to completion and finalize the archive.
    ///
    /// Non-fatal failures surface through the error event; archive
    /// failures abort with [`CrawlError::Archive`].
    pub async fn run(&self) -> CrawlResult<CrawlSummary> {
        let started = Instant::now();
        let mut summary = CrawlSummary::default();

        for seed in self.options.seeds() {
            match CanonicalUrl::parse_opts(seed, self.options.disable_queries()) {
                Ok(url) => {
                    self.frontier
                        .add(&url, ScrapeMode::Full, Discovery::Seed, 0, None)
                        .await;
                }
                // refused, not an error: the seed never existed
                Err(e) => warn!(target: "sitescan::crawl", "seed rejected: {e:#}"),
            }
        }

        let mut active: FuturesUnordered<JoinHandle<TaskOutput>> = FuturesUnordered::new();
        let interval = self.options.interval();

        loop {
            while active.len() < self.options.parallels() && !self.is_cancelled() {
                let Some(entry) = self.frontier.take().await else {
                    break;
                };
                // external pages are fetched for their metadata only
                let mode = if entry.is_external && !self.options.fetch_external() {
                    ScrapeMode::MetadataOnly
                } else {
                    entry.mode
                };

                self.events.url(&entry.url.without_hash());

                let scraper = Arc::clone(&self.scraper);
                let opts = self.scrape_opts.clone();
                let url = entry.url.clone();
                let handle = tokio::spawn(async move {
                    let outcome = scraper.scrape(&url, mode, &opts).await;
                    TaskOutput {
                        entry,
                        mode,
                        outcome,
                    }
                });
                active.push(handle);

                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
            }

            match active.next().await {
                Some(Ok(output)) => self.handle_outcome(output, &mut summary).await?,
                Some(Err(e)) => error!(target: "sitescan::crawl", "scrape task panicked: {e}"),
                None => {}
            }

            // in-flight entries are always backed by an active task
            if active.is_empty()
                && (self.is_cancelled() || self.frontier.queued_count().await == 0)
            {
                break;
            }
        }

        let path = self.archive.close().await?;
        self.events.write_file(&path);
        self.events.done();

        summary.cancelled = self.is_cancelled();
        summary.duration = started.elapsed();
        Ok(summary)
    }

    async fn handle_outcome(
        &self,
        output: TaskOutput,
        summary: &mut CrawlSummary,
    ) -> CrawlResult<()> {
        match output.outcome {
            ScrapeOutcome::Success { page, resources } => {
                self.handle_scrape_end(output.entry, output.mode, page, resources, summary)
                    .await
            }
            ScrapeOutcome::Skipped { reason } => {
                debug!(
                    target: "sitescan::crawl",
                    "scraper skipped {} ({reason})",
                    output.entry.url
                );
                self.frontier.skip(&output.entry.url).await;
                summary.skipped += 1;
                Ok(())
            }
            ScrapeOutcome::Error { name, message } => {
                self.handle_scrape_error(output.entry, &name, &message, summary)
                    .await
            }
        }
    }

    async fn handle_scrape_end(
        &self,
        entry: LinkEntry,
        mode: ScrapeMode,
        page: PageData,
        resources: Vec<ResourceData>,
        summary: &mut CrawlSummary,
    ) -> CrawlResult<()> {
        let status = page.status;

        // 5xx is worth another attempt while budget remains; 4xx is the
        // server's final word.
        if let Some(kind) = FailureKind::from_status(status)
            && kind.is_retryable()
            && entry.retries < self.options.retry()
        {
            self.events.error(&ErrorEvent::new(
                Some(entry.url.without_hash()),
                format!("HTTP {status} {}", page.status_text),
            ));
            summary.errors += 1;
            if self.frontier.retry(&entry.url).await == RetryDecision::Requeued {
                summary.retries += 1;
                return Ok(());
            }
        }

        let final_url = CanonicalUrl::parse(&page.url).unwrap_or_else(|_| entry.url.clone());
        let moved = final_url.dedup_key() != entry.url.dedup_key();

        let dest = Destination {
            status,
            status_text: page.status_text.clone(),
            content_type: page.content_type.clone(),
            final_url: moved.then(|| page.url.clone()),
        };
        self.dest_cache
            .insert(entry.url.without_hash(), dest.clone());
        for hop in &page.redirect_chain {
            self.dest_cache.insert(
                hop.url.clone(),
                Destination {
                    status: hop.status,
                    status_text: hop.status_text.clone(),
                    content_type: None,
                    final_url: Some(page.url.clone()),
                },
            );
        }

        self.frontier.done(&entry.url, Some(dest.clone())).await;
        let scope = self.frontier.admission().scope();
        let final_lower = scope.in_lower_layer(&final_url);
        if moved {
            // the redirect target is now known content; a later
            // discovery of it must not trigger a second scrape
            self.frontier
                .merge_done(&final_url, dest, !final_lower, final_lower)
                .await;
        }

        // speculative URLs that resolved badly never reach the archive
        if entry.discovery == Discovery::Predicted && should_discard_predicted(status) {
            debug!(
                target: "sitescan::crawl",
                "discarding predicted {} (status {status})",
                entry.url
            );
            summary.discarded_predicted += 1;
            return Ok(());
        }

        for hop in &page.redirect_chain {
            let stub = PageRecord {
                url: hop.url.clone(),
                redirect_from: Vec::new(),
                status: hop.status,
                status_text: hop.status_text.clone(),
                content_type: None,
                content_length: None,
                headers: Default::default(),
                meta: Default::default(),
                anchors: Vec::new(),
                images: Vec::new(),
                is_target: false,
                is_external: entry.is_external,
                is_skipped: false,
            };
            self.archive.upsert_page(&stub).await?;
        }

        let is_external = if moved { !final_lower } else { entry.is_external };
        let is_target = !is_external && (200..=399).contains(&status);
        let record = PageRecord {
            url: page.url.clone(),
            redirect_from: page.redirect_chain.iter().map(|h| h.url.clone()).collect(),
            status,
            status_text: page.status_text.clone(),
            content_type: page.content_type.clone(),
            content_length: page.content_length,
            headers: page.headers.clone(),
            meta: page.meta.clone(),
            anchors: page.anchors.clone(),
            images: page.images.clone(),
            is_target,
            is_external,
            is_skipped: false,
        };

        if let Some(html) = &page.html {
            self.archive.write_html(&page.url, html).await?;
        }
        self.archive.upsert_page(&record).await?;
        summary.pages += 1;

        for resource in &resources {
            self.handle_resource(&page.url, resource, summary).await?;
        }

        if mode == ScrapeMode::Full && !self.options.from_list() {
            self.process_anchors(&entry, &page).await?;
        }

        Ok(())
    }

    /// Fan a page's anchors back into admission, recording referrer
    /// edges for every anchor whether or not its target is fetched.
    async fn process_anchors(&self, entry: &LinkEntry, page: &PageData) -> CrawlResult<()> {
        let depth = entry.depth + 1;
        let strip_queries = self.options.disable_queries();

        for anchor in &page.anchors {
            let Ok(parsed) = CanonicalUrl::parse_opts(&anchor.href, strip_queries) else {
                continue;
            };
            let scope = self.frontier.admission().scope();
            let lower = scope.in_lower_layer(&parsed);
            let target = if lower {
                scope.inject_auth(&parsed)
            } else {
                parsed
            };
            let href = target.without_hash();

            // if the target is already known to redirect, point the
            // edge at where it lands and keep the anchor as `through`
            let (to, through) = match self.dest_cache.get(&href).and_then(|d| d.final_url.clone())
            {
                Some(final_url) => (final_url, href.clone()),
                None => (href.clone(), href.clone()),
            };
            self.archive
                .record_referrer(&page.url, &to, &anchor.text, &through)
                .await?;
            let edge = ReferrerEdge {
                from: page.url.clone(),
                to,
                text: anchor.text.clone(),
                through,
            };

            let mode = if self.options.recursive() {
                if lower {
                    Some(ScrapeMode::Full)
                } else if self.options.fetch_external() {
                    Some(ScrapeMode::MetadataOnly)
                } else {
                    None
                }
            } else {
                Some(ScrapeMode::MetadataOnly)
            };

            let Some(mode) = mode else {
                // edge only; the external target itself stays unfetched
                self.frontier.note_referrer(&target, edge).await;
                continue;
            };

            let outcome = self
                .frontier
                .add(&target, mode, Discovery::Anchor, depth, Some(edge))
                .await;

            if let AddOutcome::Queued {
                predecessor: Some(prev),
            } = outcome
                && let Some(pattern) = pagination::detect(&prev, &target)
            {
                let predicted = pagination::predict(&target, &pattern, self.options.parallels());
                debug!(
                    target: "sitescan::crawl",
                    "pagination pattern at {target}: enqueueing {} predictions",
                    predicted.len()
                );
                for next in predicted {
                    self.frontier
                        .add(&next, mode, Discovery::Predicted, depth, None)
                        .await;
                }
            }
        }
        Ok(())
    }

    async fn handle_resource(
        &self,
        page_url: &str,
        resource: &ResourceData,
        summary: &mut CrawlSummary,
    ) -> CrawlResult<()> {
        let Ok(url) = CanonicalUrl::parse(&resource.url) else {
            return Ok(());
        };
        let key = url.without_hash();

        if self.seen_resources.insert(key.clone()) {
            let scope = self.frontier.admission().scope();
            let record = ResourceRecord {
                url: key.clone(),
                status: resource.status,
                status_text: resource.status_text.clone(),
                content_type: resource.content_type.clone(),
                content_length: resource.content_length,
                is_external: !scope.in_lower_layer(&url),
                compression: resource.compression.clone(),
                cdn: resource.cdn.clone(),
                headers: resource.headers.clone(),
            };
            self.archive.upsert_resource(&record).await?;
            summary.resources += 1;
        }
        self.archive.link_page_to_resource(page_url, &key).await?;
        Ok(())
    }

    async fn handle_scrape_error(
        &self,
        entry: LinkEntry,
        name: &str,
        message: &str,
        summary: &mut CrawlSummary,
    ) -> CrawlResult<()> {
        self.events.error(&ErrorEvent::new(
            Some(entry.url.without_hash()),
            format!("{name}: {message}"),
        ));
        summary.errors += 1;

        let kind = FailureKind::from_error_name(name);
        // evaluation failures get exactly one extra attempt
        let evaluation_capped = kind == FailureKind::Evaluation && entry.retries >= 1;
        if kind.is_retryable()
            && !evaluation_capped
            && entry.retries < self.options.retry()
            && self.frontier.retry(&entry.url).await == RetryDecision::Requeued
        {
            summary.retries += 1;
            return Ok(());
        }

        let dest = Destination {
            status: UNKNOWN_ERROR_STATUS,
            status_text: UNKNOWN_ERROR_TEXT.to_string(),
            content_type: None,
            final_url: None,
        };
        self.frontier.done(&entry.url, Some(dest)).await;

        if entry.discovery != Discovery::Predicted {
            let record = PageRecord {
                url: entry.url.without_hash(),
                redirect_from: Vec::new(),
                status: UNKNOWN_ERROR_STATUS,
                status_text: UNKNOWN_ERROR_TEXT.to_string(),
                content_type: None,
                content_length: None,
                headers: Default::default(),
                meta: Default::default(),
                anchors: Vec::new(),
                images: Vec::new(),
                is_target: false,
                is_external: entry.is_external,
                is_skipped: false,
            };
            self.archive.upsert_page(&record).await?;
            summary.pages += 1;
        } else {
            summary.discarded_predicted += 1;
        }
        Ok(())
    }
}

/// Predicted URLs only earn a page record when they resolve cleanly.
fn should_discard_predicted(status: i32) -> bool {
    !(200..=399).contains(&status)
}
