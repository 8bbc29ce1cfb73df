//! sitescan: a breadth-first site crawler with a self-contained archive.
//!
//! The crawler discovers, fetches, and persists every page reachable
//! under one or more scope roots. Discovery flows through a single
//! deduplicating frontier; pages are fetched through the [`Scraper`]
//! port and persisted through the [`Archive`] port, which by default
//! lands in a tar containing a SQLite catalog and HTML snapshots.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sitescan::{
//!     Crawler, CrawlerOptions, HttpScraper, LogEvents, SqliteArchive,
//! };
//!
//! # async fn run() -> anyhow::Result<()> {
//! let options = CrawlerOptions::builder()
//!     .seeds(["https://example.com/"])
//!     .scope(["https://example.com/"])
//!     .parallels(4)
//!     .build()?;
//!
//! let archive = Arc::new(SqliteArchive::create("example.tar").await?);
//! let crawler = Crawler::new(
//!     options,
//!     Arc::new(HttpScraper::new()?),
//!     archive,
//!     Arc::new(LogEvents),
//! )?;
//! let summary = crawler.run().await?;
//! println!("crawled {} pages", summary.pages);
//! # Ok(())
//! # }
//! ```

pub mod admission;
pub mod archive;
pub mod canonical;
pub mod config;
pub mod crawler;
pub mod events;
pub mod exclude;
pub mod frontier;
pub mod pagination;
pub mod robots;
pub mod scope;
pub mod scrape;

pub use admission::{Admission, RejectReason, Verdict};
pub use archive::{Archive, ArchiveError, PageRecord, ResourceRecord, SqliteArchive};
pub use canonical::CanonicalUrl;
pub use config::CrawlerOptions;
pub use crawler::{
    CancelHandle, CrawlError, CrawlResult, CrawlSummary, Crawler, FailureKind,
    UNKNOWN_ERROR_STATUS, UNKNOWN_ERROR_TEXT,
};
pub use events::{ErrorEvent, EventSink, LogEvents, NoOpEvents};
pub use exclude::ExclusionFilter;
pub use frontier::{Destination, Discovery, LinkEntry, LinkList, LinkStatus, ReferrerEdge};
pub use pagination::PaginationPattern;
pub use robots::RobotsGate;
pub use scope::ScopeSet;
pub use scrape::{
    AnchorData, HttpScraper, PageData, PageMeta, RedirectHop, ResourceData, ScrapeMode,
    ScrapeOptions, ScrapeOutcome, Scraper,
};
