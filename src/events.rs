//! Crawl progress events.
//!
//! The orchestrator reports through an [`EventSink`] instead of an
//! event-emitter: callers hand in an implementation and receive
//! callbacks synchronously from the crawl loop. Implementations must
//! not block; anything slow belongs on a channel owned by the caller.

use std::path::Path;

use log::{error, info};
use serde::{Deserialize, Serialize};

/// A non-fatal error surfaced during the crawl.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub pid: u32,
    pub is_main_process: bool,
    pub url: Option<String>,
    pub error: String,
}

impl ErrorEvent {
    #[must_use]
    pub fn new(url: Option<String>, error: impl Into<String>) -> Self {
        Self {
            pid: std::process::id(),
            is_main_process: true,
            url,
            error: error.into(),
        }
    }
}

/// Observer interface for crawl lifecycle events.
pub trait EventSink: Send + Sync {
    /// A scrape has started for this URL.
    fn url(&self, url: &str);

    /// A non-fatal error occurred.
    fn error(&self, event: &ErrorEvent);

    /// The archive file has been written.
    fn write_file(&self, path: &Path);

    /// The crawl is complete.
    fn done(&self);
}

/// Sink that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEvents;

impl EventSink for NoOpEvents {
    #[inline(always)]
    fn url(&self, _url: &str) {}

    #[inline(always)]
    fn error(&self, _event: &ErrorEvent) {}

    #[inline(always)]
    fn write_file(&self, _path: &Path) {}

    #[inline(always)]
    fn done(&self) {}
}

/// Sink that forwards events to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEvents;

impl EventSink for LogEvents {
    fn url(&self, url: &str) {
        info!(target: "sitescan::crawl", "fetching {url}");
    }

    fn error(&self, event: &ErrorEvent) {
        match &event.url {
            Some(url) => error!(target: "sitescan::crawl", "{url}: {}", event.error),
            None => error!(target: "sitescan::crawl", "{}", event.error),
        }
    }

    fn write_file(&self, path: &Path) {
        info!(target: "sitescan::crawl", "archive saved: {}", path.display());
    }

    fn done(&self) {
        info!(target: "sitescan::crawl", "crawl complete");
    }
}
