//! Frontier entry state.

use serde::{Deserialize, Serialize};

use crate::admission::RejectReason;
use crate::canonical::CanonicalUrl;
use crate::scrape::ScrapeMode;

/// Where a frontier entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Discovery {
    Seed,
    Anchor,
    /// Synthesized by the pagination predictor ahead of discovery.
    Predicted,
}

/// Lifecycle state of a frontier entry.
///
/// `Queued -> InFlight -> Done` is the normal path; `InFlight ->
/// Queued` happens only through a bounded retry. `Skipped` is terminal
/// and reached from admission rejection or a scraper skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkStatus {
    Queued,
    InFlight,
    Done,
    Skipped,
}

/// What the scrape ultimately resolved to, kept on the entry after
/// completion and mirrored into the destination cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    pub status: i32,
    pub status_text: String,
    pub content_type: Option<String>,
    /// Final URL when a redirect moved the page.
    pub final_url: Option<String>,
}

/// One known URL and everything the frontier tracks about it.
#[derive(Debug, Clone)]
pub struct LinkEntry {
    pub url: CanonicalUrl,
    pub status: LinkStatus,
    pub mode: ScrapeMode,
    pub discovery: Discovery,
    pub depth: u32,
    pub retries: u32,
    pub dest: Option<Destination>,
    /// Not covered by any scope prefix.
    pub is_external: bool,
    /// At or under a scope root.
    pub is_lower_layer: bool,
    /// Why admission refused this URL, when it did.
    pub rejected: Option<RejectReason>,
}

/// A directed referrer relation. `through` equals `to` unless a
/// redirect intervened, in which case it is the original anchor target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferrerEdge {
    pub from: String,
    pub to: String,
    pub text: String,
    pub through: String,
}
