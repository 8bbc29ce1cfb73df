//! Crawler error and failure classification types.

use std::fmt;

use crate::archive::ArchiveError;

/// Terminal status recorded for entries whose retries ran out.
pub const UNKNOWN_ERROR_STATUS: i32 = -1;
pub const UNKNOWN_ERROR_TEXT: &str = "UnknownError";

/// Fatal crawl failures. Everything non-fatal travels through the
/// error event instead.
#[derive(Debug)]
pub enum CrawlError {
    /// Invalid options or seed set.
    Config(String),
    /// The archive refused a write; the crawl cannot continue.
    Archive(ArchiveError),
    /// The crawl was cancelled before completion.
    Cancelled,
    Other(String),
}

impl fmt::Display for CrawlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Archive(e) => write!(f, "archive failure: {e}"),
            Self::Cancelled => write!(f, "crawl was cancelled"),
            Self::Other(msg) => write!(f, "crawl error: {msg}"),
        }
    }
}

impl std::error::Error for CrawlError {}

impl From<ArchiveError> for CrawlError {
    fn from(e: ArchiveError) -> Self {
        Self::Archive(e)
    }
}

impl From<anyhow::Error> for CrawlError {
    fn from(e: anyhow::Error) -> Self {
        // {:#} keeps the full context chain
        Self::Other(format!("{e:#}"))
    }
}

pub type CrawlResult<T> = Result<T, CrawlError>;

/// Categorizes scrape failures for retry decisions.
///
/// Transport failures and server errors are usually transient; client
/// errors are the server's final word; scraper evaluation failures get
/// one more chance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connection refused, DNS, reset, timeout.
    Transport,
    /// HTTP 5xx.
    ServerError,
    /// HTTP 4xx. Terminal.
    ClientError,
    /// The scraper's own evaluation failed (for a browser-backed
    /// scraper, a DOM evaluation error).
    Evaluation,
    Unknown,
}

impl FailureKind {
    /// Classify a scraper error by its reported name.
    #[must_use]
    pub fn from_error_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.contains("timeout") || lower.contains("fetch") || lower.contains("network") {
            return Self::Transport;
        }
        if lower.contains("evaluation") || lower.contains("dom") {
            return Self::Evaluation;
        }
        Self::Unknown
    }

    /// Classify an HTTP error status. `None` for success statuses.
    #[must_use]
    pub fn from_status(status: i32) -> Option<Self> {
        match status {
            400..=499 => Some(Self::ClientError),
            500..=599 => Some(Self::ServerError),
            _ => None,
        }
    }

    /// Whether the failure is worth another attempt at all.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Transport | Self::ServerError | Self::Unknown => true,
            // one extra attempt, capped by the orchestrator
            Self::Evaluation => true,
            Self::ClientError => false,
        }
    }
}
