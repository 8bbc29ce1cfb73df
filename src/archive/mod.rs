//! The archive port: durable projections of the crawl.
//!
//! The orchestrator writes [`PageRecord`]s, [`ResourceRecord`]s, and
//! referrer edges through the [`Archive`] trait and never touches
//! storage directly. The bundled implementation persists to SQLite
//! plus an `html/` snapshot directory, packed into one uncompressed
//! tar on close. Archive failures are fatal to the crawl.

mod paths;
mod sqlite;

pub use paths::safe_path;
pub use sqlite::{PageRow, SqliteArchive};

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scrape::{AnchorData, PageMeta};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive I/O failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("archive database failure: {0}")]
    Db(#[from] sqlx::Error),
    #[error("unsafe archive path derived from {0}")]
    UnsafePath(String),
    #[error("archive is closed")]
    Closed,
    #[error("{0}")]
    Other(String),
}

/// Durable projection of one scraped page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRecord {
    /// Canonical URL without fragment.
    pub url: String,
    /// Redirect origins that led here, oldest first.
    pub redirect_from: Vec<String>,
    pub status: i32,
    pub status_text: String,
    pub content_type: Option<String>,
    /// `None` when the server never said; distinguish from zero.
    pub content_length: Option<i64>,
    pub headers: HashMap<String, String>,
    pub meta: PageMeta,
    pub anchors: Vec<AnchorData>,
    pub images: Vec<String>,
    pub is_target: bool,
    pub is_external: bool,
    pub is_skipped: bool,
}

/// A deduplicated sub-request observed during page scrapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub url: String,
    pub status: i32,
    pub status_text: String,
    pub content_type: Option<String>,
    pub content_length: Option<i64>,
    pub is_external: bool,
    pub compression: Option<String>,
    pub cdn: Option<String>,
    pub headers: HashMap<String, String>,
}

/// Persistence port consumed by the orchestrator.
#[async_trait]
pub trait Archive: Send + Sync {
    async fn upsert_page(&self, page: &PageRecord) -> Result<(), ArchiveError>;

    async fn upsert_resource(&self, resource: &ResourceRecord) -> Result<(), ArchiveError>;

    /// Record that `page_url` referenced `resource_url`. Each distinct
    /// pair is stored once.
    async fn link_page_to_resource(
        &self,
        page_url: &str,
        resource_url: &str,
    ) -> Result<(), ArchiveError>;

    /// Record a referrer edge. `through` equals `to` unless a redirect
    /// intervened. Each distinct (from, to) pair is stored once.
    async fn record_referrer(
        &self,
        from: &str,
        to: &str,
        text: &str,
        through: &str,
    ) -> Result<(), ArchiveError>;

    /// Store a page's HTML snapshot under a safe derived path.
    async fn write_html(&self, page_url: &str, html: &str) -> Result<(), ArchiveError>;

    /// Finalize the archive and return the path of the produced file.
    async fn close(&self) -> Result<PathBuf, ArchiveError>;
}
