//! SQLite + tar implementation of the [`Archive`] port.
//!
//! Rows land in a staging directory (catalog database plus `html/`
//! snapshots); [`SqliteArchive::close`] checkpoints the database and
//! packs everything into a single uncompressed tar at the output path.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use log::{debug, info};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use tempfile::TempDir;

use crate::canonical::CanonicalUrl;

use super::paths::{exceeds_component_limit, fallback_name, safe_path};
use super::{Archive, ArchiveError, PageRecord, ResourceRecord};

/// Catalog schema. One row per page keyed by canonical URL; redirect
/// hops, anchors, and images hang off it; resources are global and
/// joined to pages through `page_resources`.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS manifest (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    seeds TEXT NOT NULL,
    options TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT
);

CREATE TABLE IF NOT EXISTS pages (
    url TEXT PRIMARY KEY,
    status INTEGER NOT NULL,
    status_text TEXT NOT NULL,
    content_type TEXT,
    content_length INTEGER,
    headers TEXT NOT NULL,
    title TEXT,
    description TEXT,
    og TEXT NOT NULL,
    meta_robots_noindex INTEGER NOT NULL DEFAULT 0,
    meta_robots_nofollow INTEGER NOT NULL DEFAULT 0,
    canonical TEXT,
    alternate TEXT NOT NULL,
    lang TEXT,
    is_target INTEGER NOT NULL,
    is_external INTEGER NOT NULL,
    is_skipped INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS redirects (
    page_url TEXT NOT NULL,
    position INTEGER NOT NULL,
    from_url TEXT NOT NULL,
    PRIMARY KEY (page_url, position)
);

CREATE TABLE IF NOT EXISTS anchors (
    page_url TEXT NOT NULL,
    position INTEGER NOT NULL,
    href TEXT NOT NULL,
    text TEXT NOT NULL,
    PRIMARY KEY (page_url, position)
);

CREATE TABLE IF NOT EXISTS images (
    page_url TEXT NOT NULL,
    position INTEGER NOT NULL,
    src TEXT NOT NULL,
    PRIMARY KEY (page_url, position)
);

CREATE TABLE IF NOT EXISTS resources (
    url TEXT PRIMARY KEY,
    status INTEGER NOT NULL,
    status_text TEXT NOT NULL,
    content_type TEXT,
    content_length INTEGER,
    is_external INTEGER NOT NULL,
    compression TEXT,
    cdn TEXT,
    headers TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS page_resources (
    page_url TEXT NOT NULL,
    resource_url TEXT NOT NULL,
    UNIQUE (page_url, resource_url)
);

CREATE TABLE IF NOT EXISTS referrers (
    from_url TEXT NOT NULL,
    to_url TEXT NOT NULL,
    text TEXT NOT NULL,
    through_url TEXT NOT NULL,
    UNIQUE (from_url, to_url)
);

CREATE INDEX IF NOT EXISTS idx_referrers_to ON referrers(to_url);

CREATE TABLE IF NOT EXISTS snapshots (
    page_url TEXT PRIMARY KEY,
    file_path TEXT NOT NULL,
    intended_path TEXT
);
"#;

const DB_FILE_NAME: &str = "catalog.sqlite";

/// Archive implementation writing SQLite + HTML into a tar container.
pub struct SqliteArchive {
    pool: SqlitePool,
    staging: TempDir,
    output: PathBuf,
    closed: AtomicBool,
    long_name_counter: AtomicU32,
}

impl SqliteArchive {
    /// Create a fresh archive that will be written to `output` on close.
    pub async fn create(output: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let staging = TempDir::new()?;
        tokio::fs::create_dir_all(staging.path().join("html")).await?;

        let options = SqliteConnectOptions::new()
            .filename(staging.path().join(DB_FILE_NAME))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // One connection: the archive is a serialized single writer.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        Ok(Self {
            pool,
            staging,
            output: output.into(),
            closed: AtomicBool::new(false),
            long_name_counter: AtomicU32::new(0),
        })
    }

    /// Record session metadata so the archive is self-describing.
    pub async fn set_manifest(
        &self,
        seeds: &[String],
        options_json: &serde_json::Value,
    ) -> Result<(), ArchiveError> {
        sqlx::query(
            r#"
            INSERT INTO manifest (id, seeds, options, started_at)
            VALUES (1, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                seeds = excluded.seeds,
                options = excluded.options
            "#,
        )
        .bind(serde_json::to_string(seeds).unwrap_or_default())
        .bind(options_json.to_string())
        .bind(chrono::Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), ArchiveError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ArchiveError::Closed);
        }
        Ok(())
    }

    fn html_root(&self) -> PathBuf {
        self.staging.path().join("html")
    }

    pub async fn page_count(&self) -> Result<i64, ArchiveError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pages")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn resource_count(&self) -> Result<i64, ArchiveError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM resources")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn referrer_count(&self) -> Result<i64, ArchiveError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM referrers")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    pub async fn target_count(&self) -> Result<i64, ArchiveError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pages WHERE is_target = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.0)
    }

    /// Fetch one page row for inspection. Test and tooling helper, not
    /// part of the [`Archive`] port.
    pub async fn page(&self, url: &str) -> Result<Option<PageRow>, ArchiveError> {
        let row: Option<(i64, String, i64, i64, i64)> = sqlx::query_as(
            "SELECT status, status_text, is_target, is_external, is_skipped FROM pages WHERE url = ?",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        let Some((status, status_text, is_target, is_external, is_skipped)) = row else {
            return Ok(None);
        };
        let redirects: Vec<(String,)> = sqlx::query_as(
            "SELECT from_url FROM redirects WHERE page_url = ? ORDER BY position",
        )
        .bind(url)
        .fetch_all(&self.pool)
        .await?;
        Ok(Some(PageRow {
            status: status as i32,
            status_text,
            is_target: is_target != 0,
            is_external: is_external != 0,
            is_skipped: is_skipped != 0,
            redirect_from: redirects.into_iter().map(|(u,)| u).collect(),
        }))
    }

    pub async fn referrers_to(&self, to_url: &str) -> Result<Vec<(String, String)>, ArchiveError> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT from_url, through_url FROM referrers WHERE to_url = ?")
                .bind(to_url)
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }
}

#[async_trait]
impl Archive for SqliteArchive {
    async fn upsert_page(&self, page: &PageRecord) -> Result<(), ArchiveError> {
        self.ensure_open()?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO pages (
                url, status, status_text, content_type, content_length,
                headers, title, description, og,
                meta_robots_noindex, meta_robots_nofollow,
                canonical, alternate, lang,
                is_target, is_external, is_skipped
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                status = excluded.status,
                status_text = excluded.status_text,
                content_type = excluded.content_type,
                content_length = excluded.content_length,
                headers = excluded.headers,
                title = excluded.title,
                description = excluded.description,
                og = excluded.og,
                meta_robots_noindex = excluded.meta_robots_noindex,
                meta_robots_nofollow = excluded.meta_robots_nofollow,
                canonical = excluded.canonical,
                alternate = excluded.alternate,
                lang = excluded.lang,
                is_target = excluded.is_target,
                is_external = excluded.is_external,
                is_skipped = excluded.is_skipped
            "#,
        )
        .bind(&page.url)
        .bind(page.status)
        .bind(&page.status_text)
        .bind(&page.content_type)
        .bind(page.content_length)
        .bind(serde_json::to_string(&page.headers).unwrap_or_default())
        .bind(&page.meta.title)
        .bind(&page.meta.description)
        .bind(serde_json::to_string(&page.meta.og).unwrap_or_default())
        .bind(i32::from(page.meta.robots_noindex))
        .bind(i32::from(page.meta.robots_nofollow))
        .bind(&page.meta.canonical)
        .bind(serde_json::to_string(&page.meta.alternate).unwrap_or_default())
        .bind(&page.meta.lang)
        .bind(i32::from(page.is_target))
        .bind(i32::from(page.is_external))
        .bind(i32::from(page.is_skipped))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM redirects WHERE page_url = ?")
            .bind(&page.url)
            .execute(&mut *tx)
            .await?;
        for (position, from_url) in page.redirect_from.iter().enumerate() {
            sqlx::query("INSERT INTO redirects (page_url, position, from_url) VALUES (?, ?, ?)")
                .bind(&page.url)
                .bind(position as i64)
                .bind(from_url)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM anchors WHERE page_url = ?")
            .bind(&page.url)
            .execute(&mut *tx)
            .await?;
        for (position, anchor) in page.anchors.iter().enumerate() {
            sqlx::query(
                "INSERT INTO anchors (page_url, position, href, text) VALUES (?, ?, ?, ?)",
            )
            .bind(&page.url)
            .bind(position as i64)
            .bind(&anchor.href)
            .bind(&anchor.text)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM images WHERE page_url = ?")
            .bind(&page.url)
            .execute(&mut *tx)
            .await?;
        for (position, src) in page.images.iter().enumerate() {
            sqlx::query("INSERT INTO images (page_url, position, src) VALUES (?, ?, ?)")
                .bind(&page.url)
                .bind(position as i64)
                .bind(src)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!(target: "sitescan::archive", "page stored: {}", page.url);
        Ok(())
    }

    async fn upsert_resource(&self, resource: &ResourceRecord) -> Result<(), ArchiveError> {
        self.ensure_open()?;
        sqlx::query(
            r#"
            INSERT INTO resources (
                url, status, status_text, content_type, content_length,
                is_external, compression, cdn, headers
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                status = excluded.status,
                status_text = excluded.status_text,
                content_type = excluded.content_type,
                content_length = excluded.content_length,
                is_external = excluded.is_external,
                compression = excluded.compression,
                cdn = excluded.cdn,
                headers = excluded.headers
            "#,
        )
        .bind(&resource.url)
        .bind(resource.status)
        .bind(&resource.status_text)
        .bind(&resource.content_type)
        .bind(resource.content_length)
        .bind(i32::from(resource.is_external))
        .bind(&resource.compression)
        .bind(&resource.cdn)
        .bind(serde_json::to_string(&resource.headers).unwrap_or_default())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn link_page_to_resource(
        &self,
        page_url: &str,
        resource_url: &str,
    ) -> Result<(), ArchiveError> {
        self.ensure_open()?;
        sqlx::query(
            "INSERT OR IGNORE INTO page_resources (page_url, resource_url) VALUES (?, ?)",
        )
        .bind(page_url)
        .bind(resource_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn record_referrer(
        &self,
        from: &str,
        to: &str,
        text: &str,
        through: &str,
    ) -> Result<(), ArchiveError> {
        self.ensure_open()?;
        sqlx::query(
            "INSERT OR IGNORE INTO referrers (from_url, to_url, text, through_url) VALUES (?, ?, ?, ?)",
        )
        .bind(from)
        .bind(to)
        .bind(text)
        .bind(through)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn write_html(&self, page_url: &str, html: &str) -> Result<(), ArchiveError> {
        self.ensure_open()?;
        let url = CanonicalUrl::parse(page_url)
            .map_err(|_| ArchiveError::UnsafePath(page_url.to_string()))?;
        let derived = safe_path(&url)?;

        let (relative, intended) = if exceeds_component_limit(&derived) {
            let counter = self.long_name_counter.fetch_add(1, Ordering::Relaxed);
            let name = fallback_name(counter);
            let sidecar = self.html_root().join(format!("{name}.meta.txt"));
            tokio::fs::write(&sidecar, derived.to_string_lossy().as_bytes()).await?;
            (PathBuf::from(name), Some(derived))
        } else {
            (derived, None)
        };

        let full = self.html_root().join(&relative);
        // belt and braces: the joined path must stay under html/
        if !full.starts_with(self.html_root()) {
            return Err(ArchiveError::UnsafePath(page_url.to_string()));
        }
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, html.as_bytes()).await?;

        sqlx::query(
            r#"
            INSERT INTO snapshots (page_url, file_path, intended_path)
            VALUES (?, ?, ?)
            ON CONFLICT(page_url) DO UPDATE SET
                file_path = excluded.file_path,
                intended_path = excluded.intended_path
            "#,
        )
        .bind(page_url)
        .bind(relative.to_string_lossy().as_ref())
        .bind(intended.as_ref().map(|p| p.to_string_lossy().to_string()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn close(&self) -> Result<PathBuf, ArchiveError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(ArchiveError::Closed);
        }

        sqlx::query("UPDATE manifest SET finished_at = ? WHERE id = 1")
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        // flush the WAL so the main database file is self-contained;
        // the pool stays open for post-crawl reads and closes on drop
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;

        let staging = self.staging.path().to_path_buf();
        let output = self.output.clone();
        let written = tokio::task::spawn_blocking(move || pack_tar(&staging, &output))
            .await
            .map_err(|e| ArchiveError::Other(format!("tar task failed: {e}")))??;

        info!(target: "sitescan::archive", "archive written: {}", written.display());
        Ok(written)
    }
}

/// A page row as read back for inspection.
#[derive(Debug, Clone)]
pub struct PageRow {
    pub status: i32,
    pub status_text: String,
    pub is_target: bool,
    pub is_external: bool,
    pub is_skipped: bool,
    pub redirect_from: Vec<String>,
}

fn pack_tar(staging: &Path, output: &Path) -> Result<PathBuf, ArchiveError> {
    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(output)?;
    let mut builder = tar::Builder::new(file);
    builder.append_path_with_name(staging.join(DB_FILE_NAME), DB_FILE_NAME)?;
    builder.append_dir_all("html", staging.join("html"))?;
    builder.into_inner()?.sync_all()?;
    Ok(output.to_path_buf())
}
