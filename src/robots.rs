//! Per-origin robots.txt gate.
//!
//! The first URL seen for an origin triggers one fetch of
//! `<origin>/robots.txt`; concurrent first-touches coalesce onto that
//! single request. A non-200 response or any transport failure is
//! cached as "no restrictions" and never retried within the session.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use dashmap::DashMap;
use log::{debug, warn};
use tokio::sync::OnceCell;

use crate::canonical::CanonicalUrl;

const ROBOTS_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Cached robots.txt state and matcher for the whole crawl session.
pub struct RobotsGate {
    client: reqwest::Client,
    user_agent: String,
    enabled: bool,
    /// origin (`scheme://host[:port]`) -> lazily fetched robots body.
    /// `None` inside the cell means "no restrictions".
    cache: DashMap<String, Arc<OnceCell<Option<String>>>>,
}

impl RobotsGate {
    /// Create the gate. With `enabled` false every URL is allowed and
    /// no fetches happen.
    pub fn new(user_agent: &str, enabled: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(ROBOTS_FETCH_TIMEOUT)
            .build()
            .context("failed to build robots.txt HTTP client")?;
        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
            enabled,
            cache: DashMap::new(),
        })
    }

    /// Whether the configured user agent may fetch this URL.
    ///
    /// Non-HTTP schemes are always allowed. Absence of rules (missing
    /// or unfetchable robots.txt) means allowed.
    pub async fn is_allowed(&self, url: &CanonicalUrl) -> bool {
        if !self.enabled || !url.is_http() {
            return true;
        }
        let Some(origin) = origin_of(url) else {
            return true;
        };

        let cell = self
            .cache
            .entry(origin.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let body = cell
            .get_or_init(|| self.fetch_robots(origin.clone()))
            .await;

        match body {
            Some(content) => {
                let mut matcher = robotstxt::DefaultMatcher::default();
                matcher.one_agent_allowed_by_robots(content, &self.user_agent, url.as_str())
            }
            None => true,
        }
    }

    async fn fetch_robots(&self, origin: String) -> Option<String> {
        let robots_url = format!("{origin}/robots.txt");
        debug!(target: "sitescan::robots", "fetching {robots_url}");
        match self.client.get(&robots_url).send().await {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(body) => Some(body),
                Err(e) => {
                    warn!(target: "sitescan::robots", "failed to read {robots_url}: {e}");
                    None
                }
            },
            Ok(resp) => {
                debug!(
                    target: "sitescan::robots",
                    "{robots_url} returned {}, treating as unrestricted",
                    resp.status()
                );
                None
            }
            Err(e) => {
                debug!(
                    target: "sitescan::robots",
                    "{robots_url} unreachable ({e}), treating as unrestricted"
                );
                None
            }
        }
    }
}

fn origin_of(url: &CanonicalUrl) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{host}:{port}", url.scheme()),
        None => format!("{}://{host}", url.scheme()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_gate_allows_everything() {
        let gate = RobotsGate::new("sitescan", false).unwrap();
        let url = CanonicalUrl::parse("http://127.0.0.1:1/admin").unwrap();
        assert!(gate.is_allowed(&url).await);
    }

    #[tokio::test]
    async fn unreachable_origin_is_unrestricted() {
        let gate = RobotsGate::new("sitescan", true).unwrap();
        // nothing listens here; transport failure must not deny
        let url = CanonicalUrl::parse("http://127.0.0.1:1/page").unwrap();
        assert!(gate.is_allowed(&url).await);
    }

    #[tokio::test]
    async fn disallow_rules_deny_matching_paths() {
        let mut server = mockito::Server::new_async().await;
        let robots = server
            .mock("GET", "/robots.txt")
            .with_status(200)
            .with_body("User-agent: *\nDisallow: /admin/\n")
            .expect_at_most(1)
            .create_async()
            .await;

        let gate = RobotsGate::new("sitescan", true).unwrap();
        let denied = CanonicalUrl::parse(&format!("{}/admin/panel", server.url())).unwrap();
        let allowed = CanonicalUrl::parse(&format!("{}/public", server.url())).unwrap();
        assert!(!gate.is_allowed(&denied).await);
        assert!(gate.is_allowed(&allowed).await);
        // second lookup hits the cache, not the server
        assert!(!gate.is_allowed(&denied).await);
        robots.assert_async().await;
    }

    #[tokio::test]
    async fn non_200_robots_is_unrestricted() {
        let mut server = mockito::Server::new_async().await;
        let _robots = server
            .mock("GET", "/robots.txt")
            .with_status(404)
            .create_async()
            .await;

        let gate = RobotsGate::new("sitescan", true).unwrap();
        let url = CanonicalUrl::parse(&format!("{}/anything", server.url())).unwrap();
        assert!(gate.is_allowed(&url).await);
    }
}
