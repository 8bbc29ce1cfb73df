//! The frontier: every URL discovered but not yet finalized.
//!
//! Entries are keyed by the protocol-agnostic form of the URL without
//! userinfo or fragment, so the http/https variants of a page share one
//! entry. The list tracks a FIFO of queued keys, the in-flight set, a
//! same-shape predecessor lookup for the pagination predictor, and the
//! referrer adjacency map. All mutation is serialized behind a single
//! async mutex; admission (which may fetch robots.txt) runs outside it.

mod entry;

pub use entry::{Destination, Discovery, LinkEntry, LinkStatus, ReferrerEdge};

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use log::debug;
use tokio::sync::Mutex;

use crate::admission::{Admission, RejectReason, Verdict};
use crate::canonical::CanonicalUrl;
use crate::scrape::ScrapeMode;

/// What `add` did with a URL.
#[derive(Debug, Clone)]
pub enum AddOutcome {
    /// A new entry was enqueued. Carries the previously enqueued URL of
    /// the same shape, if any, for the pagination predictor.
    Queued {
        predecessor: Option<CanonicalUrl>,
    },
    /// The entry existed as metadata-only and was upgraded to full.
    Upgraded,
    /// The key was already known; nothing changed.
    Known,
    Rejected(RejectReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Returned to the queue tail.
    Requeued,
    /// Retry budget spent; the caller finalizes the entry.
    Exhausted,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, LinkEntry>,
    queue: VecDeque<String>,
    in_flight: HashSet<String>,
    /// URL-shape signature -> most recently enqueued URL of that shape.
    predecessors: HashMap<String, CanonicalUrl>,
    /// dedup key -> incoming referrer edges.
    referrers: HashMap<String, Vec<ReferrerEdge>>,
}

/// The link list. Shared across the orchestrator and its workers.
pub struct LinkList {
    inner: Mutex<Inner>,
    admission: Arc<Admission>,
    retry_limit: u32,
}

impl LinkList {
    #[must_use]
    pub fn new(admission: Arc<Admission>, retry_limit: u32) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            admission,
            retry_limit,
        }
    }

    #[must_use]
    pub fn admission(&self) -> &Admission {
        &self.admission
    }

    /// Admit a URL and, if new, enqueue it.
    ///
    /// The referrer edge is recorded whether or not the target is
    /// admitted: a link to an excluded page is still a link. Existing
    /// entries are upgraded metadata-only -> full when the new request
    /// asks for more, and never downgraded. Adding a finalized key is a
    /// no-op.
    pub async fn add(
        &self,
        url: &CanonicalUrl,
        mode: ScrapeMode,
        discovery: Discovery,
        depth: u32,
        referrer: Option<ReferrerEdge>,
    ) -> AddOutcome {
        let key = url.dedup_key();

        {
            let mut inner = self.inner.lock().await;
            if let Some(edge) = referrer {
                inner.referrers.entry(key.clone()).or_default().push(edge);
            }
            if let Some(existing) = inner.entries.get_mut(&key) {
                return upgrade_in_place(existing, mode);
            }
        }

        // Admission runs without the lock; robots may fetch.
        let verdict = self.admission.admit(url, discovery, depth).await;

        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.entries.get_mut(&key) {
            return upgrade_in_place(existing, mode);
        }

        match verdict {
            Verdict::Admitted {
                external,
                lower_layer,
            } => {
                inner.entries.insert(
                    key.clone(),
                    LinkEntry {
                        url: url.clone(),
                        status: LinkStatus::Queued,
                        mode,
                        discovery,
                        depth,
                        retries: 0,
                        dest: None,
                        is_external: external,
                        is_lower_layer: lower_layer,
                        rejected: None,
                    },
                );
                inner.queue.push_back(key);
                let predecessor = inner.predecessors.insert(shape_signature(url), url.clone());
                AddOutcome::Queued { predecessor }
            }
            Verdict::Rejected(reason) => {
                debug!(target: "sitescan::frontier", "rejected ({reason:?}): {url}");
                inner.entries.insert(
                    key,
                    LinkEntry {
                        url: url.clone(),
                        status: LinkStatus::Skipped,
                        mode,
                        discovery,
                        depth,
                        retries: 0,
                        dest: None,
                        is_external: false,
                        is_lower_layer: false,
                        rejected: Some(reason),
                    },
                );
                AddOutcome::Rejected(reason)
            }
        }
    }

    /// Pop the next queued entry and mark it in-flight.
    ///
    /// Safe for concurrent callers; keys whose entry already left the
    /// queued state (an upgrade race or a merge) are skipped.
    pub async fn take(&self) -> Option<LinkEntry> {
        let mut inner = self.inner.lock().await;
        while let Some(key) = inner.queue.pop_front() {
            let Some(entry) = inner.entries.get_mut(&key) else {
                continue;
            };
            if entry.status != LinkStatus::Queued {
                continue;
            }
            entry.status = LinkStatus::InFlight;
            let snapshot = entry.clone();
            inner.in_flight.insert(key);
            return Some(snapshot);
        }
        None
    }

    /// Accept a scrape result: merge the destination and finalize.
    ///
    /// Returns the finalized entry, or `None` when the URL was never
    /// known to the frontier.
    pub async fn done(&self, url: &CanonicalUrl, dest: Option<Destination>) -> Option<LinkEntry> {
        let key = url.dedup_key();
        let mut inner = self.inner.lock().await;
        inner.in_flight.remove(&key);
        let entry = inner.entries.get_mut(&key)?;
        entry.status = LinkStatus::Done;
        if dest.is_some() {
            entry.dest = dest;
        }
        Some(entry.clone())
    }

    /// Record that `url` was reached as the end of a redirect chain,
    /// so a later independent discovery of it is a no-op.
    pub async fn merge_done(
        &self,
        url: &CanonicalUrl,
        dest: Destination,
        external: bool,
        lower_layer: bool,
    ) {
        let key = url.dedup_key();
        let mut inner = self.inner.lock().await;
        inner.in_flight.remove(&key);
        match inner.entries.get_mut(&key) {
            Some(entry) => {
                if entry.status != LinkStatus::Done && entry.status != LinkStatus::Skipped {
                    entry.status = LinkStatus::Done;
                    entry.dest = Some(dest);
                }
            }
            None => {
                inner.entries.insert(
                    key,
                    LinkEntry {
                        url: url.clone(),
                        status: LinkStatus::Done,
                        mode: ScrapeMode::Full,
                        discovery: Discovery::Anchor,
                        depth: 0,
                        retries: 0,
                        dest: Some(dest),
                        is_external: external,
                        is_lower_layer: lower_layer,
                        rejected: None,
                    },
                );
            }
        }
    }

    /// Ask to requeue a failed entry. Increments the retry count and
    /// returns it to the queue tail while budget remains.
    pub async fn retry(&self, url: &CanonicalUrl) -> RetryDecision {
        let key = url.dedup_key();
        let mut inner = self.inner.lock().await;
        let Some(entry) = inner.entries.get_mut(&key) else {
            return RetryDecision::Exhausted;
        };
        if entry.retries >= self.retry_limit {
            return RetryDecision::Exhausted;
        }
        entry.retries += 1;
        entry.status = LinkStatus::Queued;
        let retries = entry.retries;
        inner.in_flight.remove(&key);
        inner.queue.push_back(key.clone());
        debug!(target: "sitescan::frontier", "requeued (attempt {retries}): {key}");
        RetryDecision::Requeued
    }

    /// Mark an entry skipped (scraper declined it). Terminal.
    pub async fn skip(&self, url: &CanonicalUrl) -> Option<LinkEntry> {
        let key = url.dedup_key();
        let mut inner = self.inner.lock().await;
        inner.in_flight.remove(&key);
        let entry = inner.entries.get_mut(&key)?;
        entry.status = LinkStatus::Skipped;
        Some(entry.clone())
    }

    pub async fn is_metadata_only(&self, key: &str) -> bool {
        let inner = self.inner.lock().await;
        inner
            .entries
            .get(key)
            .is_some_and(|e| e.mode == ScrapeMode::MetadataOnly)
    }

    /// Total number of known keys, terminal or not.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.entries.is_empty()
    }

    /// Entries waiting in the queue (stale keys excluded).
    pub async fn queued_count(&self) -> usize {
        let inner = self.inner.lock().await;
        inner
            .queue
            .iter()
            .filter(|k| {
                inner
                    .entries
                    .get(*k)
                    .is_some_and(|e| e.status == LinkStatus::Queued)
            })
            .count()
    }

    /// Queued plus in-flight entries.
    pub async fn pending_count(&self) -> usize {
        let queued = self.queued_count().await;
        queued + self.inner.lock().await.in_flight.len()
    }

    /// Whether any work remains to dispatch or await.
    pub async fn has_work(&self) -> bool {
        self.pending_count().await > 0
    }

    /// Snapshot one entry by dedup key.
    pub async fn entry(&self, key: &str) -> Option<LinkEntry> {
        self.inner.lock().await.entries.get(key).cloned()
    }

    /// Record a referrer edge for a target that is not being enqueued
    /// (an external anchor the crawl will not fetch).
    pub async fn note_referrer(&self, url: &CanonicalUrl, edge: ReferrerEdge) {
        let key = url.dedup_key();
        self.inner
            .lock()
            .await
            .referrers
            .entry(key)
            .or_default()
            .push(edge);
    }

    /// Incoming referrer edges recorded for a dedup key.
    pub async fn referrers_of(&self, key: &str) -> Vec<ReferrerEdge> {
        self.inner
            .lock()
            .await
            .referrers
            .get(key)
            .cloned()
            .unwrap_or_default()
    }
}

fn upgrade_in_place(existing: &mut LinkEntry, requested: ScrapeMode) -> AddOutcome {
    if existing.status == LinkStatus::Queued
        && existing.mode == ScrapeMode::MetadataOnly
        && requested == ScrapeMode::Full
    {
        existing.mode = ScrapeMode::Full;
        return AddOutcome::Upgraded;
    }
    AddOutcome::Known
}

/// Shape signature: host, path arity, and query key set. Two URLs with
/// the same signature are candidates for pagination pairing.
fn shape_signature(url: &CanonicalUrl) -> String {
    let keys: Vec<String> = url.sorted_query().into_iter().map(|(k, _)| k).collect();
    format!(
        "{}|{}|{}",
        url.host_key(),
        url.segments().len(),
        keys.join(",")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exclude::ExclusionFilter;
    use crate::robots::RobotsGate;
    use crate::scope::ScopeSet;

    fn list_with_scope(scope_urls: &[&str]) -> LinkList {
        let scope_owned: Vec<String> = scope_urls.iter().map(ToString::to_string).collect();
        let scope = ScopeSet::from_urls(&scope_owned, false).unwrap();
        let exclude = ExclusionFilter::new(&[], &[], &[]).unwrap();
        let robots = Arc::new(RobotsGate::new("sitescan-test", false).unwrap());
        LinkList::new(Arc::new(Admission::new(scope, exclude, robots, 10)), 1)
    }

    fn url(s: &str) -> CanonicalUrl {
        CanonicalUrl::parse(s).unwrap()
    }

    #[tokio::test]
    async fn add_take_done_round_trip() {
        let list = list_with_scope(&["http://h.example/"]);
        let u = url("http://h.example/page");
        let outcome = list
            .add(&u, ScrapeMode::Full, Discovery::Seed, 0, None)
            .await;
        assert!(matches!(outcome, AddOutcome::Queued { .. }));
        assert_eq!(list.pending_count().await, 1);

        let taken = list.take().await.unwrap();
        assert_eq!(taken.status, LinkStatus::InFlight);
        assert!(list.take().await.is_none());

        list.done(&u, None).await.unwrap();
        assert!(!list.has_work().await);
    }

    #[tokio::test]
    async fn scheme_variants_collapse_to_one_entry() {
        let list = list_with_scope(&["http://h.example/"]);
        let first = list
            .add(
                &url("http://h.example/"),
                ScrapeMode::Full,
                Discovery::Seed,
                0,
                None,
            )
            .await;
        assert!(matches!(first, AddOutcome::Queued { .. }));
        let second = list
            .add(
                &url("https://h.example/"),
                ScrapeMode::Full,
                Discovery::Seed,
                0,
                None,
            )
            .await;
        assert!(matches!(second, AddOutcome::Known));
        assert_eq!(list.len().await, 1);
    }

    #[tokio::test]
    async fn metadata_upgrades_to_full_but_never_back() {
        let list = list_with_scope(&["http://h.example/"]);
        let u = url("http://h.example/doc");
        list.add(&u, ScrapeMode::MetadataOnly, Discovery::Anchor, 1, None)
            .await;
        let upgraded = list
            .add(&u, ScrapeMode::Full, Discovery::Anchor, 1, None)
            .await;
        assert!(matches!(upgraded, AddOutcome::Upgraded));
        let again = list
            .add(&u, ScrapeMode::MetadataOnly, Discovery::Anchor, 1, None)
            .await;
        assert!(matches!(again, AddOutcome::Known));
        assert!(!list.is_metadata_only(&u.dedup_key()).await);
    }

    #[tokio::test]
    async fn add_after_done_is_a_noop() {
        let list = list_with_scope(&["http://h.example/"]);
        let u = url("http://h.example/page");
        list.add(&u, ScrapeMode::Full, Discovery::Seed, 0, None)
            .await;
        list.take().await.unwrap();
        list.done(&u, None).await.unwrap();

        let outcome = list
            .add(&u, ScrapeMode::Full, Discovery::Anchor, 1, None)
            .await;
        assert!(matches!(outcome, AddOutcome::Known));
        assert!(!list.has_work().await);
    }

    #[tokio::test]
    async fn retry_bounded_by_limit() {
        let list = list_with_scope(&["http://h.example/"]);
        let u = url("http://h.example/flaky");
        list.add(&u, ScrapeMode::Full, Discovery::Seed, 0, None)
            .await;
        list.take().await.unwrap();

        assert_eq!(list.retry(&u).await, RetryDecision::Requeued);
        list.take().await.unwrap();
        assert_eq!(list.retry(&u).await, RetryDecision::Exhausted);
    }

    #[tokio::test]
    async fn referrer_edges_recorded_even_for_rejected_targets() {
        let scope_owned = vec!["http://h.example/".to_string()];
        let scope = ScopeSet::from_urls(&scope_owned, false).unwrap();
        let exclude =
            ExclusionFilter::new(&[], &["http://h.example/secret".to_string()], &[]).unwrap();
        let robots = Arc::new(RobotsGate::new("sitescan-test", false).unwrap());
        let list = LinkList::new(Arc::new(Admission::new(scope, exclude, robots, 10)), 0);

        let u = url("http://h.example/secret/x");
        let edge = ReferrerEdge {
            from: "http://h.example/".into(),
            to: u.without_hash(),
            text: "secret".into(),
            through: u.without_hash(),
        };
        let outcome = list
            .add(&u, ScrapeMode::Full, Discovery::Anchor, 1, Some(edge))
            .await;
        assert!(matches!(
            outcome,
            AddOutcome::Rejected(RejectReason::Excluded)
        ));
        assert_eq!(list.referrers_of(&u.dedup_key()).await.len(), 1);
        let entry = list.entry(&u.dedup_key()).await.unwrap();
        assert_eq!(entry.status, LinkStatus::Skipped);
        assert!(!list.has_work().await);
    }

    #[tokio::test]
    async fn predecessor_tracks_same_shape_urls() {
        let list = list_with_scope(&["http://h.example/"]);
        let first = url("http://h.example/p/page/1");
        let second = url("http://h.example/p/page/2");
        let different = url("http://h.example/about");

        let o1 = list
            .add(&first, ScrapeMode::Full, Discovery::Anchor, 1, None)
            .await;
        let AddOutcome::Queued { predecessor } = o1 else {
            panic!("expected queue")
        };
        assert!(predecessor.is_none());

        // different shape does not disturb the chain
        list.add(&different, ScrapeMode::Full, Discovery::Anchor, 1, None)
            .await;

        let o2 = list
            .add(&second, ScrapeMode::Full, Discovery::Anchor, 1, None)
            .await;
        let AddOutcome::Queued { predecessor } = o2 else {
            panic!("expected queue")
        };
        assert_eq!(predecessor.unwrap(), first);
    }
}
