//! Pagination detection and speculative URL generation.
//!
//! When two consecutively enqueued URLs differ in exactly one token and
//! both values are integers stepping upward, the crawler assumes a
//! paginated listing and enqueues the next few pages ahead of
//! discovery. Tokens are the path segments followed by the query values
//! in key-sorted order, so `?page=2` and `/page/2` both qualify.

use log::debug;

use crate::canonical::CanonicalUrl;

/// A detected single-token numeric progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationPattern {
    /// Index into the token vector (path segments, then sorted query
    /// values) of the advancing number.
    pub token_index: usize,
    /// Increment per page; always positive.
    pub step: i64,
    /// The number in the current URL.
    pub current: i64,
}

fn tokens(url: &CanonicalUrl) -> Vec<String> {
    let mut out = url.segments();
    out.extend(url.sorted_query().into_iter().map(|(_, v)| v));
    out
}

/// Compare a URL against its predecessor of the same shape.
///
/// Requires the same host and port, the same path arity, the same query
/// key set in the same order, exactly one differing token, and both
/// values parsing as integers with a positive step. Anything else is
/// not pagination.
#[must_use]
pub fn detect(prev: &CanonicalUrl, curr: &CanonicalUrl) -> Option<PaginationPattern> {
    if prev.host_key() != curr.host_key() {
        return None;
    }
    if prev.segments().len() != curr.segments().len() {
        return None;
    }
    let prev_keys: Vec<String> = prev.sorted_query().into_iter().map(|(k, _)| k).collect();
    let curr_keys: Vec<String> = curr.sorted_query().into_iter().map(|(k, _)| k).collect();
    if prev_keys != curr_keys {
        return None;
    }

    let prev_tokens = tokens(prev);
    let curr_tokens = tokens(curr);

    let mut differing = None;
    for (i, (a, b)) in prev_tokens.iter().zip(&curr_tokens).enumerate() {
        if a != b {
            if differing.is_some() {
                return None;
            }
            differing = Some(i);
        }
    }
    let token_index = differing?;

    let prev_num: i64 = prev_tokens[token_index].parse().ok()?;
    let current: i64 = curr_tokens[token_index].parse().ok()?;
    let step = current.checked_sub(prev_num)?;
    if step <= 0 {
        return None;
    }

    debug!(
        target: "sitescan::pagination",
        "pattern at token {token_index} (step {step}): {curr}"
    );
    Some(PaginationPattern {
        token_index,
        step,
        current,
    })
}

/// Generate the next `count` URLs of a detected pattern.
///
/// Numbers that fail to substitute back into a valid URL are dropped
/// silently; admission decides the rest.
#[must_use]
pub fn predict(curr: &CanonicalUrl, pattern: &PaginationPattern, count: usize) -> Vec<CanonicalUrl> {
    (1..=count as i64)
        .filter_map(|k| {
            let value = pattern.current.checked_add(k.checked_mul(pattern.step)?)?;
            substitute(curr, pattern.token_index, value)
        })
        .collect()
}

fn substitute(url: &CanonicalUrl, token_index: usize, value: i64) -> Option<CanonicalUrl> {
    let mut segments = url.segments();
    if token_index < segments.len() {
        segments[token_index] = value.to_string();
        return url.with_segments(&segments).ok();
    }

    let sorted = url.sorted_query();
    let (target_key, _) = sorted.get(token_index - segments.len())?;
    let mut pairs = url.query_pairs_vec();
    let slot = pairs.iter_mut().find(|(k, _)| k == target_key)?;
    slot.1 = value.to_string();
    url.with_query_pairs(&pairs).ok()
}
