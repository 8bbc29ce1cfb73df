//! URL exclusion rules: globs, prefixes, and keywords.
//!
//! Patterns are compiled once at construction to keep the admission
//! hot path free of regex compilation. The filter is pure; callers
//! cache its verdict alongside the frontier entry.

use anyhow::{Result, anyhow};
use regex::Regex;

use crate::canonical::CanonicalUrl;

/// Compile a glob pattern into an anchored regex (`*` matches any run).
fn compile_glob_pattern(pattern: &str) -> Result<Regex> {
    let escaped = regex::escape(pattern).replace("\\*", ".*");
    let anchored = format!("^{escaped}$");
    Regex::new(&anchored).map_err(|e| anyhow!("invalid glob pattern '{pattern}': {e}"))
}

/// Decides whether a URL is excluded from crawling.
#[derive(Debug, Default)]
pub struct ExclusionFilter {
    globs: Vec<Regex>,
    prefixes: Vec<String>,
    keywords: Vec<String>,
}

impl ExclusionFilter {
    /// Build the filter from crawler options.
    ///
    /// `prefixes` are full URLs; they are canonicalized to
    /// protocol-agnostic keys so `http://h/secret` also shadows
    /// `https://h/secret/...`.
    pub fn new(globs: &[String], prefixes: &[String], keywords: &[String]) -> Result<Self> {
        let globs = globs
            .iter()
            .map(|p| compile_glob_pattern(p))
            .collect::<Result<Vec<_>>>()?;
        let prefixes = prefixes
            .iter()
            .map(|p| {
                CanonicalUrl::parse(p)
                    .map(|u| u.dedup_key())
                    .unwrap_or_else(|_| p.clone())
            })
            .collect();
        Ok(Self {
            globs,
            prefixes,
            keywords: keywords.to_vec(),
        })
    }

    /// True iff any glob matches the normalized URL, any prefix matches
    /// its protocol-agnostic key, or any keyword occurs in it.
    #[must_use]
    pub fn is_excluded(&self, url: &CanonicalUrl) -> bool {
        let normalized = url.without_hash();
        if self.globs.iter().any(|g| g.is_match(&normalized)) {
            return true;
        }
        let key = url.dedup_key();
        if self.prefixes.iter().any(|p| key.starts_with(p.as_str())) {
            return true;
        }
        self.keywords.iter().any(|k| normalized.contains(k))
    }
}
