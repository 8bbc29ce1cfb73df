//! URL -> archive path derivation.
//!
//! Every HTML snapshot path is derived here and nowhere else. A URL
//! that would escape the snapshot root is a hard error, not a warning.

use std::path::PathBuf;

use crate::canonical::CanonicalUrl;

use super::ArchiveError;

/// Longest file name component the archive will write directly; longer
/// names go through the `__file_path_too_long_NNNN` fallback.
pub const MAX_COMPONENT_LEN: usize = 200;

/// Derive the relative snapshot path for a page URL.
///
/// `http://h/a/b?q=1` becomes `h/a/b_q=1.html`; a directory-style URL
/// gains an `index.html` leaf. Returns [`ArchiveError::UnsafePath`] on
/// any traversal attempt.
pub fn safe_path(url: &CanonicalUrl) -> Result<PathBuf, ArchiveError> {
    let host = url
        .host_str()
        .ok_or_else(|| ArchiveError::UnsafePath(url.to_string()))?;
    let host_dir = match url.port() {
        Some(port) => format!("{host}_{port}"),
        None => host.to_string(),
    };

    let raw_segments = url.segments();
    for segment in &raw_segments {
        if is_traversal(segment) {
            return Err(ArchiveError::UnsafePath(url.to_string()));
        }
    }

    let trailing_dir = url.path().ends_with('/') || raw_segments.is_empty();

    let mut path = PathBuf::from(sanitize(&host_dir));
    let (dirs, leaf) = if trailing_dir {
        (raw_segments.as_slice(), None)
    } else {
        let (last, init) = raw_segments.split_last().expect("non-empty segments");
        (init, Some(last.clone()))
    };
    for dir in dirs {
        path.push(sanitize(dir));
    }

    let mut stem = leaf.unwrap_or_else(|| "index".to_string());
    if let Some(query) = url.query() {
        stem.push('_');
        stem.push_str(query);
    }
    let mut file = sanitize(&stem);
    if !file.contains('.') || file.ends_with('.') {
        file.push_str(".html");
    } else if url.query().is_some() {
        // a query suffix hides the real extension; make it explicit
        file.push_str(".html");
    }
    path.push(file);

    Ok(path)
}

/// Whether the derived path needs the long-name fallback.
#[must_use]
pub fn exceeds_component_limit(path: &std::path::Path) -> bool {
    path.components()
        .any(|c| c.as_os_str().len() > MAX_COMPONENT_LEN)
}

/// File name used in place of an over-long derived path.
#[must_use]
pub fn fallback_name(counter: u32) -> String {
    format!("__file_path_too_long_{counter:04}.html")
}

fn sanitize(component: &str) -> String {
    let cleaned = sanitize_filename::sanitize(component);
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

fn is_traversal(segment: &str) -> bool {
    // percent-decoded dots count as dots
    let decoded = segment
        .replace("%2e", ".")
        .replace("%2E", ".")
        .replace("%2f", "/")
        .replace("%2F", "/");
    decoded == ".." || decoded == "." || decoded.contains("../") || decoded.contains("/..")
}
