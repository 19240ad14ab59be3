//! Prefix extraction and path rewriting.
//!
//! # Responsibilities
//! - Pull the routing segment off the front of a request path
//! - Rebuild the path the backend sees, without the segment
//!
//! # Design Decisions
//! - Matching is exact and case-sensitive on the first non-empty segment
//! - The remainder is kept byte-for-byte (inner and trailing slashes included)
//! - The query string is carried over untouched

use axum::http::uri::{InvalidUri, PathAndQuery};

/// A path split into its routing segment and the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefixMatch<'a> {
    /// First non-empty path segment.
    pub segment: &'a str,
    /// Path after the segment, always starting with `/`.
    pub rest: &'a str,
}

impl PrefixMatch<'_> {
    /// Path forwarded to the backend: the remainder, or `/` when empty.
    pub fn rewritten_path(&self) -> &str {
        if self.rest.is_empty() {
            "/"
        } else {
            self.rest
        }
    }
}

/// Split `path` into its first segment and the rest.
///
/// Returns `None` when the path has no segment at all (e.g. `/`).
pub fn split_prefix(path: &str) -> Option<PrefixMatch<'_>> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return None;
    }

    match trimmed.find('/') {
        Some(idx) => Some(PrefixMatch {
            segment: &trimmed[..idx],
            rest: &trimmed[idx..],
        }),
        None => Some(PrefixMatch {
            segment: trimmed,
            rest: "",
        }),
    }
}

/// Combine a rewritten path with the original query, if any.
pub fn with_query(path: &str, query: Option<&str>) -> Result<PathAndQuery, InvalidUri> {
    match query {
        Some(q) => format!("{path}?{q}").parse(),
        None => path.parse(),
    }
}
