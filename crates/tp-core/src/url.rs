//! URL helpers for decision evaluation
//!
//! Thin views over `url::Url` exposing just the pieces the matcher and
//! the manager need: scheme, hostname, and path-with-query.

use url::{Position, Url};

use crate::types::SchemeMask;

// =============================================================================
// Parsed URL
// =============================================================================

/// A request URL broken into the parts match patterns test against.
#[derive(Debug, Clone)]
pub struct ParsedUrl {
    inner: Url,
}

impl ParsedUrl {
    /// Parse an absolute URL. Returns `None` if it does not parse.
    pub fn parse(url: &str) -> Option<Self> {
        Url::parse(url).ok().map(|inner| Self { inner })
    }

    /// Scheme mask, or `None` for schemes patterns cannot name.
    #[inline]
    pub fn scheme(&self) -> Option<SchemeMask> {
        SchemeMask::from_scheme(self.inner.scheme())
    }

    /// Lowercased hostname; empty for host-less URLs (`file:`, `data:`).
    #[inline]
    pub fn host(&self) -> &str {
        self.inner.host_str().unwrap_or("")
    }

    /// Path plus query (`/a/b?x=1`), excluding the fragment.
    #[inline]
    pub fn path_and_query(&self) -> &str {
        &self.inner[Position::BeforePath..Position::AfterQuery]
    }
}

// =============================================================================
// Host Extraction
// =============================================================================

/// Hostname of a top-level document URL.
///
/// `None` means the URL failed to parse; callers leave the block in
/// effect. URLs without an authority (`about:blank`) yield an empty host.
pub fn top_level_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    Some(parsed.host_str().unwrap_or("").to_string())
}
