//! Match Pattern Compiler
//!
//! Compiles WebExtension-style match patterns (`*://*.example.com/path/*`,
//! `<all_urls>`) into a small structure that tests URLs without
//! allocating: a scheme mask, a host rule, and a path glob split into
//! literal pieces around `*`.

use crate::types::SchemeMask;
use crate::url::ParsedUrl;

const ALL_URLS: &str = "<all_urls>";
const SCHEME_SEPARATOR: &str = "://";

/// Error type for pattern compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("Missing '://' in pattern: {0}")]
    MissingSchemeSeparator(String),
    #[error("Unsupported scheme '{scheme}' in pattern: {pattern}")]
    UnsupportedScheme { scheme: String, pattern: String },
    #[error("Missing host in pattern: {0}")]
    MissingHost(String),
    #[error("Invalid host in pattern: {0}")]
    InvalidHost(String),
    #[error("Missing path in pattern: {0}")]
    MissingPath(String),
}

// =============================================================================
// Host Rule
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
enum HostRule {
    /// `*`
    Any,
    /// `*.example.com`: the domain itself and every subdomain
    Domain(String),
    /// `example.com`
    Exact(String),
}

impl HostRule {
    fn parse(host: &str, pattern: &str) -> Result<Self, PatternError> {
        if host == "*" {
            return Ok(Self::Any);
        }

        let invalid = || PatternError::InvalidHost(pattern.to_string());

        // Ports are not part of a match pattern; bracketed IPv6 is fine
        if host.contains(':') && !host.starts_with('[') {
            return Err(invalid());
        }
        if host.contains(|c: char| c.is_ascii_whitespace() || c == '@') {
            return Err(invalid());
        }

        if let Some(domain) = host.strip_prefix("*.") {
            if domain.is_empty() || domain.contains('*') {
                return Err(invalid());
            }
            return Ok(Self::Domain(domain.to_ascii_lowercase()));
        }

        if host.contains('*') {
            return Err(invalid());
        }

        Ok(Self::Exact(host.to_ascii_lowercase()))
    }

    #[inline]
    fn matches(&self, host: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Exact(expected) => host == expected,
            Self::Domain(domain) => {
                host == domain
                    || (host.len() > domain.len()
                        && host.ends_with(domain.as_str())
                        && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
            }
        }
    }
}

// =============================================================================
// Path Glob
// =============================================================================

/// Literal pieces of a path glob. `pieces.len() == 1` means no wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
struct PathGlob {
    pieces: Vec<String>,
}

impl PathGlob {
    fn new(glob: &str) -> Self {
        Self {
            pieces: glob.split('*').map(str::to_string).collect(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        let (first, rest) = match self.pieces.split_first() {
            Some(split) => split,
            None => return true,
        };
        let (last, middle) = match rest.split_last() {
            Some(split) => split,
            None => return text == first,
        };

        if text.len() < first.len() + last.len()
            || !text.starts_with(first.as_str())
            || !text.ends_with(last.as_str())
        {
            return false;
        }

        // Leftmost placement of each middle piece is always safe for `*`-only globs
        let mut window = &text[first.len()..text.len() - last.len()];
        for piece in middle {
            match window.find(piece.as_str()) {
                Some(pos) => window = &window[pos + piece.len()..],
                None => return false,
            }
        }
        true
    }
}

// =============================================================================
// Match Pattern
// =============================================================================

/// One compiled match pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPattern {
    source: String,
    schemes: SchemeMask,
    host: HostRule,
    /// `None` matches any path (only for `<all_urls>`)
    path: Option<PathGlob>,
}

impl MatchPattern {
    /// Compile a single pattern.
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if pattern == ALL_URLS {
            return Ok(Self {
                source: pattern.to_string(),
                schemes: SchemeMask::ALL,
                host: HostRule::Any,
                path: None,
            });
        }

        let sep = pattern
            .find(SCHEME_SEPARATOR)
            .ok_or_else(|| PatternError::MissingSchemeSeparator(pattern.to_string()))?;
        let scheme = &pattern[..sep];
        let rest = &pattern[sep + SCHEME_SEPARATOR.len()..];

        let schemes = if scheme == "*" {
            SchemeMask::WILDCARD
        } else {
            SchemeMask::from_scheme(&scheme.to_ascii_lowercase())
                .filter(|mask| *mask != SchemeMask::DATA)
                .ok_or_else(|| PatternError::UnsupportedScheme {
                    scheme: scheme.to_string(),
                    pattern: pattern.to_string(),
                })?
        };

        let path_start = rest
            .find('/')
            .ok_or_else(|| PatternError::MissingPath(pattern.to_string()))?;
        let host = &rest[..path_start];
        let path = &rest[path_start..];

        let host = if schemes == SchemeMask::FILE {
            if !host.is_empty() {
                return Err(PatternError::InvalidHost(pattern.to_string()));
            }
            HostRule::Any
        } else {
            if host.is_empty() {
                return Err(PatternError::MissingHost(pattern.to_string()));
            }
            HostRule::parse(host, pattern)?
        };

        Ok(Self {
            source: pattern.to_string(),
            schemes,
            host,
            path: Some(PathGlob::new(path)),
        })
    }

    /// The pattern text this was compiled from.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Test an already-parsed URL.
    pub fn matches_parsed(&self, url: &ParsedUrl) -> bool {
        let scheme = match url.scheme() {
            Some(scheme) => scheme,
            None => return false,
        };
        if !self.schemes.contains(scheme) {
            return false;
        }
        if !self.host.matches(url.host()) {
            return false;
        }
        match &self.path {
            Some(glob) => glob.matches(url.path_and_query()),
            None => true,
        }
    }
}

// =============================================================================
// Match Pattern Set
// =============================================================================

/// A compiled, immutable set of match patterns.
///
/// An empty set matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchPatternSet {
    patterns: Vec<MatchPattern>,
}

impl MatchPatternSet {
    /// Compile every pattern, failing on the first invalid one.
    pub fn new<I, S>(patterns: I) -> Result<Self, PatternError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| MatchPattern::parse(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn patterns(&self) -> &[MatchPattern] {
        &self.patterns
    }

    /// Does any pattern match `url`? Unparseable URLs never match.
    pub fn matches(&self, url: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        match ParsedUrl::parse(url) {
            Some(parsed) => self.matches_parsed(&parsed),
            None => false,
        }
    }

    pub fn matches_parsed(&self, url: &ParsedUrl) -> bool {
        self.patterns.iter().any(|p| p.matches_parsed(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> MatchPatternSet {
        MatchPatternSet::new(patterns).unwrap()
    }

    #[test]
    fn test_wildcard_scheme() {
        let s = set(&["*://track.example/*"]);
        assert!(s.matches("https://track.example/a"));
        assert!(s.matches("http://track.example/"));
        assert!(s.matches("wss://track.example/socket"));
        assert!(!s.matches("ftp://track.example/a"));
        assert!(!s.matches("https://other.example/a"));
        assert!(!s.matches("https://sub.track.example/a"));
    }

    #[test]
    fn test_subdomain_host() {
        let s = set(&["https://*.example.com/*"]);
        assert!(s.matches("https://example.com/"));
        assert!(s.matches("https://a.b.example.com/x"));
        assert!(!s.matches("https://badexample.com/"));
        assert!(!s.matches("http://example.com/"));
    }

    #[test]
    fn test_path_glob() {
        let s = set(&["*://cdn.example/lib/*.js"]);
        assert!(s.matches("https://cdn.example/lib/a.js"));
        assert!(s.matches("https://cdn.example/lib/x/y.js"));
        assert!(!s.matches("https://cdn.example/lib/a.css"));
        assert!(!s.matches("https://cdn.example/other/a.js"));

        let exact = set(&["*://cdn.example/ads.js"]);
        assert!(exact.matches("https://cdn.example/ads.js"));
        assert!(!exact.matches("https://cdn.example/ads.js?v=1"));

        let middle = set(&["*://cdn.example/*/track/*"]);
        assert!(middle.matches("https://cdn.example/v1/track/pixel"));
        assert!(!middle.matches("https://cdn.example/v1/pixel"));
    }

    #[test]
    fn test_path_glob_does_not_overlap() {
        let s = set(&["*://cdn.example/ab*ba"]);
        assert!(!s.matches("https://cdn.example/aba"));
        assert!(s.matches("https://cdn.example/abba"));
    }

    #[test]
    fn test_query_matched_fragment_ignored() {
        let s = set(&["*://cdn.example/*?id=*"]);
        assert!(s.matches("https://cdn.example/p?id=3#top"));
        assert!(!s.matches("https://cdn.example/p#?id=3"));
    }

    #[test]
    fn test_host_case_and_port() {
        let s = set(&["*://Track.Example/*"]);
        assert!(s.matches("https://TRACK.example:444/a"));
    }

    #[test]
    fn test_all_urls() {
        let s = set(&["<all_urls>"]);
        assert!(s.matches("https://a.example/"));
        assert!(s.matches("ftp://a.example/f"));
        assert!(s.matches("data:text/plain,hi"));
        assert!(!s.matches("chrome://settings/"));
    }

    #[test]
    fn test_file_scheme() {
        let s = set(&["file:///home/*"]);
        assert!(s.matches("file:///home/user/a.html"));
        assert!(!s.matches("file:///etc/passwd"));
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        let s = MatchPatternSet::new(Vec::<String>::new()).unwrap();
        assert!(s.is_empty());
        assert!(!s.matches("https://a.example/"));
    }

    #[test]
    fn test_unparseable_url_never_matches() {
        let s = set(&["<all_urls>"]);
        assert!(!s.matches("not a url"));
    }

    #[test]
    fn test_invalid_patterns() {
        assert!(matches!(
            MatchPattern::parse("track.example/*"),
            Err(PatternError::MissingSchemeSeparator(_))
        ));
        assert!(matches!(
            MatchPattern::parse("gopher://track.example/*"),
            Err(PatternError::UnsupportedScheme { .. })
        ));
        assert!(matches!(
            MatchPattern::parse("https://track.example"),
            Err(PatternError::MissingPath(_))
        ));
        assert!(matches!(MatchPattern::parse("https:///a"), Err(PatternError::MissingHost(_))));
        assert!(matches!(
            MatchPattern::parse("https://tr*ck.example/*"),
            Err(PatternError::InvalidHost(_))
        ));
        assert!(matches!(
            MatchPattern::parse("https://*.*.example/*"),
            Err(PatternError::InvalidHost(_))
        ));
        assert!(matches!(
            MatchPattern::parse("https://track.example:80/*"),
            Err(PatternError::InvalidHost(_))
        ));
        assert!(matches!(
            MatchPattern::parse("file://host/a"),
            Err(PatternError::InvalidHost(_))
        ));
    }

    #[test]
    fn test_set_fails_on_first_invalid() {
        let err = MatchPatternSet::new(["*://ok.example/*", "bad", "also bad"]).unwrap_err();
        assert_eq!(err, PatternError::MissingSchemeSeparator("bad".to_string()));
    }

    #[test]
    fn test_source_preserved() {
        let p = MatchPattern::parse("*://track.example/*").unwrap();
        assert_eq!(p.as_str(), "*://track.example/*");
    }
}
