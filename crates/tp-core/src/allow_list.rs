//! Per-consumer allow/shim rules
//!
//! An [`AllowList`] carries up to two rule sets. Each is built as a whole
//! new value and swapped in, so a decision never sees a half-updated
//! list.

use std::collections::HashSet;

use crate::pattern::{MatchPatternSet, PatternError};
use crate::url::ParsedUrl;

fn host_set<H>(hosts: H) -> HashSet<String>
where
    H: IntoIterator,
    H::Item: AsRef<str>,
{
    hosts
        .into_iter()
        .map(|h| h.as_ref().to_ascii_lowercase())
        .collect()
}

fn pattern_list<P>(patterns: P) -> Vec<String>
where
    P: IntoIterator,
    P::Item: AsRef<str>,
{
    patterns.into_iter().map(|p| p.as_ref().to_string()).collect()
}

// =============================================================================
// Rule Sets
// =============================================================================

/// Shim rules: match the patterns unless the top-level host is excluded.
#[derive(Debug, Clone)]
pub struct ShimRules {
    patterns: Vec<String>,
    matcher: MatchPatternSet,
    not_hosts: HashSet<String>,
}

impl ShimRules {
    pub fn new<P, H>(patterns: P, not_hosts: H) -> Result<Self, PatternError>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        H: IntoIterator,
        H::Item: AsRef<str>,
    {
        let patterns = pattern_list(patterns);
        let matcher = MatchPatternSet::new(&patterns)?;
        Ok(Self {
            patterns,
            matcher,
            not_hosts: host_set(not_hosts),
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn not_hosts(&self) -> &HashSet<String> {
        &self.not_hosts
    }

    #[inline]
    fn applies(&self, url: &ParsedUrl, top_host: &str) -> bool {
        self.matcher.matches_parsed(url) && !self.not_hosts.contains(top_host)
    }
}

/// Allow rules: match the patterns only on explicitly listed top-level hosts.
#[derive(Debug, Clone)]
pub struct AllowRules {
    patterns: Vec<String>,
    matcher: MatchPatternSet,
    hosts: HashSet<String>,
}

impl AllowRules {
    pub fn new<P, H>(patterns: P, hosts: H) -> Result<Self, PatternError>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        H: IntoIterator,
        H::Item: AsRef<str>,
    {
        let patterns = pattern_list(patterns);
        let matcher = MatchPatternSet::new(&patterns)?;
        Ok(Self {
            patterns,
            matcher,
            hosts: host_set(hosts),
        })
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn hosts(&self) -> &HashSet<String> {
        &self.hosts
    }

    #[inline]
    fn applies(&self, url: &ParsedUrl, top_host: &str) -> bool {
        // Empty include-list means no host qualifies
        self.hosts.contains(top_host) && self.matcher.matches_parsed(url)
    }
}

// =============================================================================
// Allow List
// =============================================================================

/// The rule bundle registered by one consumer.
///
/// Either rule set is `None` until first configured; that behaves like a
/// configured set that matches nothing.
#[derive(Debug, Clone)]
pub struct AllowList {
    id: String,
    shim: Option<ShimRules>,
    allow: Option<AllowRules>,
}

impl AllowList {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            shim: None,
            allow: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replace the shim rules. On a compile error the old rules stay.
    pub fn set_shims<P, H>(&mut self, patterns: P, not_hosts: H) -> Result<&mut Self, PatternError>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        H: IntoIterator,
        H::Item: AsRef<str>,
    {
        self.shim = Some(ShimRules::new(patterns, not_hosts)?);
        Ok(self)
    }

    /// Replace the allow rules. On a compile error the old rules stay.
    pub fn set_allows<P, H>(&mut self, patterns: P, hosts: H) -> Result<&mut Self, PatternError>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        H: IntoIterator,
        H::Item: AsRef<str>,
    {
        self.allow = Some(AllowRules::new(patterns, hosts)?);
        Ok(self)
    }

    pub fn shim_rules(&self) -> Option<&ShimRules> {
        self.shim.as_ref()
    }

    pub fn allow_rules(&self) -> Option<&AllowRules> {
        self.allow.as_ref()
    }

    /// Does this list shim `url` when loaded under `top_host`?
    pub fn shims(&self, url: &str, top_host: &str) -> bool {
        ParsedUrl::parse(url).map_or(false, |url| self.shims_parsed(&url, top_host))
    }

    /// Does this list allow `url` when loaded under `top_host`?
    pub fn allows(&self, url: &str, top_host: &str) -> bool {
        ParsedUrl::parse(url).map_or(false, |url| self.allows_parsed(&url, top_host))
    }

    #[inline]
    pub fn shims_parsed(&self, url: &ParsedUrl, top_host: &str) -> bool {
        self.shim.as_ref().map_or(false, |rules| rules.applies(url, top_host))
    }

    #[inline]
    pub fn allows_parsed(&self, url: &ParsedUrl, top_host: &str) -> bool {
        self.allow.as_ref().map_or(false, |rules| rules.applies(url, top_host))
    }
}
