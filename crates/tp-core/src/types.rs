//! Core type definitions for the shim engine
//!
//! These types describe the events the host's classifier emits and the
//! verdicts the engine hands back.

// =============================================================================
// Identifiers
// =============================================================================

/// Internal identifier of one in-flight network request.
pub type ChannelId = u64;

/// Request id as seen by a calling consumer (webRequest-style).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestHandle(pub u64);

impl From<u64> for RequestHandle {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

// =============================================================================
// Scheme Masks
// =============================================================================

bitflags::bitflags! {
    /// URL scheme mask for match patterns.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct SchemeMask: u8 {
        const HTTP = 1 << 0;
        const HTTPS = 1 << 1;
        const WS = 1 << 2;
        const WSS = 1 << 3;
        const DATA = 1 << 4;
        const FTP = 1 << 5;
        const FILE = 1 << 6;
        /// What a `*://` pattern covers
        const WILDCARD = Self::HTTP.bits() | Self::HTTPS.bits() | Self::WS.bits() | Self::WSS.bits();
        /// What `<all_urls>` covers
        const ALL = 0x7F;
    }
}

impl SchemeMask {
    /// Parse a lowercase scheme name. Unknown schemes yield `None`.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "http" => Some(Self::HTTP),
            "https" => Some(Self::HTTPS),
            "ws" => Some(Self::WS),
            "wss" => Some(Self::WSS),
            "data" => Some(Self::DATA),
            "ftp" => Some(Self::FTP),
            "file" => Some(Self::FILE),
            _ => None,
        }
    }
}

// =============================================================================
// Classifier Events
// =============================================================================

/// Topics the manager listens to on the host's event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// A request finished, whatever the outcome.
    StopRequest,
    /// The classifier is about to block a request.
    BeforeBlockChannel,
}

impl Topic {
    pub const ALL: [Topic; 2] = [Topic::StopRequest, Topic::BeforeBlockChannel];
}

/// A request the classifier intends to block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedChannel {
    pub channel_id: ChannelId,
    /// Request URL
    pub url: String,
    /// URL of the top-level document that initiated the request
    pub top_level_url: String,
}

impl BlockedChannel {
    pub fn new(channel_id: ChannelId, url: impl Into<String>, top_level_url: impl Into<String>) -> Self {
        Self {
            channel_id,
            url: url.into(),
            top_level_url: top_level_url.into(),
        }
    }
}

/// An event delivered by the host.
#[derive(Debug, Clone, Copy)]
pub enum ClassifierEvent<'a> {
    RequestStopped { channel_id: ChannelId },
    BeforeBlockChannel(&'a BlockedChannel),
}

impl ClassifierEvent<'_> {
    pub fn topic(&self) -> Topic {
        match self {
            Self::RequestStopped { .. } => Topic::StopRequest,
            Self::BeforeBlockChannel(_) => Topic::BeforeBlockChannel,
        }
    }
}

// =============================================================================
// Verdicts
// =============================================================================

/// Instruction for the network layer when a block is lifted.
///
/// Handlers return `Option<Unblock>`; `None` leaves the block in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unblock {
    /// Proceed with a substituted (shimmed) response
    Replace,
    /// Proceed unmodified
    Allow,
}

impl Unblock {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Allow => "allow",
        }
    }
}
