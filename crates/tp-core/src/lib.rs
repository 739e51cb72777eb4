//! Tracking-Protection Shim Engine
//!
//! Decides whether a request the tracking-protection classifier is about
//! to block should be shimmed (replaced by a local substitute), allowed,
//! or left blocked, based on pattern lists registered by consumers.
//!
//! # Architecture
//!
//! The host owns the classifier and the network stack. It delivers two
//! kinds of events to a [`ClassificationManager`]: "about to block" and
//! "request stopped". The manager walks the registered [`AllowList`]s in
//! registration order and hands back a single [`Unblock`] verdict, noting
//! the channel in its ledger until the request completes.
//!
//! # Modules
//!
//! - `pattern`: WebExtension match-pattern compiler
//! - `url`: URL views used by matching
//! - `allow_list`: per-consumer shim/allow rules
//! - `ledger`: set of channels holding an exception
//! - `manager`: event handling and start/stop lifecycle
//! - `resolver`: request handle to channel id lookup
//! - `api`: command surface for consumers
//! - `types`: shared type definitions

pub mod allow_list;
pub mod api;
pub mod ledger;
pub mod manager;
pub mod pattern;
pub mod resolver;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use allow_list::AllowList;
pub use api::TrackingProtection;
pub use ledger::RequestLedger;
pub use manager::{ClassificationManager, DetachedHub, EventHub};
pub use pattern::{MatchPattern, MatchPatternSet, PatternError};
pub use resolver::{ChannelResolver, RequestRegistry, RequestScope};
pub use types::{BlockedChannel, ChannelId, ClassifierEvent, RequestHandle, Topic, Unblock};
