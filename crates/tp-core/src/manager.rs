//! Classification Manager
//!
//! Owns every consumer's [`AllowList`], listens to the host's classifier
//! events, and decides whether a request about to be blocked is shimmed,
//! allowed, or left blocked.
//!
//! The manager is single-threaded: the host delivers events one at a time
//! through [`ClassificationManager::observe`], and registration calls run
//! on the same context, so no locking is involved.

use log::{debug, trace};

use crate::allow_list::AllowList;
use crate::ledger::RequestLedger;
use crate::pattern::PatternError;
use crate::types::{BlockedChannel, ChannelId, ClassifierEvent, Topic, Unblock};
use crate::url::{top_level_host, ParsedUrl};

// =============================================================================
// Event Hub
// =============================================================================

/// Subscription seam to the host's event bus.
pub trait EventHub {
    /// Start delivering events for `topic`.
    fn add_listener(&mut self, topic: Topic);
    /// Stop delivering events for `topic`.
    fn remove_listener(&mut self, topic: Topic);
}

/// Hub for hosts that push every event into the manager themselves.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedHub;

impl EventHub for DetachedHub {
    fn add_listener(&mut self, _topic: Topic) {}
    fn remove_listener(&mut self, _topic: Topic) {}
}

impl<T: EventHub + ?Sized> EventHub for Box<T> {
    fn add_listener(&mut self, topic: Topic) {
        (**self).add_listener(topic)
    }

    fn remove_listener(&mut self, topic: Topic) {
        (**self).remove_listener(topic)
    }
}

/// State that exists only while subscribed.
#[derive(Debug, Default)]
struct Session {
    ledger: RequestLedger,
}

// =============================================================================
// Manager
// =============================================================================

/// Applies registered allow lists to classifier block decisions.
pub struct ClassificationManager<H: EventHub> {
    hub: H,
    /// Registration order is decision order
    allow_lists: Vec<AllowList>,
    session: Option<Session>,
}

impl<H: EventHub> ClassificationManager<H> {
    pub fn new(hub: H) -> Self {
        Self {
            hub,
            allow_lists: Vec::new(),
            session: None,
        }
    }

    pub fn hub(&self) -> &H {
        &self.hub
    }

    pub fn hub_mut(&mut self) -> &mut H {
        &mut self.hub
    }

    /// Is the manager subscribed to the host's events?
    pub fn is_started(&self) -> bool {
        self.session.is_some()
    }

    fn ensure_started(&mut self) {
        if self.session.is_some() {
            return;
        }
        for topic in Topic::ALL {
            self.hub.add_listener(topic);
        }
        self.session = Some(Session::default());
        debug!("classification manager started");
    }

    /// Unsubscribe and drop the ledger. No-op when not started.
    ///
    /// Registered allow lists survive; the next `shim`/`allow` call
    /// subscribes again.
    pub fn stop(&mut self) {
        let session = match self.session.take() {
            Some(session) => session,
            None => return,
        };
        for topic in Topic::ALL {
            self.hub.remove_listener(topic);
        }
        debug!(
            "classification manager stopped, dropped {} unblocked channel(s)",
            session.ledger.len()
        );
    }

    fn allow_list_entry(&mut self, id: &str) -> &mut AllowList {
        let pos = match self.allow_lists.iter().position(|list| list.id() == id) {
            Some(pos) => pos,
            None => {
                self.allow_lists.push(AllowList::new(id));
                self.allow_lists.len() - 1
            }
        };
        &mut self.allow_lists[pos]
    }

    /// Register or replace the shim rules of consumer `id`.
    pub fn shim<P, N>(&mut self, id: &str, patterns: P, not_hosts: N) -> Result<(), PatternError>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        self.ensure_started();
        self.allow_list_entry(id).set_shims(patterns, not_hosts)?;
        debug!("shim rules set for '{}'", id);
        Ok(())
    }

    /// Register or replace the allow rules of consumer `id`.
    pub fn allow<P, N>(&mut self, id: &str, patterns: P, hosts: N) -> Result<(), PatternError>
    where
        P: IntoIterator,
        P::Item: AsRef<str>,
        N: IntoIterator,
        N::Item: AsRef<str>,
    {
        self.ensure_started();
        self.allow_list_entry(id).set_allows(patterns, hosts)?;
        debug!("allow rules set for '{}'", id);
        Ok(())
    }

    /// Drop consumer `id`'s allow list. Returns `false` if none existed.
    pub fn revoke(&mut self, id: &str) -> bool {
        let before = self.allow_lists.len();
        self.allow_lists.retain(|list| list.id() != id);
        let removed = self.allow_lists.len() != before;
        if removed {
            debug!("revoked allow list '{}'", id);
        }
        removed
    }

    /// Was the block on `channel_id` lifted, with the request still in flight?
    pub fn was_id_unblocked(&self, channel_id: ChannelId) -> bool {
        self.session
            .as_ref()
            .map_or(false, |session| session.ledger.contains(channel_id))
    }

    pub fn allow_list(&self, id: &str) -> Option<&AllowList> {
        self.allow_lists.iter().find(|list| list.id() == id)
    }

    /// Consumer ids in decision order.
    pub fn consumers(&self) -> impl Iterator<Item = &str> {
        self.allow_lists.iter().map(AllowList::id)
    }

    /// Number of in-flight requests currently holding an exception.
    pub fn unblocked_count(&self) -> usize {
        self.session.as_ref().map_or(0, |session| session.ledger.len())
    }

    /// Evaluate the allow lists for one request without touching state.
    ///
    /// Lists are tried in registration order; within a list shim wins
    /// over allow, and the first list that matches decides.
    pub fn decide(&self, url: &str, top_level_url: &str) -> Option<Unblock> {
        let top_host = match top_level_host(top_level_url) {
            Some(host) => host,
            None => {
                debug!("unparseable top-level url '{}', block stands", top_level_url);
                return None;
            }
        };
        let url = ParsedUrl::parse(url)?;

        self.allow_lists.iter().find_map(|list| {
            if list.shims_parsed(&url, &top_host) {
                trace!("'{}' shims request", list.id());
                Some(Unblock::Replace)
            } else if list.allows_parsed(&url, &top_host) {
                trace!("'{}' allows request", list.id());
                Some(Unblock::Allow)
            } else {
                None
            }
        })
    }

    /// Handle one event from the host.
    ///
    /// For a block decision the returned verdict is the single action the
    /// host must apply to the channel; `None` lets the block stand. Events
    /// arriving while stopped are ignored.
    pub fn observe(&mut self, event: ClassifierEvent<'_>) -> Option<Unblock> {
        if self.session.is_none() {
            trace!("ignoring {:?} event while stopped", event.topic());
            return None;
        }
        match event {
            ClassifierEvent::RequestStopped { channel_id } => {
                self.on_request_stopped(channel_id);
                None
            }
            ClassifierEvent::BeforeBlockChannel(channel) => self.on_before_block(channel),
        }
    }

    fn on_request_stopped(&mut self, channel_id: ChannelId) {
        if let Some(session) = self.session.as_mut() {
            if session.ledger.remove(channel_id) {
                trace!("channel {} completed, exception cleared", channel_id);
            }
        }
    }

    fn on_before_block(&mut self, channel: &BlockedChannel) -> Option<Unblock> {
        let verdict = self.decide(&channel.url, &channel.top_level_url)?;
        if let Some(session) = self.session.as_mut() {
            session.ledger.insert(channel.channel_id);
        }
        trace!(
            "channel {} ({}) unblocked: {}",
            channel.channel_id,
            channel.url,
            verdict.as_str()
        );
        Some(verdict)
    }
}

impl Default for ClassificationManager<DetachedHub> {
    fn default() -> Self {
        Self::new(DetachedHub)
    }
}
