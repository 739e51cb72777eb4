//! Command surface for configuring consumers.

use crate::manager::{ClassificationManager, EventHub};
use crate::pattern::PatternError;
use crate::resolver::{ChannelResolver, RequestScope};
use crate::types::{ClassifierEvent, RequestHandle, Unblock};

/// What consumers (extensions) call: register, revoke, and query.
pub struct TrackingProtection<H: EventHub, R: ChannelResolver> {
    manager: ClassificationManager<H>,
    resolver: R,
}

impl<H: EventHub, R: ChannelResolver> TrackingProtection<H, R> {
    pub fn new(hub: H, resolver: R) -> Self {
        Self {
            manager: ClassificationManager::new(hub),
            resolver,
        }
    }

    pub fn manager(&self) -> &ClassificationManager<H> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut ClassificationManager<H> {
        &mut self.manager
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut R {
        &mut self.resolver
    }

    pub fn shim(&mut self, consumer_id: &str, patterns: &[String], not_hosts: &[String]) -> Result<(), PatternError> {
        self.manager.shim(consumer_id, patterns, not_hosts)
    }

    pub fn allow(&mut self, consumer_id: &str, patterns: &[String], hosts: &[String]) -> Result<(), PatternError> {
        self.manager.allow(consumer_id, patterns, hosts)
    }

    pub fn revoke(&mut self, consumer_id: &str) {
        self.manager.revoke(consumer_id);
    }

    /// Was the request behind `handle` granted an exception?
    ///
    /// Unknown or expired handles answer `false`.
    pub fn was_request_unblocked(&self, handle: RequestHandle, scope: &RequestScope) -> bool {
        match self.resolver.resolve_channel_id(handle, scope) {
            Some(channel_id) => self.manager.was_id_unblocked(channel_id),
            None => false,
        }
    }

    /// Forward a host event to the manager.
    pub fn observe(&mut self, event: ClassifierEvent<'_>) -> Option<Unblock> {
        self.manager.observe(event)
    }

    /// Lifecycle hook for the owning process.
    pub fn shutdown(&mut self) {
        self.manager.stop();
    }
}
