//! Request handle to channel id resolution
//!
//! Consumers only see their own request handles. The host maps a handle,
//! within the consumer's scope, to the channel id the ledger tracks.

use std::collections::HashMap;

use crate::types::{ChannelId, RequestHandle};

/// The context a request handle is valid in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestScope {
    /// Consumer the handle was issued to
    pub consumer: String,
    /// Browser (tab) the request belongs to
    pub browser_id: u64,
}

impl RequestScope {
    pub fn new(consumer: impl Into<String>, browser_id: u64) -> Self {
        Self {
            consumer: consumer.into(),
            browser_id,
        }
    }
}

/// Maps a consumer-visible request handle to a channel id.
///
/// `None` means unknown or expired; callers treat it as "not unblocked".
pub trait ChannelResolver {
    fn resolve_channel_id(&self, handle: RequestHandle, scope: &RequestScope) -> Option<ChannelId>;
}

impl<F> ChannelResolver for F
where
    F: Fn(RequestHandle, &RequestScope) -> Option<ChannelId>,
{
    fn resolve_channel_id(&self, handle: RequestHandle, scope: &RequestScope) -> Option<ChannelId> {
        self(handle, scope)
    }
}

// =============================================================================
// Request Registry
// =============================================================================

/// In-memory resolver for hosts that hand out handles themselves.
#[derive(Debug, Default)]
pub struct RequestRegistry {
    scopes: HashMap<RequestScope, HashMap<RequestHandle, ChannelId>>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handle` to `channel_id` within `scope`. Returns the previous binding.
    pub fn register(
        &mut self,
        scope: RequestScope,
        handle: RequestHandle,
        channel_id: ChannelId,
    ) -> Option<ChannelId> {
        self.scopes.entry(scope).or_default().insert(handle, channel_id)
    }

    /// Drop one binding.
    pub fn forget(&mut self, scope: &RequestScope, handle: RequestHandle) -> Option<ChannelId> {
        let handles = self.scopes.get_mut(scope)?;
        let removed = handles.remove(&handle);
        if handles.is_empty() {
            self.scopes.remove(scope);
        }
        removed
    }

    /// Drop every binding that points at `channel_id`, in any scope.
    pub fn forget_channel(&mut self, channel_id: ChannelId) -> usize {
        let mut removed = 0;
        self.scopes.retain(|_, handles| {
            let before = handles.len();
            handles.retain(|_, id| *id != channel_id);
            removed += before - handles.len();
            !handles.is_empty()
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.scopes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

impl ChannelResolver for RequestRegistry {
    fn resolve_channel_id(&self, handle: RequestHandle, scope: &RequestScope) -> Option<ChannelId> {
        self.scopes.get(scope)?.get(&handle).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_is_scoped() {
        let mut registry = RequestRegistry::new();
        let ext1 = RequestScope::new("ext1", 1);
        let ext2 = RequestScope::new("ext2", 1);
        registry.register(ext1.clone(), RequestHandle(10), 42);

        assert_eq!(registry.resolve_channel_id(RequestHandle(10), &ext1), Some(42));
        assert_eq!(registry.resolve_channel_id(RequestHandle(10), &ext2), None);
        assert_eq!(registry.resolve_channel_id(RequestHandle(11), &ext1), None);
        assert_eq!(
            registry.resolve_channel_id(RequestHandle(10), &RequestScope::new("ext1", 2)),
            None
        );
    }

    #[test]
    fn test_forget() {
        let mut registry = RequestRegistry::new();
        let scope = RequestScope::new("ext1", 1);
        assert_eq!(registry.register(scope.clone(), RequestHandle(1), 5), None);
        assert_eq!(registry.register(scope.clone(), RequestHandle(1), 6), Some(5));

        assert_eq!(registry.forget(&scope, RequestHandle(1)), Some(6));
        assert_eq!(registry.forget(&scope, RequestHandle(1)), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_forget_channel_across_scopes() {
        let mut registry = RequestRegistry::new();
        registry.register(RequestScope::new("ext1", 1), RequestHandle(1), 9);
        registry.register(RequestScope::new("ext2", 1), RequestHandle(3), 9);
        registry.register(RequestScope::new("ext2", 1), RequestHandle(4), 10);

        assert_eq!(registry.forget_channel(9), 2);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.forget_channel(9), 0);
    }

    #[test]
    fn test_closure_resolver() {
        let resolver = |handle: RequestHandle, _: &RequestScope| Some(handle.0 + 100);
        assert_eq!(
            resolver.resolve_channel_id(RequestHandle(1), &RequestScope::new("x", 0)),
            Some(101)
        );
    }
}
