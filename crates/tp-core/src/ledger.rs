//! Ledger of requests that were granted an exception.

use std::collections::HashSet;

use crate::types::ChannelId;

/// Channel ids whose block was lifted and that have not completed yet.
#[derive(Debug, Default, Clone)]
pub struct RequestLedger {
    unblocked: HashSet<ChannelId>,
}

impl RequestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an exception. Returns `false` if the id was already present.
    pub fn insert(&mut self, channel_id: ChannelId) -> bool {
        self.unblocked.insert(channel_id)
    }

    /// Forget a completed request. Absent ids are ignored.
    pub fn remove(&mut self, channel_id: ChannelId) -> bool {
        self.unblocked.remove(&channel_id)
    }

    #[inline]
    pub fn contains(&self, channel_id: ChannelId) -> bool {
        self.unblocked.contains(&channel_id)
    }

    pub fn len(&self) -> usize {
        self.unblocked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unblocked.is_empty()
    }

    pub fn clear(&mut self) {
        self.unblocked.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_remove() {
        let mut ledger = RequestLedger::new();
        assert!(ledger.insert(42));
        assert!(!ledger.insert(42));
        assert!(ledger.contains(42));
        assert_eq!(ledger.len(), 1);

        assert!(ledger.remove(42));
        assert!(!ledger.contains(42));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut ledger = RequestLedger::new();
        ledger.insert(1);
        assert!(!ledger.remove(2));
        assert!(ledger.contains(1));
    }

    #[test]
    fn test_clear() {
        let mut ledger = RequestLedger::new();
        ledger.insert(1);
        ledger.insert(2);
        ledger.clear();
        assert!(ledger.is_empty());
    }
}
