//! In-flight page log for a single write transaction.
//!
//! Every page mutated inside a transaction is parked here under a
//! transaction-local log key; the referencing slot in its parent holds
//! `PageRef::Log(key)` until commit drains the cache into durable
//! storage. The cache is owned by exactly one write transaction and is
//! never shared, so it carries no locking of its own.

use std::collections::HashMap;

use revtree_types::LogKey;

use crate::page::Page;

#[derive(Debug, Default)]
pub struct TransactionPageCache {
    entries: HashMap<LogKey, Page>,
    next_key: u64,
}

impl TransactionPageCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a page in the log and return the key under which it can be
    /// retrieved. Keys are unique for the lifetime of the cache, even
    /// across removals.
    pub fn put(&mut self, page: Page) -> LogKey {
        let key = LogKey::new(self.next_key);
        self.next_key += 1;
        self.entries.insert(key, page);
        key
    }

    #[must_use]
    pub fn get(&self, key: LogKey) -> Option<&Page> {
        self.entries.get(&key)
    }

    pub fn get_mut(&mut self, key: LogKey) -> Option<&mut Page> {
        self.entries.get_mut(&key)
    }

    /// Take a page out of the log, typically while the commit walk
    /// persists it.
    pub fn remove(&mut self, key: LogKey) -> Option<Page> {
        self.entries.remove(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every parked page. Used on abort.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_remove() {
        let mut cache = TransactionPageCache::new();
        assert!(cache.is_empty());

        let a = cache.put(Page::leaf());
        let b = cache.put(Page::indirect(4));
        assert_ne!(a, b);
        assert_eq!(cache.len(), 2);

        assert!(cache.get(a).is_some());
        let removed = cache.remove(a).unwrap();
        assert_eq!(removed.kind(), crate::page::PageKind::LeafRecord);
        assert!(cache.get(a).is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keys_not_reused_after_removal() {
        let mut cache = TransactionPageCache::new();
        let a = cache.put(Page::leaf());
        cache.remove(a);
        let b = cache.put(Page::leaf());
        assert_ne!(a, b);
    }

    #[test]
    fn clear_empties_the_log() {
        let mut cache = TransactionPageCache::new();
        cache.put(Page::leaf());
        cache.put(Page::leaf());
        cache.clear();
        assert!(cache.is_empty());
    }
}
