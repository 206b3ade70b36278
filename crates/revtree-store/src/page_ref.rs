//! Page references: the slots that name a page by exactly one of an
//! in-memory handle, an in-transaction log key, or a stable durable
//! key.

use revtree_types::{LogKey, PageKey};

use crate::page::Page;

/// A slot naming a page, with exactly one authoritative case.
///
/// - [`Absent`](PageRef::Absent): the page never existed in this or any
///   ancestor revision. Reads through an absent reference report "no
///   such record", never an error.
/// - [`InMemory`](PageRef::InMemory): an owned page that has not been
///   through the transaction log yet (bootstrap pages).
/// - [`Log`](PageRef::Log): a dirty copy resident in the transaction
///   page cache of the active write transaction.
/// - [`Durable`](PageRef::Durable): a committed page addressable in the
///   persistent cache / backing store.
#[derive(Debug, Clone, Default)]
pub enum PageRef {
    /// No page in this or any ancestor revision.
    #[default]
    Absent,
    /// Owned page not yet entered into any cache.
    InMemory(Box<Page>),
    /// Dirty copy keyed into the transaction page cache.
    Log(LogKey),
    /// Committed page keyed into the persistent cache / backing store.
    Durable(PageKey),
}

impl PageRef {
    /// Returns true when no page exists behind this slot.
    #[inline]
    #[must_use]
    pub const fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The durable page key, if this reference has been persisted.
    #[inline]
    #[must_use]
    pub const fn durable_key(&self) -> Option<PageKey> {
        match self {
            Self::Durable(key) => Some(*key),
            _ => None,
        }
    }

    /// The transaction-log key, if this reference points at a dirty
    /// in-transaction copy.
    #[inline]
    #[must_use]
    pub const fn log_key(&self) -> Option<LogKey> {
        match self {
            Self::Log(key) => Some(*key),
            _ => None,
        }
    }

    /// Replace this slot with [`PageRef::Absent`] and return the
    /// previous value.
    #[inline]
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::Page;

    #[test]
    fn default_is_absent() {
        assert!(PageRef::default().is_absent());
    }

    #[test]
    fn accessors_match_variant() {
        let durable = PageRef::Durable(PageKey::new(7));
        assert_eq!(durable.durable_key(), Some(PageKey::new(7)));
        assert_eq!(durable.log_key(), None);

        let log = PageRef::Log(LogKey::new(3));
        assert_eq!(log.log_key(), Some(LogKey::new(3)));
        assert_eq!(log.durable_key(), None);

        let mem = PageRef::InMemory(Box::new(Page::leaf()));
        assert!(!mem.is_absent());
        assert_eq!(mem.durable_key(), None);
    }

    #[test]
    fn take_leaves_absent() {
        let mut slot = PageRef::Durable(PageKey::new(1));
        let taken = slot.take();
        assert!(slot.is_absent());
        assert_eq!(taken.durable_key(), Some(PageKey::new(1)));
    }
}
