//! Versioned, copy-on-write page store: an uber page anchors a chain
//! of immutable revision roots, each rooting a fixed-fan-out indirect
//! page trie down to leaf record pages. Commits share every untouched
//! subtree with the previous revision, so any historical revision stays
//! independently readable at O(trie depth) page hops.

pub mod backend;
pub mod codec;
pub mod page;
pub mod page_ref;
pub mod persistent_cache;
pub mod store;
pub mod txn_cache;

pub use backend::{MemoryStore, PageStore, SledStore};
pub use codec::{BinaryCodec, PageCodec};
pub use page::{
    CAS_REF, NAME_REF, PATH_REF, PATH_SUMMARY_REF, Page, PageKind, PagePayload,
    REVISION_ROOT_REFS, TRIE_REF,
};
pub use page_ref::PageRef;
pub use persistent_cache::PersistentPageCache;
pub use store::{
    PageReadAccess, StoreConfig, TreeReader, TreeStore, TxnState, WriteTransaction,
};
pub use txn_cache::TransactionPageCache;

pub use revtree_error::{Result, RevTreeError};
pub use revtree_types::{LogKey, NodeKey, PageKey, Record, RevisionNumber, TrieLayout};
