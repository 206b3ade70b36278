//! The concrete page representation.
//!
//! All page variants share one shape: a variant tag, a fixed-arity
//! array of [`PageRef`] slots, a dirty flag, and a variant-specific
//! payload. Once a page is reachable from a published revision root it
//! is logically immutable; any further mutation goes through a fresh
//! copy in the transaction page cache.

use std::collections::BTreeMap;

use revtree_types::{Record, RevisionNumber};

use crate::page_ref::PageRef;

/// Reference-slot offsets on a revision root page.
pub const TRIE_REF: usize = 0;
/// Path summary index reference slot.
pub const PATH_SUMMARY_REF: usize = 1;
/// Name dictionary reference slot.
pub const NAME_REF: usize = 2;
/// Content-address-structure index reference slot.
pub const CAS_REF: usize = 3;
/// Path index reference slot.
pub const PATH_REF: usize = 4;

/// Number of reference slots on a revision root page.
pub const REVISION_ROOT_REFS: usize = 5;

/// Page variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PageKind {
    /// The single process-wide root page, holding the revision chain.
    Uber = 1,
    /// One per committed revision; owns the trie root and index roots.
    RevisionRoot = 2,
    /// Internal trie node: one reference slot per digit value.
    Indirect = 3,
    /// Leaf page holding records keyed by node key.
    LeafRecord = 4,
    /// Name dictionary index root.
    Name = 5,
    /// Path summary index root.
    PathSummary = 6,
    /// Path index root.
    Path = 7,
    /// Content-address-structure index root.
    Cas = 8,
}

impl PageKind {
    /// Serialized variant tag.
    #[inline]
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Decode a variant tag.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Uber),
            2 => Some(Self::RevisionRoot),
            3 => Some(Self::Indirect),
            4 => Some(Self::LeafRecord),
            5 => Some(Self::Name),
            6 => Some(Self::PathSummary),
            7 => Some(Self::Path),
            8 => Some(Self::Cas),
            _ => None,
        }
    }

    /// Whether this kind is one of the auxiliary index roots hanging
    /// off a revision root page.
    #[must_use]
    pub const fn is_aux_index(self) -> bool {
        matches!(self, Self::Name | Self::PathSummary | Self::Path | Self::Cas)
    }
}

/// Variant-specific page payload.
#[derive(Debug, Clone)]
pub enum PagePayload {
    /// Indirect and auxiliary index pages carry references only.
    None,
    /// Per-revision metadata.
    RevisionRoot {
        /// Immutable revision number this root was created for.
        revision: RevisionNumber,
        /// Last allocated node key; -1 before the first allocation.
        max_node_key: i64,
        /// Commit wall-clock time in milliseconds, stamped at
        /// serialization.
        revision_timestamp_millis: u64,
    },
    /// Global counters owned by the uber page. The revision count is
    /// implicit in the reference-chain length.
    Uber {
        /// Highest page key handed out so far; key 0 is the uber page.
        max_page_key: u64,
    },
    /// Versioned records of a leaf page, keyed by full node key.
    Records(BTreeMap<u64, Record>),
}

/// One page: variant tag, reference array, dirty flag, payload.
#[derive(Debug, Clone)]
pub struct Page {
    kind: PageKind,
    refs: Vec<PageRef>,
    dirty: bool,
    payload: PagePayload,
}

impl Page {
    /// Create the uber page of a fresh store: no revisions yet, page
    /// key 0 taken by the uber page itself.
    #[must_use]
    pub fn uber() -> Self {
        Self {
            kind: PageKind::Uber,
            refs: Vec::new(),
            dirty: true,
            payload: PagePayload::Uber { max_page_key: 0 },
        }
    }

    /// Create the bootstrap revision root (revision 0): an empty trie
    /// and freshly created auxiliary index pages held in memory until
    /// the bootstrap commit persists them.
    #[must_use]
    pub fn revision_root() -> Self {
        let mut refs = vec![PageRef::Absent; REVISION_ROOT_REFS];
        refs[NAME_REF] = PageRef::InMemory(Box::new(Self::aux(PageKind::Name)));
        refs[PATH_SUMMARY_REF] = PageRef::InMemory(Box::new(Self::aux(PageKind::PathSummary)));
        refs[PATH_REF] = PageRef::InMemory(Box::new(Self::aux(PageKind::Path)));
        refs[CAS_REF] = PageRef::InMemory(Box::new(Self::aux(PageKind::Cas)));
        Self {
            kind: PageKind::RevisionRoot,
            refs,
            dirty: true,
            payload: PagePayload::RevisionRoot {
                revision: RevisionNumber::ZERO,
                max_node_key: -1,
                revision_timestamp_millis: 0,
            },
        }
    }

    /// Clone a committed revision root for the next revision: the
    /// reference array is copied verbatim (sharing every subtree) and
    /// `max_node_key` is inherited from the previous revision.
    #[must_use]
    pub fn clone_for_revision(&self, revision: RevisionNumber) -> Self {
        debug_assert_eq!(self.kind, PageKind::RevisionRoot);
        let (max_node_key, revision_timestamp_millis) = match self.payload {
            PagePayload::RevisionRoot {
                max_node_key,
                revision_timestamp_millis,
                ..
            } => (max_node_key, revision_timestamp_millis),
            _ => (-1, 0),
        };
        Self {
            kind: PageKind::RevisionRoot,
            refs: self.refs.clone(),
            dirty: false,
            payload: PagePayload::RevisionRoot {
                revision,
                max_node_key,
                revision_timestamp_millis,
            },
        }
    }

    /// Create an indirect trie page with `fanout` absent slots.
    #[must_use]
    pub fn indirect(fanout: usize) -> Self {
        Self {
            kind: PageKind::Indirect,
            refs: vec![PageRef::Absent; fanout],
            dirty: true,
            payload: PagePayload::None,
        }
    }

    /// Create an empty leaf record page.
    #[must_use]
    pub fn leaf() -> Self {
        Self {
            kind: PageKind::LeafRecord,
            refs: Vec::new(),
            dirty: true,
            payload: PagePayload::Records(BTreeMap::new()),
        }
    }

    /// Create an auxiliary index root page (one slot for its own
    /// indirect tree, absent until the index is first populated).
    #[must_use]
    pub fn aux(kind: PageKind) -> Self {
        debug_assert!(kind.is_aux_index());
        Self {
            kind,
            refs: vec![PageRef::Absent],
            dirty: true,
            payload: PagePayload::None,
        }
    }

    /// Reassemble a page from decoded parts. Used by the codec only.
    pub(crate) fn from_parts(kind: PageKind, refs: Vec<PageRef>, payload: PagePayload) -> Self {
        Self {
            kind,
            refs,
            dirty: false,
            payload,
        }
    }

    /// Variant tag of this page.
    #[inline]
    #[must_use]
    pub const fn kind(&self) -> PageKind {
        self.kind
    }

    /// Whether this page has been modified since it was last
    /// serialized.
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the page dirty.
    #[inline]
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Clear the dirty flag; called by the commit walk right before
    /// serialization.
    #[inline]
    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    /// Number of reference slots.
    #[inline]
    #[must_use]
    pub fn ref_count(&self) -> usize {
        self.refs.len()
    }

    /// Read one reference slot.
    #[inline]
    #[must_use]
    pub fn reference(&self, idx: usize) -> &PageRef {
        &self.refs[idx]
    }

    /// Mutate one reference slot.
    #[inline]
    pub fn reference_mut(&mut self, idx: usize) -> &mut PageRef {
        &mut self.refs[idx]
    }

    /// Iterate over all reference slots mutably (commit walk).
    pub fn references_mut(&mut self) -> impl Iterator<Item = &mut PageRef> {
        self.refs.iter_mut()
    }

    /// Append a reference slot; only the uber page grows its array
    /// (one slot per published revision root).
    pub fn push_reference(&mut self, slot: PageRef) {
        debug_assert_eq!(self.kind, PageKind::Uber);
        self.refs.push(slot);
    }

    /// Raw payload access for the codec.
    #[inline]
    #[must_use]
    pub const fn payload(&self) -> &PagePayload {
        &self.payload
    }

    // --- RevisionRoot accessors ---

    /// Revision number, for revision root pages.
    #[must_use]
    pub const fn revision(&self) -> Option<RevisionNumber> {
        match self.payload {
            PagePayload::RevisionRoot { revision, .. } => Some(revision),
            _ => None,
        }
    }

    /// Last allocated node key, for revision root pages.
    #[must_use]
    pub const fn max_node_key(&self) -> Option<i64> {
        match self.payload {
            PagePayload::RevisionRoot { max_node_key, .. } => Some(max_node_key),
            _ => None,
        }
    }

    /// Allocate the next node key on an in-progress revision root.
    ///
    /// Keys are dense: -1 becomes 0, 0 becomes 1, and so on. Marks the
    /// page dirty. Returns `None` for non-root pages.
    pub fn allocate_node_key(&mut self) -> Option<u64> {
        match &mut self.payload {
            PagePayload::RevisionRoot { max_node_key, .. } => {
                *max_node_key += 1;
                self.dirty = true;
                Some(u64::try_from(*max_node_key).ok()?)
            }
            _ => None,
        }
    }

    /// Revision commit timestamp in milliseconds, for revision root
    /// pages.
    #[must_use]
    pub const fn revision_timestamp_millis(&self) -> Option<u64> {
        match self.payload {
            PagePayload::RevisionRoot {
                revision_timestamp_millis,
                ..
            } => Some(revision_timestamp_millis),
            _ => None,
        }
    }

    /// Stamp the revision timestamp; called once when the commit walk
    /// serializes the revision root.
    pub fn set_revision_timestamp(&mut self, millis: u64) {
        if let PagePayload::RevisionRoot {
            revision_timestamp_millis,
            ..
        } = &mut self.payload
        {
            *revision_timestamp_millis = millis;
        }
    }

    // --- Uber accessors ---

    /// Number of published revisions (uber page only).
    #[must_use]
    pub fn revision_count(&self) -> Option<u32> {
        match self.payload {
            PagePayload::Uber { .. } => u32::try_from(self.refs.len()).ok(),
            _ => None,
        }
    }

    /// Highest page key handed out so far (uber page only).
    #[must_use]
    pub const fn max_page_key(&self) -> Option<u64> {
        match self.payload {
            PagePayload::Uber { max_page_key } => Some(max_page_key),
            _ => None,
        }
    }

    /// Record the highest page key handed out by a commit.
    pub fn set_max_page_key(&mut self, key: u64) {
        if let PagePayload::Uber { max_page_key } = &mut self.payload {
            *max_page_key = key;
        }
    }

    // --- LeafRecord accessors ---

    /// Records of a leaf page.
    #[must_use]
    pub const fn records(&self) -> Option<&BTreeMap<u64, Record>> {
        match &self.payload {
            PagePayload::Records(records) => Some(records),
            _ => None,
        }
    }

    /// Mutable records of a leaf page. Does not mark dirty by itself.
    pub fn records_mut(&mut self) -> Option<&mut BTreeMap<u64, Record>> {
        match &mut self.payload {
            PagePayload::Records(records) => Some(records),
            _ => None,
        }
    }
}
