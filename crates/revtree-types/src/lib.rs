//! Core identifier, record and trie-layout types shared across the
//! revtree crates.
//!
//! Everything here is a small value type: the store crate owns the
//! behavior, this crate owns the vocabulary.

use std::fmt;

/// Stable 64-bit identifier for one record, used as the trie address.
///
/// Node keys are assigned densely and monotonically per revision chain
/// and are never reused across published revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct NodeKey(u64);

impl NodeKey {
    /// Create a node key from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(key: u64) -> Self {
        Self(key)
    }

    /// Get the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeKey {
    fn from(key: u64) -> Self {
        Self(key)
    }
}

/// Stable logical key of a page once it has been persisted.
///
/// Page keys are allocated monotonically at commit time and never
/// reused; key 0 is reserved for the uber page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PageKey(u64);

impl PageKey {
    /// Reserved key of the uber page, the single mutable slot in the
    /// backing store.
    pub const UBER: Self = Self(0);

    /// Create a page key from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(key: u64) -> Self {
        Self(key)
    }

    /// Get the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of a dirty page while it is resident only in the transaction
/// page cache of the active write transaction.
///
/// Log keys are scoped to one transaction and are meaningless after
/// commit or abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct LogKey(u64);

impl LogKey {
    /// Create a log key from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(key: u64) -> Self {
        Self(key)
    }

    /// Get the raw u64 value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LogKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonically increasing number identifying one published revision.
///
/// Revision 0 is the empty bootstrap revision created at store open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RevisionNumber(u32);

impl RevisionNumber {
    /// The bootstrap revision.
    pub const ZERO: Self = Self(0);

    /// Create a revision number from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(revision: u32) -> Self {
        Self(revision)
    }

    /// Get the raw u32 value.
    #[inline]
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// The revision directly after this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RevisionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque record payload stored in a leaf record page.
///
/// The node model that gives these bytes meaning lives in a higher
/// layer; the store only moves them.
#[derive(Clone, PartialEq, Eq)]
pub struct Record {
    data: Vec<u8>,
}

impl Record {
    /// Create a record from owned bytes.
    #[must_use]
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// The record payload.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Payload length in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true for a zero-length payload.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consume self and return the inner bytes.
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("len", &self.data.len())
            .finish()
    }
}

impl From<Vec<u8>> for Record {
    fn from(data: Vec<u8>) -> Self {
        Self::from_vec(data)
    }
}

impl From<&[u8]> for Record {
    fn from(data: &[u8]) -> Self {
        Self::from_vec(data.to_vec())
    }
}

/// Fan-out and depth of the indirect-page reference trie.
///
/// A node key is sliced into a leaf slot (the low `record_bits` bits)
/// and `levels` trie digits of `level_bits` bits each, most significant
/// digit first. Every key therefore has a unique, constant-length path
/// from the trie root to its leaf record page.
///
/// The layout is built once at store open and threaded through every
/// trie operation; there is no ambient global configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrieLayout {
    level_bits: u32,
    levels: u32,
    record_bits: u32,
}

impl TrieLayout {
    /// Default layout: 512-way indirect pages, five trie levels, 512
    /// records per leaf page — 2^54 addressable node keys.
    pub const DEFAULT: Self = Self {
        level_bits: 9,
        levels: 5,
        record_bits: 9,
    };

    /// Build a layout, validating that the digit widths are sane and
    /// that the full address still fits a 64-bit key.
    #[must_use]
    pub const fn new(level_bits: u32, levels: u32, record_bits: u32) -> Option<Self> {
        if level_bits == 0 || level_bits > 16 || record_bits == 0 || record_bits > 16 {
            return None;
        }
        if levels == 0 || record_bits + levels * level_bits > 63 {
            return None;
        }
        Some(Self {
            level_bits,
            levels,
            record_bits,
        })
    }

    /// References per indirect page.
    #[inline]
    #[must_use]
    pub const fn fanout(self) -> usize {
        1 << self.level_bits
    }

    /// Trie depth from root reference to leaf record page.
    #[inline]
    #[must_use]
    pub const fn levels(self) -> u32 {
        self.levels
    }

    /// Records per leaf record page.
    #[inline]
    #[must_use]
    pub const fn records_per_leaf(self) -> u64 {
        1 << self.record_bits
    }

    /// Largest node key the trie can address.
    #[inline]
    #[must_use]
    pub const fn max_node_key(self) -> u64 {
        (1 << (self.record_bits + self.levels * self.level_bits)) - 1
    }

    /// Check that a node key is addressable by this layout.
    ///
    /// # Errors
    ///
    /// Returns the key and the addressable maximum when out of range.
    pub fn check(self, key: NodeKey) -> Result<(), (u64, u64)> {
        let max = self.max_node_key();
        if key.get() > max {
            Err((key.get(), max))
        } else {
            Ok(())
        }
    }

    /// Logical number of the leaf record page holding `key`.
    #[inline]
    #[must_use]
    pub const fn leaf_number(self, key: NodeKey) -> u64 {
        key.get() >> self.record_bits
    }

    /// Trie digit consumed at `level` (0 = root level) when resolving
    /// `key`. Digits are taken most significant first.
    #[inline]
    #[must_use]
    pub const fn digit(self, key: NodeKey, level: u32) -> usize {
        debug_assert!(level < self.levels);
        let shift = self.level_bits * (self.levels - 1 - level);
        ((self.leaf_number(key) >> shift) & ((1 << self.level_bits) - 1)) as usize
    }

    /// First trie level at which the paths of two keys diverge, or
    /// `None` when both keys land on the same leaf record page.
    #[must_use]
    pub fn divergence_level(self, a: NodeKey, b: NodeKey) -> Option<u32> {
        (0..self.levels).find(|&level| self.digit(a, level) != self.digit(b, level))
    }
}

impl Default for TrieLayout {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn revision_number_successor() {
        assert_eq!(RevisionNumber::ZERO.next(), RevisionNumber::new(1));
        assert_eq!(RevisionNumber::new(41).next().get(), 42);
    }

    #[test]
    fn default_layout_dimensions() {
        let layout = TrieLayout::default();
        assert_eq!(layout.fanout(), 512);
        assert_eq!(layout.levels(), 5);
        assert_eq!(layout.records_per_leaf(), 512);
        assert_eq!(layout.max_node_key(), (1 << 54) - 1);
    }

    #[test]
    fn layout_rejects_degenerate_shapes() {
        assert!(TrieLayout::new(0, 5, 9).is_none());
        assert!(TrieLayout::new(9, 0, 9).is_none());
        assert!(TrieLayout::new(9, 5, 0).is_none());
        // 16 + 3 * 16 = 64 bits does not leave room in an i64-friendly key.
        assert!(TrieLayout::new(16, 3, 16).is_none());
        assert!(TrieLayout::new(16, 2, 15).is_some());
    }

    #[test]
    fn check_bounds() {
        let layout = TrieLayout::default();
        assert!(layout.check(NodeKey::new(0)).is_ok());
        assert!(layout.check(NodeKey::new(layout.max_node_key())).is_ok());
        let err = layout
            .check(NodeKey::new(layout.max_node_key() + 1))
            .unwrap_err();
        assert_eq!(err, (layout.max_node_key() + 1, layout.max_node_key()));
    }

    #[test]
    fn digits_most_significant_first() {
        // 2-level layout with 4-way fan-out and 4 records per leaf:
        // key = rrrr dd dd rr (leaf number is the middle 4 bits).
        let layout = TrieLayout::new(2, 2, 2).unwrap();
        let key = NodeKey::new(0b11_01_10);
        assert_eq!(layout.leaf_number(key), 0b11_01);
        assert_eq!(layout.digit(key, 0), 0b11);
        assert_eq!(layout.digit(key, 1), 0b01);
    }

    #[test]
    fn same_leaf_no_divergence() {
        let layout = TrieLayout::default();
        // Keys 0..511 share leaf 0.
        assert_eq!(
            layout.divergence_level(NodeKey::new(3), NodeKey::new(510)),
            None
        );
        // Keys 512 and 511 differ in the last trie digit.
        assert_eq!(
            layout.divergence_level(NodeKey::new(511), NodeKey::new(512)),
            Some(4)
        );
    }

    proptest! {
        /// Paths of two keys diverge exactly at the level of their
        /// highest differing digit, and never before.
        #[test]
        fn divergence_is_highest_differing_digit(
            a in 0_u64..(1 << 54),
            b in 0_u64..(1 << 54),
        ) {
            let layout = TrieLayout::default();
            let (a, b) = (NodeKey::new(a), NodeKey::new(b));
            match layout.divergence_level(a, b) {
                None => {
                    prop_assert_eq!(layout.leaf_number(a), layout.leaf_number(b));
                }
                Some(level) => {
                    for earlier in 0..level {
                        prop_assert_eq!(layout.digit(a, earlier), layout.digit(b, earlier));
                    }
                    prop_assert_ne!(layout.digit(a, level), layout.digit(b, level));
                }
            }
        }

        /// Digit decomposition is a bijection on the leaf number: the
        /// digits reassemble to the leaf number for every key.
        #[test]
        fn digits_reassemble(key in 0_u64..(1 << 54)) {
            let layout = TrieLayout::default();
            let key = NodeKey::new(key);
            let mut leaf = 0_u64;
            for level in 0..layout.levels() {
                leaf = (leaf << 9) | layout.digit(key, level) as u64;
            }
            prop_assert_eq!(leaf, layout.leaf_number(key));
        }
    }
}
