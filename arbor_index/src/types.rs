// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Primitive index types: tree indices and the subtree ranges they span.

use core::fmt;

/// Preorder position of a node in the full (remote) hierarchy.
///
/// Assigned by the data source at fetch time and stable for the node's lifetime.
/// It doubles as node identity inside the engine and as the left bound of the
/// node's [`IndexRange`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct TreeIndex(pub u32);

impl TreeIndex {
    /// The index of the first root in a hierarchy.
    pub const ROOT: Self = Self(0);

    /// Create a tree index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Raw value.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for TreeIndex {
    fn from(index: u32) -> Self {
        Self(index)
    }
}

impl fmt::Display for TreeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The half-open run of indices `[start, start + len)` owned by one subtree.
///
/// `len` is the node's authoritative subtree size (itself plus every descendant,
/// loaded or not), so the range is known before any child has been fetched.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexRange {
    /// Index of the subtree root.
    pub start: TreeIndex,
    /// Number of indices in the subtree, including the root. Never zero for a real node.
    pub len: u32,
}

impl IndexRange {
    /// Create the range of a subtree rooted at `start` with `len` members.
    pub const fn new(start: TreeIndex, len: u32) -> Self {
        Self { start, len }
    }

    /// One past the last index in the range.
    ///
    /// Saturates at `u32::MAX`; a data source never reports a subtree that large.
    pub const fn end(&self) -> TreeIndex {
        TreeIndex(self.start.0.saturating_add(self.len))
    }

    /// Whether `k` lies inside this subtree.
    ///
    /// This is the single containment primitive of the engine: it never looks at
    /// children, so it is correct while descendants are still unloaded.
    #[inline]
    pub const fn contains(&self, k: TreeIndex) -> bool {
        self.start.0 <= k.0 && k.0 < self.end().0
    }

    /// Whether `other` lies entirely inside this range.
    pub const fn contains_range(&self, other: &Self) -> bool {
        self.start.0 <= other.start.0 && other.end().0 <= self.end().0
    }

    /// The range of descendants only (the root excluded).
    ///
    /// Empty for a leaf.
    pub const fn descendants(&self) -> Self {
        Self {
            start: TreeIndex(self.start.0.saturating_add(1)),
            len: self.len.saturating_sub(1),
        }
    }

    /// True if the range holds no index.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Containment over raw parts: `start <= k < start + subtree_size`.
///
/// Convenience form of [`IndexRange::contains`] for callers that hold a node's
/// index and subtree size separately.
#[inline]
pub const fn contains(start: TreeIndex, subtree_size: u32, k: TreeIndex) -> bool {
    IndexRange::new(start, subtree_size).contains(k)
}
