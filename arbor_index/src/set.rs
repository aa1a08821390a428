// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ordered sets of tree indices with subtree-range queries.

use alloc::collections::BTreeSet;
use alloc::collections::btree_set;
use alloc::vec::Vec;

use crate::types::{IndexRange, TreeIndex};

/// An ordered set of [`TreeIndex`] values.
///
/// Because indices are assigned in preorder, "does any member fall inside this
/// subtree" is a single ordered range probe, `O(log n)`, with no traversal.
/// The checked, expanded, selected and hidden-unknown sets are all of this type.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct IndexSet {
    members: BTreeSet<TreeIndex>,
}

impl IndexSet {
    /// Create an empty set.
    pub const fn new() -> Self {
        Self {
            members: BTreeSet::new(),
        }
    }

    /// Insert `index`; returns `true` if it was not present.
    pub fn insert(&mut self, index: TreeIndex) -> bool {
        self.members.insert(index)
    }

    /// Remove `index`; returns `true` if it was present.
    pub fn remove(&mut self, index: TreeIndex) -> bool {
        self.members.remove(&index)
    }

    /// Whether `index` is a member.
    pub fn contains(&self, index: TreeIndex) -> bool {
        self.members.contains(&index)
    }

    /// Whether any member lies inside `range`.
    pub fn any_within(&self, range: IndexRange) -> bool {
        if range.is_empty() {
            return false;
        }
        self.members.range(range.start..range.end()).next().is_some()
    }

    /// Members inside `range`, ascending.
    pub fn within(&self, range: IndexRange) -> impl Iterator<Item = TreeIndex> + '_ {
        let span = if range.is_empty() {
            range.start..range.start
        } else {
            range.start..range.end()
        };
        self.members.range(span).copied()
    }

    /// Remove every member inside `range`; returns how many were removed.
    pub fn remove_within(&mut self, range: IndexRange) -> usize {
        let doomed: Vec<TreeIndex> = self.within(range).collect();
        for index in &doomed {
            self.members.remove(index);
        }
        doomed.len()
    }

    /// Keep only the members for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(TreeIndex) -> bool) {
        self.members.retain(|index| keep(*index));
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if the set has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Iterate members in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = TreeIndex> + '_ {
        self.members.iter().copied()
    }
}

impl FromIterator<TreeIndex> for IndexSet {
    fn from_iter<I: IntoIterator<Item = TreeIndex>>(iter: I) -> Self {
        Self {
            members: iter.into_iter().collect(),
        }
    }
}

impl Extend<TreeIndex> for IndexSet {
    fn extend<I: IntoIterator<Item = TreeIndex>>(&mut self, iter: I) {
        self.members.extend(iter);
    }
}

impl<const N: usize> From<[u32; N]> for IndexSet {
    fn from(raw: [u32; N]) -> Self {
        raw.into_iter().map(TreeIndex).collect()
    }
}

impl IntoIterator for IndexSet {
    type Item = TreeIndex;
    type IntoIter = btree_set::IntoIter<TreeIndex>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.into_iter()
    }
}

impl<'a> IntoIterator for &'a IndexSet {
    type Item = TreeIndex;
    type IntoIter = core::iter::Copied<btree_set::Iter<'a, TreeIndex>>;

    fn into_iter(self) -> Self::IntoIter {
        self.members.iter().copied()
    }
}
