// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Checkbox derivation: which unchecked nodes still hide descendants of unknown state.
//!
//! ## Overview
//!
//! The explicit checked set holds user-toggled indices; checking a node checks
//! its whole subtree, loaded or not. From that set and the loaded tree this
//! module derives [`HiddenUnknown`]: the nodes that render as unchecked but still
//! own unloaded descendants, so a renderer can show "some of this may still be
//! hidden" without fetching anything.
//!
//! ## Rule
//!
//! Walking the loaded tree in preorder, for each node `n`:
//! - sentinel: nothing to decide, stop;
//! - no checked index inside `n`'s range: flag every node of `n`'s loaded subtree
//!   (`n` included) whose subtree size is above one, stop;
//! - `n` itself checked: clear every flag inside `n`'s range, stop;
//! - otherwise (mixed): descend.
//!
//! [`recompute_full`] applies the rule to the whole tree.
//! [`recompute_for_subtree`] applies it below one parent after a merge and must
//! agree with the full recompute on that subtree.

use arbor_index::{IndexRange, IndexSet, TreeIndex};

use crate::tree::{Tree, traverse};
use crate::types::{Child, Node};

/// Derived set of nodes whose descendants' checked state is not yet known.
///
/// A member is unchecked itself but has unloaded descendants whose state
/// cannot be determined. Absent means `false`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HiddenUnknown(IndexSet);

impl HiddenUnknown {
    /// Create an empty annotation.
    pub const fn new() -> Self {
        Self(IndexSet::new())
    }

    /// Whether `index` is flagged.
    pub fn get(&self, index: TreeIndex) -> bool {
        self.0.contains(index)
    }

    /// Flagged indices, ascending.
    pub fn iter(&self) -> impl Iterator<Item = TreeIndex> + '_ {
        self.0.iter()
    }

    /// Number of flagged nodes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if nothing is flagged.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn clear_within(&mut self, range: IndexRange) {
        self.0.remove_within(range);
    }
}

/// Tri-state checkbox value of one loaded node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CheckState {
    /// The node or one of its ancestors is explicitly checked.
    Checked,
    /// Some, but not all, of the subtree is checked.
    Partial,
    /// Nothing in the subtree is checked and no ancestor is checked.
    Unchecked,
}

/// Whether no checked index lies inside `node`'s subtree.
///
/// Local to the subtree: an explicitly checked ancestor is not consulted here.
/// Use [`check_state`] for the inherited view.
pub fn is_strictly_unchecked(node: &Node, checked: &IndexSet) -> bool {
    !checked.any_within(node.range())
}

/// Inherited checkbox state of the node at `index`, `None` if not loaded.
pub fn check_state(tree: &Tree, checked: &IndexSet, index: TreeIndex) -> Option<CheckState> {
    let path = tree.path_to(index)?;
    if path.iter().any(|n| checked.contains(n.index())) {
        return Some(CheckState::Checked);
    }
    let node = path.last()?;
    Some(if is_strictly_unchecked(node, checked) {
        CheckState::Unchecked
    } else {
        CheckState::Partial
    })
}

/// One step of the rule; returns whether to descend.
fn classify(child: &Child, checked: &IndexSet, hidden: &mut HiddenUnknown) -> bool {
    let Child::Node(node) = child else {
        return false;
    };
    if is_strictly_unchecked(node, checked) {
        node.walk(|d| {
            if d.subtree_size() > 1 {
                hidden.0.insert(d.index());
            }
        });
        return false;
    }
    if checked.contains(node.index()) {
        hidden.clear_within(node.range());
        return false;
    }
    true
}

/// Derive [`HiddenUnknown`] for the whole loaded tree.
///
/// Run whenever the checked set changes.
pub fn recompute_full(tree: &Tree, checked: &IndexSet) -> HiddenUnknown {
    let mut hidden = HiddenUnknown::new();
    tree.traverse(|child| classify(child, checked, &mut hidden));
    tracing::trace!(flagged = hidden.len(), "recomputed hidden-unknown set");
    hidden
}

/// Re-derive [`HiddenUnknown`] below `parent` after its children list changed.
///
/// `parent` is the owner of the merged list (`None` for the root level, which
/// degenerates to [`recompute_full`]). Entries outside the parent's descendant
/// range are carried over from `prev`; inside it the result equals what
/// [`recompute_full`] produces. The tree is needed because an explicitly checked
/// ancestor covers the new children without any of them being checked.
pub fn recompute_for_subtree(
    prev: &HiddenUnknown,
    tree: &Tree,
    parent: Option<TreeIndex>,
    checked: &IndexSet,
) -> HiddenUnknown {
    let Some(parent) = parent else {
        return recompute_full(tree, checked);
    };
    let Some(path) = tree.path_to(parent) else {
        return prev.clone();
    };
    let owner = path[path.len() - 1];

    let mut hidden = prev.clone();
    hidden.clear_within(owner.range().descendants());
    for node in &path {
        // Strictly unchecked ancestor: every new child is strictly unchecked
        // too, which the rule below flags the same way.
        if is_strictly_unchecked(node, checked) {
            break;
        }
        if checked.contains(node.index()) {
            return hidden;
        }
    }
    traverse(owner.children(), |child| classify(child, checked, &mut hidden));
    hidden
}
