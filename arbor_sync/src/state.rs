// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Controller state and options.

use std::collections::BTreeSet;

use arbor_index::{IndexSet, TreeIndex};
use arbor_tree::{CheckState, CursorToken, HiddenUnknown, Tree, check_state};

use crate::error::SyncError;
use crate::types::{Epoch, NodeFlags, OpStatus};

/// Behavior switches for the controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SyncOptions {
    /// Check the first root after the initial fetch, so consumers never start
    /// from an empty selection.
    pub seed_root_checked: bool,
    /// Expand the first root after the initial fetch.
    pub seed_root_expanded: bool,
    /// Expand every ancestor of the target after an ancestor-path load.
    pub expand_ancestors: bool,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            seed_root_checked: true,
            seed_root_expanded: true,
            expand_ancestors: true,
        }
    }
}

impl SyncOptions {
    /// Set [`seed_root_checked`](Self::seed_root_checked).
    #[must_use]
    pub const fn seed_root_checked(mut self, on: bool) -> Self {
        self.seed_root_checked = on;
        self
    }

    /// Set [`seed_root_expanded`](Self::seed_root_expanded).
    #[must_use]
    pub const fn seed_root_expanded(mut self, on: bool) -> Self {
        self.seed_root_expanded = on;
        self
    }

    /// Set [`expand_ancestors`](Self::expand_ancestors).
    #[must_use]
    pub const fn expand_ancestors(mut self, on: bool) -> Self {
        self.expand_ancestors = on;
        self
    }
}

/// Immutable snapshot of everything the controller knows.
///
/// Produced by [`reduce`](crate::reduce); cloning is cheap apart from the
/// index sets, since the tree shares its nodes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncState {
    pub(crate) options: SyncOptions,
    pub(crate) epoch: Epoch,
    pub(crate) status: OpStatus,
    pub(crate) tree: Tree,
    pub(crate) checked: IndexSet,
    pub(crate) hidden: HiddenUnknown,
    pub(crate) expanded: IndexSet,
    pub(crate) selected: IndexSet,
    pub(crate) loading_cursors: BTreeSet<CursorToken>,
    pub(crate) loading_children: IndexSet,
    pub(crate) error: Option<SyncError>,
}

impl SyncState {
    /// An empty state in epoch zero.
    pub fn new(options: SyncOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    /// Defaults for everything but the options, in the epoch after this one.
    pub(crate) fn restarted(&self) -> Self {
        Self {
            options: self.options,
            epoch: self.epoch.next(),
            ..Self::default()
        }
    }

    /// Options in effect.
    pub fn options(&self) -> SyncOptions {
        self.options
    }

    /// Current epoch.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Whole-tree lifecycle.
    pub fn status(&self) -> OpStatus {
        self.status
    }

    /// True while any fetch is outstanding.
    pub fn is_loading(&self) -> bool {
        self.status == OpStatus::Fetching
            || !self.loading_cursors.is_empty()
            || !self.loading_children.is_empty()
    }

    /// The loaded tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Explicitly checked indices.
    pub fn checked(&self) -> &IndexSet {
        &self.checked
    }

    /// Derived hidden-unknown flags.
    pub fn hidden_unknown(&self) -> &HiddenUnknown {
        &self.hidden
    }

    /// Expanded indices.
    pub fn expanded(&self) -> &IndexSet {
        &self.expanded
    }

    /// Selected indices.
    pub fn selected(&self) -> &IndexSet {
        &self.selected
    }

    /// Cursors whose page is being fetched.
    ///
    /// Callers should consult this before issuing
    /// [`Command::LoadSiblings`](crate::Command::LoadSiblings).
    pub fn loading_cursors(&self) -> &BTreeSet<CursorToken> {
        &self.loading_cursors
    }

    /// Whether the page behind `token` is being fetched.
    pub fn is_cursor_loading(&self, token: &CursorToken) -> bool {
        self.loading_cursors.contains(token)
    }

    /// Nodes whose children are being fetched.
    pub fn loading_children(&self) -> &IndexSet {
        &self.loading_children
    }

    /// Most recent failure, cleared by `InitialFetch` and `Reset`.
    pub fn error(&self) -> Option<&SyncError> {
        self.error.as_ref()
    }

    /// Inherited tri-state of a loaded node.
    pub fn check_state(&self, index: TreeIndex) -> Option<CheckState> {
        check_state(&self.tree, &self.checked, index)
    }

    /// True if neither the node's subtree nor any of its ancestors is checked.
    ///
    /// `None` if the node is not loaded.
    pub fn is_strictly_unchecked(&self, index: TreeIndex) -> Option<bool> {
        self.check_state(index).map(|s| s == CheckState::Unchecked)
    }

    /// Everything a renderer needs to draw one row, `None` if not loaded.
    pub fn node_flags(&self, index: TreeIndex) -> Option<NodeFlags> {
        let node = self.tree.find(index)?;
        let mut flags = match self.check_state(index)? {
            CheckState::Checked => NodeFlags::CHECKED,
            CheckState::Partial => NodeFlags::PARTIAL,
            CheckState::Unchecked => NodeFlags::empty(),
        };
        flags.set(NodeFlags::HIDDEN_UNKNOWN, self.hidden.get(index));
        flags.set(NodeFlags::EXPANDED, self.expanded.contains(index));
        flags.set(NodeFlags::SELECTED, self.selected.contains(index));
        flags.set(NodeFlags::LOADED, node.is_loaded());
        let cursor = node.cursor();
        flags.set(NodeFlags::HAS_MORE, cursor.is_some());
        flags.set(
            NodeFlags::PENDING,
            self.loading_children.contains(index) || cursor.is_some_and(|c| c.pending),
        );
        Some(flags)
    }
}
