// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Commands, requests, and the small value types shared by the controller and services.

use core::fmt;

use arbor_index::{IndexSet, TreeIndex};
use arbor_tree::{CursorToken, NodeRecord, Page};

use crate::error::FetchError;

/// Generation counter for the whole-tree lifecycle.
///
/// Bumped by [`Command::InitialFetch`] and [`Command::Reset`]. Every
/// [`Request`] carries the epoch current when it was issued; a completion from
/// an older epoch is stale and is dropped.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch(pub u64);

impl Epoch {
    /// The epoch after this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Epoch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "epoch {}", self.0)
    }
}

/// Identifies the hierarchy to load: a model revision.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RootQuery {
    /// Model identifier.
    pub model_id: u64,
    /// Revision of the model.
    pub revision_id: u64,
}

impl RootQuery {
    /// Query for one model revision.
    pub const fn new(model_id: u64, revision_id: u64) -> Self {
        Self {
            model_id,
            revision_id,
        }
    }
}

/// Server-resolved path to a node, with the checked set that goes with it.
///
/// `tree` is a root-level list whose nested records lead to the target.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AncestorPath {
    /// Root-level records; the path to the target is nested inside.
    pub tree: Vec<NodeRecord>,
    /// Cursor for the rest of the root level, if it was delivered partially.
    #[cfg_attr(feature = "serde", serde(default))]
    pub next_cursor: Option<CursorToken>,
    /// Indices to treat as explicitly checked.
    #[cfg_attr(feature = "serde", serde(default))]
    pub checked: Vec<TreeIndex>,
}

impl AncestorPath {
    /// The root level as a page.
    pub fn into_parts(self) -> (Page, Vec<TreeIndex>) {
        (
            Page {
                items: self.tree,
                next_cursor: self.next_cursor,
            },
            self.checked,
        )
    }
}

/// Input to the controller: user intents and fetch completions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Discard everything and load the root level of a hierarchy.
    InitialFetch(RootQuery),
    /// Replace the explicit checked set.
    ToggleChecked(IndexSet),
    /// Replace the selected set.
    SetSelected(IndexSet),
    /// Replace the expanded set.
    SetExpanded(IndexSet),
    /// Fetch the children of a loaded, not-yet-populated node.
    LazyLoadChildren(TreeIndex),
    /// Fetch the page behind a cursor sentinel.
    LoadSiblings(CursorToken),
    /// Load the server-resolved path to a node.
    ///
    /// The tree is replaced unless that path is already loaded.
    LoadAncestors(TreeIndex),
    /// Restore every field to its default and start a new epoch.
    Reset,

    /// Completion of a [`RequestKind::Root`] request.
    RootLoaded {
        /// Epoch the request was issued in.
        epoch: Epoch,
        /// Fetched root level.
        result: Result<Page, FetchError>,
    },
    /// Completion of a [`RequestKind::Children`] request.
    ChildrenLoaded {
        /// Epoch the request was issued in.
        epoch: Epoch,
        /// Node whose children were fetched.
        parent: TreeIndex,
        /// Fetched children.
        result: Result<Page, FetchError>,
    },
    /// Completion of a [`RequestKind::Siblings`] request.
    SiblingsLoaded {
        /// Epoch the request was issued in.
        epoch: Epoch,
        /// Cursor the page was fetched for.
        token: CursorToken,
        /// Fetched page.
        result: Result<Page, FetchError>,
    },
    /// Completion of a [`RequestKind::AncestorPath`] request.
    AncestorsLoaded {
        /// Epoch the request was issued in.
        epoch: Epoch,
        /// Node the path leads to.
        target: TreeIndex,
        /// Resolved path.
        result: Result<AncestorPath, FetchError>,
    },
}

impl Command {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitialFetch(_) => "InitialFetch",
            Self::ToggleChecked(_) => "ToggleChecked",
            Self::SetSelected(_) => "SetSelected",
            Self::SetExpanded(_) => "SetExpanded",
            Self::LazyLoadChildren(_) => "LazyLoadChildren",
            Self::LoadSiblings(_) => "LoadSiblings",
            Self::LoadAncestors(_) => "LoadAncestors",
            Self::Reset => "Reset",
            Self::RootLoaded { .. } => "RootLoaded",
            Self::ChildrenLoaded { .. } => "ChildrenLoaded",
            Self::SiblingsLoaded { .. } => "SiblingsLoaded",
            Self::AncestorsLoaded { .. } => "AncestorsLoaded",
        }
    }
}

/// What to fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestKind {
    /// `TreeDataService::fetch_root`.
    Root(RootQuery),
    /// `TreeDataService::fetch_children`.
    Children(TreeIndex),
    /// `TreeDataService::fetch_siblings_page`.
    Siblings(CursorToken),
    /// `TreeDataService::fetch_ancestor_path`.
    AncestorPath(TreeIndex),
}

/// A fetch the controller wants performed.
///
/// Run it with [`execute`](crate::execute) (or any other executor) and feed the
/// resulting completion [`Command`] back into the controller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    /// Epoch the request belongs to.
    pub epoch: Epoch,
    /// What to fetch.
    pub kind: RequestKind,
}

/// Lifecycle of the whole tree.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OpStatus {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// A root-level or ancestor-path fetch is outstanding.
    Fetching,
    /// A tree is loaded.
    Ready,
    /// The last root-level fetch failed and no tree is loaded.
    Errored,
}

bitflags::bitflags! {
    /// Render-ready summary of one loaded node.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u8 {
        /// The node or an ancestor is explicitly checked.
        const CHECKED        = 0b0000_0001;
        /// Some, but not all, of the subtree is checked.
        const PARTIAL        = 0b0000_0010;
        /// Unchecked, with unloaded descendants of unknown state.
        const HIDDEN_UNKNOWN = 0b0000_0100;
        /// In the expanded set.
        const EXPANDED       = 0b0000_1000;
        /// In the selected set.
        const SELECTED       = 0b0001_0000;
        /// Children fetched (always set for leaves).
        const LOADED         = 0b0010_0000;
        /// The children list ends with a cursor.
        const HAS_MORE       = 0b0100_0000;
        /// A children or sibling-page fetch for this node is outstanding.
        const PENDING        = 0b1000_0000;
    }
}
