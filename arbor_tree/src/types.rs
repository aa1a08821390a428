// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the tree: nodes, pagination sentinels, and wire records.

use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use arbor_index::{IndexRange, TreeIndex};

/// Opaque pagination token issued by the data source.
///
/// Names the position "more siblings follow here" in one children list.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CursorToken(String);

impl CursorToken {
    /// Wrap a token string.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CursorToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Placeholder for "more siblings exist" at the end of a children list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CursorSentinel {
    /// Token to pass to the data source to fetch the next page.
    pub token: CursorToken,
    /// True while the page behind this cursor is being fetched.
    ///
    /// A pending sentinel is shown as a placeholder whose interactions are swallowed.
    pub pending: bool,
}

impl CursorSentinel {
    /// A fresh, non-pending sentinel.
    pub fn new(token: CursorToken) -> Self {
        Self {
            token,
            pending: false,
        }
    }
}

/// One element of a children list: a data node or a pagination sentinel.
///
/// A sentinel, if present, is always the last element of its list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Child {
    /// A loaded data node.
    Node(Arc<Node>),
    /// "More siblings follow" marker.
    Cursor(CursorSentinel),
}

impl Child {
    /// The data node, if this is one.
    pub fn as_node(&self) -> Option<&Arc<Node>> {
        match self {
            Self::Node(node) => Some(node),
            Self::Cursor(_) => None,
        }
    }

    /// The sentinel, if this is one.
    pub fn as_cursor(&self) -> Option<&CursorSentinel> {
        match self {
            Self::Node(_) => None,
            Self::Cursor(cursor) => Some(cursor),
        }
    }
}

/// Per-node metadata reported by the data source.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeMeta {
    /// Authoritative size of the subtree rooted here, the node included.
    ///
    /// Known before any child is loaded; always at least `1`.
    pub subtree_size: u32,
}

/// A loaded node of the hierarchy.
///
/// Nodes are never mutated in place once placed in a [`Tree`](crate::Tree);
/// structural changes produce a new tree that shares every untouched subtree.
/// Index and subtree size are fixed at construction, so the node's
/// [`range`](Self::range) never changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    pub(crate) index: TreeIndex,
    pub(crate) id: u64,
    pub(crate) parent: Option<TreeIndex>,
    pub(crate) meta: NodeMeta,
    pub(crate) children: Vec<Child>,
}

impl Node {
    /// Preorder index.
    pub fn index(&self) -> TreeIndex {
        self.index
    }

    /// Identifier assigned by the data source.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Index of the parent node, `None` for a root.
    pub fn parent(&self) -> Option<TreeIndex> {
        self.parent
    }

    /// Reported metadata.
    pub fn meta(&self) -> NodeMeta {
        self.meta
    }

    /// Shorthand for `meta().subtree_size`.
    pub fn subtree_size(&self) -> u32 {
        self.meta.subtree_size
    }

    /// The contiguous index span of this subtree.
    pub fn range(&self) -> IndexRange {
        IndexRange::new(self.index, self.meta.subtree_size)
    }

    /// Whether `k` lies in this node's subtree, loaded or not.
    pub fn contains(&self, k: TreeIndex) -> bool {
        self.range().contains(k)
    }

    /// Loaded children, with a trailing sentinel when more pages exist.
    pub fn children(&self) -> &[Child] {
        &self.children
    }

    /// Mutable access to the children list.
    ///
    /// Only reachable through [`Tree::update_node`](crate::Tree::update_node),
    /// which re-validates the list before publishing the new tree.
    pub fn children_mut(&mut self) -> &mut Vec<Child> {
        &mut self.children
    }

    /// Replace the data-source identifier.
    pub fn set_id(&mut self, id: u64) {
        self.id = id;
    }

    /// Loaded child nodes, skipping the sentinel.
    pub fn child_nodes(&self) -> impl Iterator<Item = &Arc<Node>> + '_ {
        self.children.iter().filter_map(Child::as_node)
    }

    /// The trailing sentinel, if more siblings remain to be fetched.
    pub fn cursor(&self) -> Option<&CursorSentinel> {
        self.children.last().and_then(Child::as_cursor)
    }

    /// True if the node has no descendants at all.
    pub fn is_leaf(&self) -> bool {
        self.meta.subtree_size == 1
    }

    /// True if the node's children have been fetched (always true for a leaf).
    pub fn is_loaded(&self) -> bool {
        self.is_leaf() || !self.children.is_empty()
    }

    /// Visit this node and every loaded descendant in preorder.
    pub fn walk<'a>(&'a self, mut visit: impl FnMut(&'a Self)) {
        let mut stack: Vec<&'a Self> = Vec::new();
        stack.push(self);
        while let Some(node) = stack.pop() {
            visit(node);
            for child in node.children.iter().rev() {
                if let Child::Node(n) = child {
                    stack.push(n);
                }
            }
        }
    }
}

/// A node as delivered by the data source.
///
/// Records may nest already-fetched descendants in `children`. Converting a
/// record into a [`Node`] validates the contiguity invariant for every level.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeRecord {
    /// Preorder index.
    pub index: TreeIndex,
    /// Identifier assigned by the data source.
    pub id: u64,
    /// Parent index as reported; checked against where the record is delivered.
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent: Option<TreeIndex>,
    /// Authoritative subtree size.
    pub subtree_size: u32,
    /// Already-fetched children, in sibling order.
    #[cfg_attr(feature = "serde", serde(default))]
    pub children: Vec<NodeRecord>,
    /// Cursor for the rest of `children`, if they were delivered partially.
    #[cfg_attr(feature = "serde", serde(default))]
    pub next_cursor: Option<CursorToken>,
}

impl NodeRecord {
    /// A record with no loaded children whose `id` mirrors its index.
    pub fn new(index: u32, subtree_size: u32) -> Self {
        Self {
            index: TreeIndex(index),
            id: u64::from(index),
            parent: None,
            subtree_size,
            children: Vec::new(),
            next_cursor: None,
        }
    }

    /// Set the data-source identifier.
    #[must_use]
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Set the reported parent.
    #[must_use]
    pub fn with_parent(mut self, parent: u32) -> Self {
        self.parent = Some(TreeIndex(parent));
        self
    }

    /// Attach already-fetched children.
    #[must_use]
    pub fn with_children(mut self, children: Vec<Self>) -> Self {
        self.children = children;
        self
    }

    /// Mark `children` as a partial first page.
    #[must_use]
    pub fn with_cursor(mut self, token: impl Into<String>) -> Self {
        self.next_cursor = Some(CursorToken::new(token));
        self
    }
}

/// One page of nodes returned by the data source.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Page {
    /// Delivered siblings, in order.
    pub items: Vec<NodeRecord>,
    /// Cursor for the following page, if any.
    #[cfg_attr(feature = "serde", serde(default))]
    pub next_cursor: Option<CursorToken>,
}

impl Page {
    /// A final page (no cursor).
    pub fn new(items: Vec<NodeRecord>) -> Self {
        Self {
            items,
            next_cursor: None,
        }
    }

    /// A page followed by more.
    #[must_use]
    pub fn with_cursor(mut self, token: impl Into<String>) -> Self {
        self.next_cursor = Some(CursorToken::new(token));
        self
    }
}
