// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Contiguity checks and record conversion.
//!
//! A children list is valid when:
//! - a sentinel appears at most once, and only in last position;
//! - every node has a non-zero subtree size and lies inside its parent's descendant range;
//! - sibling ranges are ascending and do not overlap;
//! - without a trailing sentinel, the siblings tile the parent's descendant range exactly.
//!
//! An empty list is valid: it means "not loaded yet".

use alloc::sync::Arc;
use alloc::vec::Vec;

use arbor_index::{IndexRange, TreeIndex};
use thiserror::Error;

use crate::types::{Child, CursorSentinel, CursorToken, Node, NodeMeta, NodeRecord, Page};

/// A structural change that would break the tree's invariants.
///
/// These are programmer- or data-source-level faults and are never silently
/// tolerated: the offending merge is rejected and the previous tree is kept.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum MergeError {
    /// No loaded node has this index.
    #[error("node {0} is not loaded")]
    NotFound(TreeIndex),

    /// No children list ends with this cursor.
    #[error("cursor {0} is not in the tree")]
    CursorNotFound(CursorToken),

    /// A node reported an empty subtree.
    #[error("node {0} reports a subtree size of zero")]
    ZeroSubtreeSize(TreeIndex),

    /// A child's range escapes its parent's descendant range.
    #[error("node {child} (size {size}) lies outside the subtree of {parent}")]
    OutsideParent {
        /// Offending child.
        child: TreeIndex,
        /// Its reported subtree size.
        size: u32,
        /// Parent it was delivered under.
        parent: TreeIndex,
    },

    /// Two siblings overlap or appear out of order.
    #[error("sibling {next} overlaps or precedes {previous}")]
    SiblingOrder {
        /// Earlier sibling in the list.
        previous: TreeIndex,
        /// The sibling that follows it.
        next: TreeIndex,
    },

    /// A complete children list skips indices.
    #[error("expected a child at {expected} under {parent:?}, found {found}")]
    Gap {
        /// Parent of the list, `None` for the roots.
        parent: Option<TreeIndex>,
        /// Index the next sibling had to start at.
        expected: TreeIndex,
        /// Index it started at.
        found: TreeIndex,
    },

    /// A complete children list does not add up to the reported subtree size.
    #[error("node {parent} reports {reported} descendants but {delivered} were delivered")]
    SizeMismatch {
        /// Parent of the list.
        parent: TreeIndex,
        /// `subtree_size - 1` of the parent.
        reported: u32,
        /// Sum of the delivered children's subtree sizes.
        delivered: u32,
    },

    /// A record names a parent other than the node it was delivered under.
    #[error("node {child} claims parent {claimed:?} but was delivered under {actual:?}")]
    ParentMismatch {
        /// Offending record.
        child: TreeIndex,
        /// Parent named by the record.
        claimed: Option<TreeIndex>,
        /// Parent it was delivered under.
        actual: Option<TreeIndex>,
    },

    /// A sentinel appears before the end of a list.
    #[error("cursor is not the last element of the children of {parent:?}")]
    CursorNotLast {
        /// Parent of the list, `None` for the roots.
        parent: Option<TreeIndex>,
    },

    /// A patch changed a node's index or subtree size.
    #[error("patch changed the identity or size of node {0}")]
    RangeChanged(TreeIndex),
}

/// Validate one children list against its parent (or the root level when `parent` is `None`).
///
/// Shallow: descendants of the listed nodes were validated when they were built.
pub(crate) fn check_list(parent: Option<&Node>, children: &[Child]) -> Result<(), MergeError> {
    let parent_index = parent.map(Node::index);
    let bounds = parent.map(|p| p.range().descendants());

    let mut has_cursor = false;
    let mut previous: Option<IndexRange> = None;
    let mut delivered: u32 = 0;
    for (i, child) in children.iter().enumerate() {
        let node = match child {
            Child::Cursor(_) if i + 1 == children.len() => {
                has_cursor = true;
                continue;
            }
            Child::Cursor(_) => {
                return Err(MergeError::CursorNotLast {
                    parent: parent_index,
                });
            }
            Child::Node(node) => node,
        };
        let range = node.range();
        if range.is_empty() {
            return Err(MergeError::ZeroSubtreeSize(node.index));
        }
        if node.parent != parent_index {
            return Err(MergeError::ParentMismatch {
                child: node.index,
                claimed: node.parent,
                actual: parent_index,
            });
        }
        if let (Some(bounds), Some(p)) = (bounds, parent_index)
            && !bounds.contains_range(&range)
        {
            return Err(MergeError::OutsideParent {
                child: node.index,
                size: range.len,
                parent: p,
            });
        }
        if let Some(prev) = previous
            && range.start < prev.end()
        {
            return Err(MergeError::SiblingOrder {
                previous: prev.start,
                next: range.start,
            });
        }
        delivered = delivered.saturating_add(range.len);
        previous = Some(range);
    }

    // Gaps are only allowed where a cursor says more siblings exist.
    let (Some(bounds), Some(p)) = (bounds, parent_index) else {
        return Ok(());
    };
    if has_cursor || children.is_empty() {
        return Ok(());
    }
    let mut expected = bounds.start;
    for node in children.iter().filter_map(Child::as_node) {
        if node.index != expected {
            return Err(MergeError::Gap {
                parent: parent_index,
                expected,
                found: node.index,
            });
        }
        expected = node.range().end();
    }
    if expected != bounds.end() {
        return Err(MergeError::SizeMismatch {
            parent: p,
            reported: bounds.len,
            delivered,
        });
    }
    Ok(())
}

/// Build a validated node (and its delivered descendants) from a record.
pub(crate) fn node_from_record(
    record: NodeRecord,
    parent: Option<TreeIndex>,
) -> Result<Arc<Node>, MergeError> {
    if record.subtree_size == 0 {
        return Err(MergeError::ZeroSubtreeSize(record.index));
    }
    if record.parent.is_some() && record.parent != parent {
        return Err(MergeError::ParentMismatch {
            child: record.index,
            claimed: record.parent,
            actual: parent,
        });
    }
    let mut node = Node {
        index: record.index,
        id: record.id,
        parent,
        meta: NodeMeta {
            subtree_size: record.subtree_size,
        },
        children: Vec::new(),
    };
    let children = list_from_records(record.children, record.next_cursor, Some(record.index))?;
    check_list(Some(&node), &children)?;
    node.children = children;
    Ok(Arc::new(node))
}

/// Convert delivered siblings plus an optional trailing cursor into a children list.
///
/// Each node is validated recursively; the list itself is checked by the caller,
/// which knows whether it replaces or extends an existing list.
pub(crate) fn list_from_records(
    records: Vec<NodeRecord>,
    next_cursor: Option<CursorToken>,
    parent: Option<TreeIndex>,
) -> Result<Vec<Child>, MergeError> {
    let mut children = Vec::with_capacity(records.len() + usize::from(next_cursor.is_some()));
    for record in records {
        children.push(Child::Node(node_from_record(record, parent)?));
    }
    if let Some(token) = next_cursor {
        children.push(Child::Cursor(CursorSentinel::new(token)));
    }
    Ok(children)
}

/// Convert a page delivered for `parent`.
pub(crate) fn list_from_page(page: Page, parent: Option<TreeIndex>) -> Result<Vec<Child>, MergeError> {
    list_from_records(page.items, page.next_cursor, parent)
}
