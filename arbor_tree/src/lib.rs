// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arbor Tree: an immutable, lazily-loaded tree with pagination sentinels.
//!
//! A remote hierarchy is too large to fetch at once, so it arrives a page at a
//! time: the roots first, then the children of whatever the user expands, then
//! further sibling pages behind a cursor. Every node reports its preorder index
//! and subtree size up front, which is enough to answer containment questions
//! about parts of the tree that have not been fetched yet.
//!
//! - [`Tree`]: a forest of shared [`Node`]s. Updates copy the path from the root
//!   level to the changed node and share everything else.
//! - [`Child`]: an element of a children list, either a node or a
//!   [`CursorSentinel`] that stands for "more siblings follow".
//! - [`Tree::merge_children`]: applies a fetched [`Page`] as a new root level, as
//!   the children of one node, or as the next page behind a cursor, and rejects
//!   anything that would break the contiguity invariant ([`MergeError`]).
//! - [`check`]: derives [`HiddenUnknown`], the unchecked nodes that still own
//!   unloaded descendants, from an explicit checked [`IndexSet`](arbor_index::IndexSet).
//!
//! ## Contiguity
//!
//! Within one children list, sibling ranges are ascending and disjoint. A list
//! that ends in a sentinel may skip indices (they belong to pages not fetched
//! yet). A list without one must tile its parent's descendant range exactly.
//! An empty list means "not loaded".
//!
//! # Example
//!
//! ```rust
//! use arbor_index::{IndexSet, TreeIndex};
//! use arbor_tree::{MergeTarget, NodeRecord, Page, Tree, recompute_full};
//!
//! // R(0, size 4) -> A(1, leaf), B(2, size 2, children not fetched yet)
//! let tree = Tree::from_page(Page::new(vec![
//!     NodeRecord::new(0, 4).with_children(vec![NodeRecord::new(1, 1), NodeRecord::new(2, 2)]),
//! ]))
//! .unwrap();
//!
//! // Check A; B is unchecked and hides a descendant we know nothing about.
//! let checked = IndexSet::from([1]);
//! let hidden = recompute_full(&tree, &checked);
//! assert!(hidden.get(TreeIndex(2)));
//!
//! // Fetch B's children. The single leaf C must fill B's range.
//! let merged = tree
//!     .merge_children(MergeTarget::Children(TreeIndex(2)), Page::new(vec![NodeRecord::new(3, 1)]))
//!     .unwrap();
//! assert_eq!(merged.tree.len(), 4);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod check;
mod tree;
mod types;
mod validate;

pub use check::{
    CheckState, HiddenUnknown, check_state, is_strictly_unchecked, recompute_for_subtree,
    recompute_full,
};
pub use tree::{MergeTarget, Merged, Tree, traverse};
pub use types::{Child, CursorSentinel, CursorToken, Node, NodeMeta, NodeRecord, Page};
pub use validate::MergeError;
