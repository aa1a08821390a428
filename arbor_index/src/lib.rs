// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arbor Index: nested-set arithmetic over preorder tree indices.
//!
//! Every node of a remote hierarchy is numbered in preorder and reports its
//! subtree size up front. Together those two numbers give the node a contiguous
//! [`IndexRange`], so "is `k` inside this subtree" is a comparison instead of a
//! traversal, and stays correct while descendants have not been fetched yet.
//!
//! - [`TreeIndex`]: preorder position, used as node identity.
//! - [`IndexRange`]: the `[index, index + subtree_size)` span of a subtree.
//! - [`IndexSet`]: ordered index set whose [`IndexSet::any_within`] answers
//!   "does any member fall in this subtree" with one range probe.
//!
//! It does not depend on any tree representation; higher layers (such as
//! `arbor_tree`) attach ranges to their nodes and feed them here.
//!
//! # Example
//!
//! ```rust
//! use arbor_index::{IndexRange, IndexSet, TreeIndex};
//!
//! // A node at index 4 whose subtree holds 5 indices: 4, 5, 6, 7, 8.
//! let node = IndexRange::new(TreeIndex(4), 5);
//! assert!(node.contains(TreeIndex(8)));
//! assert!(!node.contains(TreeIndex(9)));
//!
//! // Nothing checked inside 4..9 means the node is strictly unchecked.
//! let checked = IndexSet::from([0, 2, 11]);
//! assert!(!checked.any_within(node));
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod set;
pub mod types;

pub use set::IndexSet;
pub use types::{IndexRange, TreeIndex, contains};
