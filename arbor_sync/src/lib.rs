// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Arbor Sync: a command-driven controller for browsing a remote tree lazily.
//!
//! ## Overview
//!
//! The controller owns the loaded [`Tree`](arbor_tree::Tree), the explicit
//! checked set, the derived hidden-unknown flags, and the expanded and selected
//! sets. It accepts [`Command`]s and answers each with a new [`SyncState`] plus,
//! when data is needed, a [`Request`] for a [`TreeDataService`].
//!
//! ## Workflow
//!
//! 1) Send `InitialFetch` with a [`RootQuery`]. The state restarts in a new
//!    [`Epoch`] and a root-level request comes back.
//! 2) Run the request with [`execute`], which returns the completion command,
//!    and apply that. [`SyncController::dispatch`] does both in a loop.
//! 3) Drive the tree from the UI: `LazyLoadChildren` when a node is expanded,
//!    `LoadSiblings` when a cursor row scrolls into view, `ToggleChecked` when
//!    the selection changes, `LoadAncestors` to jump to a node.
//!
//! ## Guarantees
//!
//! - At most one fetch per cursor and per parent is in flight; repeats are no-ops.
//! - Completions from an earlier epoch, or for a target the current tree no
//!   longer waits on, are dropped.
//! - Fetch failures and inconsistent data never alter the tree; they are kept
//!   in [`SyncState::error`].
//! - After every change, the hidden-unknown flags equal a full recompute.
//!
//! ## Example
//!
//! ```
//! use arbor_index::TreeIndex;
//! use arbor_sync::adapters::memory::{MemoryNode, MemoryService};
//! use arbor_sync::{Command, RootQuery, SyncController, SyncOptions};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let service = MemoryService::new(vec![MemoryNode::balanced(3, 3)]);
//! let mut controller = SyncController::new(SyncOptions::default());
//!
//! controller.dispatch(&service, Command::InitialFetch(RootQuery::new(1, 1))).await;
//! controller.dispatch(&service, Command::LazyLoadChildren(TreeIndex(0))).await;
//! assert_eq!(controller.state().tree().len(), 4);
//! # }
//! ```

pub mod adapters;
mod controller;
mod error;
mod service;
mod state;
mod types;

pub use controller::{SyncController, Transition, reduce};
pub use error::{FetchError, SyncError};
pub use service::{TreeDataService, execute};
pub use state::{SyncOptions, SyncState};
pub use types::{
    AncestorPath, Command, Epoch, NodeFlags, OpStatus, Request, RequestKind, RootQuery,
};
