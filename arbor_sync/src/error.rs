// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.

use arbor_index::TreeIndex;
use arbor_tree::{CursorToken, MergeError};
use thiserror::Error;

/// Failure reported by a [`TreeDataService`](crate::TreeDataService).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum FetchError {
    /// Transport or backend failure.
    #[error("service error: {0}")]
    Service(String),

    /// The service does not know this index.
    #[error("node {0} does not exist")]
    NotFound(TreeIndex),

    /// The service did not issue this cursor, or it has expired.
    #[error("invalid cursor {0}")]
    InvalidCursor(CursorToken),
}

/// Last failure observed by the controller, kept in [`SyncState::error`](crate::SyncState::error).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SyncError {
    /// A fetch failed; the tree is unchanged.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Fetched data would have broken the tree's invariants; it was not applied.
    #[error("rejected inconsistent data: {0}")]
    Merge(#[from] MergeError),
}
