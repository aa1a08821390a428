// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The data-source boundary.

use arbor_index::TreeIndex;
use arbor_tree::{CursorToken, Page};

use crate::error::FetchError;
use crate::types::{AncestorPath, Command, Request, RequestKind, RootQuery};

/// Remote source of tree pages.
///
/// Every record crossing this boundary carries its preorder index and its
/// authoritative subtree size. The controller never calls the service itself:
/// it emits [`Request`]s, and [`execute`] (or the caller's own executor) turns
/// them into calls here.
#[async_trait::async_trait]
pub trait TreeDataService: Send + Sync {
    /// The root level of a hierarchy.
    async fn fetch_root(&self, query: &RootQuery) -> Result<Page, FetchError>;

    /// The first page of children of `parent`.
    async fn fetch_children(&self, parent: TreeIndex) -> Result<Page, FetchError>;

    /// The page of siblings behind `cursor`.
    async fn fetch_siblings_page(&self, cursor: &CursorToken) -> Result<Page, FetchError>;

    /// The path from the root level to `target`, with the matching checked set.
    async fn fetch_ancestor_path(&self, target: TreeIndex) -> Result<AncestorPath, FetchError>;
}

/// Run one request and wrap the outcome in its completion command.
pub async fn execute<S>(service: &S, request: Request) -> Command
where
    S: TreeDataService + ?Sized,
{
    let Request { epoch, kind } = request;
    match kind {
        RequestKind::Root(query) => Command::RootLoaded {
            epoch,
            result: service.fetch_root(&query).await,
        },
        RequestKind::Children(parent) => Command::ChildrenLoaded {
            epoch,
            parent,
            result: service.fetch_children(parent).await,
        },
        RequestKind::Siblings(token) => {
            let result = service.fetch_siblings_page(&token).await;
            Command::SiblingsLoaded {
                epoch,
                token,
                result,
            }
        }
        RequestKind::AncestorPath(target) => Command::AncestorsLoaded {
            epoch,
            target,
            result: service.fetch_ancestor_path(target).await,
        },
    }
}
