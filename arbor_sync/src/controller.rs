// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Controller implementation.
//!
//! ## Overview
//!
//! [`reduce`] is a pure function from a state and a [`Command`] to the next
//! state, plus at most one [`Request`] for the caller to run. Structural
//! changes go through [`Tree::merge_children`]; every merge is followed by a
//! scoped hidden-unknown recompute, every checked-set change by a full one.
//!
//! ## Lifecycle
//!
//! - `InitialFetch` restarts from defaults in a new epoch, then requests the root level.
//!   If a node was selected while that fetch was in flight, `RootLoaded` answers
//!   with an ancestor-path request for it.
//! - `LazyLoadChildren`, `LoadSiblings`, and `LoadAncestors` request data; their
//!   completions come back as `ChildrenLoaded`, `SiblingsLoaded`, and `AncestorsLoaded`.
//! - `Reset` restarts from defaults in a new epoch.
//! - `AncestorsLoaded` replaces the tree, unless the resolved path is already
//!   loaded; then only the checked set and expansion change.
//!
//! ## Staleness
//!
//! A completion is applied only if its epoch is current and the thing it was
//! fetched for is still being waited on: the parent in `loading_children`, or
//! the cursor in `loading_cursors`. Anything else is dropped with a warning.
//!
//! ## Failures
//!
//! A failed fetch leaves the tree as it was and reverts only the affected
//! loading marker. Data that would break the tree's invariants is rejected the
//! same way and logged as an error.

use std::collections::BTreeSet;
use std::mem;

use arbor_index::{IndexSet, TreeIndex};
use arbor_tree::{CursorToken, MergeTarget, Page, Tree, recompute_for_subtree, recompute_full};

use crate::error::{FetchError, SyncError};
use crate::service::{TreeDataService, execute};
use crate::state::{SyncOptions, SyncState};
use crate::types::{AncestorPath, Command, Epoch, OpStatus, Request, RequestKind, RootQuery};

/// Outcome of one [`reduce`] step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transition {
    /// The next state.
    pub state: SyncState,
    /// Fetch to perform, if the command asked for one.
    pub request: Option<Request>,
}

impl Transition {
    fn idle(state: SyncState) -> Self {
        Self {
            state,
            request: None,
        }
    }

    fn fetch(state: SyncState, kind: RequestKind) -> Self {
        let epoch = state.epoch;
        Self {
            state,
            request: Some(Request { epoch, kind }),
        }
    }
}

/// Apply one command.
pub fn reduce(state: SyncState, command: Command) -> Transition {
    tracing::debug!(command = command.name(), epoch = state.epoch.0, "apply");
    match command {
        Command::InitialFetch(query) => initial_fetch(&state, query),
        Command::ToggleChecked(checked) => {
            let hidden = recompute_full(&state.tree, &checked);
            Transition::idle(SyncState {
                checked,
                hidden,
                ..state
            })
        }
        Command::SetSelected(selected) => Transition::idle(SyncState { selected, ..state }),
        Command::SetExpanded(expanded) => Transition::idle(SyncState { expanded, ..state }),
        Command::LazyLoadChildren(parent) => lazy_load_children(state, parent),
        Command::LoadSiblings(token) => load_siblings(state, token),
        Command::LoadAncestors(target) => {
            let mut state = state;
            state.status = OpStatus::Fetching;
            Transition::fetch(state, RequestKind::AncestorPath(target))
        }
        Command::Reset => Transition::idle(state.restarted()),
        Command::RootLoaded { epoch, result } => {
            if is_stale(&state, epoch, "RootLoaded") {
                return Transition::idle(state);
            }
            root_loaded(state, result)
        }
        Command::ChildrenLoaded {
            epoch,
            parent,
            result,
        } => {
            if is_stale(&state, epoch, "ChildrenLoaded") {
                return Transition::idle(state);
            }
            Transition::idle(children_loaded(state, parent, result))
        }
        Command::SiblingsLoaded {
            epoch,
            token,
            result,
        } => {
            if is_stale(&state, epoch, "SiblingsLoaded") {
                return Transition::idle(state);
            }
            Transition::idle(siblings_loaded(state, token, result))
        }
        Command::AncestorsLoaded {
            epoch,
            target,
            result,
        } => {
            if is_stale(&state, epoch, "AncestorsLoaded") {
                return Transition::idle(state);
            }
            Transition::idle(ancestors_loaded(state, target, result))
        }
    }
}

fn is_stale(state: &SyncState, epoch: Epoch, command: &'static str) -> bool {
    if epoch == state.epoch {
        return false;
    }
    tracing::warn!(
        command,
        result_epoch = epoch.0,
        current_epoch = state.epoch.0,
        "dropping result from a previous epoch"
    );
    true
}

fn fail(state: &mut SyncState, error: impl Into<SyncError>) {
    let error = error.into();
    match &error {
        SyncError::Merge(e) => tracing::error!(error = %e, "merge rejected"),
        SyncError::Fetch(e) => tracing::warn!(error = %e, "fetch failed"),
    }
    state.error = Some(error);
}

fn initial_fetch(state: &SyncState, query: RootQuery) -> Transition {
    let mut next = state.restarted();
    next.status = OpStatus::Fetching;
    Transition::fetch(next, RequestKind::Root(query))
}

fn root_loaded(mut state: SyncState, result: Result<Page, FetchError>) -> Transition {
    if !state.tree.is_empty() {
        // An ancestor-path load got there first.
        tracing::warn!("dropping root level; a tree is already loaded");
        return Transition::idle(state);
    }
    let loaded = result
        .map_err(SyncError::from)
        .and_then(|page| Ok(Tree::from_page(page)?));
    let tree = match loaded {
        Ok(tree) => tree,
        Err(e) => {
            state.status = OpStatus::Errored;
            fail(&mut state, e);
            return Transition::idle(state);
        }
    };
    if let Some(root) = tree.root().map(|r| r.index()) {
        if state.options.seed_root_checked {
            state.checked.insert(root);
        }
        if state.options.seed_root_expanded {
            state.expanded.insert(root);
        }
    }
    state.hidden = recompute_full(&tree, &state.checked);
    state.tree = tree;
    state.status = OpStatus::Ready;

    // A node selected while the root level was in flight gets revealed now.
    let first_selected = state.selected.iter().next();
    match first_selected {
        Some(target) => {
            tracing::debug!(%target, "revealing selection made during the initial fetch");
            state.status = OpStatus::Fetching;
            Transition::fetch(state, RequestKind::AncestorPath(target))
        }
        None => Transition::idle(state),
    }
}

fn lazy_load_children(mut state: SyncState, parent: TreeIndex) -> Transition {
    let Some(node) = state.tree.find(parent) else {
        tracing::warn!(%parent, "children requested for a node that is not loaded");
        return Transition::idle(state);
    };
    if node.is_loaded() {
        tracing::debug!(%parent, "children already loaded");
        return Transition::idle(state);
    }
    if !state.loading_children.insert(parent) {
        tracing::debug!(%parent, "children already being fetched");
        return Transition::idle(state);
    }
    Transition::fetch(state, RequestKind::Children(parent))
}

fn children_loaded(
    mut state: SyncState,
    parent: TreeIndex,
    result: Result<Page, FetchError>,
) -> SyncState {
    if !state.loading_children.remove(parent) {
        tracing::warn!(%parent, "dropping children nobody is waiting for");
        return state;
    }
    let page = match result {
        Ok(page) => page,
        Err(e) => {
            fail(&mut state, e);
            return state;
        }
    };
    match state.tree.merge_children(MergeTarget::Children(parent), page) {
        Ok(merged) => {
            tracing::debug!(%parent, added = merged.added.len(), "children merged");
            state.hidden =
                recompute_for_subtree(&state.hidden, &merged.tree, merged.parent, &state.checked);
            state.tree = merged.tree;
        }
        Err(e) => fail(&mut state, e),
    }
    state
}

fn load_siblings(mut state: SyncState, token: CursorToken) -> Transition {
    if state.is_cursor_loading(&token) {
        tracing::warn!(%token, "page already being fetched");
        return Transition::idle(state);
    }
    match state.tree.set_cursor_pending(&token, true) {
        Ok(tree) => state.tree = tree,
        Err(e) => {
            tracing::warn!(%token, error = %e, "page requested for an unknown cursor");
            return Transition::idle(state);
        }
    }
    state.loading_cursors.insert(token.clone());
    Transition::fetch(state, RequestKind::Siblings(token))
}

fn siblings_loaded(
    mut state: SyncState,
    token: CursorToken,
    result: Result<Page, FetchError>,
) -> SyncState {
    if !state.loading_cursors.remove(&token) {
        tracing::warn!(%token, "dropping page nobody is waiting for");
        return state;
    }
    let merged = result
        .map_err(SyncError::from)
        .and_then(|page| {
            state
                .tree
                .merge_children(MergeTarget::Siblings(token.clone()), page)
                .map_err(SyncError::from)
        });
    match merged {
        Ok(merged) => {
            tracing::debug!(%token, added = merged.added.len(), "page merged");
            state.hidden =
                recompute_for_subtree(&state.hidden, &merged.tree, merged.parent, &state.checked);
            state.tree = merged.tree;
        }
        Err(e) => {
            // Put back a non-pending sentinel so the page can be requested again.
            match state.tree.set_cursor_pending(&token, false) {
                Ok(tree) => state.tree = tree,
                Err(restore) => tracing::error!(%token, error = %restore, "sentinel vanished"),
            }
            fail(&mut state, e);
        }
    }
    state
}

fn ancestors_loaded(
    mut state: SyncState,
    target: TreeIndex,
    result: Result<AncestorPath, FetchError>,
) -> SyncState {
    let loaded = result.map_err(SyncError::from).and_then(|path| {
        let (page, checked) = path.into_parts();
        Ok((Tree::from_page(page)?, checked.into_iter().collect::<IndexSet>()))
    });
    let (mut tree, checked) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => {
            state.status = if state.tree.is_empty() {
                OpStatus::Errored
            } else {
                OpStatus::Ready
            };
            fail(&mut state, e);
            return state;
        }
    };

    let chain: Vec<TreeIndex> = tree
        .path_to(target)
        .map(|path| path.iter().map(|n| n.index()).collect())
        .unwrap_or_default();
    if state.options.expand_ancestors {
        state.expanded.extend(chain.iter().copied());
    }

    if state.tree.has_branch(&chain) {
        // The path is already loaded: keep every fetched page and in-flight marker.
        tracing::debug!(%target, "path already loaded; keeping the tree");
    } else {
        // In-flight fetches survive only where their target is still waiting in the new tree.
        state
            .loading_children
            .retain(|i| tree.find(i).is_some_and(|n| !n.is_loaded()));
        let mut kept = BTreeSet::new();
        for token in mem::take(&mut state.loading_cursors) {
            if let Ok(pending) = tree.set_cursor_pending(&token, true) {
                tree = pending;
                kept.insert(token);
            }
        }
        state.loading_cursors = kept;
        state.tree = tree;
    }

    state.hidden = recompute_full(&state.tree, &checked);
    state.checked = checked;
    state.status = OpStatus::Ready;
    state
}

/// Owns a [`SyncState`] and drives commands through [`reduce`].
#[derive(Clone, Debug, Default)]
pub struct SyncController {
    state: SyncState,
}

impl SyncController {
    /// A controller with the given options and an empty state.
    pub fn new(options: SyncOptions) -> Self {
        Self {
            state: SyncState::new(options),
        }
    }

    /// Current state.
    pub fn state(&self) -> &SyncState {
        &self.state
    }

    /// Apply one command and return the fetch it asks for, if any.
    ///
    /// Use this when requests are executed elsewhere (for example, concurrently);
    /// feed each completion back through `apply`.
    pub fn apply(&mut self, command: Command) -> Option<Request> {
        let state = mem::take(&mut self.state);
        let Transition { state, request } = reduce(state, command);
        self.state = state;
        request
    }

    /// Apply `command`, run any request it produces against `service`, and
    /// apply the completion, until no request is left.
    pub async fn dispatch<S>(&mut self, service: &S, command: Command) -> &SyncState
    where
        S: TreeDataService + ?Sized,
    {
        let mut next = Some(command);
        while let Some(command) = next.take() {
            if let Some(request) = self.apply(command) {
                next = Some(execute(service, request).await);
            }
        }
        &self.state
    }
}
