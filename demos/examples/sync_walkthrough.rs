// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sync walkthrough.
//!
//! Drive a controller against an in-memory service: load the root, expand,
//! page through siblings, check a branch, and jump to a deep node.
//!
//! Run:
//! - `cargo run -p arbor_demos --example sync_walkthrough`
//! - `RUST_LOG=arbor_sync=trace cargo run -p arbor_demos --example sync_walkthrough`

use arbor_index::{IndexSet, TreeIndex};
use arbor_sync::adapters::memory::{MemoryNode, MemoryService};
use arbor_sync::{Command, NodeFlags, RootQuery, SyncController, SyncOptions, SyncState};
use arbor_tree::Child;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn flag_marks(flags: NodeFlags) -> String {
    let mut out = String::new();
    out.push_str(if flags.contains(NodeFlags::CHECKED) {
        "[x]"
    } else if flags.contains(NodeFlags::PARTIAL) {
        "[-]"
    } else {
        "[ ]"
    });
    for (flag, mark) in [
        (NodeFlags::HIDDEN_UNKNOWN, " ?"),
        (NodeFlags::SELECTED, " *"),
        (NodeFlags::HAS_MORE, " +"),
        (NodeFlags::PENDING, " ..."),
    ] {
        if flags.contains(flag) {
            out.push_str(mark);
        }
    }
    out
}

/// Print the rows a tree view would show: children of expanded nodes only.
fn print_rows(state: &SyncState, children: &[Child], depth: usize) {
    for child in children {
        match child {
            Child::Node(node) => {
                let flags = state.node_flags(node.index()).unwrap_or_default();
                let arrow = if node.is_leaf() {
                    ' '
                } else if flags.contains(NodeFlags::EXPANDED) {
                    'v'
                } else {
                    '>'
                };
                println!(
                    "{:indent$}{arrow} #{} {}",
                    "",
                    node.index(),
                    flag_marks(flags),
                    indent = depth * 2
                );
                if flags.contains(NodeFlags::EXPANDED) {
                    print_rows(state, node.children(), depth + 1);
                }
            }
            Child::Cursor(cursor) => {
                let label = if cursor.pending { "loading" } else { "load more" };
                println!("{:indent$}  ({label})", "", indent = depth * 2);
            }
        }
    }
}

fn show(title: &str, state: &SyncState) {
    println!("== {title} [{:?}, epoch {}]", state.status(), state.epoch());
    print_rows(state, state.tree().roots(), 0);
    if let Some(err) = state.error() {
        println!("   last error: {err}");
    }
}

/// First cursor found under `parent`, if its children list is still partial.
fn cursor_under(state: &SyncState, parent: TreeIndex) -> Option<arbor_tree::CursorToken> {
    let node = state.tree().find(parent)?;
    node.cursor().map(|c| c.token.clone())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "arbor_sync=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Root with four branches of four leaves each, served two at a time.
    let service = MemoryService::new(vec![MemoryNode::balanced(3, 4)]).with_page_size(2);
    let mut controller = SyncController::new(SyncOptions::default().seed_root_checked(false));

    let state = controller
        .dispatch(&service, Command::InitialFetch(RootQuery::new(7, 1)))
        .await;
    show("root loaded", state);

    let state = controller
        .dispatch(&service, Command::LazyLoadChildren(TreeIndex(0)))
        .await;
    show("first page of branches", state);

    let state = controller
        .dispatch(&service, Command::ToggleChecked(IndexSet::from([1])))
        .await;
    show("first branch checked", state);

    while let Some(token) = cursor_under(controller.state(), TreeIndex(0)) {
        controller.dispatch(&service, Command::LoadSiblings(token)).await;
    }
    show("all branches loaded", controller.state());

    controller
        .dispatch(&service, Command::LazyLoadChildren(TreeIndex(6)))
        .await;
    let mut expanded = controller.state().expanded().clone();
    expanded.insert(TreeIndex(6));
    controller.dispatch(&service, Command::SetExpanded(expanded)).await;
    controller
        .dispatch(&service, Command::SetSelected(IndexSet::from([7])))
        .await;
    show("second branch opened", controller.state());

    // A failed page leaves the cursor in place to retry.
    if let Some(token) = cursor_under(controller.state(), TreeIndex(6)) {
        service.fail_next();
        controller
            .dispatch(&service, Command::LoadSiblings(token))
            .await;
        show("page fetch failed", controller.state());
    }

    let state = controller
        .dispatch(&service, Command::LoadAncestors(TreeIndex(19)))
        .await;
    show("jumped to #19", state);

    println!("service calls: {}", service.calls());
}
