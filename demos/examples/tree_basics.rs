// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tree basics.
//!
//! Load a root, fetch children in two pages, and watch the hidden-unknown
//! flags follow the checked set.
//!
//! Run:
//! - `cargo run -p arbor_demos --example tree_basics`

use arbor_index::{IndexSet, TreeIndex};
use arbor_tree::{
    Child, CursorToken, HiddenUnknown, MergeTarget, NodeRecord, Page, Tree, recompute_for_subtree, recompute_full,
};

fn print_level(children: &[Child], checked: &IndexSet, hidden: &HiddenUnknown, depth: usize) {
    for child in children {
        match child {
            Child::Node(n) => {
                println!(
                    "{:indent$}{} size={} {}{}",
                    "",
                    n.index(),
                    n.subtree_size(),
                    if checked.contains(n.index()) { "[x]" } else { "[ ]" },
                    if hidden.get(n.index()) { " (hidden unknown)" } else { "" },
                    indent = depth * 2
                );
                print_level(n.children(), checked, hidden, depth + 1);
            }
            Child::Cursor(c) => println!("{:indent$}... more ({})", "", c.token, indent = depth * 2),
        }
    }
}

fn print(tree: &Tree, checked: &IndexSet) {
    print_level(tree.roots(), checked, &recompute_full(tree, checked), 0);
}

fn main() {
    // R(0) holds A(1, leaf) and B(2), whose four descendants are not fetched yet.
    let tree = Tree::from_page(Page::new(vec![
        NodeRecord::new(0, 7).with_children(vec![NodeRecord::new(1, 1), NodeRecord::new(2, 5)]),
    ]))
    .expect("children tile the root");

    let checked = IndexSet::from([1]);
    println!("-- A checked, B not fetched");
    print(&tree, &checked);

    // B's children arrive in two pages.
    let first = tree
        .merge_children(
            MergeTarget::Children(TreeIndex(2)),
            Page::new(vec![NodeRecord::new(3, 1), NodeRecord::new(4, 2)]).with_cursor("b-2"),
        )
        .expect("first page fits inside B");
    let hidden = recompute_for_subtree(
        &recompute_full(&tree, &checked),
        &first.tree,
        first.parent,
        &checked,
    );
    assert_eq!(hidden, recompute_full(&first.tree, &checked));
    println!("-- first page of B");
    print(&first.tree, &checked);

    let second = first
        .tree
        .merge_children(
            MergeTarget::Siblings(CursorToken::new("b-2")),
            Page::new(vec![NodeRecord::new(6, 1)]),
        )
        .expect("last page completes B");
    println!("-- second page of B, B checked");
    print(&second.tree, &IndexSet::from([1, 2]));

    // A page that does not add up is rejected and the tree is untouched.
    let err = second
        .tree
        .merge_children(
            MergeTarget::Children(TreeIndex(4)),
            Page::new(vec![NodeRecord::new(5, 3)]),
        )
        .expect_err("4 has room for one descendant");
    println!("-- rejected: {err}");
}
