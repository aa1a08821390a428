// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property tests for lazy loading and hidden-unknown derivation.
//!
//! A random preorder hierarchy is loaded in a random order (children lists,
//! sometimes split into two pages behind a cursor). After every merge:
//!
//! 1. The scoped recompute equals the full recompute.
//! 2. Every flagged node is strictly unchecked, has descendants, and inherits no check.
//! 3. Containment agrees with the generated hierarchy for loaded and unloaded nodes.
//! 4. Re-applying the same children page leaves the tree unchanged.

use arbor_index::{IndexSet, TreeIndex};
use arbor_tree::{
    CheckState, Child, CursorToken, HiddenUnknown, MergeTarget, NodeRecord, Page, Tree,
    check_state, recompute_for_subtree, recompute_full,
};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

/// Flat description of a generated hierarchy, indexed by preorder index.
#[derive(Debug, Clone)]
struct Shape {
    roots: Vec<(u32, u32)>,
    sizes: Vec<u32>,
    kids: Vec<Vec<(u32, u32)>>,
}

impl Shape {
    fn generate(total: u32, roots: u32, seeds: &[u32]) -> Self {
        let mut shape = Self {
            roots: Vec::new(),
            sizes: vec![0; total as usize],
            kids: vec![Vec::new(); total as usize],
        };
        let mut rng = seeds.iter().copied().cycle();
        let mut next = 0;
        let mut remaining = total;
        let mut left = roots.max(1);
        while remaining > 0 {
            let take = if left == 1 {
                remaining
            } else {
                1 + rng.next().unwrap_or(0) % remaining
            };
            left = left.saturating_sub(1);
            let root = shape.build(&mut next, take, &mut rng);
            shape.roots.push(root);
            remaining -= take;
        }
        shape
    }

    fn build(&mut self, next: &mut u32, size: u32, rng: &mut impl Iterator<Item = u32>) -> (u32, u32) {
        let index = *next;
        *next += 1;
        self.sizes[index as usize] = size;
        let mut remaining = size - 1;
        while remaining > 0 {
            let take = 1 + rng.next().unwrap_or(0) % remaining;
            let child = self.build(next, take, rng);
            self.kids[index as usize].push(child);
            remaining -= take;
        }
        (index, size)
    }

    fn records(list: &[(u32, u32)]) -> Vec<NodeRecord> {
        list.iter().map(|&(i, s)| NodeRecord::new(i, s)).collect()
    }

    fn contains(&self, node: u32, k: u32) -> bool {
        node <= k && k < node + self.sizes[node as usize]
    }
}

enum Step {
    Expand(TreeIndex),
    More(CursorToken, TreeIndex),
}

fn candidates(tree: &Tree) -> Vec<Step> {
    let mut out = Vec::new();
    tree.traverse(|child| {
        if let Child::Node(node) = child {
            if !node.is_loaded() {
                out.push(Step::Expand(node.index()));
            }
            if let Some(cursor) = node.cursor() {
                out.push(Step::More(cursor.token.clone(), node.index()));
            }
        }
        true
    });
    out
}

fn checked_from(mask: &[bool]) -> IndexSet {
    mask.iter()
        .enumerate()
        .filter(|(_, on)| **on)
        .map(|(i, _)| TreeIndex(i as u32))
        .collect()
}

fn hierarchy() -> impl Strategy<Value = (Shape, Vec<bool>, Vec<u32>)> {
    (2u32..40, 1u32..4, prop::collection::vec(any::<u32>(), 1..32)).prop_flat_map(
        |(total, roots, seeds)| {
            let shape = Shape::generate(total, roots, &seeds);
            (
                Just(shape),
                prop::collection::vec(prop::bool::weighted(0.15), total as usize),
                prop::collection::vec(any::<u32>(), 0..64),
            )
        },
    )
}

fn assert_flags_sound(
    tree: &Tree,
    checked: &IndexSet,
    hidden: &HiddenUnknown,
) -> Result<(), TestCaseError> {
    for k in hidden.iter() {
        let node = tree.find(k);
        prop_assert!(node.is_some(), "flagged {} is not loaded", k);
        prop_assert!(node.is_some_and(|n| n.subtree_size() > 1), "flagged leaf {}", k);
        prop_assert_eq!(check_state(tree, checked, k), Some(CheckState::Unchecked));
    }
    Ok(())
}

// ═════════════════════════════════════════════════════════════════════════
// 1-4. Random load orders
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn scoped_recompute_matches_full((shape, mask, picks) in hierarchy()) {
        let checked = checked_from(&mask);
        let mut tree = Tree::from_page(Page::new(Shape::records(&shape.roots)))
            .expect("generated roots are valid");
        let mut hidden = recompute_full(&tree, &checked);
        assert_flags_sound(&tree, &checked, &hidden)?;

        for pick in picks {
            let steps = candidates(&tree);
            if steps.is_empty() {
                break;
            }
            let (target, page) = match &steps[pick as usize % steps.len()] {
                Step::Expand(index) => {
                    let kids = &shape.kids[index.get() as usize];
                    let page = if pick & 1 == 1 && kids.len() >= 2 {
                        Page::new(Shape::records(&kids[..1])).with_cursor(format!("p{index}"))
                    } else {
                        Page::new(Shape::records(kids))
                    };
                    (MergeTarget::Children(*index), page)
                }
                Step::More(token, owner) => {
                    let kids = &shape.kids[owner.get() as usize];
                    (MergeTarget::Siblings(token.clone()), Page::new(Shape::records(&kids[1..])))
                }
            };

            let merged = tree
                .merge_children(target.clone(), page.clone())
                .map_err(|e| TestCaseError::fail(format!("merge rejected: {e}")))?;

            let scoped = recompute_for_subtree(&hidden, &merged.tree, merged.parent, &checked);
            let full = recompute_full(&merged.tree, &checked);
            prop_assert_eq!(&scoped, &full, "target {:?}", target);
            assert_flags_sound(&merged.tree, &checked, &full)?;

            if let MergeTarget::Children(_) = target {
                let again = merged.tree.merge_children(target, page);
                prop_assert_eq!(again.map(|m| m.tree), Ok(merged.tree.clone()));
            }

            tree = merged.tree;
            hidden = scoped;
        }

        tree.traverse(|child| {
            if let Child::Node(node) = child {
                for k in 0..shape.sizes.len() as u32 {
                    assert_eq!(
                        node.contains(TreeIndex(k)),
                        shape.contains(node.index().get(), k),
                        "containment of {k} in {}",
                        node.index()
                    );
                }
            }
            true
        });
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Bad pages never publish
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn short_children_page_is_rejected((shape, _mask, _picks) in hierarchy()) {
        let tree = Tree::from_page(Page::new(Shape::records(&shape.roots)))
            .expect("generated roots are valid");
        for &(root, size) in &shape.roots {
            let kids = &shape.kids[root as usize];
            if size < 2 || kids.is_empty() {
                continue;
            }
            // Drop the last child: the rest cannot tile the root any more.
            let short = Page::new(Shape::records(&kids[..kids.len() - 1]));
            let result = tree.merge_children(MergeTarget::Children(TreeIndex(root)), short);
            prop_assert!(result.is_err(), "short page under {} accepted", root);
            prop_assert!(tree.find(TreeIndex(root)).is_some_and(|n| !n.is_loaded()));
        }
    }
}
