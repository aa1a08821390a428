// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: traversal, lookup, path-copying updates, merges.

use alloc::sync::Arc;
use alloc::vec::Vec;

use arbor_index::TreeIndex;

use crate::types::{Child, CursorSentinel, CursorToken, Node, Page};
use crate::validate::{MergeError, check_list, list_from_page};

/// Where a fetched page goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeTarget {
    /// Replace the root level wholesale (initial load).
    Roots,
    /// Replace the children of this node wholesale (lazy child load).
    Children(TreeIndex),
    /// Append after the list that currently ends with this cursor (sibling page).
    ///
    /// The sentinel is stripped, delivered nodes are inserted in index order
    /// (nodes already present are kept as they are), and a fresh sentinel is
    /// attached only if the page carries a next cursor.
    Siblings(CursorToken),
}

/// Result of [`Tree::merge_children`].
#[derive(Clone, Debug)]
pub struct Merged {
    /// The new tree.
    pub tree: Tree,
    /// Owner of the merged list, `None` for the root level.
    pub parent: Option<TreeIndex>,
    /// Nodes that were not in the tree before, in sibling order.
    pub added: Vec<Arc<Node>>,
}

/// An immutable, lazily populated forest of [`Node`]s.
///
/// Cloning is cheap: subtrees are shared through [`Arc`], and every update
/// copies only the path from the root level down to the changed node.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tree {
    roots: Vec<Child>,
}

/// Preorder depth-first walk over `children` and their loaded descendants.
///
/// `visit` returns whether to descend into the visited element. Sentinels are
/// visited too; they have nothing to descend into.
pub fn traverse<'a>(children: &'a [Child], mut visit: impl FnMut(&'a Child) -> bool) {
    let mut stack: Vec<&'a Child> = children.iter().rev().collect();
    while let Some(child) = stack.pop() {
        if !visit(child) {
            continue;
        }
        if let Child::Node(node) = child {
            stack.extend(node.children.iter().rev());
        }
    }
}

/// The node-only prefix of a children list (a trailing sentinel cut off).
fn node_slice(children: &[Child]) -> &[Child] {
    match children.last() {
        Some(Child::Cursor(_)) => &children[..children.len() - 1],
        _ => children,
    }
}

/// Position of the sibling whose range contains `index`.
///
/// Siblings are ordered by index, so this is a binary search.
fn position_of(children: &[Child], index: TreeIndex) -> Option<usize> {
    let nodes = node_slice(children);
    let after = nodes.partition_point(|c| c.as_node().is_some_and(|n| n.index <= index));
    let pos = after.checked_sub(1)?;
    match &nodes[pos] {
        Child::Node(n) if n.contains(index) => Some(pos),
        _ => None,
    }
}

impl Tree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self { roots: Vec::new() }
    }

    /// Build a tree from a root-level page.
    pub fn from_page(page: Page) -> Result<Self, MergeError> {
        Ok(Self::new().merge_children(MergeTarget::Roots, page)?.tree)
    }

    /// True if nothing has been loaded.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// The root level.
    pub fn roots(&self) -> &[Child] {
        &self.roots
    }

    /// The first root node.
    pub fn root(&self) -> Option<&Arc<Node>> {
        self.roots.iter().find_map(Child::as_node)
    }

    /// Number of loaded nodes (sentinels excluded).
    pub fn len(&self) -> usize {
        let mut count = 0;
        traverse(&self.roots, |c| {
            count += usize::from(c.as_node().is_some());
            true
        });
        count
    }

    /// Preorder walk over the whole loaded tree. See [`traverse`].
    pub fn traverse<'a>(&'a self, visit: impl FnMut(&'a Child) -> bool) {
        traverse(&self.roots, visit);
    }

    /// Look up a loaded node by index.
    ///
    /// Descends by containment, so the cost is `O(depth * log(siblings))`.
    pub fn find(&self, index: TreeIndex) -> Option<&Arc<Node>> {
        self.path_to(index).and_then(|path| path.last().copied())
    }

    /// The loaded chain of nodes from the root level to `index`, inclusive.
    ///
    /// `None` if `index` is not loaded.
    pub fn path_to(&self, index: TreeIndex) -> Option<Vec<&Arc<Node>>> {
        let mut path = Vec::new();
        let mut level = self.roots.as_slice();
        loop {
            let pos = position_of(level, index)?;
            let Child::Node(node) = &level[pos] else {
                return None;
            };
            path.push(node);
            if node.index == index {
                return Some(path);
            }
            level = node.children.as_slice();
        }
    }

    /// Whether `keys` names an existing root-to-node chain (each key a direct child of the previous).
    ///
    /// An empty chain is not a branch.
    pub fn has_branch(&self, keys: &[TreeIndex]) -> bool {
        let Some(last) = keys.last() else {
            return false;
        };
        self.path_to(*last).is_some_and(|path| {
            path.len() == keys.len() && path.iter().zip(keys).all(|(n, k)| n.index == *k)
        })
    }

    /// Locate the list that ends with `token`.
    ///
    /// Returns the owner (`None` for the root level) and the sentinel.
    pub fn find_cursor(&self, token: &CursorToken) -> Option<(Option<TreeIndex>, &CursorSentinel)> {
        if let Some(Child::Cursor(c)) = self.roots.last()
            && c.token == *token
        {
            return Some((None, c));
        }
        let mut found = None;
        traverse(&self.roots, |child| {
            if found.is_some() {
                return false;
            }
            let Child::Node(node) = child else {
                return false;
            };
            if let Some(c) = node.cursor()
                && c.token == *token
            {
                found = Some((Some(node.index), c));
                return false;
            }
            true
        });
        found
    }

    /// A new tree with the node at `index` patched; only the path to it is copied.
    ///
    /// The patched node's children list is re-validated, and its index and
    /// subtree size must not change.
    pub fn update_node(
        &self,
        index: TreeIndex,
        patch: impl FnOnce(&mut Node),
    ) -> Result<Self, MergeError> {
        let roots = Self::rebuild(&self.roots, index, &mut Some(patch))?;
        Ok(Self { roots })
    }

    fn rebuild<F: FnOnce(&mut Node)>(
        level: &[Child],
        index: TreeIndex,
        patch: &mut Option<F>,
    ) -> Result<Vec<Child>, MergeError> {
        let pos = position_of(level, index).ok_or(MergeError::NotFound(index))?;
        let Child::Node(current) = &level[pos] else {
            return Err(MergeError::NotFound(index));
        };
        let mut node = Node::clone(current);
        if node.index == index {
            let Some(patch) = patch.take() else {
                return Err(MergeError::NotFound(index));
            };
            let range = node.range();
            patch(&mut node);
            if node.range() != range {
                return Err(MergeError::RangeChanged(index));
            }
            check_list(Some(&node), &node.children)?;
        } else {
            node.children = Self::rebuild(&node.children, index, patch)?;
        }
        let mut copy = level.to_vec();
        copy[pos] = Child::Node(Arc::new(node));
        Ok(copy)
    }

    /// Replace the list owned by `owner` (`None` = root level) with `children`.
    fn with_list(&self, owner: Option<TreeIndex>, children: Vec<Child>) -> Result<Self, MergeError> {
        match owner {
            None => {
                check_list(None, &children)?;
                Ok(Self { roots: children })
            }
            Some(index) => self.update_node(index, |node| node.children = children),
        }
    }

    fn list_of(&self, owner: Option<TreeIndex>) -> Result<&[Child], MergeError> {
        match owner {
            None => Ok(&self.roots),
            Some(index) => self
                .find(index)
                .map(|n| n.children.as_slice())
                .ok_or(MergeError::NotFound(index)),
        }
    }

    /// Merge a fetched page into the tree.
    ///
    /// Fails, leaving `self` untouched, if the result would break contiguity
    /// (for example when delivered sizes do not add up to the reported one).
    pub fn merge_children(&self, target: MergeTarget, page: Page) -> Result<Merged, MergeError> {
        match target {
            MergeTarget::Roots => {
                let children = list_from_page(page, None)?;
                let added = children.iter().filter_map(Child::as_node).cloned().collect();
                Ok(Merged {
                    tree: self.with_list(None, children)?,
                    parent: None,
                    added,
                })
            }
            MergeTarget::Children(parent) => {
                let owner = self.find(parent).ok_or(MergeError::NotFound(parent))?;
                let children = list_from_page(page, Some(parent))?;
                if children.is_empty() && !owner.is_leaf() {
                    return Err(MergeError::SizeMismatch {
                        parent,
                        reported: owner.subtree_size() - 1,
                        delivered: 0,
                    });
                }
                let added = children.iter().filter_map(Child::as_node).cloned().collect();
                Ok(Merged {
                    tree: self.with_list(Some(parent), children)?,
                    parent: Some(parent),
                    added,
                })
            }
            MergeTarget::Siblings(token) => {
                let (owner, _) = self
                    .find_cursor(&token)
                    .ok_or_else(|| MergeError::CursorNotFound(token.clone()))?;
                let existing = node_slice(self.list_of(owner)?);
                let incoming = list_from_page(page, owner)?;
                let (children, added) = merge_sorted(existing, incoming);
                Ok(Merged {
                    tree: self.with_list(owner, children)?,
                    parent: owner,
                    added,
                })
            }
        }
    }

    /// A new tree with the sentinel `token` marked pending or idle.
    pub fn set_cursor_pending(&self, token: &CursorToken, pending: bool) -> Result<Self, MergeError> {
        let (owner, _) = self
            .find_cursor(token)
            .ok_or_else(|| MergeError::CursorNotFound(token.clone()))?;
        let mut children = self.list_of(owner)?.to_vec();
        if let Some(Child::Cursor(c)) = children.last_mut() {
            c.pending = pending;
        }
        self.with_list(owner, children)
    }
}

/// Merge incoming siblings (plus optional trailing sentinel) into an existing
/// cursor-free list by index. Existing nodes win over re-delivered ones.
fn merge_sorted(existing: &[Child], incoming: Vec<Child>) -> (Vec<Child>, Vec<Arc<Node>>) {
    let mut out = Vec::with_capacity(existing.len() + incoming.len());
    let mut added = Vec::new();
    let mut cursor = None;
    let mut old = existing.iter().peekable();
    for child in incoming {
        let new = match child {
            Child::Node(n) => n,
            Child::Cursor(c) => {
                cursor = Some(c);
                continue;
            }
        };
        while let Some(o) = old.next_if(|o| o.as_node().is_some_and(|o| o.index < new.index)) {
            out.push(o.clone());
        }
        if old
            .peek()
            .and_then(|o| o.as_node())
            .is_some_and(|o| o.index == new.index)
        {
            continue;
        }
        added.push(new.clone());
        out.push(Child::Node(new));
    }
    out.extend(old.cloned());
    if let Some(c) = cursor {
        out.push(Child::Cursor(c));
    }
    (out, added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeRecord;
    use alloc::vec;

    // R(0, size 4) -> A(1, leaf), B(2, size 2, unloaded)
    fn small() -> Tree {
        Tree::from_page(Page::new(vec![
            NodeRecord::new(0, 4).with_children(vec![NodeRecord::new(1, 1), NodeRecord::new(2, 2)]),
        ]))
        .expect("valid tree")
    }

    fn indices(tree: &Tree) -> Vec<u32> {
        let mut out = Vec::new();
        tree.traverse(|c| {
            if let Child::Node(n) = c {
                out.push(n.index().get());
            }
            true
        });
        out
    }

    #[test]
    fn traverse_is_preorder_and_prunes() {
        let tree = small()
            .merge_children(MergeTarget::Children(TreeIndex(2)), Page::new(vec![NodeRecord::new(3, 1)]))
            .expect("children of B tile its range")
            .tree;
        assert_eq!(indices(&tree), [0, 1, 2, 3]);

        let mut seen = Vec::new();
        tree.traverse(|c| {
            let n = c.as_node().expect("no sentinels here");
            seen.push(n.index().get());
            n.index() != TreeIndex(2)
        });
        assert_eq!(seen, [0, 1, 2], "descent into B was refused");
    }

    #[test]
    fn find_and_path() {
        let tree = small();
        assert_eq!(tree.find(TreeIndex(2)).map(|n| n.subtree_size()), Some(2));
        assert!(tree.find(TreeIndex(3)).is_none(), "3 is inside B but unloaded");
        let path: Vec<u32> = tree
            .path_to(TreeIndex(1))
            .expect("A is loaded")
            .iter()
            .map(|n| n.index().get())
            .collect();
        assert_eq!(path, [0, 1]);
    }

    #[test]
    fn has_branch_requires_direct_chain() {
        let tree = small();
        assert!(tree.has_branch(&[TreeIndex(0), TreeIndex(2)]));
        assert!(tree.has_branch(&[TreeIndex(0)]));
        assert!(!tree.has_branch(&[TreeIndex(2)]), "must start at a root");
        assert!(!tree.has_branch(&[TreeIndex(0), TreeIndex(3)]));
        assert!(!tree.has_branch(&[]));
        assert!(!Tree::new().has_branch(&[TreeIndex(0)]));
    }

    #[test]
    fn update_copies_only_the_path() {
        let tree = small();
        let updated = tree
            .update_node(TreeIndex(2), |n| n.set_id(99))
            .expect("B exists");
        assert_eq!(updated.find(TreeIndex(2)).map(|n| n.id()), Some(99));
        assert_eq!(tree.find(TreeIndex(2)).map(|n| n.id()), Some(2), "old tree untouched");

        let a_old = tree.find(TreeIndex(1)).expect("A");
        let a_new = updated.find(TreeIndex(1)).expect("A");
        assert!(Arc::ptr_eq(a_old, a_new), "off-path subtree is shared");
    }

    #[test]
    fn update_rejects_structural_corruption() {
        let tree = small();
        let err = tree.update_node(TreeIndex(0), |n| {
            n.children_mut().pop();
        });
        assert!(matches!(err, Err(MergeError::SizeMismatch { .. })));
        assert_eq!(
            tree.update_node(TreeIndex(7), |_| {}),
            Err(MergeError::NotFound(TreeIndex(7)))
        );
    }

    #[test]
    fn children_merge_is_wholesale_and_idempotent() {
        let page = Page::new(vec![NodeRecord::new(3, 1)]);
        let once = small()
            .merge_children(MergeTarget::Children(TreeIndex(2)), page.clone())
            .expect("valid");
        let twice = once
            .tree
            .merge_children(MergeTarget::Children(TreeIndex(2)), page)
            .expect("valid");
        assert_eq!(once.tree, twice.tree);
        assert_eq!(once.parent, Some(TreeIndex(2)));
        assert_eq!(once.added.len(), 1);
    }

    #[test]
    fn children_merge_rejects_size_mismatch() {
        let tree = small();
        let err = tree.merge_children(
            MergeTarget::Children(TreeIndex(0)),
            Page::new(vec![NodeRecord::new(1, 1)]),
        );
        assert!(matches!(err, Err(MergeError::SizeMismatch { .. })));
        let empty = tree.merge_children(MergeTarget::Children(TreeIndex(2)), Page::default());
        assert_eq!(
            empty.map(|m| m.tree),
            Err(MergeError::SizeMismatch {
                parent: TreeIndex(2),
                reported: 1,
                delivered: 0,
            })
        );
    }

    #[test]
    fn sibling_pages_append_and_swap_cursor() {
        // R(0, size 6) with first page [1, 2] and a cursor.
        let tree = Tree::from_page(Page::new(vec![
            NodeRecord::new(0, 6)
                .with_children(vec![NodeRecord::new(1, 1), NodeRecord::new(2, 1)])
                .with_cursor("p2"),
        ]))
        .expect("valid");
        let token = CursorToken::new("p2");
        assert_eq!(tree.find_cursor(&token).map(|(o, _)| o), Some(Some(TreeIndex(0))));

        let merged = tree
            .merge_children(
                MergeTarget::Siblings(token.clone()),
                Page::new(vec![NodeRecord::new(3, 1), NodeRecord::new(4, 1)]).with_cursor("p3"),
            )
            .expect("valid");
        assert_eq!(merged.parent, Some(TreeIndex(0)));
        assert_eq!(indices(&merged.tree), [0, 1, 2, 3, 4]);
        assert!(merged.tree.find_cursor(&token).is_none(), "old cursor stripped");
        let root = merged.tree.root().expect("root");
        assert_eq!(root.cursor().map(|c| c.token.as_str()), Some("p3"));

        let last = merged
            .tree
            .merge_children(
                MergeTarget::Siblings(CursorToken::new("p3")),
                Page::new(vec![NodeRecord::new(5, 1)]),
            )
            .expect("final page completes the list");
        assert_eq!(indices(&last.tree), [0, 1, 2, 3, 4, 5]);
        assert!(last.tree.root().expect("root").cursor().is_none());
    }

    #[test]
    fn sibling_page_skips_nodes_already_present() {
        // Ancestor-path shape: first page [1], path child 4 (loaded), cursor.
        let tree = Tree::from_page(Page::new(vec![
            NodeRecord::new(0, 6)
                .with_children(vec![
                    NodeRecord::new(1, 1),
                    NodeRecord::new(4, 2).with_children(vec![NodeRecord::new(5, 1)]),
                ])
                .with_cursor("c"),
        ]))
        .expect("gaps are fine before a cursor");
        let merged = tree
            .merge_children(
                MergeTarget::Siblings(CursorToken::new("c")),
                Page::new(vec![
                    NodeRecord::new(2, 1),
                    NodeRecord::new(3, 1),
                    NodeRecord::new(4, 2),
                ]),
            )
            .expect("re-delivered 4 is skipped, list completes");
        assert_eq!(indices(&merged.tree), [0, 1, 2, 3, 4, 5]);
        let added: Vec<u32> = merged.added.iter().map(|n| n.index().get()).collect();
        assert_eq!(added, [2, 3]);
        assert!(
            merged.tree.find(TreeIndex(5)).is_some(),
            "existing loaded subtree of 4 kept"
        );
    }

    #[test]
    fn pending_flag_round_trip() {
        let tree = Tree::from_page(Page::new(vec![
            NodeRecord::new(0, 3)
                .with_children(vec![NodeRecord::new(1, 1)])
                .with_cursor("more"),
        ]))
        .expect("valid");
        let token = CursorToken::new("more");
        let pending = tree.set_cursor_pending(&token, true).expect("cursor exists");
        assert_eq!(pending.find_cursor(&token).map(|(_, c)| c.pending), Some(true));
        let idle = pending.set_cursor_pending(&token, false).expect("cursor exists");
        assert_eq!(idle, tree);
        assert_eq!(
            tree.set_cursor_pending(&CursorToken::new("nope"), true),
            Err(MergeError::CursorNotFound(CursorToken::new("nope")))
        );
    }

    #[test]
    fn root_level_pagination() {
        let tree = Tree::from_page(Page::new(vec![NodeRecord::new(0, 1)]).with_cursor("roots"))
            .expect("valid");
        assert_eq!(
            tree.find_cursor(&CursorToken::new("roots")).map(|(o, _)| o),
            Some(None)
        );
        let merged = tree
            .merge_children(
                MergeTarget::Siblings(CursorToken::new("roots")),
                Page::new(vec![NodeRecord::new(1, 2)]),
            )
            .expect("valid");
        assert_eq!(merged.parent, None);
        assert_eq!(merged.tree.roots().len(), 2);
        assert_eq!(merged.tree.len(), 2);
    }
}
