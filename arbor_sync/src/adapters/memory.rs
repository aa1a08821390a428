// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! In-memory data source.
//!
//! ## Notes
//!
//! [`MemoryService`] holds a whole hierarchy and serves it the way a remote
//! backend would: preorder indices, authoritative subtree sizes, children in
//! pages of [`MemoryService::page_size`] behind `owner:offset` cursor tokens.
//! It is meant for tests, demos, and benchmarks.
//!
//! Ancestor paths deliver, for each node on the path, the first page of its
//! parent's children plus the path node itself (when it falls beyond that
//! page), followed by a cursor when more siblings remain. The target is
//! reported as the only checked index.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use arbor_index::TreeIndex;
use arbor_tree::{CursorToken, NodeRecord, Page};

use crate::error::FetchError;
use crate::service::TreeDataService;
use crate::types::{AncestorPath, RootQuery};

/// Default number of children per page.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// One node of a hierarchy to serve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemoryNode {
    /// Identifier reported to clients.
    pub id: u64,
    /// Children in sibling order.
    pub children: Vec<Self>,
}

impl MemoryNode {
    /// A node with no children.
    pub fn leaf(id: u64) -> Self {
        Self {
            id,
            children: Vec::new(),
        }
    }

    /// A node with children.
    pub fn new(id: u64, children: Vec<Self>) -> Self {
        Self { id, children }
    }

    /// Number of nodes in this subtree, itself included.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Self::count).sum::<usize>()
    }

    /// A complete tree of the given depth where every inner node has `fanout`
    /// children. Ids count up in preorder from zero.
    pub fn balanced(depth: u32, fanout: u32) -> Self {
        fn build(depth: u32, fanout: u32, next: &mut u64) -> MemoryNode {
            let id = *next;
            *next += 1;
            let children = if depth <= 1 {
                Vec::new()
            } else {
                (0..fanout).map(|_| build(depth - 1, fanout, next)).collect()
            };
            MemoryNode { id, children }
        }
        build(depth, fanout, &mut 0)
    }
}

#[derive(Debug)]
struct Entry {
    id: u64,
    parent: Option<TreeIndex>,
    size: u32,
    children: Vec<TreeIndex>,
}

/// A [`TreeDataService`] over a hierarchy held in memory.
#[derive(Debug)]
pub struct MemoryService {
    entries: Vec<Entry>,
    roots: Vec<TreeIndex>,
    page_size: usize,
    fail_next: AtomicBool,
    calls: AtomicUsize,
}

impl MemoryService {
    /// Serve the given root level, numbering nodes in preorder.
    ///
    /// # Panics
    ///
    /// If the hierarchy has more nodes than a [`TreeIndex`] can number.
    pub fn new(roots: Vec<MemoryNode>) -> Self {
        let total: usize = roots.iter().map(MemoryNode::count).sum();
        assert!(
            u32::try_from(total).is_ok(),
            "{total} nodes do not fit in a u32 tree index"
        );
        let mut service = Self {
            entries: Vec::new(),
            roots: Vec::new(),
            page_size: DEFAULT_PAGE_SIZE,
            fail_next: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        };
        for root in roots {
            let index = service.flatten(root, None);
            service.roots.push(index);
        }
        service
    }

    /// Set the page size (at least one).
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn flatten(&mut self, node: MemoryNode, parent: Option<TreeIndex>) -> TreeIndex {
        let position = self.entries.len();
        let index = TreeIndex(Self::narrow(position));
        self.entries.push(Entry {
            id: node.id,
            parent,
            size: 1,
            children: Vec::new(),
        });
        let mut children = Vec::with_capacity(node.children.len());
        for child in node.children {
            children.push(self.flatten(child, Some(index)));
        }
        let size = Self::narrow(self.entries.len() - position);
        let entry = &mut self.entries[position];
        entry.size = size;
        entry.children = children;
        index
    }

    // Bounded by the node count checked in `new`.
    fn narrow(n: usize) -> u32 {
        u32::try_from(n).unwrap_or_else(|_| unreachable!("node count checked in `new`"))
    }

    /// Children per page.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Total number of nodes served.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the hierarchy is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Make the next call fail with [`FetchError::Service`].
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Number of calls served so far, failed ones included.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn begin(&self, call: &'static str) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_next.swap(false, Ordering::SeqCst) {
            tracing::debug!(call, "injected failure");
            return Err(FetchError::Service(format!("injected failure in {call}")));
        }
        Ok(())
    }

    fn entry(&self, index: TreeIndex) -> Result<&Entry, FetchError> {
        self.entries
            .get(index.get() as usize)
            .ok_or(FetchError::NotFound(index))
    }

    fn list(&self, owner: Option<TreeIndex>) -> Result<&[TreeIndex], FetchError> {
        match owner {
            None => Ok(&self.roots),
            Some(index) => Ok(&self.entry(index)?.children),
        }
    }

    fn record(&self, index: TreeIndex) -> Result<NodeRecord, FetchError> {
        let entry = self.entry(index)?;
        let mut record = NodeRecord::new(index.get(), entry.size).with_id(entry.id);
        record.parent = entry.parent;
        Ok(record)
    }

    fn cursor(owner: Option<TreeIndex>, offset: usize) -> CursorToken {
        match owner {
            None => CursorToken::new(format!("root:{offset}")),
            Some(index) => CursorToken::new(format!("{}:{offset}", index.get())),
        }
    }

    fn parse_cursor(token: &CursorToken) -> Option<(Option<TreeIndex>, usize)> {
        let (owner, offset) = token.as_str().split_once(':')?;
        let owner = match owner {
            "root" => None,
            n => Some(TreeIndex(n.parse().ok()?)),
        };
        Some((owner, offset.parse().ok()?))
    }

    fn page(&self, owner: Option<TreeIndex>, offset: usize) -> Result<Page, FetchError> {
        let list = self.list(owner)?;
        let end = offset.saturating_add(self.page_size).min(list.len());
        let items = list
            .get(offset..end)
            .unwrap_or_default()
            .iter()
            .map(|i| self.record(*i))
            .collect::<Result<_, _>>()?;
        Ok(Page {
            items,
            next_cursor: (end < list.len()).then(|| Self::cursor(owner, end)),
        })
    }

    /// First page of `owner`'s children, with the chain below `path[0]` nested inside.
    fn path_level(
        &self,
        owner: Option<TreeIndex>,
        path: &[TreeIndex],
    ) -> Result<(Vec<NodeRecord>, Option<CursorToken>), FetchError> {
        let Page {
            mut items,
            next_cursor,
        } = self.page(owner, 0)?;
        let Some((&head, rest)) = path.split_first() else {
            return Ok((items, next_cursor));
        };
        let pos = match items.binary_search_by_key(&head, |r| r.index) {
            Ok(pos) => pos,
            Err(pos) => {
                items.insert(pos, self.record(head)?);
                pos
            }
        };
        if !rest.is_empty() {
            let (children, cursor) = self.path_level(Some(head), rest)?;
            items[pos].children = children;
            items[pos].next_cursor = cursor;
        }
        Ok((items, next_cursor))
    }
}

#[async_trait::async_trait]
impl TreeDataService for MemoryService {
    async fn fetch_root(&self, query: &RootQuery) -> Result<Page, FetchError> {
        self.begin("fetch_root")?;
        tracing::debug!(model = query.model_id, revision = query.revision_id, "serving roots");
        self.page(None, 0)
    }

    async fn fetch_children(&self, parent: TreeIndex) -> Result<Page, FetchError> {
        self.begin("fetch_children")?;
        self.entry(parent)?;
        self.page(Some(parent), 0)
    }

    async fn fetch_siblings_page(&self, cursor: &CursorToken) -> Result<Page, FetchError> {
        self.begin("fetch_siblings_page")?;
        let (owner, offset) =
            Self::parse_cursor(cursor).ok_or_else(|| FetchError::InvalidCursor(cursor.clone()))?;
        let len = self
            .list(owner)
            .map_err(|_| FetchError::InvalidCursor(cursor.clone()))?
            .len();
        if offset == 0 || offset >= len {
            return Err(FetchError::InvalidCursor(cursor.clone()));
        }
        self.page(owner, offset)
    }

    async fn fetch_ancestor_path(&self, target: TreeIndex) -> Result<AncestorPath, FetchError> {
        self.begin("fetch_ancestor_path")?;
        let mut chain = vec![target];
        let mut at = self.entry(target)?.parent;
        while let Some(parent) = at {
            chain.push(parent);
            at = self.entry(parent)?.parent;
        }
        chain.reverse();
        let (tree, next_cursor) = self.path_level(None, &chain)?;
        Ok(AncestorPath {
            tree,
            next_cursor,
            checked: vec![target],
        })
    }
}
