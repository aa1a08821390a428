// Copyright 2025 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use arbor_index::{IndexRange, IndexSet, TreeIndex};
use arbor_tree::{MergeTarget, NodeRecord, Page, Tree, recompute_for_subtree, recompute_full};
use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn below(&mut self, n: u32) -> u32 {
        (self.next_u64() % u64::from(n.max(1))) as u32
    }
}

/// Fully delivered complete tree, indices in preorder.
fn balanced(next: &mut u32, depth: u32, fanout: u32) -> NodeRecord {
    let index = *next;
    *next += 1;
    let children: Vec<NodeRecord> = if depth <= 1 {
        Vec::new()
    } else {
        (0..fanout).map(|_| balanced(next, depth - 1, fanout)).collect()
    };
    let size = 1 + children.iter().map(|c| c.subtree_size).sum::<u32>();
    NodeRecord::new(index, size).with_children(children)
}

/// A loaded tree whose last root child is left unloaded, plus the page that completes it.
fn with_pending_branch(depth: u32, fanout: u32) -> (Tree, TreeIndex, Page) {
    let mut root = balanced(&mut 0, depth, fanout);
    let Some(last) = root.children.last_mut() else {
        panic!("depth must be at least 2");
    };
    let kids = core::mem::take(&mut last.children);
    let parent = last.index;
    let tree = Tree::from_page(Page::new(vec![root])).expect("generated tree is valid");
    (tree, parent, Page::new(kids))
}

fn checked_sample(rng: &mut Rng, total: u32, count: usize) -> IndexSet {
    (0..count).map(|_| TreeIndex(rng.below(total))).collect()
}

fn bench_full(c: &mut Criterion) {
    let mut group = c.benchmark_group("recompute_full");
    for &(depth, fanout) in &[(4u32, 8u32), (5, 8), (6, 6)] {
        let tree = Tree::from_page(Page::new(vec![balanced(&mut 0, depth, fanout)]))
            .expect("generated tree is valid");
        let total = tree.len() as u32;
        let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
        let checked = checked_sample(&mut rng, total, 16);
        group.throughput(Throughput::Elements(u64::from(total)));
        group.bench_function(format!("sparse_checks_n{total}"), |b| {
            b.iter(|| black_box(recompute_full(&tree, &checked)));
        });
        group.bench_function(format!("nothing_checked_n{total}"), |b| {
            b.iter(|| black_box(recompute_full(&tree, &IndexSet::new())));
        });
    }
    group.finish();
}

fn bench_merge_then_recompute(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_then_recompute");
    for &(depth, fanout) in &[(4u32, 8u32), (5, 8)] {
        let (tree, parent, page) = with_pending_branch(depth, fanout);
        let mut rng = Rng::new(0xBADC_F00D_1234_5678);
        let checked = checked_sample(&mut rng, tree.root().map_or(1, |r| r.subtree_size()), 16);
        let prev = recompute_full(&tree, &checked);
        let n = tree.len();
        group.bench_function(format!("scoped_n{n}"), |b| {
            b.iter_batched(
                || page.clone(),
                |page| {
                    let merged = tree
                        .merge_children(MergeTarget::Children(parent), page)
                        .expect("page tiles the branch");
                    black_box(recompute_for_subtree(&prev, &merged.tree, merged.parent, &checked))
                },
                BatchSize::SmallInput,
            );
        });
        group.bench_function(format!("full_n{n}"), |b| {
            b.iter_batched(
                || page.clone(),
                |page| {
                    let merged = tree
                        .merge_children(MergeTarget::Children(parent), page)
                        .expect("page tiles the branch");
                    black_box(recompute_full(&merged.tree, &checked))
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    let tree = Tree::from_page(Page::new(vec![balanced(&mut 0, 6, 6)]))
        .expect("generated tree is valid");
    let total = tree.len() as u32;
    let mut rng = Rng::new(0xC1A5_7E55_9999_ABCD);
    let probes: Vec<TreeIndex> = (0..1024).map(|_| TreeIndex(rng.below(total))).collect();
    group.throughput(Throughput::Elements(probes.len() as u64));
    group.bench_function("find", |b| {
        b.iter(|| {
            let found = probes.iter().filter(|k| tree.find(**k).is_some()).count();
            black_box(found)
        });
    });
    group.bench_function("update_node", |b| {
        b.iter(|| {
            for k in probes.iter().take(64) {
                black_box(tree.update_node(*k, |n| n.set_id(7)).expect("loaded"));
            }
        });
    });

    let checked = checked_sample(&mut rng, total, 256);
    let ranges: Vec<IndexRange> = probes
        .iter()
        .map(|k| IndexRange::new(*k, 1 + rng.below(64)))
        .collect();
    group.bench_function("any_within", |b| {
        b.iter(|| black_box(ranges.iter().filter(|r| checked.any_within(**r)).count()));
    });
    group.finish();
}

criterion_group!(benches, bench_full, bench_merge_then_recompute, bench_lookup);
criterion_main!(benches);
