//! Benchmarks for keyed loop reconciliation and the LIS move planner.
//!
//! Run with: cargo bench -p alpen-runtime --bench reconcile_bench

use alpen_dom::NodeId;
use alpen_runtime::Runtime;
use alpen_runtime::loops::longest_increasing_subsequence;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;

/// A started runtime rendering `0..n` in a keyed loop, and the component node.
fn keyed_list(n: usize) -> (Runtime, NodeId) {
    let runtime = Runtime::new();
    let nodes = runtime
        .mount(
            r#"<ul x-data="{ items: [] }"><template x-for="item in items" :key="item"><li x-text="item"></li></template></ul>"#,
        )
        .expect("markup");
    runtime.start();
    let list = nodes[0];
    set_items(&runtime, list, (0..n).collect());
    (runtime, list)
}

fn set_items(runtime: &Runtime, list: NodeId, items: Vec<usize>) {
    let literal: Vec<String> = items.iter().map(usize::to_string).collect();
    runtime
        .evaluate(list, &format!("items = [{}]", literal.join(",")))
        .expect("assignment");
    runtime.tick();
}

/// Deterministic shuffle so every run measures the same permutation.
fn scrambled(n: usize) -> Vec<usize> {
    let mut items: Vec<usize> = (0..n).collect();
    let mut state = 0x2545_f491_u64;
    for i in (1..n).rev() {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        items.swap(i, (state % (i as u64 + 1)) as usize);
    }
    items
}

fn bench_lis(c: &mut Criterion) {
    let mut group = c.benchmark_group("loops/lis");

    for n in [100usize, 1_000, 10_000] {
        group.throughput(Throughput::Elements(n as u64));
        let sorted: Vec<usize> = (0..n).collect();
        let shuffled = scrambled(n);
        group.bench_with_input(BenchmarkId::new("sorted", n), &sorted, |b, seq| {
            b.iter(|| black_box(longest_increasing_subsequence(seq)));
        });
        group.bench_with_input(BenchmarkId::new("shuffled", n), &shuffled, |b, seq| {
            b.iter(|| black_box(longest_increasing_subsequence(seq)));
        });
    }

    group.finish();
}

fn bench_reconcile(c: &mut Criterion) {
    let mut group = c.benchmark_group("loops/reconcile");
    group.sample_size(20);

    for n in [50usize, 500] {
        group.throughput(Throughput::Elements(n as u64));

        let (runtime, list) = keyed_list(n);
        let forward: Vec<usize> = (0..n).collect();
        let reversed: Vec<usize> = (0..n).rev().collect();
        let mut flip = false;
        group.bench_function(BenchmarkId::new("reverse", n), |b| {
            b.iter(|| {
                flip = !flip;
                let items = if flip { reversed.clone() } else { forward.clone() };
                set_items(&runtime, list, items);
            });
        });

        let (runtime, list) = keyed_list(n);
        let mut grow = false;
        group.bench_function(BenchmarkId::new("append_remove_tail", n), |b| {
            b.iter(|| {
                grow = !grow;
                let len = if grow { n + 10 } else { n };
                set_items(&runtime, list, (0..len).collect());
            });
        });

        let (runtime, list) = keyed_list(n);
        let scrambled = scrambled(n);
        let mut toggle = false;
        group.bench_function(BenchmarkId::new("scramble", n), |b| {
            b.iter(|| {
                toggle = !toggle;
                let items = if toggle { scrambled.clone() } else { forward.clone() };
                set_items(&runtime, list, items);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_lis, bench_reconcile);
criterion_main!(benches);
