//! Criterion micro-benchmarks for allocate, release, and validation paths.

use std::hint::black_box;

use bootheap::Heap;
use bootheap_bench::{bench_config, fragmenting_churn, lifo_churn, request_sizes};
use criterion::{criterion_group, criterion_main, Criterion};

fn make_heap() -> Heap {
    Heap::new(bench_config()).unwrap()
}

/// Benchmark: one allocate/release pair on an empty heap (grow + retract).
fn bench_alloc_release_tail(c: &mut Criterion) {
    let mut heap = make_heap();
    c.bench_function("alloc_release_tail", |b| {
        b.iter(|| {
            let p = heap.allocate(black_box(48)).unwrap();
            heap.release(black_box(p));
        });
    });
}

/// Benchmark: reuse of a free block at the head of a long chain.
fn bench_alloc_reuse_head(c: &mut Criterion) {
    let mut heap = make_heap();
    let head = heap.allocate(64).unwrap();
    for _ in 0..256 {
        heap.allocate(32).unwrap();
    }
    heap.release(head);
    c.bench_function("alloc_reuse_head", |b| {
        b.iter(|| {
            let p = heap.allocate(black_box(64)).unwrap();
            heap.release(p);
        });
    });
}

/// Benchmark: first-fit walk past 256 allocated blocks before growing.
fn bench_alloc_walk_256(c: &mut Criterion) {
    let mut heap = make_heap();
    for _ in 0..256 {
        heap.allocate(32).unwrap();
    }
    c.bench_function("alloc_walk_256", |b| {
        b.iter(|| {
            let p = heap.allocate(black_box(16)).unwrap();
            heap.release(p);
        });
    });
}

/// Benchmark: 1K-request LIFO batch.
fn bench_lifo_churn_1k(c: &mut Criterion) {
    let mut heap = make_heap();
    let sizes = request_sizes(1_000, 40, 42);
    c.bench_function("lifo_churn_1k", |b| {
        b.iter(|| black_box(lifo_churn(&mut heap, &sizes)));
    });
}

/// Benchmark: 1K-request fragment-and-refill batch.
fn bench_fragmenting_churn_1k(c: &mut Criterion) {
    let mut heap = make_heap();
    let sizes = request_sizes(1_000, 40, 42);
    c.bench_function("fragmenting_churn_1k", |b| {
        b.iter(|| black_box(fragmenting_churn(&mut heap, &sizes)));
    });
}

/// Benchmark: zero-allocate a 1 KiB array into a dirty reused block.
fn bench_zero_allocate_1k(c: &mut Criterion) {
    let mut heap = make_heap();
    let dirty = heap.allocate(1024).unwrap();
    heap.payload_mut(dirty).unwrap().fill(0xAB);
    let _pin = heap.allocate(4).unwrap();
    heap.release(dirty);
    c.bench_function("zero_allocate_1k", |b| {
        b.iter(|| {
            let p = heap.zero_allocate(black_box(256), black_box(4)).unwrap();
            heap.release(p);
        });
    });
}

/// Benchmark: rejecting a pointer that was never handed out.
fn bench_invalid_release(c: &mut Criterion) {
    let mut heap = make_heap();
    let p = heap.allocate(32).unwrap();
    let _pin = heap.allocate(32).unwrap();
    heap.release(p);
    c.bench_function("invalid_release", |b| {
        b.iter(|| black_box(heap.try_release(black_box(p)).is_err()));
    });
}

criterion_group!(
    benches,
    bench_alloc_release_tail,
    bench_alloc_reuse_head,
    bench_alloc_walk_256,
    bench_lifo_churn_1k,
    bench_fragmenting_churn_1k,
    bench_zero_allocate_1k,
    bench_invalid_release
);
criterion_main!(benches);
