//! Workload profiles for benchmarking the bootheap allocator.
//!
//! - [`bench_config`]: a 64 KiB heap with wiping off
//! - [`request_sizes`]: deterministic request sizes from a seed
//! - [`lifo_churn`]: allocate a batch, release it newest-first
//! - [`fragmenting_churn`]: release every other block, then refill the holes

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use bootheap::{Heap, HeapConfig, Ptr};

/// Capacity used by the benchmark profiles.
pub const BENCH_CAPACITY: u32 = 64 * 1024;

/// Heap config for benchmarks. Wiping is off so the numbers measure the
/// chain, not `memset`.
pub fn bench_config() -> HeapConfig {
    HeapConfig::new(BENCH_CAPACITY).with_wipe_on_release(false)
}

/// Generate `n` request sizes in `1..=max_size`.
///
/// Same seed, same sizes.
pub fn request_sizes(n: usize, max_size: u32, seed: u64) -> Vec<u32> {
    let mut state = seed;
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) % u64::from(max_size)) as u32 + 1
        })
        .collect()
}

/// Allocate one block per size, then release them in reverse order.
///
/// Every release hits the tail, so the heap ends empty. Returns the number
/// of successful allocations.
pub fn lifo_churn(heap: &mut Heap, sizes: &[u32]) -> usize {
    let ptrs: Vec<Ptr> = sizes.iter().filter_map(|&s| heap.allocate(s)).collect();
    let served = ptrs.len();
    for p in ptrs.into_iter().rev() {
        heap.release(p);
    }
    served
}

/// Allocate one block per size, release every other one, refill the holes
/// with the same sizes, then release everything.
///
/// Exercises first-fit search over a fragmented chain along with split and
/// both fuse directions. Returns the number of successful allocations.
pub fn fragmenting_churn(heap: &mut Heap, sizes: &[u32]) -> usize {
    let mut ptrs: Vec<Option<Ptr>> = sizes.iter().map(|&s| heap.allocate(s)).collect();
    let mut served = ptrs.iter().flatten().count();

    for slot in ptrs.iter_mut().step_by(2) {
        if let Some(p) = slot.take() {
            heap.release(p);
        }
    }
    for (slot, &s) in ptrs.iter_mut().zip(sizes).step_by(2) {
        *slot = heap.allocate(s);
        served += usize::from(slot.is_some());
    }
    for p in ptrs.into_iter().flatten() {
        heap.release(p);
    }
    served
}
