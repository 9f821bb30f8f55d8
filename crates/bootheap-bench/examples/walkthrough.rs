//! Walk through the allocator's lifecycle and print the block layout.
//!
//! Run with `RUST_LOG=bootheap=trace` to see every grow, split, fuse, and
//! retract as it happens.

use bootheap::{CountingAllocator, Heap, HeapConfig, RawAllocator, HEADER_SIZE};
use tracing_subscriber::EnvFilter;

fn print_layout(label: &str, heap: &Heap) {
    println!("--- {label} (brk={}, high_water={}) ---", heap.brk(), heap.high_water());
    for block in heap.blocks() {
        println!(
            "  [{:#06x}..{:#06x}) payload={} size={:>4} {}",
            block.offset,
            block.offset + block.footprint(),
            block.payload,
            block.size,
            if block.allocated { "allocated" } else { "free" },
        );
    }
    if heap.is_empty() {
        println!("  (empty)");
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bootheap=debug")),
        )
        .init();

    println!("=== bootheap walkthrough ===\n");

    let mut heap = Heap::new(HeapConfig::new(1024)).unwrap();

    let a = heap.allocate(24).unwrap();
    let b = heap.allocate(40).unwrap();
    let c = heap.zero_allocate(4, 8).unwrap();
    let d = heap.allocate(10).unwrap();
    print_layout("four allocations", &heap);

    heap.release(b);
    print_layout("released b (hole in the middle)", &heap);

    let e = heap.allocate(8).unwrap();
    println!("\nallocate(8) reused b's slot: {}", e == b);
    print_layout("split the hole", &heap);

    heap.release(a);
    heap.release(e);
    print_layout("released a and e (fused)", &heap);

    let merged = heap.allocate(24 + HEADER_SIZE + 40).unwrap();
    println!("\nallocate({}) landed at a: {}", 24 + HEADER_SIZE + 40, merged == a);

    heap.release(b);
    println!("releasing a stale pointer is ignored: {:?}", heap.try_release(b).err());

    heap.release(d);
    heap.release(c);
    heap.release(merged);
    print_layout("released everything", &heap);

    println!("\n{:#?}", heap.stats());

    // Consumers that take a RawAllocator can be handed a counting wrapper.
    let mut counting = CountingAllocator::new(heap);
    for word in ["first", "fit", "arena"] {
        counting.allocate_copy(word.as_bytes());
    }
    println!("\ncounts through the wrapper: {:?}", counting.counts());
    print_layout("after allocate_copy", counting.inner());
}
