//! Test utilities for bootheap development.
//!
//! - [`ShadowHeap`]: a [`Heap`] paired with a model of every live
//!   allocation. Each allocation is filled with a per-allocation tag byte;
//!   after every step the shadow checks that live ranges do not overlap,
//!   that no tag has been overwritten, and that the block chain is sound.
//! - [`Op`] and [`op_sequence`]: proptest strategies that drive a
//!   `ShadowHeap` through random allocate/release interleavings.
//! - Config fixtures.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use bootheap::{Heap, HeapConfig, HeapError, Ptr};
use proptest::prelude::*;

/// 1 KiB heap with wiping off, small enough to hit exhaustion quickly.
pub fn small_config() -> HeapConfig {
    HeapConfig::new(1024).with_wipe_on_release(false)
}

/// 1 KiB heap that wipes payloads on release.
pub fn wiping_config() -> HeapConfig {
    HeapConfig::new(1024).with_wipe_on_release(true)
}

/// One step of a random workload.
#[derive(Clone, Debug)]
pub enum Op {
    /// `allocate(size)`.
    Allocate(u32),
    /// `zero_allocate(count, element_size)`.
    ZeroAllocate(u32, u32),
    /// Release the live allocation at `index % live_count`.
    Release(usize),
    /// Release the same pointer twice.
    DoubleRelease(usize),
    /// Release an arbitrary raw offset.
    ReleaseRaw(u32),
}

/// Strategy for a single [`Op`], weighted towards allocate and release.
pub fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u32..160).prop_map(Op::Allocate),
        1 => (0u32..8, 0u32..24).prop_map(|(n, s)| Op::ZeroAllocate(n, s)),
        4 => any::<usize>().prop_map(Op::Release),
        1 => any::<usize>().prop_map(Op::DoubleRelease),
        1 => any::<u32>().prop_map(Op::ReleaseRaw),
    ]
}

/// Strategy for a workload of up to `max_len` ops.
pub fn op_sequence(max_len: usize) -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(op(), 1..max_len)
}

/// A live allocation as the model sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Live {
    pub ptr: Ptr,
    /// Bytes requested by the caller.
    pub requested: u32,
    /// Byte every requested position was filled with.
    pub tag: u8,
}

impl Live {
    fn end(&self) -> u32 {
        self.ptr.raw() + self.requested
    }
}

/// A heap plus a model of what should be live in it.
pub struct ShadowHeap {
    pub heap: Heap,
    pub live: Vec<Live>,
    next_tag: u8,
}

impl ShadowHeap {
    pub fn new(config: HeapConfig) -> Self {
        Self {
            heap: Heap::new(config).expect("fixture config is valid"),
            live: Vec::new(),
            next_tag: 1,
        }
    }

    /// Allocate, tag, and record. Returns the heap's result.
    pub fn allocate(&mut self, size: u32) -> Result<Ptr, HeapError> {
        let ptr = self.heap.try_allocate(size)?;
        self.adopt(ptr, size);
        Ok(ptr)
    }

    /// Zero-allocate, check the zeroing, then tag and record.
    pub fn zero_allocate(&mut self, count: u32, element_size: u32) -> Result<Ptr, HeapError> {
        let ptr = self.heap.try_zero_allocate(count, element_size)?;
        let payload = self.heap.payload(ptr).expect("fresh allocation is valid");
        assert!(
            payload.iter().all(|&b| b == 0),
            "zero_allocate returned dirty memory at {ptr}"
        );
        self.adopt(ptr, count * element_size);
        Ok(ptr)
    }

    /// Release the live allocation at `index % live.len()`, if any.
    pub fn release_nth(&mut self, index: usize) -> Option<Live> {
        if self.live.is_empty() {
            return None;
        }
        let entry = self.live.swap_remove(index % self.live.len());
        self.heap
            .try_release(entry.ptr)
            .unwrap_or_else(|e| panic!("live pointer {} rejected: {e}", entry.ptr));
        Some(entry)
    }

    /// Release a live allocation, then release it again and check that the
    /// second call changed nothing.
    pub fn double_release_nth(&mut self, index: usize) {
        let Some(entry) = self.release_nth(index) else {
            return;
        };
        let before: Vec<_> = self.heap.blocks().collect();
        let brk = self.heap.brk();
        assert!(self.heap.try_release(entry.ptr).is_err());
        self.heap.release(entry.ptr);
        assert_eq!(self.heap.blocks().collect::<Vec<_>>(), before);
        assert_eq!(self.heap.brk(), brk);
    }

    /// Release a raw offset. Must be a no-op unless it happens to be live,
    /// in which case the model is updated.
    pub fn release_raw(&mut self, raw: u32) {
        let ptr = Ptr::from_raw(raw);
        match self.live.iter().position(|l| l.ptr == ptr) {
            Some(index) => {
                self.release_nth(index);
            }
            None => {
                let before: Vec<_> = self.heap.blocks().collect();
                assert!(self.heap.try_release(ptr).is_err());
                assert_eq!(self.heap.blocks().collect::<Vec<_>>(), before);
            }
        }
    }

    /// Apply one [`Op`]. Allocation failures are allowed; everything else
    /// is checked.
    pub fn apply(&mut self, op: &Op) {
        match *op {
            Op::Allocate(size) => {
                let _ = self.allocate(size);
            }
            Op::ZeroAllocate(count, element_size) => {
                let _ = self.zero_allocate(count, element_size);
            }
            Op::Release(index) => {
                self.release_nth(index);
            }
            Op::DoubleRelease(index) => self.double_release_nth(index),
            Op::ReleaseRaw(raw) => self.release_raw(raw),
        }
    }

    /// Check the model against the heap.
    ///
    /// # Panics
    ///
    /// Panics with a description of the first discrepancy.
    pub fn verify(&self) {
        if let Err(e) = self.heap.check_integrity() {
            panic!("integrity violated: {e}");
        }

        let mut ranges: Vec<&Live> = self.live.iter().collect();
        ranges.sort_by_key(|l| l.ptr);
        for pair in ranges.windows(2) {
            assert!(
                pair[0].end() <= pair[1].ptr.raw(),
                "live allocations overlap: {:?} and {:?}",
                pair[0],
                pair[1]
            );
        }

        for live in &self.live {
            assert_eq!(live.ptr.raw() % 4, 0, "misaligned payload {}", live.ptr);
            let payload = self
                .heap
                .payload(live.ptr)
                .unwrap_or_else(|| panic!("live pointer {} not recognised", live.ptr));
            assert!(payload.len() as u32 >= live.requested);
            assert!(
                payload[..live.requested as usize].iter().all(|&b| b == live.tag),
                "contents of {} were clobbered",
                live.ptr
            );
        }

        let stats = self.heap.stats();
        assert_eq!(stats.allocated_blocks as usize, self.live.len());
    }

    fn adopt(&mut self, ptr: Ptr, requested: u32) {
        let tag = self.next_tag;
        self.next_tag = self.next_tag.wrapping_add(1).max(1);
        let payload = self
            .heap
            .payload_mut(ptr)
            .expect("fresh allocation is valid");
        payload[..requested as usize].fill(tag);
        self.live.push(Live {
            ptr,
            requested,
            tag,
        });
    }
}
