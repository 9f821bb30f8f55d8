//! The allocation seam consumers depend on.
//!
//! Components that need dynamic memory (document trees, decode buffers)
//! take a `&mut impl RawAllocator` rather than reaching for a global, so the
//! heap can be swapped out or wrapped (for accounting, fault injection,
//! tracing) without touching the consumer.

use crate::handle::Ptr;
use crate::heap::Heap;

/// Allocate / release interface over a pool of payload pointers.
pub trait RawAllocator {
    /// Allocate `size` bytes, or `None` on failure. [`Heap`] serves a
    /// zero-byte request with a 4-byte block.
    fn allocate(&mut self, size: u32) -> Option<Ptr>;

    /// Allocate a zeroed array of `count * element_size` bytes, or `None` on
    /// failure or overflow.
    fn zero_allocate(&mut self, count: u32, element_size: u32) -> Option<Ptr>;

    /// Release `ptr`. Invalid pointers are ignored.
    fn release(&mut self, ptr: Ptr);

    /// Mutable access to the payload at `ptr`.
    fn payload_mut(&mut self, ptr: Ptr) -> Option<&mut [u8]>;

    /// Allocate a copy of `bytes`.
    ///
    /// Returns `None` if `bytes` is longer than `u32::MAX` or the allocation
    /// fails.
    fn allocate_copy(&mut self, bytes: &[u8]) -> Option<Ptr> {
        let len = u32::try_from(bytes.len()).ok()?;
        let ptr = self.allocate(len)?;
        match self.payload_mut(ptr) {
            Some(dst) => {
                dst[..bytes.len()].copy_from_slice(bytes);
                Some(ptr)
            }
            None => {
                self.release(ptr);
                None
            }
        }
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> RawAllocator for Heap<B> {
    fn allocate(&mut self, size: u32) -> Option<Ptr> {
        Heap::allocate(self, size)
    }

    fn zero_allocate(&mut self, count: u32, element_size: u32) -> Option<Ptr> {
        Heap::zero_allocate(self, count, element_size)
    }

    fn release(&mut self, ptr: Ptr) {
        Heap::release(self, ptr);
    }

    fn payload_mut(&mut self, ptr: Ptr) -> Option<&mut [u8]> {
        Heap::payload_mut(self, ptr)
    }
}

impl<A: RawAllocator + ?Sized> RawAllocator for &mut A {
    fn allocate(&mut self, size: u32) -> Option<Ptr> {
        (**self).allocate(size)
    }

    fn zero_allocate(&mut self, count: u32, element_size: u32) -> Option<Ptr> {
        (**self).zero_allocate(count, element_size)
    }

    fn release(&mut self, ptr: Ptr) {
        (**self).release(ptr);
    }

    fn payload_mut(&mut self, ptr: Ptr) -> Option<&mut [u8]> {
        (**self).payload_mut(ptr)
    }
}

/// Running totals kept by [`CountingAllocator`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AllocCounts {
    /// Successful allocations (plain and zeroed).
    pub allocations: u64,
    /// Allocation requests that returned `None`.
    pub failures: u64,
    /// Release calls forwarded to the inner allocator.
    pub releases: u64,
}

impl AllocCounts {
    /// Allocations not yet matched by a release call.
    ///
    /// Counts release calls, not successful releases, so an ignored invalid
    /// release still decrements it.
    pub fn outstanding(&self) -> u64 {
        self.allocations.saturating_sub(self.releases)
    }
}

/// Wraps another allocator and counts calls through it.
#[derive(Debug)]
pub struct CountingAllocator<A> {
    inner: A,
    counts: AllocCounts,
}

impl<A: RawAllocator> CountingAllocator<A> {
    /// Wrap `inner` with zeroed counters.
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            counts: AllocCounts::default(),
        }
    }

    /// Totals so far.
    pub fn counts(&self) -> AllocCounts {
        self.counts
    }

    /// Shared access to the wrapped allocator.
    pub fn inner(&self) -> &A {
        &self.inner
    }

    /// Unwrap, returning the inner allocator.
    pub fn into_inner(self) -> A {
        self.inner
    }

    fn record(&mut self, result: Option<Ptr>) -> Option<Ptr> {
        match result {
            Some(_) => self.counts.allocations += 1,
            None => self.counts.failures += 1,
        }
        result
    }
}

impl<A: RawAllocator> RawAllocator for CountingAllocator<A> {
    fn allocate(&mut self, size: u32) -> Option<Ptr> {
        let result = self.inner.allocate(size);
        self.record(result)
    }

    fn zero_allocate(&mut self, count: u32, element_size: u32) -> Option<Ptr> {
        let result = self.inner.zero_allocate(count, element_size);
        self.record(result)
    }

    fn release(&mut self, ptr: Ptr) {
        self.counts.releases += 1;
        self.inner.release(ptr);
    }

    fn payload_mut(&mut self, ptr: Ptr) -> Option<&mut [u8]> {
        self.inner.payload_mut(ptr)
    }
}
