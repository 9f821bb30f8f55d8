//! The public allocator: allocate, zero-allocate, release.
//!
//! [`Heap`] ties the arena, the block chain and the address validator
//! together. It has no lifecycle of its own: once constructed it is ready,
//! and it lives as long as its buffer.
//!
//! # Concurrency
//!
//! Every mutating operation takes `&mut self`. The heap is therefore never
//! re-entered and never touched from two threads at once unless the
//! integrator wraps it in a lock of their choosing. There is no locking
//! inside.

use std::fmt;

use crate::align::align_to_4;
use crate::arena::Arena;
use crate::block::{self, BlockRef, Header, MIN_PAYLOAD};
use crate::chain::{BlockChain, Blocks, Fit};
use crate::config::{HeapConfig, ReleasePolicy};
use crate::error::{HeapError, IntegrityError};
use crate::handle::Ptr;
use crate::stats::HeapStats;
use crate::validate;

/// First-fit block allocator over a single fixed-size buffer.
///
/// The default buffer is a `Box<[u8]>` allocated once by [`Heap::new`].
/// Any `B: AsRef<[u8]> + AsMut<[u8]>` works with [`Heap::with_buffer`],
/// including a `&'static mut [u8]` or an inline `[u8; N]` for environments
/// that have no platform heap at all.
///
/// ```
/// use bootheap::{Heap, HeapConfig};
///
/// let mut heap = Heap::new(HeapConfig::new(1024)).unwrap();
/// let p = heap.allocate(10).unwrap();
/// heap.payload_mut(p).unwrap()[..5].copy_from_slice(b"hello");
/// assert_eq!(&heap.payload(p).unwrap()[..5], b"hello");
/// heap.release(p);
/// assert!(heap.is_empty());
/// ```
pub struct Heap<B = Box<[u8]>> {
    arena: Arena<B>,
    chain: BlockChain,
    config: HeapConfig,
}

impl Heap {
    /// Create a heap backed by a freshly allocated, zeroed buffer of
    /// `config.capacity` bytes.
    pub fn new(config: HeapConfig) -> Result<Self, HeapError> {
        config.validate()?;
        let buf = vec![0u8; config.capacity as usize].into_boxed_slice();
        Ok(Self {
            arena: Arena::new(buf),
            chain: BlockChain::new(),
            config,
        })
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> Heap<B> {
    /// Create a heap over a caller-provided buffer.
    ///
    /// The capacity is taken from the buffer length; `config.capacity` is
    /// overwritten. The buffer's initial contents do not matter.
    pub fn with_buffer(buffer: B, config: HeapConfig) -> Result<Self, HeapError> {
        let len = buffer.as_ref().len();
        let capacity = u32::try_from(len).map_err(|_| HeapError::InvalidConfig {
            reason: format!("buffer of {len} bytes exceeds the u32 size range"),
        })?;
        let config = HeapConfig { capacity, ..config };
        config.validate()?;
        Ok(Self {
            arena: Arena::new(buffer),
            chain: BlockChain::new(),
            config,
        })
    }

    /// Allocate `size` bytes. Returns `None` on any failure.
    ///
    /// The block holds `size` rounded up to a multiple of 4, and never less
    /// than [`MIN_PAYLOAD`]: `allocate(0)` returns a usable 4-byte block.
    /// See [`Heap::try_allocate`] for the failure cases.
    pub fn allocate(&mut self, size: u32) -> Option<Ptr> {
        self.try_allocate(size).ok()
    }

    /// Allocate `size` bytes, rounded up to a multiple of 4.
    ///
    /// A zero-byte request is rounded up to [`MIN_PAYLOAD`] so that every
    /// block has a releasable payload. The first free block wide enough is
    /// reused (and split if the slack can hold another block); otherwise a
    /// new block is appended at the break cursor.
    ///
    /// # Errors
    ///
    /// - [`HeapError::RequestTooLarge`] if the aligned size is not strictly
    ///   smaller than the capacity.
    /// - [`HeapError::Exhausted`] if no free block fits and the unclaimed
    ///   space cannot hold a new one.
    pub fn try_allocate(&mut self, size: u32) -> Result<Ptr, HeapError> {
        let capacity = self.arena.capacity();
        let aligned = match align_to_4(size.max(MIN_PAYLOAD)) {
            Some(aligned) if aligned < capacity => aligned,
            _ => {
                tracing::debug!(size, capacity, "allocation can never fit");
                return Err(HeapError::RequestTooLarge {
                    requested: size,
                    capacity,
                });
            }
        };

        let b = match self.chain.find_fit(&self.arena, aligned) {
            Fit::Found(b) => {
                BlockChain::split(&mut self.arena, b, aligned);
                block::set_occupant(&mut self.arena, b, Some(b.payload()));
                b
            }
            Fit::Miss { last } => match self.chain.extend(&mut self.arena, last, aligned) {
                Some(b) => b,
                None => {
                    let available = self.arena.unclaimed();
                    tracing::debug!(size = aligned, available, "heap exhausted");
                    return Err(HeapError::Exhausted {
                        requested: aligned,
                        available,
                    });
                }
            },
        };

        tracing::trace!(ptr = b.payload(), size = aligned, "allocated");
        Ok(Ptr(b.payload()))
    }

    /// Allocate a zeroed array of `count` elements of `element_size` bytes.
    /// Returns `None` on any failure.
    pub fn zero_allocate(&mut self, count: u32, element_size: u32) -> Option<Ptr> {
        self.try_zero_allocate(count, element_size).ok()
    }

    /// Allocate a zeroed array of `count` elements of `element_size` bytes.
    ///
    /// The product is checked before anything is allocated, so an
    /// overflowing request can never produce an undersized buffer.
    ///
    /// # Errors
    ///
    /// - [`HeapError::SizeOverflow`] if the byte count exceeds `u32::MAX`.
    /// - [`HeapError::ZeroSize`] if the byte count is zero.
    /// - Anything [`Heap::try_allocate`] returns.
    pub fn try_zero_allocate(&mut self, count: u32, element_size: u32) -> Result<Ptr, HeapError> {
        let total = u64::from(count) * u64::from(element_size);
        let Ok(size) = u32::try_from(total) else {
            tracing::debug!(count, element_size, "zero-allocate size overflow");
            return Err(HeapError::SizeOverflow {
                count,
                element_size,
            });
        };
        if size == 0 {
            return Err(HeapError::ZeroSize);
        }

        let ptr = self.try_allocate(size)?;
        let b = BlockRef::from_payload(ptr.raw());
        let len = Header::load(&self.arena, b).size;
        self.arena.wipe(b.payload(), len);
        Ok(ptr)
    }

    /// Release the allocation at `ptr`.
    ///
    /// Releasing [`Ptr::NULL`] does nothing under every policy. Any other
    /// pointer that fails validation (foreign, interior, already released)
    /// is ignored and logged. Under [`ReleasePolicy::DebugAssert`] it panics
    /// instead when debug assertions are on. Use [`Heap::try_release`] to
    /// observe the failure.
    pub fn release(&mut self, ptr: Ptr) {
        if ptr.is_null() {
            return;
        }
        if let Err(err) = self.try_release(ptr) {
            match self.config.invalid_release {
                ReleasePolicy::DebugAssert if cfg!(debug_assertions) => {
                    panic!("{err}");
                }
                _ => tracing::warn!(%ptr, error = %err, "ignored invalid release"),
            }
        }
    }

    /// Release the allocation at `ptr`, reporting invalid pointers.
    ///
    /// The freed block is merged with a free predecessor and a free
    /// successor. If it ends up last in the chain it is dropped entirely and
    /// the break cursor moves back to its header.
    ///
    /// # Errors
    ///
    /// [`HeapError::InvalidRelease`] if `ptr` is not the payload of an
    /// allocated block. The heap is not modified.
    pub fn try_release(&mut self, ptr: Ptr) -> Result<(), HeapError> {
        let freed = validate::resolve(&self.arena, &self.chain, ptr)
            .map_err(|reason| HeapError::InvalidRelease { ptr, reason })?;
        let header = Header::load(&self.arena, freed);
        if self.config.wipe_on_release {
            self.arena.wipe(freed.payload(), header.size);
        }
        block::set_occupant(&mut self.arena, freed, None);

        let mut b = freed;
        if let Some(prev) = header.prev {
            if Header::load(&self.arena, prev).is_free() {
                b = BlockChain::fuse(&mut self.arena, prev);
            }
        }
        if Header::load(&self.arena, b).next.is_some() {
            BlockChain::fuse(&mut self.arena, b);
        } else {
            self.chain.detach_tail(&mut self.arena, b);
        }

        tracing::trace!(%ptr, size = header.size, brk = self.arena.brk(), "released");
        Ok(())
    }

    /// Mutable access to the payload at `ptr`.
    ///
    /// The slice spans the block's full (aligned) payload, which may be
    /// longer than the size originally requested.
    pub fn payload_mut(&mut self, ptr: Ptr) -> Option<&mut [u8]> {
        let b = validate::resolve(&self.arena, &self.chain, ptr).ok()?;
        let size = Header::load(&self.arena, b).size;
        Some(self.arena.bytes_mut(b.payload(), size))
    }

    /// Drop every allocation at once and retract the break cursor to the
    /// start of the arena. All outstanding pointers become invalid.
    pub fn reset(&mut self) {
        if self.config.wipe_on_release {
            let claimed = self.arena.brk();
            self.arena.wipe(0, claimed);
        } else {
            // Stale headers left behind must not validate once the region is
            // handed out again.
            let mut cursor = self.chain.head();
            while let Some(b) = cursor {
                cursor = Header::load(&self.arena, b).next;
                block::set_occupant(&mut self.arena, b, None);
            }
        }
        self.chain.clear();
        self.arena.retract(0);
        tracing::trace!("heap reset");
    }
}

impl<B: AsRef<[u8]>> Heap<B> {
    /// Shared access to the payload at `ptr`, or `None` if `ptr` is not an
    /// allocated payload.
    pub fn payload(&self, ptr: Ptr) -> Option<&[u8]> {
        let b = validate::resolve(&self.arena, &self.chain, ptr).ok()?;
        let size = Header::load(&self.arena, b).size;
        Some(self.arena.bytes(b.payload(), size))
    }

    /// Usable payload size of the allocation at `ptr`.
    pub fn usable_size(&self, ptr: Ptr) -> Option<u32> {
        let b = validate::resolve(&self.arena, &self.chain, ptr).ok()?;
        Some(Header::load(&self.arena, b).size)
    }

    /// Whether `ptr` is the payload of a currently allocated block.
    pub fn is_allocated(&self, ptr: Ptr) -> bool {
        validate::resolve(&self.arena, &self.chain, ptr).is_ok()
    }

    /// Arena size in bytes.
    pub fn capacity(&self) -> u32 {
        self.arena.capacity()
    }

    /// Current break cursor: bytes claimed by blocks.
    pub fn brk(&self) -> u32 {
        self.arena.brk()
    }

    /// Largest value the break cursor has reached.
    pub fn high_water(&self) -> u32 {
        self.arena.high_water()
    }

    /// Whether no block is claimed.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// The active configuration.
    pub fn config(&self) -> &HeapConfig {
        &self.config
    }

    /// Iterate over all blocks in address order.
    pub fn blocks(&self) -> Blocks<'_, B> {
        Blocks::new(&self.arena, &self.chain)
    }

    /// Summarise current occupancy.
    pub fn stats(&self) -> HeapStats {
        HeapStats::collect(
            self.arena.capacity(),
            self.arena.brk(),
            self.arena.high_water(),
            self.blocks(),
        )
    }

    /// Verify the block chain's structural invariants: contiguity, back
    /// links, occupancy markers, exhaustive coalescing, no trailing free
    /// block, and a chain that ends exactly at the break cursor.
    pub fn check_integrity(&self) -> Result<(), IntegrityError> {
        self.chain.verify(&self.arena)
    }
}

impl<B: AsRef<[u8]>> fmt::Debug for Heap<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap")
            .field("capacity", &self.arena.capacity())
            .field("brk", &self.arena.brk())
            .field("high_water", &self.arena.high_water())
            .field("config", &self.config)
            .finish()
    }
}
