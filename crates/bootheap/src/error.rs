//! Heap error types.

use std::error::Error;
use std::fmt;

use crate::handle::Ptr;

/// Errors that can occur during heap operations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HeapError {
    /// Not enough unclaimed arena space to append a new block, and no free
    /// block is wide enough.
    Exhausted {
        /// Aligned payload size that was requested.
        requested: u32,
        /// Unclaimed bytes left between the break cursor and the arena end.
        available: u32,
    },
    /// The request can never be satisfied by this arena: its aligned size is
    /// not strictly smaller than the capacity, or alignment overflowed.
    RequestTooLarge {
        /// Payload size as passed by the caller.
        requested: u32,
        /// Total arena capacity in bytes.
        capacity: u32,
    },
    /// `count * element_size` does not fit the allocator's size type.
    SizeOverflow {
        /// Number of elements requested.
        count: u32,
        /// Size of each element in bytes.
        element_size: u32,
    },
    /// A zero-initialised allocation of zero bytes was requested.
    ZeroSize,
    /// A release target failed address validation.
    InvalidRelease {
        /// The rejected pointer.
        ptr: Ptr,
        /// Which validation step rejected it.
        reason: InvalidPointer,
    },
    /// The heap configuration or backing buffer is unusable.
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exhausted {
                requested,
                available,
            } => {
                write!(
                    f,
                    "heap exhausted: requested {requested} bytes, {available} bytes unclaimed"
                )
            }
            Self::RequestTooLarge {
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "request of {requested} bytes can never fit an arena of {capacity} bytes"
                )
            }
            Self::SizeOverflow {
                count,
                element_size,
            } => {
                write!(
                    f,
                    "size overflow: {count} elements of {element_size} bytes exceed u32"
                )
            }
            Self::ZeroSize => write!(f, "zero-sized allocation requested"),
            Self::InvalidRelease { ptr, reason } => {
                write!(f, "invalid release of {ptr}: {reason}")
            }
            Self::InvalidConfig { reason } => write!(f, "invalid heap config: {reason}"),
        }
    }
}

impl Error for HeapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidRelease { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// Why the address validator rejected a pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidPointer {
    /// The null pointer.
    Null,
    /// Nothing is allocated, so no pointer can be valid.
    EmptyHeap,
    /// The pointer lies outside the claimed region.
    OutOfBounds {
        /// Break cursor at the time of the check.
        brk: u32,
    },
    /// The pointer is not on an alignment boundary.
    Misaligned,
    /// The header in front of the pointer does not claim it: the block is
    /// free, already released, or the pointer is interior to a payload.
    NotAllocated,
    /// The header claims the pointer but its size runs past the break cursor
    /// or its links do not agree with the neighbouring headers.
    Corrupt {
        /// The size recorded in the header.
        size: u32,
    },
}

impl fmt::Display for InvalidPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null pointer"),
            Self::EmptyHeap => write!(f, "heap has no allocations"),
            Self::OutOfBounds { brk } => write!(f, "outside claimed region (break {brk})"),
            Self::Misaligned => write!(f, "misaligned pointer"),
            Self::NotAllocated => write!(f, "not the payload of an allocated block"),
            Self::Corrupt { size } => {
                write!(f, "header (size {size}) is inconsistent with the block chain")
            }
        }
    }
}

impl Error for InvalidPointer {}

/// A structural invariant of the block chain that does not hold.
///
/// Returned by [`Heap::check_integrity`](crate::Heap::check_integrity).
/// All offsets are header offsets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegrityError {
    /// A block does not start where its predecessor ends.
    Gap {
        /// Where the block was expected.
        expected: u32,
        /// Where the chain says it is.
        found: u32,
    },
    /// A block's `prev` link does not name its actual predecessor.
    BrokenBackLink {
        /// The block with the bad link.
        block: u32,
        /// The actual predecessor, if any.
        expected: Option<u32>,
        /// The recorded `prev` link.
        found: Option<u32>,
    },
    /// A block's occupancy marker is neither free nor its own payload.
    ForeignOccupant {
        /// The block with the bad marker.
        block: u32,
        /// The recorded marker.
        marker: u32,
    },
    /// Two neighbouring blocks are both free.
    AdjacentFree {
        /// The first free block.
        first: u32,
        /// Its free successor.
        second: u32,
    },
    /// The last block is free instead of having been retracted.
    TrailingFree {
        /// The free tail block.
        block: u32,
    },
    /// The chain does not end at the break cursor.
    BreakMismatch {
        /// Where the last payload ends.
        chain_end: u32,
        /// The break cursor.
        brk: u32,
    },
}

impl fmt::Display for IntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gap { expected, found } => {
                write!(f, "block at {found} but predecessor ends at {expected}")
            }
            Self::BrokenBackLink {
                block,
                expected,
                found,
            } => {
                write!(
                    f,
                    "block {block} prev link is {found:?}, predecessor is {expected:?}"
                )
            }
            Self::ForeignOccupant { block, marker } => {
                write!(f, "block {block} has foreign occupancy marker {marker}")
            }
            Self::AdjacentFree { first, second } => {
                write!(f, "free blocks {first} and {second} were not coalesced")
            }
            Self::TrailingFree { block } => write!(f, "tail block {block} is free"),
            Self::BreakMismatch { chain_end, brk } => {
                write!(f, "chain ends at {chain_end} but break cursor is {brk}")
            }
        }
    }
}

impl Error for IntegrityError {}
