//! First-fit block allocator over a single fixed-size arena.
//!
//! `bootheap` manages one statically sized byte buffer with no calls into a
//! platform heap after construction. It serves two verbs, "allocate N bytes"
//! and "release this pointer", plus a zeroing variant, and knows nothing
//! about what it stores.
//!
//! # Architecture
//!
//! ```text
//! Heap (public API: allocate / zero_allocate / release)
//! ├── Arena: byte buffer + break cursor
//! │   └── [hdr|payload][hdr|payload][hdr|payload] ...   | unclaimed
//! │        ^ block chain, address ordered           brk ^
//! ├── BlockChain: first-fit search, growth, split, fuse, tail retraction
//! └── address validator: release targets are checked before use
//! ```
//!
//! Each block is a 16-byte inline header (size, next, prev, occupancy
//! marker) followed by its payload. Links are offsets into the buffer, not
//! pointers. A free block's marker is NIL; an allocated block's marker is
//! its own payload offset, which is what the validator checks on release.
//!
//! # Invariants
//!
//! After every public operation:
//!
//! 1. Blocks tile `[0, brk)` in address order with no gaps.
//! 2. No two neighbouring blocks are both free.
//! 3. Occupancy markers are NIL or the block's own payload offset.
//! 4. The break cursor equals the end of the last payload; the last block
//!    is never free (releasing it retracts the break instead).
//!
//! [`Heap::check_integrity`] verifies all of them.
//!
//! # Concurrency
//!
//! Single-threaded. Mutation requires `&mut Heap`; share one across
//! threads only behind a lock.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod align;
mod arena;
mod block;
mod chain;
pub mod config;
pub mod error;
pub mod handle;
pub mod heap;
pub mod stats;
pub mod traits;
mod validate;

// Public re-exports for the primary API surface.
pub use block::{HEADER_SIZE, MIN_PAYLOAD};
pub use chain::{BlockInfo, Blocks};
pub use config::{HeapConfig, ReleasePolicy};
pub use error::{HeapError, IntegrityError, InvalidPointer};
pub use handle::Ptr;
pub use heap::Heap;
pub use stats::HeapStats;
pub use traits::{AllocCounts, CountingAllocator, RawAllocator};
