//! Address validation for pointers coming back from clients.
//!
//! Nothing derived from a client pointer is trusted until [`resolve`]
//! accepts it. The final check relies on the occupancy marker: an allocated
//! block's header stores its own payload offset, so an interior pointer, a
//! pointer into free space or a pointer whose header has been scribbled on
//! does not find itself there.
//!
//! A client can still write a header-shaped pattern into its own payload.
//! Release reads and rewrites the neighbours a header names, so those links
//! are checked too: each must point at an in-bounds header that links back.

use crate::align::is_aligned;
use crate::arena::Arena;
use crate::block::{self, BlockRef, Header, HEADER_SIZE};
use crate::chain::BlockChain;
use crate::error::InvalidPointer;
use crate::handle::Ptr;

/// Map `ptr` to the header of the allocated block whose payload it is.
pub(crate) fn resolve<B: AsRef<[u8]>>(
    arena: &Arena<B>,
    chain: &BlockChain,
    ptr: Ptr,
) -> Result<BlockRef, InvalidPointer> {
    if ptr.is_null() {
        return Err(InvalidPointer::Null);
    }
    if chain.is_empty() {
        return Err(InvalidPointer::EmptyHeap);
    }
    let brk = arena.brk();
    if ptr.raw() < HEADER_SIZE || ptr.raw() >= brk {
        return Err(InvalidPointer::OutOfBounds { brk });
    }
    if !is_aligned(ptr.raw()) {
        return Err(InvalidPointer::Misaligned);
    }

    let b = BlockRef::from_payload(ptr.raw());
    if block::raw_occupant(arena, b) != ptr.raw() {
        return Err(InvalidPointer::NotAllocated);
    }
    let header = Header::load(arena, b);
    let size = header.size;
    match ptr.raw().checked_add(size) {
        Some(end) if end <= brk && links_agree(arena, chain, b, &header, end) => Ok(b),
        _ => Err(InvalidPointer::Corrupt { size }),
    }
}

/// `b`'s neighbours exist, sit where `b`'s header says, and link back to it.
/// The far links of free neighbours are bounds-checked as well, since fusing
/// with them rewrites the blocks those links name.
fn links_agree<B: AsRef<[u8]>>(
    arena: &Arena<B>,
    chain: &BlockChain,
    b: BlockRef,
    header: &Header,
    end: u32,
) -> bool {
    let prev_ok = match header.prev {
        None => chain.head() == Some(b),
        Some(p) if p.offset() < b.offset() => {
            let before = Header::load(arena, p);
            let adjacent =
                before.next == Some(b) && p.payload().checked_add(before.size) == Some(b.offset());
            // A free predecessor absorbs `b` and may then be detached, which
            // rewrites its own predecessor.
            let outer_ok = !before.is_free()
                || match before.prev {
                    None => chain.head() == Some(p),
                    Some(pp) => pp.offset() < p.offset(),
                };
            adjacent && outer_ok
        }
        Some(_) => false,
    };
    if !prev_ok {
        return false;
    }

    match header.next {
        None => end == arena.brk(),
        Some(n) if n.offset() == end && header_fits(arena, n) => {
            let after = Header::load(arena, n);
            if after.prev != Some(b) {
                return false;
            }
            let after_end = match n.payload().checked_add(after.size) {
                Some(e) if e <= arena.brk() => e,
                _ => return false,
            };
            match after.next {
                Some(r) if after.is_free() => r.offset() == after_end && header_fits(arena, r),
                _ => true,
            }
        }
        Some(_) => false,
    }
}

fn header_fits<B: AsRef<[u8]>>(arena: &Arena<B>, b: BlockRef) -> bool {
    b.offset()
        .checked_add(HEADER_SIZE)
        .is_some_and(|end| end <= arena.brk())
}
