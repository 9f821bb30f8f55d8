//! The address-ordered block chain and the algorithms that reshape it.
//!
//! Blocks are linked in physical order, so walking `next` from the head
//! visits the claimed region `[0, brk)` front to back with no gaps. Free and
//! allocated blocks share the one list; there is no separate free list.
//!
//! Shape-changing operations:
//!
//! - [`BlockChain::extend`] appends a block at the break cursor (growth).
//! - [`BlockChain::find_fit`] is a first-fit scan.
//! - [`BlockChain::split`] carves the unused tail of a free block off into
//!   a new free block.
//! - [`BlockChain::fuse`] merges a block with a free successor.
//! - [`BlockChain::detach_tail`] drops the last block and retracts the break.

use crate::arena::Arena;
use crate::block::{self, BlockRef, Header, HEADER_SIZE, MIN_PAYLOAD};
use crate::error::IntegrityError;
use crate::handle::Ptr;

/// Outcome of a first-fit search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Fit {
    /// A free block at least as wide as the request.
    Found(BlockRef),
    /// Nothing fits; `last` is where growth should append.
    Miss { last: Option<BlockRef> },
}

/// Head of the block chain. The blocks themselves live in the arena.
pub(crate) struct BlockChain {
    head: Option<BlockRef>,
}

impl BlockChain {
    pub(crate) fn new() -> Self {
        Self { head: None }
    }

    pub(crate) fn head(&self) -> Option<BlockRef> {
        self.head
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Forget every block. The caller resets the break cursor.
    pub(crate) fn clear(&mut self) {
        self.head = None;
    }

    /// Return the first free block with at least `size` payload bytes.
    pub(crate) fn find_fit<B: AsRef<[u8]>>(&self, arena: &Arena<B>, size: u32) -> Fit {
        let mut last = None;
        let mut cursor = self.head;
        while let Some(b) = cursor {
            let header = Header::load(arena, b);
            if header.is_free() && header.size >= size {
                return Fit::Found(b);
            }
            last = Some(b);
            cursor = header.next;
        }
        Fit::Miss { last }
    }

    /// Claim `HEADER_SIZE + size` bytes at the break cursor and link a new
    /// allocated block after `last`.
    ///
    /// Returns `None`, leaving the arena untouched, if the bytes do not fit.
    pub(crate) fn extend<B: AsRef<[u8]> + AsMut<[u8]>>(
        &mut self,
        arena: &mut Arena<B>,
        last: Option<BlockRef>,
        size: u32,
    ) -> Option<BlockRef> {
        let footprint = HEADER_SIZE.checked_add(size)?;
        let b = BlockRef::at(arena.sbrk(footprint)?);
        Header {
            size,
            next: None,
            prev: last,
            occupant: Some(b.payload()),
        }
        .store(arena, b);
        match last {
            Some(last) => block::set_next(arena, last, Some(b)),
            None => self.head = Some(b),
        }
        tracing::trace!(block = b.offset(), size, brk = arena.brk(), "extended heap");
        Some(b)
    }

    /// Shrink `b` to `size` bytes and link the remainder as a new free block,
    /// if the remainder can hold a header plus [`MIN_PAYLOAD`].
    ///
    /// Returns the new free block, or `None` when `b` was left oversized.
    pub(crate) fn split<B: AsRef<[u8]> + AsMut<[u8]>>(
        arena: &mut Arena<B>,
        b: BlockRef,
        size: u32,
    ) -> Option<BlockRef> {
        let mut donor = Header::load(arena, b);
        let slack = donor.size.checked_sub(size)?;
        if slack < HEADER_SIZE + MIN_PAYLOAD {
            return None;
        }

        let remainder = BlockRef::at(b.payload() + size);
        Header {
            size: slack - HEADER_SIZE,
            next: donor.next,
            prev: Some(b),
            occupant: None,
        }
        .store(arena, remainder);
        if let Some(after) = donor.next {
            block::set_prev(arena, after, Some(remainder));
        }

        donor.size = size;
        donor.next = Some(remainder);
        donor.store(arena, b);
        tracing::trace!(
            block = b.offset(),
            size,
            remainder = remainder.offset(),
            "split block"
        );
        Some(remainder)
    }

    /// Absorb `b`'s successor into `b` if the successor is free.
    pub(crate) fn fuse<B: AsRef<[u8]> + AsMut<[u8]>>(arena: &mut Arena<B>, b: BlockRef) -> BlockRef {
        let mut header = Header::load(arena, b);
        let Some(next) = header.next else {
            return b;
        };
        let absorbed = Header::load(arena, next);
        if !absorbed.is_free() {
            return b;
        }

        header.size += HEADER_SIZE + absorbed.size;
        header.next = absorbed.next;
        header.store(arena, b);
        if let Some(after) = absorbed.next {
            block::set_prev(arena, after, Some(b));
        }
        tracing::trace!(block = b.offset(), absorbed = next.offset(), size = header.size, "fused blocks");
        b
    }

    /// Unlink the tail block `b` and retract the break cursor to its header.
    pub(crate) fn detach_tail<B: AsRef<[u8]> + AsMut<[u8]>>(&mut self, arena: &mut Arena<B>, b: BlockRef) {
        let header = Header::load(arena, b);
        debug_assert!(header.next.is_none(), "detach_tail on non-tail block");
        match header.prev {
            Some(prev) => block::set_next(arena, prev, None),
            None => self.head = None,
        }
        arena.retract(b.offset());
        tracing::trace!(block = b.offset(), brk = arena.brk(), "retracted break");
    }

    /// Walk the chain and check every structural invariant.
    pub(crate) fn verify<B: AsRef<[u8]>>(&self, arena: &Arena<B>) -> Result<(), IntegrityError> {
        let mut expected = 0u32;
        let mut prev: Option<BlockRef> = None;
        let mut prev_free = false;
        let mut cursor = self.head;

        // `expected` climbs by at least HEADER_SIZE per block and is capped
        // by the break, so a looping chain fails the gap check.
        while let Some(b) = cursor {
            if b.offset() != expected {
                return Err(IntegrityError::Gap {
                    expected,
                    found: b.offset(),
                });
            }
            if b.offset().saturating_add(HEADER_SIZE) > arena.brk() {
                return Err(IntegrityError::BreakMismatch {
                    chain_end: b.payload(),
                    brk: arena.brk(),
                });
            }
            let header = Header::load(arena, b);
            if header.prev != prev {
                return Err(IntegrityError::BrokenBackLink {
                    block: b.offset(),
                    expected: prev.map(BlockRef::offset),
                    found: header.prev.map(BlockRef::offset),
                });
            }
            if let Some(marker) = header.occupant {
                if marker != b.payload() {
                    return Err(IntegrityError::ForeignOccupant {
                        block: b.offset(),
                        marker,
                    });
                }
            }
            if header.is_free() {
                if let (true, Some(p)) = (prev_free, prev) {
                    return Err(IntegrityError::AdjacentFree {
                        first: p.offset(),
                        second: b.offset(),
                    });
                }
                if header.next.is_none() {
                    return Err(IntegrityError::TrailingFree { block: b.offset() });
                }
            }

            expected = match b.payload().checked_add(header.size) {
                Some(end) if end <= arena.brk() => end,
                _ => {
                    return Err(IntegrityError::BreakMismatch {
                        chain_end: b.payload().saturating_add(header.size),
                        brk: arena.brk(),
                    })
                }
            };
            prev_free = header.is_free();
            prev = Some(b);
            cursor = header.next;
        }

        if expected != arena.brk() {
            return Err(IntegrityError::BreakMismatch {
                chain_end: expected,
                brk: arena.brk(),
            });
        }
        Ok(())
    }
}

/// Upper bound on how many blocks the arena can hold.
fn max_blocks<B: AsRef<[u8]>>(arena: &Arena<B>) -> usize {
    (arena.capacity() / HEADER_SIZE) as usize + 1
}

/// Snapshot of one block, as reported by [`Heap::blocks`](crate::Heap::blocks).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Header offset.
    pub offset: u32,
    /// Payload offset.
    pub payload: Ptr,
    /// Payload size in bytes.
    pub size: u32,
    /// Whether the block is allocated.
    pub allocated: bool,
}

impl BlockInfo {
    /// Header plus payload, in bytes.
    pub fn footprint(&self) -> u32 {
        HEADER_SIZE + self.size
    }
}

/// Address-ordered iterator over the block chain.
///
/// Stops early rather than looping if the chain has been corrupted into a
/// cycle; use [`Heap::check_integrity`](crate::Heap::check_integrity) to
/// tell the difference.
pub struct Blocks<'a, B> {
    arena: &'a Arena<B>,
    cursor: Option<BlockRef>,
    budget: usize,
}

impl<'a, B: AsRef<[u8]>> Blocks<'a, B> {
    pub(crate) fn new(arena: &'a Arena<B>, chain: &BlockChain) -> Self {
        Self {
            arena,
            cursor: chain.head(),
            budget: max_blocks(arena),
        }
    }
}

impl<B: AsRef<[u8]>> Iterator for Blocks<'_, B> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let b = self.cursor?;
        if self.budget == 0 || b.offset().saturating_add(HEADER_SIZE) > self.arena.brk() {
            self.cursor = None;
            return None;
        }
        self.budget -= 1;
        let header = Header::load(self.arena, b);
        self.cursor = header.next;
        Some(BlockInfo {
            offset: b.offset(),
            payload: Ptr(b.payload()),
            size: header.size,
            allocated: !header.is_free(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup(capacity: usize) -> (Arena<Vec<u8>>, BlockChain) {
        (Arena::new(vec![0u8; capacity]), BlockChain::new())
    }

    fn free(arena: &mut Arena<Vec<u8>>, b: BlockRef) {
        block::set_occupant(arena, b, None);
    }

    #[test]
    fn extend_links_blocks_in_address_order() {
        let (mut arena, mut chain) = setup(256);
        let a = chain.extend(&mut arena, None, 8).unwrap();
        let b = chain.extend(&mut arena, Some(a), 12).unwrap();
        assert_eq!(a.offset(), 0);
        assert_eq!(b.offset(), HEADER_SIZE + 8);
        assert_eq!(arena.brk(), b.payload() + 12);
        assert_eq!(chain.head(), Some(a));
        assert_eq!(Header::load(&arena, a).next, Some(b));
        assert_eq!(Header::load(&arena, b).prev, Some(a));
        assert_eq!(Header::load(&arena, b).occupant, Some(b.payload()));
        assert!(chain.verify(&arena).is_ok());
    }

    #[test]
    fn extend_failure_commits_nothing() {
        let (mut arena, mut chain) = setup(64);
        let a = chain.extend(&mut arena, None, 32).unwrap();
        let brk = arena.brk();
        assert!(chain.extend(&mut arena, Some(a), 32).is_none());
        assert_eq!(arena.brk(), brk);
        assert_eq!(Header::load(&arena, a).next, None);
    }

    #[test]
    fn find_fit_skips_allocated_and_narrow_blocks() {
        let (mut arena, mut chain) = setup(256);
        let a = chain.extend(&mut arena, None, 8).unwrap();
        let b = chain.extend(&mut arena, Some(a), 4).unwrap();
        let c = chain.extend(&mut arena, Some(b), 32).unwrap();
        let d = chain.extend(&mut arena, Some(c), 4).unwrap();
        free(&mut arena, b);
        free(&mut arena, c);

        assert_eq!(chain.find_fit(&arena, 4), Fit::Found(b));
        assert_eq!(chain.find_fit(&arena, 16), Fit::Found(c));
        assert_eq!(chain.find_fit(&arena, 64), Fit::Miss { last: Some(d) });
    }

    #[test]
    fn find_fit_on_empty_chain_has_no_last() {
        let (arena, chain) = setup(64);
        assert_eq!(chain.find_fit(&arena, 4), Fit::Miss { last: None });
    }

    #[test]
    fn split_carves_free_remainder() {
        let (mut arena, mut chain) = setup(256);
        let a = chain.extend(&mut arena, None, 64).unwrap();
        let tail = chain.extend(&mut arena, Some(a), 4).unwrap();
        free(&mut arena, a);

        let rest = BlockChain::split(&mut arena, a, 16).unwrap();
        assert_eq!(rest.offset(), a.payload() + 16);
        let donor = Header::load(&arena, a);
        let remainder = Header::load(&arena, rest);
        assert_eq!(donor.size, 16);
        assert_eq!(donor.next, Some(rest));
        assert_eq!(remainder.size, 64 - 16 - HEADER_SIZE);
        assert!(remainder.is_free());
        assert_eq!(remainder.next, Some(tail));
        assert_eq!(Header::load(&arena, tail).prev, Some(rest));
    }

    #[test]
    fn split_refuses_to_leave_a_sliver() {
        let (mut arena, mut chain) = setup(256);
        let a = chain.extend(&mut arena, None, 36).unwrap();
        // Slack of 16 cannot hold a header plus MIN_PAYLOAD.
        assert!(BlockChain::split(&mut arena, a, 20).is_none());
        assert_eq!(Header::load(&arena, a).size, 36);
        // Slack of exactly HEADER_SIZE + MIN_PAYLOAD is enough.
        assert!(BlockChain::split(&mut arena, a, 16).is_some());
        assert_eq!(Header::load(&arena, a).size, 16);
    }

    #[test]
    fn fuse_absorbs_free_successor_only() {
        let (mut arena, mut chain) = setup(256);
        let a = chain.extend(&mut arena, None, 8).unwrap();
        let b = chain.extend(&mut arena, Some(a), 8).unwrap();
        let c = chain.extend(&mut arena, Some(b), 8).unwrap();

        BlockChain::fuse(&mut arena, a);
        assert_eq!(Header::load(&arena, a).size, 8);

        free(&mut arena, b);
        BlockChain::fuse(&mut arena, a);
        let merged = Header::load(&arena, a);
        assert_eq!(merged.size, 8 + HEADER_SIZE + 8);
        assert_eq!(merged.next, Some(c));
        assert_eq!(Header::load(&arena, c).prev, Some(a));
    }

    #[test]
    fn detach_tail_retracts_to_header() {
        let (mut arena, mut chain) = setup(256);
        let a = chain.extend(&mut arena, None, 8).unwrap();
        let b = chain.extend(&mut arena, Some(a), 8).unwrap();
        free(&mut arena, b);
        chain.detach_tail(&mut arena, b);
        assert_eq!(arena.brk(), b.offset());
        assert_eq!(Header::load(&arena, a).next, None);

        free(&mut arena, a);
        chain.detach_tail(&mut arena, a);
        assert!(chain.is_empty());
        assert_eq!(arena.brk(), 0);
    }

    #[test]
    fn verify_reports_adjacent_free_blocks() {
        let (mut arena, mut chain) = setup(256);
        let a = chain.extend(&mut arena, None, 8).unwrap();
        let b = chain.extend(&mut arena, Some(a), 8).unwrap();
        chain.extend(&mut arena, Some(b), 8).unwrap();
        free(&mut arena, a);
        free(&mut arena, b);
        assert_eq!(
            chain.verify(&arena),
            Err(IntegrityError::AdjacentFree {
                first: a.offset(),
                second: b.offset()
            })
        );
    }

    #[test]
    fn verify_reports_trailing_free_block() {
        let (mut arena, mut chain) = setup(256);
        let a = chain.extend(&mut arena, None, 8).unwrap();
        free(&mut arena, a);
        assert_eq!(
            chain.verify(&arena),
            Err(IntegrityError::TrailingFree { block: 0 })
        );
    }

    #[test]
    fn verify_reports_foreign_occupant() {
        let (mut arena, mut chain) = setup(256);
        let a = chain.extend(&mut arena, None, 8).unwrap();
        block::set_occupant(&mut arena, a, Some(4));
        assert_eq!(
            chain.verify(&arena),
            Err(IntegrityError::ForeignOccupant { block: 0, marker: 4 })
        );
    }

    #[test]
    fn verify_reports_self_link_as_gap() {
        let (mut arena, mut chain) = setup(64);
        let a = chain.extend(&mut arena, None, 0).unwrap();
        block::set_next(&mut arena, a, Some(a));
        assert_eq!(
            chain.verify(&arena),
            Err(IntegrityError::Gap {
                expected: HEADER_SIZE,
                found: 0
            })
        );
    }

    #[test]
    fn verify_reports_self_back_link() {
        let (mut arena, mut chain) = setup(64);
        let a = chain.extend(&mut arena, None, 0).unwrap();
        block::set_prev(&mut arena, a, Some(a));
        assert_eq!(
            chain.verify(&arena),
            Err(IntegrityError::BrokenBackLink {
                block: 0,
                expected: None,
                found: Some(0)
            })
        );
    }

    #[test]
    fn verify_reports_chain_ending_short_of_break() {
        let (mut arena, mut chain) = setup(256);
        let a = chain.extend(&mut arena, None, 8).unwrap();
        let mut header = Header::load(&arena, a);
        header.size = 4;
        header.store(&mut arena, a);
        assert_eq!(
            chain.verify(&arena),
            Err(IntegrityError::BreakMismatch {
                chain_end: 20,
                brk: 24
            })
        );
    }

    #[test]
    fn verify_reports_payload_past_break() {
        let (mut arena, mut chain) = setup(256);
        let a = chain.extend(&mut arena, None, 8).unwrap();
        let mut header = Header::load(&arena, a);
        header.size = 64;
        header.store(&mut arena, a);
        assert_eq!(
            chain.verify(&arena),
            Err(IntegrityError::BreakMismatch {
                chain_end: 80,
                brk: 24
            })
        );
    }

    #[test]
    fn blocks_iterator_stops_on_self_link() {
        let (mut arena, mut chain) = setup(64);
        let a = chain.extend(&mut arena, None, 0).unwrap();
        block::set_next(&mut arena, a, Some(a));
        assert_eq!(Blocks::new(&arena, &chain).count(), max_blocks(&arena));
    }

    #[test]
    fn blocks_iterator_reports_layout() {
        let (mut arena, mut chain) = setup(256);
        let a = chain.extend(&mut arena, None, 8).unwrap();
        let b = chain.extend(&mut arena, Some(a), 24).unwrap();
        chain.extend(&mut arena, Some(b), 4).unwrap();
        free(&mut arena, b);

        let infos: Vec<_> = Blocks::new(&arena, &chain).collect();
        assert_eq!(infos.len(), 3);
        assert_eq!(infos[1].offset, b.offset());
        assert_eq!(infos[1].size, 24);
        assert!(!infos[1].allocated);
        assert_eq!(infos[1].footprint(), HEADER_SIZE + 24);
        assert!(infos[0].allocated && infos[2].allocated);
    }
}
