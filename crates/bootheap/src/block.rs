//! Inline block headers.
//!
//! Every block starts with a [`HEADER_SIZE`]-byte header stored in the arena
//! itself, followed by its payload:
//!
//! ```text
//! offset  field     contents
//! 0       size      payload bytes, header excluded
//! 4       next      header offset of the physical successor, or NIL
//! 8       prev      header offset of the physical predecessor, or NIL
//! 12      occupant  NIL when free, the block's own payload offset when allocated
//! ```
//!
//! Links are arena offsets rather than pointers, so the chain survives being
//! moved along with its buffer and never aliases client memory.

use crate::arena::Arena;

/// Size of a block header in bytes.
pub const HEADER_SIZE: u32 = 16;

/// Smallest payload worth splitting off into its own free block.
pub const MIN_PAYLOAD: u32 = 4;

/// Encoded "no block" / "free" marker.
const NIL: u32 = u32::MAX;

const SIZE_FIELD: u32 = 0;
const NEXT_FIELD: u32 = 4;
const PREV_FIELD: u32 = 8;
const OCCUPANT_FIELD: u32 = 12;

/// Header offset of a block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockRef(u32);

impl BlockRef {
    pub(crate) fn at(offset: u32) -> Self {
        Self(offset)
    }

    /// The header whose payload starts at `payload`. Caller guarantees
    /// `payload >= HEADER_SIZE`.
    pub(crate) fn from_payload(payload: u32) -> Self {
        Self(payload - HEADER_SIZE)
    }

    pub(crate) fn offset(self) -> u32 {
        self.0
    }

    pub(crate) fn payload(self) -> u32 {
        self.0 + HEADER_SIZE
    }
}

/// Decoded copy of a block header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) size: u32,
    pub(crate) next: Option<BlockRef>,
    pub(crate) prev: Option<BlockRef>,
    /// `Some(payload)` when allocated.
    pub(crate) occupant: Option<u32>,
}

impl Header {
    pub(crate) fn load<B: AsRef<[u8]>>(arena: &Arena<B>, block: BlockRef) -> Self {
        let base = block.offset();
        Self {
            size: arena.read_u32(base + SIZE_FIELD),
            next: decode_link(arena.read_u32(base + NEXT_FIELD)),
            prev: decode_link(arena.read_u32(base + PREV_FIELD)),
            occupant: decode(arena.read_u32(base + OCCUPANT_FIELD)),
        }
    }

    pub(crate) fn store<B: AsRef<[u8]> + AsMut<[u8]>>(&self, arena: &mut Arena<B>, block: BlockRef) {
        let base = block.offset();
        arena.write_u32(base + SIZE_FIELD, self.size);
        arena.write_u32(base + NEXT_FIELD, encode(self.next.map(BlockRef::offset)));
        arena.write_u32(base + PREV_FIELD, encode(self.prev.map(BlockRef::offset)));
        arena.write_u32(base + OCCUPANT_FIELD, encode(self.occupant));
    }

    pub(crate) fn is_free(&self) -> bool {
        self.occupant.is_none()
    }
}

/// Raw occupancy word of `block`, without decoding the rest of the header.
pub(crate) fn raw_occupant<B: AsRef<[u8]>>(arena: &Arena<B>, block: BlockRef) -> u32 {
    arena.read_u32(block.offset() + OCCUPANT_FIELD)
}

pub(crate) fn set_next<B: AsRef<[u8]> + AsMut<[u8]>>(
    arena: &mut Arena<B>,
    block: BlockRef,
    next: Option<BlockRef>,
) {
    arena.write_u32(block.offset() + NEXT_FIELD, encode(next.map(BlockRef::offset)));
}

pub(crate) fn set_prev<B: AsRef<[u8]> + AsMut<[u8]>>(
    arena: &mut Arena<B>,
    block: BlockRef,
    prev: Option<BlockRef>,
) {
    arena.write_u32(block.offset() + PREV_FIELD, encode(prev.map(BlockRef::offset)));
}

pub(crate) fn set_occupant<B: AsRef<[u8]> + AsMut<[u8]>>(
    arena: &mut Arena<B>,
    block: BlockRef,
    occupant: Option<u32>,
) {
    arena.write_u32(block.offset() + OCCUPANT_FIELD, encode(occupant));
}

fn encode(value: Option<u32>) -> u32 {
    value.unwrap_or(NIL)
}

fn decode(raw: u32) -> Option<u32> {
    (raw != NIL).then_some(raw)
}

fn decode_link(raw: u32) -> Option<BlockRef> {
    decode(raw).map(BlockRef)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_through_arena() {
        let mut arena = Arena::new(vec![0u8; 64]);
        let block = BlockRef::at(16);
        let header = Header {
            size: 12,
            next: Some(BlockRef::at(44)),
            prev: Some(BlockRef::at(0)),
            occupant: Some(block.payload()),
        };
        header.store(&mut arena, block);
        assert_eq!(Header::load(&arena, block), header);
    }

    #[test]
    fn missing_links_encode_as_nil() {
        let mut arena = Arena::new(vec![0u8; 16]);
        let block = BlockRef::at(0);
        Header {
            size: 0,
            next: None,
            prev: None,
            occupant: None,
        }
        .store(&mut arena, block);
        assert_eq!(arena.read_u32(4), u32::MAX);
        assert_eq!(raw_occupant(&arena, block), u32::MAX);
        assert!(Header::load(&arena, block).is_free());
    }

    #[test]
    fn field_setters_touch_one_word() {
        let mut arena = Arena::new(vec![0u8; 32]);
        let block = BlockRef::at(0);
        Header {
            size: 8,
            next: None,
            prev: None,
            occupant: None,
        }
        .store(&mut arena, block);

        set_occupant(&mut arena, block, Some(block.payload()));
        set_next(&mut arena, block, Some(BlockRef::at(24)));
        set_prev(&mut arena, block, None);

        let h = Header::load(&arena, block);
        assert_eq!(h.size, 8);
        assert_eq!(h.next, Some(BlockRef::at(24)));
        assert_eq!(h.prev, None);
        assert_eq!(h.occupant, Some(16));
    }

    #[test]
    fn payload_and_header_offsets_are_inverse() {
        let block = BlockRef::at(40);
        assert_eq!(block.payload(), 56);
        assert_eq!(BlockRef::from_payload(56), block);
    }
}
