//! Occupancy statistics.

use crate::block::HEADER_SIZE;
use crate::chain::BlockInfo;

/// Point-in-time summary of how the arena is used.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Arena size in bytes.
    pub capacity: u32,
    /// Bytes claimed by blocks (the break cursor).
    pub claimed: u32,
    /// Largest value the break cursor has reached.
    pub high_water: u32,
    /// Number of allocated blocks.
    pub allocated_blocks: u32,
    /// Number of free blocks inside the claimed region.
    pub free_blocks: u32,
    /// Payload bytes held by allocated blocks.
    pub allocated_bytes: u32,
    /// Payload bytes held by free blocks.
    pub free_bytes: u32,
    /// Largest free payload inside the claimed region.
    pub largest_free: u32,
}

impl HeapStats {
    pub(crate) fn collect(
        capacity: u32,
        claimed: u32,
        high_water: u32,
        blocks: impl Iterator<Item = BlockInfo>,
    ) -> Self {
        let mut stats = Self {
            capacity,
            claimed,
            high_water,
            ..Self::default()
        };
        for info in blocks {
            if info.allocated {
                stats.allocated_blocks += 1;
                stats.allocated_bytes += info.size;
            } else {
                stats.free_blocks += 1;
                stats.free_bytes += info.size;
                stats.largest_free = stats.largest_free.max(info.size);
            }
        }
        stats
    }

    /// Bytes past the break cursor that have never been claimed or have been
    /// given back.
    pub fn unclaimed(&self) -> u32 {
        self.capacity - self.claimed
    }

    /// Bytes spent on block headers.
    pub fn header_bytes(&self) -> u32 {
        (self.allocated_blocks + self.free_blocks) * HEADER_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Ptr;

    fn info(offset: u32, size: u32, allocated: bool) -> BlockInfo {
        BlockInfo {
            offset,
            payload: Ptr(offset + HEADER_SIZE),
            size,
            allocated,
        }
    }

    #[test]
    fn collect_splits_allocated_and_free() {
        let blocks = vec![info(0, 8, true), info(24, 32, false), info(72, 4, true)];
        let stats = HeapStats::collect(256, 92, 120, blocks.into_iter());
        assert_eq!(stats.allocated_blocks, 2);
        assert_eq!(stats.allocated_bytes, 12);
        assert_eq!(stats.free_blocks, 1);
        assert_eq!(stats.free_bytes, 32);
        assert_eq!(stats.largest_free, 32);
        assert_eq!(stats.unclaimed(), 164);
        assert_eq!(stats.header_bytes(), 48);
        assert_eq!(stats.high_water, 120);
    }

    #[test]
    fn empty_heap_has_no_blocks() {
        let stats = HeapStats::collect(64, 0, 0, std::iter::empty());
        assert_eq!(stats, HeapStats { capacity: 64, ..HeapStats::default() });
        assert_eq!(stats.unclaimed(), 64);
    }
}
