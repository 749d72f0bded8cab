//! DMA chunk planning
//!
//! Bulk transfers are split into packets of at most [`MAX_PACKET_SIZE`]
//! bytes. Every written packet is prefixed with a tag byte whose low two
//! bits tell the chip where the packet sits in the transfer.

use crate::error::{Error, Result};

use super::DATA_MARKER_NIBBLE;

/// Maximum data packet size (8 KiB)
pub const MAX_PACKET_SIZE: usize = 8 * 1024;

/// Position of a segment inside its transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPosition {
    /// The transfer fits in one segment
    Only,
    /// First of several segments
    First,
    /// Neither first nor last
    Middle,
    /// Last of several segments
    Last,
}

impl ChunkPosition {
    /// Order bits carried in the data block tag
    ///
    /// The chip only distinguishes "first", "middle" and "final"; a lone
    /// segment is tagged as final.
    pub const fn order_bits(self) -> u8 {
        match self {
            ChunkPosition::First => 0x1,
            ChunkPosition::Middle => 0x2,
            ChunkPosition::Last | ChunkPosition::Only => 0x3,
        }
    }

    /// Tag byte written before a data block
    pub const fn tag_byte(self) -> u8 {
        DATA_MARKER_NIBBLE | self.order_bits()
    }
}

/// One segment of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Offset into the transfer
    pub offset: usize,
    /// Segment length (never above the plan's packet size)
    pub len: usize,
    /// Position tag
    pub position: ChunkPosition,
}

impl Chunk {
    /// Byte range of the segment inside the transfer buffer
    pub fn range(&self) -> core::ops::Range<usize> {
        self.offset..self.offset + self.len
    }
}

/// Ordered segments of one transfer
///
/// The plan is lazy: segments are produced by iterating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkPlan {
    total: usize,
    max_packet: usize,
    offset: usize,
}

impl ChunkPlan {
    /// Total length covered by the plan
    pub fn total(&self) -> usize {
        self.total
    }

    /// Number of segments
    pub fn segment_count(&self) -> usize {
        self.total.div_ceil(self.max_packet)
    }
}

impl Iterator for ChunkPlan {
    type Item = Chunk;

    fn next(&mut self) -> Option<Chunk> {
        if self.offset >= self.total {
            return None;
        }
        let remaining = self.total - self.offset;
        let len = remaining.min(self.max_packet);
        let first = self.offset == 0;
        let last = remaining <= self.max_packet;
        let position = match (first, last) {
            (true, true) => ChunkPosition::Only,
            (true, false) => ChunkPosition::First,
            (false, false) => ChunkPosition::Middle,
            (false, true) => ChunkPosition::Last,
        };
        let chunk = Chunk {
            offset: self.offset,
            len,
            position,
        };
        self.offset += len;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total - self.offset.min(self.total)).div_ceil(self.max_packet);
        (left, Some(left))
    }
}

impl ExactSizeIterator for ChunkPlan {}

/// Split `total` bytes into segments of at most `max_packet` bytes
pub fn plan(total: usize, max_packet: usize) -> Result<ChunkPlan> {
    if max_packet == 0 {
        return Err(Error::InvalidArgument);
    }
    Ok(ChunkPlan {
        total,
        max_packet,
        offset: 0,
    })
}
