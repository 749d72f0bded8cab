//! Bounded byte buffers for frame construction and parsing
//!
//! [`FrameBuf`] is a fixed-capacity buffer that refuses writes past its
//! capacity; [`ByteCursor`] walks a received buffer and refuses reads past
//! its end. Both report [`Error::BufferOverrun`] instead of relying on
//! manual index arithmetic.

use crate::error::{Error, Result};
use heapless::Vec;

/// Capacity of a command or combined-exchange buffer
///
/// The longest combined exchange is a register read with checksums:
/// 5 command bytes + 12 response bytes.
pub const FRAME_CAPACITY: usize = 32;

/// Fixed-capacity frame buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameBuf {
    bytes: Vec<u8, FRAME_CAPACITY>,
}

impl FrameBuf {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    /// Append one byte
    pub fn push(&mut self, byte: u8) -> Result<()> {
        self.bytes.push(byte).map_err(|_| Error::BufferOverrun)
    }

    /// Append a slice
    pub fn extend_from_slice(&mut self, data: &[u8]) -> Result<()> {
        self.bytes
            .extend_from_slice(data)
            .map_err(|_| Error::BufferOverrun)
    }

    /// Pad with `count` copies of `byte`
    pub fn pad(&mut self, byte: u8, count: usize) -> Result<()> {
        if self.bytes.len() + count > FRAME_CAPACITY {
            return Err(Error::BufferOverrun);
        }
        for _ in 0..count {
            self.push(byte)?;
        }
        Ok(())
    }

    /// Number of bytes written
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Returns true if nothing was written
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Written bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl core::ops::Deref for FrameBuf {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

/// Bounds-checked reader over a received buffer
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Start reading at the beginning of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Next byte, or `None` at the end of the buffer
    pub fn next_byte(&mut self) -> Option<u8> {
        let byte = *self.data.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    /// Next byte, or [`Error::BufferOverrun`] at the end of the buffer
    pub fn byte(&mut self) -> Result<u8> {
        self.next_byte().ok_or(Error::BufferOverrun)
    }

    /// Skip `count` bytes
    pub fn skip(&mut self, count: usize) -> Result<()> {
        self.take(count).map(|_| ())
    }

    /// Take the next `count` bytes
    pub fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(count).ok_or(Error::BufferOverrun)?;
        let slice = self.data.get(self.pos..end).ok_or(Error::BufferOverrun)?;
        self.pos = end;
        Ok(slice)
    }

    /// Take exactly `N` bytes as an array
    pub fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Everything not consumed yet
    pub fn rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos..];
        self.pos = self.data.len();
        rest
    }

    /// Number of bytes not consumed yet
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Current read position
    pub fn position(&self) -> usize {
        self.pos
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_buf_capacity() {
        let mut buf = FrameBuf::new();
        buf.pad(0, FRAME_CAPACITY).unwrap();
        assert_eq!(buf.len(), FRAME_CAPACITY);
        assert_eq!(buf.push(1), Err(Error::BufferOverrun));
        assert_eq!(buf.extend_from_slice(&[1, 2]), Err(Error::BufferOverrun));
    }

    #[test]
    fn test_pad_rejects_without_partial_write() {
        let mut buf = FrameBuf::new();
        buf.extend_from_slice(&[0xAA; 30]).unwrap();
        assert_eq!(buf.pad(0, 3), Err(Error::BufferOverrun));
        assert_eq!(buf.len(), 30);
    }

    #[test]
    fn test_cursor() {
        let data = [1u8, 2, 3, 4, 5];
        let mut cur = ByteCursor::new(&data);
        assert_eq!(cur.byte(), Ok(1));
        assert_eq!(cur.take(2), Ok(&[2u8, 3][..]));
        assert_eq!(cur.remaining(), 2);
        assert_eq!(cur.take_array::<3>(), Err(Error::BufferOverrun));
        // A failed take does not advance
        assert_eq!(cur.position(), 3);
        assert_eq!(cur.rest(), &[4, 5]);
        assert_eq!(cur.next_byte(), None);
        assert_eq!(cur.byte(), Err(Error::BufferOverrun));
    }
}
