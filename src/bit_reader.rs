//! LSB-first bit reader over a borrowed byte buffer, as used by DEFLATE.

use std::fmt::Debug;

use crate::{CodecError, Result};

/// Reads bits from a sequence of bytes, least significant bit of each byte first.
#[derive(Clone)]
pub struct BitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl Debug for BitReader<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "BitReader{{ data: [{} bytes], bit_pos: {} }}",
            self.data.len(),
            self.bit_pos
        )
    }
}

/// Widest value a single [`BitReader::read`] can return.
pub const MAX_BITS_PER_CALL: u32 = 32;

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    /// Reads `num` bits (0..=32), the first bit read landing in bit 0 of the result.
    /// ```
    /// # use png2sixel::bit_reader::BitReader;
    /// let mut br = BitReader::new(&[0b1010_0110, 0xff]);
    /// assert_eq!(br.read(3)?, 0b110);
    /// assert_eq!(br.read(5)?, 0b10100);
    /// assert_eq!(br.read(8)?, 0xff);
    /// assert!(br.read(1).is_err());
    /// # Ok::<(), png2sixel::CodecError>(())
    /// ```
    pub fn read(&mut self, num: u32) -> Result<u32> {
        debug_assert!(num <= MAX_BITS_PER_CALL);
        if num == 0 {
            return Ok(0);
        }
        if self.bits_remaining() < num as usize {
            return Err(CodecError::TruncatedStream);
        }

        let mut value = 0u64;
        let mut got = 0u32;
        while got < num {
            let byte = self.data[self.bit_pos >> 3] as u64;
            let offset = (self.bit_pos & 7) as u32;
            let take = (8 - offset).min(num - got);
            let bits = (byte >> offset) & ((1u64 << take) - 1);
            value |= bits << got;
            got += take;
            self.bit_pos += take as usize;
        }
        Ok(value as u32)
    }

    /// Returns the last `num` bits to the stream.
    pub fn unread(&mut self, num: u32) {
        debug_assert!(num as usize <= self.bit_pos);
        self.bit_pos = self.bit_pos.saturating_sub(num as usize);
    }

    /// Discards the remaining bits of the current byte.
    pub fn align(&mut self) {
        self.bit_pos = self.bit_pos.div_ceil(8) * 8;
    }

    /// Aligns to a byte boundary and returns the next `len` whole bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        self.align();
        let start = self.bit_pos >> 3;
        let end = start.checked_add(len).ok_or(CodecError::TruncatedStream)?;
        if end > self.data.len() {
            return Err(CodecError::TruncatedStream);
        }
        self.bit_pos = end * 8;
        Ok(&self.data[start..end])
    }

    pub fn bits_remaining(&self) -> usize {
        self.data.len() * 8 - self.bit_pos
    }

    pub fn total_bits_read(&self) -> usize {
        self.bit_pos
    }

    /// Number of bytes touched so far, counting a partially read byte as consumed.
    pub fn bytes_consumed(&self) -> usize {
        self.bit_pos.div_ceil(8)
    }
}
