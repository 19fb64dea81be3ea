//! Canonical Huffman decode tables (RFC 1951 §3.2.2).
//!
//! The table is a flat array of `2^max_bits` entries indexed by the next
//! `max_bits` stream bits. Since DEFLATE packs codes MSB-first into an
//! LSB-first stream, each code is bit-reversed and replicated at every index
//! whose low `length` bits equal it (stride `2^length`). Decoding reads
//! `max_bits` speculatively, resolves the symbol in one lookup and hands the
//! surplus bits back to the reader. This trades `O(2^max_bits)` memory for
//! `O(1)` decode.

use crate::{bit_reader::BitReader, CodecError, Result};

/// Longest code length DEFLATE allows.
pub const MAX_CODE_LENGTH: usize = 15;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Entry {
    symbol: u16,
    /// 0 marks a bit pattern with no code.
    length: u8,
}

/// Decode table for one canonical Huffman code.
#[derive(Clone, Debug)]
pub struct HuffmanTable {
    max_bits: u32,
    entries: Vec<Entry>,
}

impl HuffmanTable {
    /// Builds a table from per-symbol code lengths (0 = symbol unused).
    ///
    /// Incomplete code sets are accepted; over-subscribed ones are rejected.
    pub fn from_code_lengths(lengths: &[u8]) -> Result<Self> {
        let mut bl_count = [0u32; MAX_CODE_LENGTH + 1];
        for &len in lengths {
            if len as usize > MAX_CODE_LENGTH {
                return Err(CodecError::format(format!("code length {len} exceeds 15")));
            }
            bl_count[len as usize] += 1;
        }
        bl_count[0] = 0;

        let mut left = 1i64;
        for &count in &bl_count[1..] {
            left = (left << 1) - count as i64;
            if left < 0 {
                return Err(CodecError::HuffmanDecode);
            }
        }

        let max_bits = (1..=MAX_CODE_LENGTH)
            .rev()
            .find(|&len| bl_count[len] > 0)
            .unwrap_or(0) as u32;

        let mut next_code = [0u32; MAX_CODE_LENGTH + 1];
        let mut code = 0u32;
        for bits in 1..=MAX_CODE_LENGTH {
            code = (code + bl_count[bits - 1]) << 1;
            next_code[bits] = code;
        }

        let size = 1usize << max_bits;
        let mut entries = vec![Entry::default(); size];
        for (symbol, &len) in lengths.iter().enumerate() {
            if len == 0 {
                continue;
            }
            let code = next_code[len as usize];
            next_code[len as usize] += 1;

            let reversed = code.reverse_bits() >> (32 - len as u32);
            let entry = Entry {
                symbol: symbol as u16,
                length: len,
            };
            for slot in entries
                .iter_mut()
                .skip(reversed as usize)
                .step_by(1 << len)
            {
                *slot = entry;
            }
        }

        Ok(Self { max_bits, entries })
    }

    /// Length of the longest code, which is also log2 of the table size.
    pub fn max_bits(&self) -> u32 {
        self.max_bits
    }

    /// Decodes one symbol from `br`.
    pub fn decode(&self, br: &mut BitReader<'_>) -> Result<u16> {
        if self.max_bits == 0 {
            return Err(CodecError::HuffmanDecode);
        }
        let available = (br.bits_remaining() as u32).min(self.max_bits);
        if available == 0 {
            return Err(CodecError::TruncatedStream);
        }

        let bits = br.read(available)?;
        let entry = self.entries[bits as usize];
        let length = entry.length as u32;

        if length == 0 || length > available {
            br.unread(available);
            return Err(if available < self.max_bits {
                CodecError::TruncatedStream
            } else {
                CodecError::HuffmanDecode
            });
        }

        br.unread(available - length);
        Ok(entry.symbol)
    }
}
