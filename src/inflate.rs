//! Raw DEFLATE decoder (RFC 1951): stored, fixed-Huffman and dynamic-Huffman blocks.

use std::sync::OnceLock;

use crate::{
    bit_reader::BitReader, huffman::HuffmanTable, tracing_wrappers::*, CodecError, Result,
};

/// Length base values for symbols 257..=285.
const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115,
    131, 163, 195, 227, 258,
];

/// Extra bits for symbols 257..=285.
const LENGTH_EXTRA: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Distance base values for distance symbols 0..=29.
const DIST_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// Extra bits for distance symbols 0..=29.
const DIST_EXTRA: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Transmission order of the code-length alphabet.
const CL_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

const END_OF_BLOCK: usize = 256;
const MAX_LIT_CODES: usize = 286;
const MAX_DIST_CODES: usize = 30;

/// Upper bound on output bytes per input byte: two 1-bit codes for a 258-byte match.
const MAX_EXPANSION: usize = 1032;

struct FixedTables {
    literal: HuffmanTable,
    distance: HuffmanTable,
}

static FIXED_TABLES: OnceLock<FixedTables> = OnceLock::new();

fn fixed_tables() -> Result<&'static FixedTables> {
    if let Some(tables) = FIXED_TABLES.get() {
        return Ok(tables);
    }

    let mut lengths = [0u8; 288];
    lengths[..144].fill(8);
    lengths[144..256].fill(9);
    lengths[256..280].fill(7);
    lengths[280..].fill(8);

    let tables = FixedTables {
        literal: HuffmanTable::from_code_lengths(&lengths)?,
        distance: HuffmanTable::from_code_lengths(&[5u8; 32])?,
    };
    Ok(FIXED_TABLES.get_or_init(|| tables))
}

/// Decompresses a raw DEFLATE stream.
///
/// ```
/// // A single stored block holding "hi".
/// let out = png2sixel::inflate(&[0x01, 0x02, 0x00, 0xfd, 0xff, b'h', b'i'])?;
/// assert_eq!(out, b"hi");
/// # Ok::<(), png2sixel::CodecError>(())
/// ```
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut inflater = Inflater::new(data, usize::MAX, 0);
    inflater.run()?;
    Ok(inflater.out)
}

/// Like [`inflate`], but stops once `limit` bytes have been produced.
///
/// Whatever the stream holds past the limit is never decoded, so it is neither
/// validated nor allocated. Space for `limit` bytes is reserved up front, capped
/// at the most `data` could expand to.
///
/// ```
/// // Stored "abc" capped at two bytes.
/// let stored = [0x01, 0x03, 0x00, 0xfc, 0xff, b'a', b'b', b'c'];
/// assert_eq!(png2sixel::inflate_with_limit(&stored, 2)?, b"ab");
/// # Ok::<(), png2sixel::CodecError>(())
/// ```
pub fn inflate_with_limit(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    Ok(inflate_to_limit(data, limit)?.0)
}

/// Bounded inflate that also reports whether the stream ran to its final block.
///
/// The flag is `false` when output was cut off at `limit`.
pub(crate) fn inflate_to_limit(data: &[u8], limit: usize) -> Result<(Vec<u8>, bool)> {
    let capacity = limit.min(data.len().saturating_mul(MAX_EXPANSION));
    let mut inflater = Inflater::new(data, limit, capacity);
    inflater.run()?;
    Ok((inflater.out, !inflater.capped))
}

struct Inflater<'a> {
    br: BitReader<'a>,
    out: Vec<u8>,
    limit: usize,
    capped: bool,
}

impl<'a> Inflater<'a> {
    fn new(data: &'a [u8], limit: usize, capacity: usize) -> Self {
        Inflater {
            br: BitReader::new(data),
            out: Vec::with_capacity(capacity),
            limit,
            capped: false,
        }
    }

    fn room(&self) -> usize {
        self.limit - self.out.len()
    }

    fn run(&mut self) -> Result<()> {
        loop {
            let is_final = self.br.read(1)? == 1;
            let block_type = self.br.read(2)?;
            trace!(is_final, block_type, out_len = self.out.len(), "inflate block");

            match block_type {
                0 => self.stored_block()?,
                1 => {
                    let tables = fixed_tables()?;
                    self.huffman_block(&tables.literal, &tables.distance)?;
                }
                2 => {
                    let (literal, distance) = self.dynamic_tables()?;
                    self.huffman_block(&literal, &distance)?;
                }
                _ => return Err(CodecError::format("invalid DEFLATE block type 3")),
            }

            if self.capped {
                trace!(limit = self.limit, "inflate output limit reached");
                return Ok(());
            }
            if is_final {
                return Ok(());
            }
        }
    }

    fn stored_block(&mut self) -> Result<()> {
        let header = self.br.read_bytes(4)?;
        let len = u16::from_le_bytes([header[0], header[1]]);
        let nlen = u16::from_le_bytes([header[2], header[3]]);
        if len != !nlen {
            return Err(CodecError::format(format!(
                "stored block length {len:#06x} does not match complement {nlen:#06x}"
            )));
        }
        let mut len = len as usize;
        if len > self.room() {
            len = self.room();
            self.capped = true;
        }
        let bytes = self.br.read_bytes(len)?;
        self.out.extend_from_slice(bytes);
        Ok(())
    }

    fn dynamic_tables(&mut self) -> Result<(HuffmanTable, HuffmanTable)> {
        let hlit = self.br.read(5)? as usize + 257;
        let hdist = self.br.read(5)? as usize + 1;
        let hclen = self.br.read(4)? as usize + 4;
        if hlit > MAX_LIT_CODES {
            return Err(CodecError::format(format!("HLIT of {hlit} exceeds 286")));
        }
        if hdist > MAX_DIST_CODES {
            return Err(CodecError::format(format!("HDIST of {hdist} exceeds 30")));
        }

        let mut cl_lengths = [0u8; 19];
        for &symbol in CL_ORDER.iter().take(hclen) {
            cl_lengths[symbol] = self.br.read(3)? as u8;
        }
        let cl_table = HuffmanTable::from_code_lengths(&cl_lengths)?;

        let total = hlit + hdist;
        let mut lengths = vec![0u8; total];
        let mut i = 0;
        while i < total {
            let (value, repeat) = match cl_table.decode(&mut self.br)? {
                sym @ 0..=15 => (sym as u8, 1),
                16 => {
                    if i == 0 {
                        return Err(CodecError::format("repeat code with no previous length"));
                    }
                    (lengths[i - 1], 3 + self.br.read(2)? as usize)
                }
                17 => (0, 3 + self.br.read(3)? as usize),
                18 => (0, 11 + self.br.read(7)? as usize),
                sym => {
                    return Err(CodecError::format(format!("invalid code length symbol {sym}")))
                }
            };
            if i + repeat > total {
                return Err(CodecError::format("code length run overflows table"));
            }
            lengths[i..i + repeat].fill(value);
            i += repeat;
        }

        if lengths[END_OF_BLOCK] == 0 {
            return Err(CodecError::format("end-of-block symbol has no code"));
        }

        let literal = HuffmanTable::from_code_lengths(&lengths[..hlit])?;
        let distance = HuffmanTable::from_code_lengths(&lengths[hlit..])?;
        trace!(hlit, hdist, hclen, "dynamic huffman tables");
        Ok((literal, distance))
    }

    fn huffman_block(&mut self, literal: &HuffmanTable, distance: &HuffmanTable) -> Result<()> {
        loop {
            let symbol = literal.decode(&mut self.br)? as usize;
            match symbol {
                0..=255 => {
                    if self.room() == 0 {
                        self.capped = true;
                        return Ok(());
                    }
                    self.out.push(symbol as u8);
                }
                END_OF_BLOCK => return Ok(()),
                257..=285 => {
                    let idx = symbol - 257;
                    let length = LENGTH_BASE[idx] as usize
                        + self.br.read(LENGTH_EXTRA[idx] as u32)? as usize;

                    let dist_symbol = distance.decode(&mut self.br)? as usize;
                    if dist_symbol >= MAX_DIST_CODES {
                        return Err(CodecError::format(format!(
                            "invalid distance symbol {dist_symbol}"
                        )));
                    }
                    let dist = DIST_BASE[dist_symbol] as usize
                        + self.br.read(DIST_EXTRA[dist_symbol] as u32)? as usize;

                    let room = self.room();
                    copy_match(&mut self.out, dist, length.min(room))?;
                    if length > room {
                        self.capped = true;
                        return Ok(());
                    }
                }
                _ => {
                    return Err(CodecError::format(format!(
                        "invalid literal/length symbol {symbol}"
                    )))
                }
            }
        }
    }
}

/// Appends `length` bytes starting `distance` bytes before the end of `out`.
///
/// Overlapping matches (`distance < length`) repeat the tail pattern, so they
/// are copied one byte at a time.
fn copy_match(out: &mut Vec<u8>, distance: usize, length: usize) -> Result<()> {
    if distance == 0 || distance > out.len() {
        return Err(CodecError::format(format!(
            "back-reference distance {distance} exceeds {} bytes of output",
            out.len()
        )));
    }
    let start = out.len() - distance;
    if distance >= length {
        out.extend_from_within(start..start + length);
    } else {
        out.reserve(length);
        for i in 0..length {
            let byte = out[start + i];
            out.push(byte);
        }
    }
    Ok(())
}
