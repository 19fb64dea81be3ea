//! PNG container parsing: signature, chunk records, IHDR/PLTE/tRNS/IDAT/IEND.

use crate::{color::ColorType, tracing_wrappers::*, CodecError, Result};

/// The 8-byte signature every PNG starts with.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Chunk lengths are limited to 2^31 - 1.
const MAX_CHUNK_LEN: u32 = 0x7fff_ffff;
/// length + type + crc
const CHUNK_OVERHEAD: usize = 12;

/// One `length | type | data | crc` record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub kind: [u8; 4],
    pub data: &'a [u8],
    pub crc: u32,
}

impl Chunk<'_> {
    pub fn length(&self) -> u32 {
        self.data.len() as u32
    }

    /// CRC-32 over the type tag and data, as stored in the trailer.
    pub fn computed_crc(&self) -> u32 {
        !crc32_update(crc32_update(!0, &self.kind), self.data)
    }

    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.kind).into_owned()
    }
}

/// Iterates over the chunk records following the signature.
///
/// Stops after IEND or when the input ends on a chunk boundary.
pub struct ChunkIter<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
}

/// Validates the signature and returns an iterator over the chunks.
pub fn chunks(data: &[u8]) -> Result<ChunkIter<'_>> {
    if data.len() < PNG_SIGNATURE.len() || data[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
        return Err(CodecError::format("missing PNG signature"));
    }
    Ok(ChunkIter {
        data,
        pos: PNG_SIGNATURE.len(),
        done: false,
    })
}

impl<'a> Iterator for ChunkIter<'a> {
    type Item = Result<Chunk<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos == self.data.len() {
            return None;
        }
        let rest = &self.data[self.pos..];
        if rest.len() < CHUNK_OVERHEAD {
            self.done = true;
            return Some(Err(CodecError::TruncatedStream));
        }

        let length = u32::from_be_bytes([rest[0], rest[1], rest[2], rest[3]]);
        if length > MAX_CHUNK_LEN {
            self.done = true;
            return Some(Err(CodecError::format(format!(
                "chunk length {length} exceeds 2^31-1"
            ))));
        }
        let length = length as usize;
        if rest.len() - CHUNK_OVERHEAD < length {
            self.done = true;
            return Some(Err(CodecError::TruncatedStream));
        }

        let kind = [rest[4], rest[5], rest[6], rest[7]];
        let data = &rest[8..8 + length];
        let crc_bytes = &rest[8 + length..CHUNK_OVERHEAD + length];
        let crc = u32::from_be_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

        self.pos += CHUNK_OVERHEAD + length;
        if &kind == b"IEND" {
            self.done = true;
        }
        Some(Ok(Chunk { kind, data, crc }))
    }
}

/// Decoded IHDR fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImageHeader {
    pub width: u32,
    pub height: u32,
    pub bit_depth: u8,
    pub color_type: ColorType,
    pub interlace: u8,
}

impl ImageHeader {
    /// Parses and validates an IHDR payload.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() != 13 {
            return Err(CodecError::format(format!(
                "IHDR must be 13 bytes, got {}",
                data.len()
            )));
        }
        let width = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let height = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        let bit_depth = data[8];
        let color_type = data[9];
        let compression = data[10];
        let filter = data[11];
        let interlace = data[12];

        if width == 0 || height == 0 {
            return Err(CodecError::format(format!(
                "image dimensions {width}x{height} must be non-zero"
            )));
        }
        if bit_depth != 8 {
            return Err(CodecError::unsupported(format!("bit depth {bit_depth}")));
        }
        let color_type = ColorType::from_u8(color_type)?;
        if compression != 0 {
            return Err(CodecError::format(format!("compression method {compression}")));
        }
        if filter != 0 {
            return Err(CodecError::format(format!("filter method {filter}")));
        }
        match interlace {
            0 => {}
            1 => return Err(CodecError::unsupported("interlaced images")),
            _ => return Err(CodecError::format(format!("interlace method {interlace}"))),
        }

        Ok(Self {
            width,
            height,
            bit_depth,
            color_type,
            interlace,
        })
    }
}

/// The chunks a decoder needs, gathered from one PNG stream.
#[derive(Clone, Debug)]
pub struct PngStream<'a> {
    pub header: ImageHeader,
    pub palette: Option<&'a [u8]>,
    pub transparency: Option<&'a [u8]>,
    /// Concatenated IDAT payloads: one zlib stream.
    pub idat: Vec<u8>,
}

/// Walks all chunks and collects IHDR, PLTE, tRNS and the IDAT payload.
pub fn read_chunks(data: &[u8], verify_crc: bool) -> Result<PngStream<'_>> {
    let mut header: Option<ImageHeader> = None;
    let mut palette = None;
    let mut transparency = None;
    let mut idat = Vec::new();
    let mut seen_idat = false;
    let mut crc_error = None;

    for (index, chunk) in chunks(data)?.enumerate() {
        let chunk = chunk?;

        if verify_crc && crc_error.is_none() {
            let actual = chunk.computed_crc();
            if actual != chunk.crc {
                crc_error = Some(CodecError::ChecksumMismatch {
                    kind: "chunk crc-32",
                    expected: chunk.crc,
                    actual,
                });
            }
        }

        match &chunk.kind {
            b"IHDR" => {
                if index != 0 {
                    return Err(CodecError::format("IHDR must be the first chunk"));
                }
                let parsed = ImageHeader::parse(chunk.data)?;
                debug!(?parsed, "IHDR");
                header = Some(parsed);
            }
            b"PLTE" => {
                if header.is_none() {
                    return Err(CodecError::format("PLTE before IHDR"));
                }
                if palette.is_some() {
                    return Err(CodecError::format("duplicate PLTE chunk"));
                }
                let len = chunk.data.len();
                if len == 0 || len % 3 != 0 || len / 3 > crate::PALETTE_MAX {
                    return Err(CodecError::format(format!("invalid PLTE length {len}")));
                }
                palette = Some(chunk.data);
            }
            b"tRNS" => transparency = Some(chunk.data),
            b"IDAT" => {
                if header.is_none() {
                    return Err(CodecError::format("IDAT before IHDR"));
                }
                seen_idat = true;
                idat.extend_from_slice(chunk.data);
            }
            b"IEND" => break,
            _ => {
                trace!(chunk = %chunk.name(), length = chunk.length(), "skipping chunk");
            }
        }
    }

    let header = header.ok_or_else(|| CodecError::format("missing IHDR chunk"))?;
    if header.color_type == ColorType::Indexed && palette.is_none() {
        return Err(CodecError::unsupported("indexed color without a PLTE chunk"));
    }
    if !seen_idat {
        return Err(CodecError::format("missing IDAT chunk"));
    }
    if let Some(err) = crc_error {
        return Err(err);
    }

    Ok(PngStream {
        header,
        palette,
        transparency,
        idat,
    })
}

const CRC_TABLE: [u32; 256] = make_crc_table();

const fn make_crc_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut n = 0;
    while n < 256 {
        let mut c = n as u32;
        let mut k = 0;
        while k < 8 {
            c = if c & 1 != 0 {
                0xedb8_8320 ^ (c >> 1)
            } else {
                c >> 1
            };
            k += 1;
        }
        table[n] = c;
        n += 1;
    }
    table
}

fn crc32_update(mut crc: u32, data: &[u8]) -> u32 {
    for &byte in data {
        crc = CRC_TABLE[((crc ^ byte as u32) & 0xff) as usize] ^ (crc >> 8);
    }
    crc
}

/// CRC-32 (IEEE) of `data`.
pub fn crc32(data: &[u8]) -> u32 {
    !crc32_update(!0, data)
}
