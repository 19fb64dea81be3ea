//! PNG to RGBA8 decoding.
//!
//! Pipeline: chunk walk -> zlib inflate -> scanline unfilter -> color normalization.

use crate::{
    chunk::read_chunks, color::to_rgba, filter::unfilter, image::rgba_len, tracing_wrappers::*,
    zlib, CodecError, Image, InflateBackend, Result,
};

/// Options for [`decode_with`].
#[derive(Clone, Debug)]
pub struct DecodeOptions {
    /// Verify chunk CRC-32 and zlib Adler-32 checksums.
    pub verify_checksums: bool,

    /// DEFLATE implementation used for the image data.
    pub backend: InflateBackend,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            verify_checksums: true,
            backend: InflateBackend::Auto,
        }
    }
}

/// Decodes an 8-bit, non-interlaced PNG into an RGBA8 [`Image`].
///
/// # Errors
///
/// - [`CodecError::Format`]: bad signature, missing IHDR/IDAT, invalid chunk
///   layout or invalid DEFLATE data
/// - [`CodecError::UnsupportedFeature`]: bit depth other than 8, interlacing,
///   unknown color type, indexed color without PLTE
/// - [`CodecError::TruncatedStream`]: input ends before the expected data
/// - [`CodecError::HuffmanDecode`]: an undecodable Huffman code
/// - [`CodecError::ChecksumMismatch`]: a CRC-32 or Adler-32 mismatch
///
/// # Example
///
/// ```rust,no_run
/// let bytes = std::fs::read("image.png")?;
/// let image = png2sixel::decode(&bytes)?;
/// assert_eq!(
///     image.pixels().len(),
///     image.width() as usize * image.height() as usize * 4
/// );
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[must_use = "this returns the decoded Image"]
pub fn decode(data: &[u8]) -> Result<Image> {
    decode_with(data, &DecodeOptions::default())
}

/// Decodes a PNG with explicit options.
#[must_use = "this returns the decoded Image"]
pub fn decode_with(data: &[u8], opts: &DecodeOptions) -> Result<Image> {
    let stream = read_chunks(data, opts.verify_checksums)?;
    let header = stream.header;
    let width = header.width as usize;
    let height = header.height as usize;
    let bpp = header.color_type.bytes_per_pixel();

    // Reject sizes whose RGBA buffer cannot be addressed before inflating anything.
    rgba_len(header.width, header.height)?;
    let raw_len = width
        .checked_mul(bpp)
        .and_then(|stride| stride.checked_add(1))
        .and_then(|line| line.checked_mul(height))
        .ok_or(CodecError::InvalidDimensions { width, height })?;

    // Inflating stops at `raw_len`; any further image data is never decoded.
    let inflated = zlib::decompress(&stream.idat, opts.backend, opts.verify_checksums, raw_len)?;
    if inflated.len() < raw_len {
        return Err(CodecError::TruncatedStream);
    }

    let samples = unfilter(&inflated, width, height, bpp)?;
    let rgba = to_rgba(
        header.color_type,
        &samples,
        stream.palette,
        stream.transparency,
    )?;
    debug!(width, height, color_type = ?header.color_type, "decoded PNG");

    Image::new(header.width, header.height, rgba)
}
