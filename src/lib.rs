//! # png2sixel
//!
//! A 100% Rust PNG decoder and SIXEL encoder.
//!
//! ## Features
//!
//! - **Decoder**: PNG to RGBA8 with a from-scratch DEFLATE implementation
//!   (optionally backed by `miniz_oxide`)
//! - **Encoder**: RGBA8 to SIXEL with median-cut color quantization
//!
//! ## Quick Start
//!
//! ### Decoding a PNG
//!
//! ```ignore
//! use png2sixel::decode;
//!
//! let bytes = std::fs::read("snake.png")?;
//! let image = decode(&bytes)?;
//! println!("{}x{}", image.width(), image.height());
//! ```
//!
//! ### Encoding an image to SIXEL
//!
//! ```ignore
//! use png2sixel::{decode, encode_sixel, EncodeOptions};
//!
//! let image = decode(&std::fs::read("snake.png")?)?;
//! let opts = EncodeOptions {
//!     target_width: Some(320),
//!     ..Default::default()
//! };
//! let sixel = encode_sixel(&image, &opts)?;
//! print!("{}", sixel);
//! ```

use thiserror::Error;

mod tracing_wrappers;

pub mod bit_reader;
pub mod chunk;
pub mod color;
pub mod decoder;
pub mod encoder;
pub mod filter;
pub mod huffman;
pub mod image;
pub mod inflate;
pub mod quant;
pub mod zlib;

pub use decoder::{decode, decode_with, DecodeOptions};
pub use encoder::{
    encode_sixel, encode_sixel_default, sixel_encode, EncodeOptions, SixelDocument,
};
pub use filter::paeth;
pub use image::{resize, Image};
pub use inflate::{inflate, inflate_with_limit};
pub use quant::{quantize, QuantizedImage, Rgb};
pub use zlib::InflateBackend;

/// Errors that can occur during PNG decoding or SIXEL encoding.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Structurally invalid input: bad signature, bad chunk layout, bad DEFLATE block, ...
    #[error("invalid format: {0}")]
    Format(String),

    /// Valid PNG that uses something this codec does not implement
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    /// Input ended before the expected data
    #[error("truncated stream")]
    TruncatedStream,

    /// A Huffman code did not map to any symbol
    #[error("undecodable huffman code")]
    HuffmanDecode,

    /// A CRC-32 or Adler-32 check failed
    #[error("{kind} checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        kind: &'static str,
        expected: u32,
        actual: u32,
    },

    /// Invalid image dimensions (zero or too large)
    #[error("invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    /// Buffer size doesn't match expected size for dimensions
    #[error("buffer size mismatch: expected {expected} bytes, got {actual}")]
    BufferSizeMismatch { expected: usize, actual: usize },

    /// The external inflate backend rejected the stream
    #[error("inflate backend error: {0}")]
    Backend(String),
}

/// Coarse classification of a [`CodecError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Format,
    UnsupportedFeature,
    TruncatedStream,
    HuffmanDecode,
}

impl CodecError {
    /// Returns the error class. Checksum, backend and caller-misuse errors are format errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::UnsupportedFeature(_) => ErrorKind::UnsupportedFeature,
            CodecError::TruncatedStream => ErrorKind::TruncatedStream,
            CodecError::HuffmanDecode => ErrorKind::HuffmanDecode,
            CodecError::Format(_)
            | CodecError::ChecksumMismatch { .. }
            | CodecError::InvalidDimensions { .. }
            | CodecError::BufferSizeMismatch { .. }
            | CodecError::Backend(_) => ErrorKind::Format,
        }
    }

    pub(crate) fn format(msg: impl Into<String>) -> Self {
        CodecError::Format(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        CodecError::UnsupportedFeature(msg.into())
    }
}

/// Result type for codec operations.
pub type Result<T> = core::result::Result<T, CodecError>;

/// Upper bound for palette entries (and SIXEL color registers).
pub(crate) const PALETTE_MAX: usize = 256;
