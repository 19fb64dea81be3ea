//! The decoded RGBA8 image and nearest-neighbour resizing.

use crate::{CodecError, Result};

/// An RGBA8 image: 4 bytes per pixel, row-major, top row first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Image {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Image {
    /// Wraps an RGBA8 buffer of exactly `width * height * 4` bytes.
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = rgba_len(width, height)?;
        if pixels.len() != expected {
            return Err(CodecError::BufferSizeMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// RGBA pixel data (4 bytes per pixel: R, G, B, A).
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    /// The RGBA value at `(x, y)`, or `None` outside the image.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let px = &self.pixels[idx..idx + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Nearest-neighbour resize. Resizing to the current size returns an identical copy.
    pub fn resized(&self, width: u32, height: u32) -> Result<Image> {
        let len = rgba_len(width, height)?;
        if width == self.width && height == self.height {
            return Ok(self.clone());
        }

        let src_w = self.width as u64;
        let src_h = self.height as u64;
        let src_stride = self.width as usize * 4;

        let src_cols: Vec<usize> = (0..width as u64)
            .map(|x| (x * src_w / width as u64) as usize * 4)
            .collect();

        let mut pixels = Vec::with_capacity(len);
        for y in 0..height as u64 {
            let sy = (y * src_h / height as u64) as usize;
            let row = &self.pixels[sy * src_stride..(sy + 1) * src_stride];
            for &sx in &src_cols {
                pixels.extend_from_slice(&row[sx..sx + 4]);
            }
        }

        Ok(Image {
            width,
            height,
            pixels,
        })
    }
}

/// Nearest-neighbour resize of `image` to `width` x `height`.
pub fn resize(image: &Image, width: u32, height: u32) -> Result<Image> {
    image.resized(width, height)
}

/// Byte length of a `width` x `height` RGBA8 buffer, rejecting zero or overflowing sizes.
pub(crate) fn rgba_len(width: u32, height: u32) -> Result<usize> {
    let invalid = || CodecError::InvalidDimensions {
        width: width as usize,
        height: height as usize,
    };
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(invalid)
}
