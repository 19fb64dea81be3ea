//! Maps the sample layouts of 8-bit PNG color types onto RGBA8.

use crate::{CodecError, Result};

/// PNG color type from IHDR.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ColorType {
    Grayscale = 0,
    Rgb = 2,
    Indexed = 3,
    GrayscaleAlpha = 4,
    Rgba = 6,
}

impl ColorType {
    pub fn from_u8(value: u8) -> Result<Self> {
        match value {
            0 => Ok(ColorType::Grayscale),
            2 => Ok(ColorType::Rgb),
            3 => Ok(ColorType::Indexed),
            4 => Ok(ColorType::GrayscaleAlpha),
            6 => Ok(ColorType::Rgba),
            _ => Err(CodecError::unsupported(format!("color type {value}"))),
        }
    }

    /// Bytes per pixel at bit depth 8.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            ColorType::Grayscale | ColorType::Indexed => 1,
            ColorType::GrayscaleAlpha => 2,
            ColorType::Rgb => 3,
            ColorType::Rgba => 4,
        }
    }
}

/// Converts unfiltered samples to RGBA8.
///
/// `palette` is the raw PLTE payload and `transparency` the raw tRNS payload, if any.
/// For grayscale and RGB images tRNS is a 16-bit color key; for indexed images it
/// holds one alpha per palette entry (missing entries are opaque).
pub fn to_rgba(
    color_type: ColorType,
    samples: &[u8],
    palette: Option<&[u8]>,
    transparency: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let bpp = color_type.bytes_per_pixel();
    let mut out = Vec::with_capacity(samples.len() / bpp * 4);

    match color_type {
        ColorType::Grayscale => {
            let key = match transparency {
                Some(&[hi, lo]) => Some(u16::from_be_bytes([hi, lo])),
                _ => None,
            };
            for &g in samples {
                let alpha = if key == Some(g as u16) { 0 } else { 255 };
                out.extend_from_slice(&[g, g, g, alpha]);
            }
        }
        ColorType::Rgb => {
            let key = match transparency {
                Some(&[rh, rl, gh, gl, bh, bl]) => Some([
                    u16::from_be_bytes([rh, rl]),
                    u16::from_be_bytes([gh, gl]),
                    u16::from_be_bytes([bh, bl]),
                ]),
                _ => None,
            };
            for px in samples.chunks_exact(3) {
                let rgb = [px[0] as u16, px[1] as u16, px[2] as u16];
                let alpha = if key == Some(rgb) { 0 } else { 255 };
                out.extend_from_slice(&[px[0], px[1], px[2], alpha]);
            }
        }
        ColorType::Indexed => {
            let palette = palette.ok_or_else(|| {
                CodecError::unsupported("indexed color without a PLTE chunk")
            })?;
            let entries = palette.len() / 3;
            let alphas = transparency.unwrap_or(&[]);
            if alphas.len() > entries {
                return Err(CodecError::format(format!(
                    "tRNS has {} entries for a {entries}-entry palette",
                    alphas.len()
                )));
            }
            for &index in samples {
                let i = index as usize;
                if i >= entries {
                    return Err(CodecError::format(format!(
                        "palette index {i} out of range for {entries} entries"
                    )));
                }
                let alpha = alphas.get(i).copied().unwrap_or(255);
                out.extend_from_slice(&[
                    palette[i * 3],
                    palette[i * 3 + 1],
                    palette[i * 3 + 2],
                    alpha,
                ]);
            }
        }
        ColorType::GrayscaleAlpha => {
            for px in samples.chunks_exact(2) {
                out.extend_from_slice(&[px[0], px[0], px[0], px[1]]);
            }
        }
        ColorType::Rgba => out.extend_from_slice(samples),
    }

    Ok(out)
}
