//! SIXEL encoder: optional nearest-neighbour resize, median-cut quantization,
//! then six-row bands with run-length encoded column bitmasks.

use std::fmt;

use crate::{
    quant::{quantize, QuantizedImage, Rgb, DEFAULT_ALPHA_THRESHOLD, TRANSPARENT_INDEX},
    tracing_wrappers::*,
    CodecError, Image, Result, PALETTE_MAX,
};

/// Options for [`encode_sixel`].
#[derive(Clone, Debug)]
pub struct EncodeOptions {
    /// Output width in pixels. When only one target dimension is set the other
    /// follows the source aspect ratio.
    pub target_width: Option<u32>,

    /// Output height in pixels.
    pub target_height: Option<u32>,

    /// Maximum number of colors in the palette (clamped to 1-256).
    pub max_colors: u16,

    /// Pixels with alpha below this value are left unpainted.
    pub alpha_threshold: u8,

    /// Emit P2=1 in the DCS introducer so unpainted pixels keep the terminal background.
    pub transparent_background: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            target_width: None,
            target_height: None,
            max_colors: PALETTE_MAX as u16,
            alpha_threshold: DEFAULT_ALPHA_THRESHOLD,
            transparent_background: false,
        }
    }
}

/// A complete SIXEL device control string, from `ESC P` to `ESC \`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SixelDocument(String);

impl SixelDocument {
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn into_string(self) -> String {
        self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SixelDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SixelDocument {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<SixelDocument> for String {
    fn from(doc: SixelDocument) -> Self {
        doc.0
    }
}

/// Encodes an [`Image`] as a SIXEL document.
///
/// # Errors
///
/// Only a zero or unaddressable target size fails
/// ([`CodecError::InvalidDimensions`]); encoding itself is total.
///
/// # Example
///
/// ```ignore
/// use png2sixel::{decode, encode_sixel, EncodeOptions};
///
/// let image = decode(&std::fs::read("logo.png")?)?;
/// let opts = EncodeOptions {
///     target_width: Some(320),
///     ..Default::default()
/// };
/// print!("{}", encode_sixel(&image, &opts)?);
/// ```
#[must_use = "this returns the encoded SixelDocument"]
pub fn encode_sixel(image: &Image, opts: &EncodeOptions) -> Result<SixelDocument> {
    let (width, height) = target_size(image, opts)?;
    let resized;
    let image = if (width, height) == (image.width(), image.height()) {
        image
    } else {
        trace!(
            from_width = image.width(),
            from_height = image.height(),
            width,
            height,
            "resizing before quantization"
        );
        resized = image.resized(width, height)?;
        &resized
    };

    let quantized = quantize(image, opts.max_colors as usize, opts.alpha_threshold);
    let doc = encode_indexed(&quantized, opts.transparent_background);
    debug!(
        width,
        height,
        colors = quantized.palette.len(),
        bytes = doc.len(),
        "encoded sixel"
    );
    Ok(SixelDocument(doc))
}

/// Encodes with [`EncodeOptions::default`].
#[inline]
#[must_use = "this returns the encoded SixelDocument"]
pub fn encode_sixel_default(image: &Image) -> Result<SixelDocument> {
    encode_sixel(image, &EncodeOptions::default())
}

/// Encodes a raw RGBA8 buffer (4 bytes per pixel) as a SIXEL string.
///
/// # Errors
///
/// - [`CodecError::InvalidDimensions`] for a zero or oversized width/height
/// - [`CodecError::BufferSizeMismatch`] when `rgba.len() != width * height * 4`
#[must_use = "this returns the encoded SIXEL string"]
pub fn sixel_encode(
    rgba: &[u8],
    width: usize,
    height: usize,
    opts: &EncodeOptions,
) -> Result<String> {
    let invalid = || CodecError::InvalidDimensions { width, height };
    if width == 0 || height == 0 {
        return Err(invalid());
    }
    let w = u32::try_from(width).map_err(|_| invalid())?;
    let h = u32::try_from(height).map_err(|_| invalid())?;
    let image = Image::new(w, h, rgba.to_vec())?;
    encode_sixel(&image, opts).map(SixelDocument::into_string)
}

/// Resolves the output size, deriving a missing dimension from the aspect ratio.
fn target_size(image: &Image, opts: &EncodeOptions) -> Result<(u32, u32)> {
    let (w, h) = (image.width(), image.height());
    let (tw, th) = match (opts.target_width, opts.target_height) {
        (None, None) => return Ok((w, h)),
        (Some(tw), Some(th)) => (tw as u64, th as u64),
        (Some(tw), None) => (tw as u64, scale(h, tw, w)),
        (None, Some(th)) => (scale(w, th, h), th as u64),
    };
    match (u32::try_from(tw), u32::try_from(th)) {
        (Ok(tw), Ok(th)) if tw > 0 && th > 0 => Ok((tw, th)),
        _ => Err(CodecError::InvalidDimensions {
            width: tw as usize,
            height: th as usize,
        }),
    }
}

/// `dim * num / den` rounded to nearest and at least 1, or 0 when `num` is 0.
fn scale(dim: u32, num: u32, den: u32) -> u64 {
    if num == 0 {
        return 0;
    }
    let den = den as u64;
    ((dim as u64 * num as u64 + den / 2) / den).max(1)
}

fn encode_indexed(q: &QuantizedImage, transparent_background: bool) -> String {
    let width = q.width as usize;
    let height = q.height as usize;
    let mut out = String::with_capacity(64 + q.palette.len() * 16 + width * height.div_ceil(6));

    // DCS introducer: ESC P [p1;p2;p3] q. P2=1 leaves unset pixels transparent.
    out.push('\x1b');
    out.push('P');
    if transparent_background {
        out.push_str("0;1;0");
    }
    out.push('q');

    // Raster attributes: 1:1 aspect ratio, image extent.
    out.push_str("\"1;1;");
    write_number(&mut out, width);
    out.push(';');
    write_number(&mut out, height);

    for (i, c) in q.palette.iter().enumerate() {
        write_register(&mut out, i + 1, *c);
    }

    // Per-color column bitmasks for the current band, allocated on first use.
    let mut masks: Vec<Vec<u8>> = vec![Vec::new(); q.palette.len() + 1];
    let mut used = vec![false; q.palette.len() + 1];

    for y0 in (0..height).step_by(6) {
        let y_max = usize::min(y0 + 6, height);

        for y in y0..y_max {
            let bit = 1u8 << (y - y0);
            let row = &q.indices[y * width..(y + 1) * width];
            for (x, &index) in row.iter().enumerate() {
                if index == TRANSPARENT_INDEX {
                    continue;
                }
                let index = index as usize;
                let mask = &mut masks[index];
                if !used[index] {
                    used[index] = true;
                    mask.clear();
                    mask.resize(width, 0);
                }
                mask[x] |= bit;
            }
        }

        for index in 1..used.len() {
            if !used[index] {
                continue;
            }
            used[index] = false;
            out.push('#');
            write_number(&mut out, index);
            write_runs(&mut out, &masks[index]);
            // Carriage return to the start of the band for the next color.
            out.push('$');
        }

        out.push('-');
    }

    // String terminator
    out.push('\x1b');
    out.push('\\');
    out
}

/// `#<index>;2;<r%>;<g%>;<b%>`
fn write_register(out: &mut String, index: usize, c: Rgb) {
    out.push('#');
    write_number(out, index);
    out.push_str(";2");
    for v in [c.r, c.g, c.b] {
        out.push(';');
        write_number(out, percent(v));
    }
}

#[inline]
fn percent(v: u8) -> usize {
    (v as usize * 100 + 127) / 255
}

/// Run-length encodes sixel characters; runs of 4 or more become `!<n><char>`.
fn write_runs(out: &mut String, mask: &[u8]) {
    let mut x = 0;
    while x < mask.len() {
        let bits = mask[x];
        let run_len = mask[x..].iter().take_while(|&&b| b == bits).count();
        let ch = (63 + bits) as char;
        if run_len > 3 {
            out.push('!');
            write_number(out, run_len);
            out.push(ch);
        } else {
            for _ in 0..run_len {
                out.push(ch);
            }
        }
        x += run_len;
    }
}

#[inline]
fn write_number(out: &mut String, mut n: usize) {
    if n == 0 {
        out.push('0');
        return;
    }

    let mut buf = [0u8; 20];
    let mut i = buf.len();
    while n > 0 {
        i -= 1;
        buf[i] = b'0' + (n % 10) as u8;
        n /= 10;
    }
    out.extend(buf[i..].iter().map(|&d| d as char));
}
