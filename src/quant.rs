//! Median-cut color quantization (Heckbert, "Color Image Quantization for
//! Frame Buffer Display", SIGGRAPH '82).
//!
//! Pixels with alpha below the threshold become transparent (index 0). The
//! distinct opaque colors are either used as the palette directly, or split
//! into boxes along their widest channel until the palette budget is reached.

use std::collections::HashMap;

use crate::{tracing_wrappers::*, Image, PALETTE_MAX};

/// Alpha at or above which a pixel counts as opaque.
pub const DEFAULT_ALPHA_THRESHOLD: u8 = 128;

/// Index used for transparent pixels in [`QuantizedImage::indices`].
pub const TRANSPARENT_INDEX: u16 = 0;

/// An opaque palette color.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[inline]
    fn channel(self, channel: usize) -> u8 {
        match channel {
            0 => self.r,
            1 => self.g,
            _ => self.b,
        }
    }
}

/// Palette plus one index per pixel.
///
/// Indices are 1-based into `palette`; [`TRANSPARENT_INDEX`] marks transparent pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuantizedImage {
    pub width: u32,
    pub height: u32,
    pub palette: Vec<Rgb>,
    pub indices: Vec<u16>,
}

const NO_COLOR: u32 = u32::MAX;

/// Reduces `image` to at most `max_colors` (clamped to 1..=256) opaque colors.
///
/// With no more distinct opaque colors than the budget, the palette is exactly
/// those colors in order of first appearance.
pub fn quantize(image: &Image, max_colors: usize, alpha_threshold: u8) -> QuantizedImage {
    let max_colors = max_colors.clamp(1, PALETTE_MAX);

    let mut lookup: HashMap<Rgb, u32> = HashMap::new();
    let mut colors: Vec<Rgb> = Vec::new();
    let pixel_colors: Vec<u32> = image
        .pixels()
        .chunks_exact(4)
        .map(|px| {
            if px[3] < alpha_threshold {
                return NO_COLOR;
            }
            let rgb = Rgb::new(px[0], px[1], px[2]);
            *lookup.entry(rgb).or_insert_with(|| {
                colors.push(rgb);
                (colors.len() - 1) as u32
            })
        })
        .collect();

    let (palette, color_index) = if colors.len() <= max_colors {
        debug!(colors = colors.len(), "exact palette");
        let index = (1..=colors.len() as u16).collect();
        (colors, index)
    } else {
        median_cut(&colors, max_colors)
    };

    let indices = pixel_colors
        .iter()
        .map(|&id| {
            if id == NO_COLOR {
                TRANSPARENT_INDEX
            } else {
                color_index[id as usize]
            }
        })
        .collect();

    QuantizedImage {
        width: image.width(),
        height: image.height(),
        palette,
        indices,
    }
}

struct ColorBox {
    /// Ids into the distinct-color list.
    members: Vec<u32>,
    ranges: [u8; 3],
}

impl ColorBox {
    fn new(members: Vec<u32>, colors: &[Rgb]) -> Self {
        let mut min = [u8::MAX; 3];
        let mut max = [u8::MIN; 3];
        for &id in &members {
            let c = colors[id as usize];
            for ch in 0..3 {
                min[ch] = min[ch].min(c.channel(ch));
                max[ch] = max[ch].max(c.channel(ch));
            }
        }
        let ranges = std::array::from_fn(|ch| max[ch].saturating_sub(min[ch]));
        Self { members, ranges }
    }

    /// Channel with the largest range, ties going to R, then G, then B.
    fn widest_channel(&self) -> (usize, u8) {
        let mut best = 0;
        for ch in 1..3 {
            if self.ranges[ch] > self.ranges[best] {
                best = ch;
            }
        }
        (best, self.ranges[best])
    }

    fn mean(&self, colors: &[Rgb]) -> Rgb {
        let n = self.members.len() as u64;
        let mut sum = [0u64; 3];
        for &id in &self.members {
            let c = colors[id as usize];
            for (ch, s) in sum.iter_mut().enumerate() {
                *s += c.channel(ch) as u64;
            }
        }
        let avg = |s: u64| ((s + n / 2) / n) as u8;
        Rgb::new(avg(sum[0]), avg(sum[1]), avg(sum[2]))
    }
}

/// Splits the color set into at most `max_colors` boxes and returns the box
/// means plus the 1-based box index of every input color.
fn median_cut(colors: &[Rgb], max_colors: usize) -> (Vec<Rgb>, Vec<u16>) {
    let mut boxes = vec![ColorBox::new((0..colors.len() as u32).collect(), colors)];

    while boxes.len() < max_colors {
        // Widest box first; earlier boxes win ties.
        let mut pick = None;
        let mut best_range = 0u8;
        for (i, b) in boxes.iter().enumerate() {
            let (_, range) = b.widest_channel();
            if range > best_range {
                best_range = range;
                pick = Some(i);
            }
        }
        let Some(i) = pick else {
            break;
        };

        let (channel, _) = boxes[i].widest_channel();
        let mut members = std::mem::take(&mut boxes[i].members);
        members.sort_by_key(|&id| colors[id as usize].channel(channel));
        let upper = members.split_off(members.len() / 2);

        boxes[i] = ColorBox::new(members, colors);
        boxes.insert(i + 1, ColorBox::new(upper, colors));
    }
    debug!(colors = colors.len(), boxes = boxes.len(), "median cut");

    let mut color_index = vec![0u16; colors.len()];
    let palette = boxes
        .iter()
        .enumerate()
        .map(|(i, b)| {
            for &id in &b.members {
                color_index[id as usize] = (i + 1) as u16;
            }
            b.mean(colors)
        })
        .collect();
    (palette, color_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn image_from(colors: &[[u8; 4]], width: u32) -> Image {
        let height = colors.len() as u32 / width;
        Image::new(width, height, colors.concat()).unwrap()
    }

    #[test]
    fn test_exact_palette_first_appearance_order() {
        let img = image_from(
            &[
                [0, 0, 255, 255],
                [255, 0, 0, 255],
                [0, 0, 255, 255],
                [0, 255, 0, 200],
            ],
            2,
        );
        let q = quantize(&img, 256, DEFAULT_ALPHA_THRESHOLD);
        assert_eq!(
            q.palette,
            vec![Rgb::new(0, 0, 255), Rgb::new(255, 0, 0), Rgb::new(0, 255, 0)]
        );
        assert_eq!(q.indices, vec![1, 2, 1, 3]);
    }

    #[test]
    fn test_alpha_threshold() {
        let img = image_from(&[[9, 9, 9, 127], [9, 9, 9, 128], [1, 1, 1, 0], [1, 1, 1, 255]], 4);
        let q = quantize(&img, 256, 128);
        assert_eq!(q.palette, vec![Rgb::new(9, 9, 9), Rgb::new(1, 1, 1)]);
        assert_eq!(q.indices, vec![0, 1, 0, 2]);

        let q = quantize(&img, 256, 0);
        assert_eq!(q.indices, vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_fully_transparent() {
        let img = image_from(&[[1, 2, 3, 0], [4, 5, 6, 10]], 2);
        let q = quantize(&img, 256, DEFAULT_ALPHA_THRESHOLD);
        assert!(q.palette.is_empty());
        assert_eq!(q.indices, vec![0, 0]);
    }

    #[test]
    fn test_exactly_256_colors_is_bijective() {
        let pixels: Vec<[u8; 4]> = (0..=255u8).map(|v| [v, 255 - v, v / 2, 255]).collect();
        let img = image_from(&pixels, 16);
        let q = quantize(&img, 256, DEFAULT_ALPHA_THRESHOLD);
        assert_eq!(q.palette.len(), 256);
        let expected: Vec<u16> = (1..=256).collect();
        assert_eq!(q.indices, expected);
        for (px, &idx) in pixels.iter().zip(&q.indices) {
            assert_eq!(q.palette[idx as usize - 1], Rgb::new(px[0], px[1], px[2]));
        }
    }

    #[test]
    fn test_median_cut_splits_widest_channel() {
        let img = image_from(
            &[
                [0, 0, 0, 255],
                [250, 0, 0, 255],
                [10, 0, 0, 255],
                [200, 0, 0, 255],
            ],
            4,
        );
        let q = quantize(&img, 2, DEFAULT_ALPHA_THRESHOLD);
        assert_eq!(q.palette, vec![Rgb::new(5, 0, 0), Rgb::new(225, 0, 0)]);
        assert_eq!(q.indices, vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_median_cut_mean_rounds_to_nearest() {
        // Box means: (0 + 1) / 2 = 0.5 -> 1, (254 + 255) / 2 = 254.5 -> 255
        let img = image_from(
            &[[0, 0, 0, 255], [1, 0, 0, 255], [254, 0, 0, 255], [255, 0, 0, 255]],
            4,
        );
        let q = quantize(&img, 2, DEFAULT_ALPHA_THRESHOLD);
        assert_eq!(q.palette, vec![Rgb::new(1, 0, 0), Rgb::new(255, 0, 0)]);
    }

    #[test]
    fn test_median_cut_caps_palette() {
        let mut pixels = Vec::new();
        for y in 0..32u32 {
            for x in 0..32u32 {
                pixels.push([(x * 8) as u8, (y * 8) as u8, ((x + y) * 4) as u8, 255]);
            }
        }
        let img = image_from(&pixels, 32);
        let q = quantize(&img, 256, DEFAULT_ALPHA_THRESHOLD);
        assert_eq!(q.palette.len(), 256);
        assert!(q.indices.iter().all(|&i| (1..=256).contains(&i)));

        let mut used = vec![false; 257];
        for &i in &q.indices {
            used[i as usize] = true;
        }
        assert!(used[1..].iter().all(|&u| u), "every box should own pixels");

        assert_eq!(q, quantize(&img, 256, DEFAULT_ALPHA_THRESHOLD));
    }

    #[test]
    fn test_single_color_budget() {
        let img = image_from(&[[0, 0, 0, 255], [100, 50, 20, 255], [200, 100, 40, 255]], 3);
        let q = quantize(&img, 1, DEFAULT_ALPHA_THRESHOLD);
        assert_eq!(q.palette, vec![Rgb::new(100, 50, 20)]);
        assert_eq!(q.indices, vec![1, 1, 1]);
    }
}
