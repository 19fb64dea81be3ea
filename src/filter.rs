//! Reverses PNG per-scanline filtering (None, Sub, Up, Average, Paeth).

use crate::{CodecError, Result};

/// Per-scanline filter selector.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FilterType {
    None = 0,
    Sub = 1,
    Up = 2,
    Average = 3,
    Paeth = 4,
}

impl TryFrom<u8> for FilterType {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(FilterType::None),
            1 => Ok(FilterType::Sub),
            2 => Ok(FilterType::Up),
            3 => Ok(FilterType::Average),
            4 => Ok(FilterType::Paeth),
            _ => Err(CodecError::format(format!("invalid filter type {value}"))),
        }
    }
}

/// Paeth predictor: whichever of `a` (left), `b` (above), `c` (upper left)
/// is closest to `a + b - c`, ties going to `a` then `b`.
///
/// ```
/// use png2sixel::paeth;
/// assert_eq!(paeth(10, 20, 20), 10);
/// assert_eq!(paeth(10, 20, 10), 20);
/// assert_eq!(paeth(10, 20, 30), 10);
/// ```
#[inline]
pub fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Unfilters `height` scanlines of `width * bpp` bytes, each prefixed by a filter byte.
///
/// Bytes past the last scanline are ignored.
pub fn unfilter(data: &[u8], width: usize, height: usize, bpp: usize) -> Result<Vec<u8>> {
    let stride = width
        .checked_mul(bpp)
        .ok_or(CodecError::InvalidDimensions { width, height })?;
    let needed = stride
        .checked_add(1)
        .and_then(|line| line.checked_mul(height))
        .ok_or(CodecError::InvalidDimensions { width, height })?;
    if data.len() < needed {
        return Err(CodecError::TruncatedStream);
    }

    let mut out = vec![0u8; stride * height];
    let zero_row = vec![0u8; stride];

    for (y, line) in data[..needed].chunks_exact(stride + 1).enumerate() {
        let filter = FilterType::try_from(line[0])?;
        let (done, rest) = out.split_at_mut(y * stride);
        let prev = if y == 0 {
            &zero_row[..]
        } else {
            &done[(y - 1) * stride..]
        };
        let cur = &mut rest[..stride];
        cur.copy_from_slice(&line[1..]);
        unfilter_row(filter, bpp, prev, cur);
    }
    Ok(out)
}

fn unfilter_row(filter: FilterType, bpp: usize, prev: &[u8], cur: &mut [u8]) {
    match filter {
        FilterType::None => {}
        FilterType::Sub => {
            for i in bpp..cur.len() {
                cur[i] = cur[i].wrapping_add(cur[i - bpp]);
            }
        }
        FilterType::Up => {
            for (c, &p) in cur.iter_mut().zip(prev) {
                *c = c.wrapping_add(p);
            }
        }
        FilterType::Average => {
            for i in 0..cur.len() {
                let left = if i >= bpp { cur[i - bpp] } else { 0 };
                let avg = ((left as u16 + prev[i] as u16) / 2) as u8;
                cur[i] = cur[i].wrapping_add(avg);
            }
        }
        FilterType::Paeth => {
            for i in 0..cur.len() {
                let (left, upper_left) = if i >= bpp {
                    (cur[i - bpp], prev[i - bpp])
                } else {
                    (0, 0)
                };
                cur[i] = cur[i].wrapping_add(paeth(left, prev[i], upper_left));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_paeth_reduces_to_left_when_above_equals_upper_left() {
        for a in (0..=255u8).step_by(7) {
            for b in (0..=255u8).step_by(11) {
                assert_eq!(paeth(a, b, b), a);
            }
        }
    }

    #[test]
    fn test_paeth_negation_invariant() {
        for a in (0..=255u8).step_by(5) {
            for b in (0..=255u8).step_by(9) {
                for c in (0..=255u8).step_by(13) {
                    assert_eq!(paeth(255 - a, 255 - b, 255 - c), 255 - paeth(a, b, c));
                }
            }
        }
    }

    #[test]
    fn test_paeth_tie_breaking() {
        // p = 10 + 20 - 15 = 15: pa = 5, pb = 5, pc = 0 -> c
        assert_eq!(paeth(10, 20, 15), 15);
        // all distances zero -> a
        assert_eq!(paeth(0, 0, 0), 0);
        // p = 5 + 5 - 0 = 10: pa = 5, pb = 5, pc = 10 -> a wins the tie
        assert_eq!(paeth(5, 5, 0), 5);
        // p = 0 + 10 - 5 = 5: pa = 5, pb = 5, pc = 0 -> c
        assert_eq!(paeth(0, 10, 5), 5);
        // p = 2 + 10 - 4 = 8: pa = 6, pb = 2, pc = 4 -> b
        assert_eq!(paeth(2, 10, 4), 10);
    }

    #[test]
    fn test_filter_type_parse() {
        assert_eq!(FilterType::try_from(4).unwrap(), FilterType::Paeth);
        assert!(matches!(FilterType::try_from(5), Err(CodecError::Format(_))));
    }

    #[test]
    fn test_unfilter_each_type() {
        // 2 pixels of 2 bytes per row, second row filtered with every type in turn.
        let first = [10u8, 20, 30, 40];
        let cases: [(u8, [u8; 4], [u8; 4]); 5] = [
            (0, [1, 2, 3, 4], [1, 2, 3, 4]),
            (1, [1, 2, 3, 4], [1, 2, 4, 6]),
            (2, [1, 2, 3, 4], [11, 22, 33, 44]),
            // left of first pixel is 0: 1+5, 2+10, 3+(6+30)/2, 4+(12+40)/2
            (3, [1, 2, 3, 4], [6, 12, 21, 30]),
            // first pixel: paeth(0, up, 0) = up; then paeth(left, up, ul)
            (4, [1, 2, 3, 4], [11, 22, 33, 44]),
        ];
        for (filter, raw, expected) in cases {
            let mut data = vec![0u8];
            data.extend_from_slice(&first);
            data.push(filter);
            data.extend_from_slice(&raw);
            let out = unfilter(&data, 2, 2, 2).unwrap();
            assert_eq!(&out[..4], &first, "filter {filter}");
            assert_eq!(&out[4..], &expected, "filter {filter}");
        }
    }

    #[test]
    fn test_unfilter_wraps_mod_256() {
        let data = [1u8, 200, 100];
        assert_eq!(unfilter(&data, 2, 1, 1).unwrap(), vec![200, 44]);
    }

    #[test]
    fn test_unfilter_truncated_and_bad_filter() {
        assert!(matches!(
            unfilter(&[0, 1, 2], 2, 2, 1),
            Err(CodecError::TruncatedStream)
        ));
        assert!(matches!(
            unfilter(&[7, 1, 2], 2, 1, 1),
            Err(CodecError::Format(_))
        ));
    }
}
