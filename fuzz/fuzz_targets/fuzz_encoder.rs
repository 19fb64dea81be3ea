#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use png2sixel::{encode_sixel, EncodeOptions, Image};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    width: u8,
    height: u8,
    pixels: Vec<u8>,
    max_colors: u16,
    alpha_threshold: u8,
    target_width: Option<u8>,
    target_height: Option<u8>,
    transparent_background: bool,
}

fuzz_target!(|input: FuzzInput| {
    let width = (input.width as u32).clamp(1, 128);
    let height = (input.height as u32).clamp(1, 128);

    let expected_size = (width * height * 4) as usize;
    if input.pixels.len() < expected_size {
        return;
    }
    let Ok(img) = Image::new(width, height, input.pixels[..expected_size].to_vec()) else {
        return;
    };

    let opts = EncodeOptions {
        target_width: input.target_width.map(u32::from),
        target_height: input.target_height.map(u32::from),
        max_colors: input.max_colors,
        alpha_threshold: input.alpha_threshold,
        transparent_background: input.transparent_background,
    };

    // Encoding only fails for a zero target size.
    match encode_sixel(&img, &opts) {
        Ok(doc) => {
            assert!(doc.as_str().starts_with("\x1bP"));
            assert!(doc.as_str().ends_with("\x1b\\"));
        }
        Err(_) => assert!(opts.target_width == Some(0) || opts.target_height == Some(0)),
    }
});
