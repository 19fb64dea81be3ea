#![no_main]

use libfuzzer_sys::fuzz_target;
use png2sixel::{decode_with, inflate, DecodeOptions, InflateBackend};

fuzz_target!(|data: &[u8]| {
    // Neither the raw inflater nor the PNG decoder may panic, whatever the input.
    let _ = inflate(data);

    let opts = DecodeOptions {
        verify_checksums: false,
        backend: InflateBackend::Builtin,
    };
    if let Ok(img) = decode_with(data, &opts) {
        assert_eq!(
            img.pixels().len(),
            img.width() as usize * img.height() as usize * 4
        );
    }
});
