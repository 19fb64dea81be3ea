#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use png2sixel::{decode_with, encode_sixel_default, DecodeOptions, InflateBackend};

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    png: Vec<u8>,
}

fuzz_target!(|input: FuzzInput| {
    // Whatever decodes with the builtin inflater must decode identically through Auto
    // and must always encode.
    let builtin = DecodeOptions {
        verify_checksums: false,
        backend: InflateBackend::Builtin,
    };
    let Ok(img) = decode_with(&input.png, &builtin) else {
        return;
    };

    let auto = DecodeOptions {
        verify_checksums: false,
        backend: InflateBackend::Auto,
    };
    if let Ok(other) = decode_with(&input.png, &auto) {
        assert_eq!(img, other);
    }

    let doc = encode_sixel_default(&img).expect("encoding a decoded image cannot fail");
    assert!(!doc.is_empty());
});
