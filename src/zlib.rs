//! Zlib wrapper (RFC 1950) around the DEFLATE payload of a PNG.
//!
//! The raw DEFLATE body is handed either to the builtin [`crate::inflate`]
//! engine or, when the `miniz_oxide` feature is compiled in, to
//! `miniz_oxide`. Both produce identical output for valid streams.

use crate::{inflate::inflate_to_limit, tracing_wrappers::*, CodecError, Result};

/// Which DEFLATE implementation decompresses the image data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InflateBackend {
    /// `miniz_oxide` when compiled in, the builtin engine otherwise.
    #[default]
    Auto,
    /// Always the builtin engine.
    Builtin,
    /// Always `miniz_oxide`.
    #[cfg(feature = "miniz_oxide")]
    MinizOxide,
}

const ZLIB_HEADER_LEN: usize = 2;
const ADLER_LEN: usize = 4;

/// Validates the zlib header, inflates the body and checks the Adler-32 trailer.
///
/// At most `limit` bytes are inflated. The trailer covers the whole stream, so it
/// is only checked when the stream ends within the limit.
pub fn decompress(
    data: &[u8],
    backend: InflateBackend,
    verify_checksum: bool,
    limit: usize,
) -> Result<Vec<u8>> {
    if data.len() < ZLIB_HEADER_LEN + ADLER_LEN {
        return Err(CodecError::TruncatedStream);
    }
    check_header(data[0], data[1])?;

    let body = &data[ZLIB_HEADER_LEN..data.len() - ADLER_LEN];
    let (out, complete) = match backend {
        InflateBackend::Builtin => inflate_to_limit(body, limit)?,
        #[cfg(feature = "miniz_oxide")]
        InflateBackend::MinizOxide => inflate_miniz(body, limit)?,
        #[cfg(feature = "miniz_oxide")]
        InflateBackend::Auto => match inflate_miniz(body, limit) {
            Ok(inflated) => inflated,
            // Re-run the builtin engine for a precisely typed error.
            Err(_) => inflate_to_limit(body, limit)?,
        },
        #[cfg(not(feature = "miniz_oxide"))]
        InflateBackend::Auto => inflate_to_limit(body, limit)?,
    };
    debug!(
        ?backend,
        compressed = body.len(),
        inflated = out.len(),
        complete,
        "zlib stream inflated"
    );

    if verify_checksum && complete {
        let trailer = &data[data.len() - ADLER_LEN..];
        let expected = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let actual = adler32(&out);
        if expected != actual {
            return Err(CodecError::ChecksumMismatch {
                kind: "adler-32",
                expected,
                actual,
            });
        }
    }
    Ok(out)
}

fn check_header(cmf: u8, flg: u8) -> Result<()> {
    if cmf & 0x0f != 8 {
        return Err(CodecError::format(format!(
            "unsupported zlib compression method {}",
            cmf & 0x0f
        )));
    }
    if cmf >> 4 > 7 {
        return Err(CodecError::format(format!(
            "zlib window size exponent {} too large",
            cmf >> 4
        )));
    }
    if (cmf as u16 * 256 + flg as u16) % 31 != 0 {
        return Err(CodecError::format("zlib header check bits are wrong"));
    }
    if flg & 0x20 != 0 {
        return Err(CodecError::format("zlib preset dictionaries are not allowed in PNG"));
    }
    Ok(())
}

#[cfg(feature = "miniz_oxide")]
fn inflate_miniz(body: &[u8], limit: usize) -> Result<(Vec<u8>, bool)> {
    use miniz_oxide::inflate::{decompress_to_vec_with_limit, TINFLStatus};

    match decompress_to_vec_with_limit(body, limit) {
        Ok(out) => Ok((out, true)),
        // The output buffer hit `limit` with input left over.
        Err(err) if err.status == TINFLStatus::HasMoreOutput => Ok((err.output, false)),
        Err(err) => Err(CodecError::Backend(format!("{:?}", err.status))),
    }
}

/// Adler-32 checksum (RFC 1950 §8.2).
pub fn adler32(data: &[u8]) -> u32 {
    const MOD: u32 = 65521;
    // Largest n such that 255n(n+1)/2 + (n+1)(MOD-1) fits in u32.
    const NMAX: usize = 5552;

    let mut a = 1u32;
    let mut b = 0u32;
    for chunk in data.chunks(NMAX) {
        for &byte in chunk {
            a += byte as u32;
            b += a;
        }
        a %= MOD;
        b %= MOD;
    }
    (b << 16) | a
}
