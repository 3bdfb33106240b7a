//! DEFLATE (RFC 1951) and the zlib wrapper (RFC 1950).

mod huffman;
mod inflate;
mod deflate_impl;

pub use inflate::inflate;
pub use deflate_impl::{deflate, DeflateLevel};

use crate::checksum::Adler32;
use crate::error::ImageError;

/// Wrap raw DEFLATE output in a zlib container: 2-byte header, payload,
/// big-endian Adler-32 trailer over the *uncompressed* data.
pub fn zlib_compress(data: &[u8], level: DeflateLevel) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len() / 2 + 16);
    out.extend_from_slice(&zlib_header(level));
    out.extend_from_slice(&deflate(data, level));
    let mut adler = Adler32::new();
    adler.update(data);
    out.extend_from_slice(&adler.finish().to_be_bytes());
    out
}

fn zlib_header(level: DeflateLevel) -> [u8; 2] {
    let cmf: u16 = 0x78; // CM=8, CINFO=7 (32 KiB window)
    let flevel: u16 = match level {
        DeflateLevel::Stored => 0,
        DeflateLevel::Fast => 1,
        DeflateLevel::Default => 2,
        DeflateLevel::Best => 3,
    };
    let mut header = (cmf << 8) | (flevel << 6);
    let check = header % 31;
    if check != 0 {
        header += 31 - check;
    }
    [(header >> 8) as u8, (header & 0xFF) as u8]
}

/// Unwrap a zlib container: validate the 2-byte header (reject FDICT=1),
/// inflate the payload. A missing or mismatched Adler-32 trailer is
/// tolerated — the decompressed data is still returned.
pub fn zlib_decompress(data: &[u8]) -> Result<Vec<u8>, ImageError> {
    if data.len() < 2 {
        return Err(ImageError::UnexpectedEof);
    }
    let cmf = data[0];
    let flg = data[1];
    if (cmf as u16 * 256 + flg as u16) % 31 != 0 {
        return Err(ImageError::InvalidData("zlib header checksum failed".into()));
    }
    if cmf & 0x0F != 8 {
        return Err(ImageError::UnsupportedFeature(format!("zlib CM={}", cmf & 0x0F)));
    }
    if flg & 0x20 != 0 {
        return Err(ImageError::UnsupportedFeature("zlib preset dictionary".into()));
    }
    inflate(&data[2..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zlib_roundtrip() {
        let data = b"the quick brown fox jumps over the lazy dog, the quick brown fox";
        let compressed = zlib_compress(data, DeflateLevel::Default);
        let decompressed = zlib_decompress(&compressed).unwrap();
        assert_eq!(decompressed, data);
    }

    #[test]
    fn zlib_header_checksum_divisible_by_31() {
        for level in [DeflateLevel::Stored, DeflateLevel::Fast, DeflateLevel::Default, DeflateLevel::Best] {
            let h = zlib_header(level);
            let word = (h[0] as u16) * 256 + h[1] as u16;
            assert_eq!(word % 31, 0);
        }
    }
}
