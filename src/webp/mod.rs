//! WebP container codec (§4.3.6): RIFF/WEBP chunk framing around a VP8L
//! lossless payload (primary, exact round-trip) or a VP8 lossy payload
//! (secondary, header-parseable only on decode).

mod vp8;
mod vp8l;

use enough::Stop;

use crate::error::ImageError;
use crate::image::Image;

fn pad_even(data: &mut Vec<u8>) {
    if data.len() % 2 == 1 {
        data.push(0);
    }
}

fn write_riff(chunk_fourcc: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut chunk = Vec::with_capacity(8 + payload.len() + 1);
    chunk.extend_from_slice(chunk_fourcc);
    chunk.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    chunk.extend_from_slice(payload);
    pad_even(&mut chunk);

    let mut out = Vec::with_capacity(12 + chunk.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&((4 + chunk.len()) as u32).to_le_bytes());
    out.extend_from_slice(b"WEBP");
    out.extend_from_slice(&chunk);
    out
}

/// Encode losslessly via VP8L (the primary path, §4.3.6).
pub fn encode_lossless(image: &Image, stop: &dyn Stop) -> Result<Vec<u8>, ImageError> {
    let payload = vp8l::encode(image, stop)?;
    Ok(write_riff(b"VP8L", &payload))
}

/// Encode lossily via VP8 (the secondary path) at `quality` in `[1, 100]`.
pub fn encode_lossy(image: &Image, quality: u8, stop: &dyn Stop) -> Result<Vec<u8>, ImageError> {
    let payload = vp8::encode(image, quality, stop)?;
    Ok(write_riff(b"VP8 ", &payload))
}

struct RiffChunk<'a> {
    fourcc: [u8; 4],
    payload: &'a [u8],
}

fn read_chunks(buf: &[u8]) -> Result<Vec<RiffChunk<'_>>, ImageError> {
    if buf.len() < 12 || &buf[0..4] != b"RIFF" || &buf[8..12] != b"WEBP" {
        return Err(ImageError::UnrecognizedFormat);
    }
    let mut chunks = Vec::new();
    let mut pos = 12;
    while pos + 8 <= buf.len() {
        let mut fourcc = [0u8; 4];
        fourcc.copy_from_slice(&buf[pos..pos + 4]);
        let size = u32::from_le_bytes([buf[pos + 4], buf[pos + 5], buf[pos + 6], buf[pos + 7]]) as usize;
        let data_start = pos + 8;
        if data_start + size > buf.len() {
            return Err(ImageError::UnexpectedEof);
        }
        chunks.push(RiffChunk { fourcc, payload: &buf[data_start..data_start + size] });
        pos = data_start + size + (size % 2);
    }
    Ok(chunks)
}

/// Decode a WebP byte stream. Fully decodes VP8L payloads; VP8 (lossy)
/// payloads resolve dimensions via [`peek_properties`] but are rejected
/// here (§4.3.6: VP8 decode is header-only in this crate).
pub fn decode(buf: &[u8], stop: &dyn Stop) -> Result<Image, ImageError> {
    let chunks = read_chunks(buf)?;
    for chunk in &chunks {
        if &chunk.fourcc == b"VP8L" {
            return vp8l::decode(chunk.payload, stop);
        }
        if &chunk.fourcc == b"VP8 " {
            return Err(ImageError::UnsupportedFeature("VP8 lossy pixel decode".into()));
        }
    }
    Err(ImageError::InvalidHeader("no VP8/VP8L chunk found".into()))
}

/// Recover `(width, height)` from either chunk type without requiring a
/// full lossless decode.
pub fn peek_properties(buf: &[u8]) -> Result<(u32, u32), ImageError> {
    let chunks = read_chunks(buf)?;
    for chunk in &chunks {
        if &chunk.fourcc == b"VP8L" {
            return vp8l::peek_dimensions(chunk.payload);
        }
        if &chunk.fourcc == b"VP8 " {
            return vp8::peek_dimensions(chunk.payload);
        }
        if &chunk.fourcc == b"VP8X" {
            if chunk.payload.len() < 10 {
                return Err(ImageError::UnexpectedEof);
            }
            let w = 1 + (u32::from(chunk.payload[4])
                | u32::from(chunk.payload[5]) << 8
                | u32::from(chunk.payload[6]) << 16);
            let h = 1 + (u32::from(chunk.payload[7])
                | u32::from(chunk.payload[8]) << 8
                | u32::from(chunk.payload[9]) << 16);
            return Ok((w, h));
        }
    }
    Err(ImageError::InvalidHeader("no recognizable WebP chunk".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelFormat;

    #[test]
    fn lossless_roundtrip_exact() {
        let pixels: Vec<u8> = (0..6 * 4 * 4).map(|i| (i * 7) as u8).collect();
        let img = Image::new(6, 4, PixelFormat::RGBA, pixels.clone()).unwrap();
        let encoded = encode_lossless(&img, &enough::Unstoppable).unwrap();
        assert_eq!(&encoded[0..4], b"RIFF");
        assert_eq!(&encoded[8..12], b"WEBP");
        let decoded = decode(&encoded, &enough::Unstoppable).unwrap();
        assert_eq!(decoded.data(), &pixels[..]);
    }

    #[test]
    fn lossy_header_parses_dimensions() {
        let img = Image::new(20, 12, PixelFormat::RGB, vec![50u8; 20 * 12 * 3]).unwrap();
        let encoded = encode_lossy(&img, 60, &enough::Unstoppable).unwrap();
        let (w, h) = peek_properties(&encoded).unwrap();
        assert_eq!((w, h), (20, 12));
        assert!(decode(&encoded, &enough::Unstoppable).is_err());
    }
}
