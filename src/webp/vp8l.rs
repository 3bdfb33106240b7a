//! VP8L lossless payload (§4.3.6, simplified per this crate's explicit
//! allowance): no prefix coding, no transforms, no color cache — just the
//! signature, packed dimensions, and a raw G/R/B/A-per-pixel stream.

use enough::Stop;

use crate::bitio::{LsbBitReader, LsbBitWriter};
use crate::error::ImageError;
use crate::image::{Image, PixelFormat};

const SIGNATURE: u8 = 0x2F;

/// Encode an image as a VP8L chunk payload (not RIFF-wrapped).
pub fn encode(image: &Image, stop: &dyn Stop) -> Result<Vec<u8>, ImageError> {
    let width = image.width();
    let height = image.height();
    let rgba = image.to_rgba8();

    let mut writer = LsbBitWriter::new();
    writer.write_bits(SIGNATURE as u32, 8);
    writer.write_bits(width - 1, 14);
    writer.write_bits(height - 1, 14);
    writer.write_bits(1, 1); // alpha present
    writer.write_bits(0, 3); // version
    writer.write_bits(0, 1); // transform flag: none
    writer.write_bits(0, 1); // color-cache flag: none

    let data = rgba.data();
    for (i, px) in data.chunks_exact(4).enumerate() {
        if i % 4096 == 0 {
            stop.check()?;
        }
        // G, R, B, A order per the spec's raw-stream contract.
        writer.write_bits(px[1] as u32, 8);
        writer.write_bits(px[0] as u32, 8);
        writer.write_bits(px[2] as u32, 8);
        writer.write_bits(px[3] as u32, 8);
    }
    Ok(writer.finish())
}

/// Decode a VP8L chunk payload produced by [`encode`].
pub fn decode(data: &[u8], stop: &dyn Stop) -> Result<Image, ImageError> {
    let mut reader = LsbBitReader::new(data);
    let signature = reader.read_bits(8)? as u8;
    if signature != SIGNATURE {
        return Err(ImageError::InvalidHeader("bad VP8L signature".into()));
    }
    let width = reader.read_bits(14)? + 1;
    let height = reader.read_bits(14)? + 1;
    let _alpha = reader.read_bits(1)?;
    let _version = reader.read_bits(3)?;
    let transform = reader.read_bits(1)?;
    let color_cache = reader.read_bits(1)?;
    if transform != 0 || color_cache != 0 {
        return Err(ImageError::UnsupportedFeature(
            "VP8L transforms/color cache".into(),
        ));
    }

    let pixel_count = width as usize * height as usize;
    let mut out = vec![0u8; pixel_count * 4];
    for (i, px) in out.chunks_exact_mut(4).enumerate() {
        if i % 4096 == 0 {
            stop.check()?;
        }
        let g = reader.read_bits(8)? as u8;
        let r = reader.read_bits(8)? as u8;
        let b = reader.read_bits(8)? as u8;
        let a = reader.read_bits(8)? as u8;
        px[0] = r;
        px[1] = g;
        px[2] = b;
        px[3] = a;
    }
    Image::new(width, height, PixelFormat::RGBA, out)
}

/// Read just width/height from a VP8L chunk payload.
pub fn peek_dimensions(data: &[u8]) -> Result<(u32, u32), ImageError> {
    let mut reader = LsbBitReader::new(data);
    let signature = reader.read_bits(8)? as u8;
    if signature != SIGNATURE {
        return Err(ImageError::InvalidHeader("bad VP8L signature".into()));
    }
    let width = reader.read_bits(14)? + 1;
    let height = reader.read_bits(14)? + 1;
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelFormat as Pf;

    #[test]
    fn roundtrips_small_image() {
        let pixels: Vec<u8> = (0..4 * 3 * 2).map(|i| (i * 17) as u8).collect();
        let img = Image::new(4, 3, Pf::RGBA, pixels.clone()).unwrap();
        let encoded = encode(&img, &enough::Unstoppable).unwrap();
        let decoded = decode(&encoded, &enough::Unstoppable).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 3);
        assert_eq!(decoded.data(), &pixels[..]);
    }

    #[test]
    fn peek_dimensions_matches_decode() {
        let img = Image::new(7, 5, Pf::RGB, vec![1u8; 7 * 5 * 3]).unwrap();
        let encoded = encode(&img, &enough::Unstoppable).unwrap();
        let (w, h) = peek_dimensions(&encoded).unwrap();
        assert_eq!((w, h), (7, 5));
    }
}
