use enough::Stop;

use crate::error::ImageError;
use crate::image::Image;
use crate::lzw;
use crate::quantize::{floyd_steinberg_dither, indexify, median_cut, Palette};

/// One frame to encode, paired with its GIF delay time.
pub struct EncodeFrame<'a> {
    pub image: &'a Image,
    pub delay_centiseconds: u16,
}

fn write_sub_blocks(out: &mut Vec<u8>, data: &[u8]) {
    for chunk in data.chunks(255) {
        out.push(chunk.len() as u8);
        out.extend_from_slice(chunk);
    }
    out.push(0);
}

fn rgba_pixels(image: &Image) -> Vec<[u8; 3]> {
    let rgba = image.to_rgba8();
    rgba.data().chunks_exact(4).map(|p| [p[0], p[1], p[2]]).collect()
}

fn has_transparency(image: &Image) -> bool {
    let rgba = image.to_rgba8();
    rgba.data().chunks_exact(4).any(|p| p[3] < 255)
}

/// Encode one or more RGBA frames to a GIF byte stream (§4.3.3). A single
/// frame produces a static GIF; more than one emits a NETSCAPE2.0
/// infinite-loop animation. `dither` selects Floyd-Steinberg dithering
/// against the shared palette instead of flat nearest-color quantization
/// (§6 `dither` destination option).
pub fn encode(
    width: u16,
    height: u16,
    frames: &[EncodeFrame],
    dither: bool,
    stop: &dyn Stop,
) -> Result<Vec<u8>, ImageError> {
    if frames.is_empty() {
        return Err(ImageError::InvalidData("GIF encode requires at least one frame".into()));
    }

    let mut all_pixels: Vec<[u8; 3]> = Vec::new();
    for frame in frames {
        all_pixels.extend(rgba_pixels(frame.image));
    }
    let palette: Palette = median_cut(&all_pixels, 256);

    let mut out = Vec::new();
    out.extend_from_slice(b"GIF89a");
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());

    let table_size_bits = (palette.colors.len().trailing_zeros() as u8).saturating_sub(1);
    let packed = 0x80 | (0x7 << 4) | table_size_bits;
    out.push(packed);
    out.push(0); // background color index
    out.push(0); // pixel aspect ratio
    for color in &palette.colors {
        out.extend_from_slice(color);
    }

    if frames.len() > 1 {
        out.push(0x21);
        out.push(0xFF);
        out.push(11);
        out.extend_from_slice(b"NETSCAPE2.0");
        out.push(3);
        out.push(1);
        out.extend_from_slice(&0u16.to_le_bytes()); // loop forever
        out.push(0);
    }

    for frame in frames {
        stop.check()?;
        let transparent = has_transparency(frame.image);
        out.push(0x21);
        out.push(0xF9);
        out.push(4);
        let disposal = 1u8 << 2; // do not dispose
        let packed = disposal | (transparent as u8);
        out.push(packed);
        out.extend_from_slice(&frame.delay_centiseconds.to_le_bytes());
        out.push(if transparent { 0xFF } else { 0 });
        out.push(0);

        out.push(0x2C);
        out.extend_from_slice(&0u16.to_le_bytes()); // left
        out.extend_from_slice(&0u16.to_le_bytes()); // top
        out.extend_from_slice(&(frame.image.width() as u16).to_le_bytes());
        out.extend_from_slice(&(frame.image.height() as u16).to_le_bytes());
        out.push(0); // no local color table

        let pixels = rgba_pixels(frame.image);
        let indices = if dither {
            floyd_steinberg_dither(&pixels, frame.image.width() as usize, frame.image.height() as usize, &palette)
        } else {
            indexify(&pixels, &palette)
        };
        let min_code_size = 8u8;
        out.push(min_code_size);
        let compressed = lzw::encode(&indices, min_code_size);
        write_sub_blocks(&mut out, &compressed);
    }

    out.push(0x3B);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gif::decode;
    use crate::image::PixelFormat;

    #[test]
    fn roundtrip_single_frame() {
        let pixels = vec![
            255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 255,
        ];
        let img = Image::new(2, 2, PixelFormat::RGBA, pixels).unwrap();
        let frames = vec![EncodeFrame { image: &img, delay_centiseconds: 10 }];
        let encoded = encode(2, 2, &frames, false, &enough::Unstoppable).unwrap();
        assert_eq!(&encoded[0..6], b"GIF89a");
        assert_eq!(*encoded.last().unwrap(), 0x3B);

        let decoded = decode::decode(&encoded, &enough::Unstoppable).unwrap();
        assert_eq!(decoded.frames.len(), 1);
        assert_eq!(decoded.frames[0].image.width(), 2);
        assert_eq!(decoded.frames[0].image.height(), 2);
    }

    #[test]
    fn animated_three_frames_contains_netscape_extension() {
        let mut imgs = Vec::new();
        for c in [[255u8, 0, 0], [0, 255, 0], [0, 0, 255]] {
            let mut px = Vec::new();
            for _ in 0..100 {
                px.extend_from_slice(&c);
                px.push(255);
            }
            imgs.push(Image::new(10, 10, PixelFormat::RGBA, px).unwrap());
        }
        let frames: Vec<EncodeFrame> =
            imgs.iter().map(|img| EncodeFrame { image: img, delay_centiseconds: 10 }).collect();
        let encoded = encode(10, 10, &frames, false, &enough::Unstoppable).unwrap();
        let text: Vec<u8> = encoded.clone();
        assert!(text.windows(11).any(|w| w == b"NETSCAPE2.0"));

        let decoded = decode::decode(&encoded, &enough::Unstoppable).unwrap();
        assert_eq!(decoded.frames.len(), 3);
        for f in &decoded.frames {
            assert_eq!((f.image.width(), f.image.height()), (10, 10));
        }
    }

    #[test]
    fn dithered_gradient_decodes_to_matching_dimensions() {
        let mut pixels = Vec::new();
        for y in 0..8u32 {
            for x in 0..8u32 {
                let v = ((x + y) * 255 / 14) as u8;
                pixels.extend_from_slice(&[v, v, v, 255]);
            }
        }
        let img = Image::new(8, 8, PixelFormat::RGBA, pixels).unwrap();
        let frames = vec![EncodeFrame { image: &img, delay_centiseconds: 0 }];
        let encoded = encode(8, 8, &frames, true, &enough::Unstoppable).unwrap();
        let decoded = decode::decode(&encoded, &enough::Unstoppable).unwrap();
        assert_eq!(decoded.frames.len(), 1);
        assert_eq!((decoded.frames[0].image.width(), decoded.frames[0].image.height()), (8, 8));
    }
}
