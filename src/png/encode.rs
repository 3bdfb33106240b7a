use enough::Stop;

use super::filter::choose_filter;
use crate::checksum::crc32;
use crate::deflate::{zlib_compress, DeflateLevel};
use crate::error::ImageError;
use crate::image::{ColorModel, Image};

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

fn write_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(data);
    let mut crc_input = Vec::with_capacity(4 + data.len());
    crc_input.extend_from_slice(kind);
    crc_input.extend_from_slice(data);
    out.extend_from_slice(&crc32(&crc_input).to_be_bytes());
}

/// Encode an [`Image`] to a PNG byte stream (§4.3.1). Normalizes to 8-bit
/// gray/RGB/RGBA via [`Image::to_rgba8`] then drops the alpha channel when
/// the source never had one, to keep color type 0/2/6 only.
pub fn encode(image: &Image, stop: &dyn Stop) -> Result<Vec<u8>, ImageError> {
    let width = image.width();
    let height = image.height();
    let has_alpha = image.format().alpha.has_alpha();
    let is_gray = image.format().color_model == ColorModel::Gray;

    let (color_type, channels, pixels) = if is_gray && !has_alpha {
        (0u8, 1usize, gray_pixels(image, false))
    } else if is_gray && has_alpha {
        (4u8, 2usize, gray_pixels(image, true))
    } else {
        let rgba = image.to_rgba8();
        if has_alpha {
            (6u8, 4usize, rgba.into_data())
        } else {
            let data = rgba.data();
            let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
            for px in data.chunks_exact(4) {
                rgb.extend_from_slice(&px[0..3]);
            }
            (2u8, 3usize, rgb)
        }
    };

    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.push(8); // bit depth
    ihdr.push(color_type);
    ihdr.push(0); // compression method
    ihdr.push(0); // filter method
    ihdr.push(0); // interlace method

    let row_bytes = width as usize * channels;
    let mut filtered = Vec::with_capacity((row_bytes + 1) * height as usize);
    let mut prev_row = vec![0u8; row_bytes];
    for y in 0..height as usize {
        stop.check()?;
        let row = &pixels[y * row_bytes..(y + 1) * row_bytes];
        let (filter_type, out_row) = choose_filter(row, &prev_row, channels);
        filtered.push(filter_type);
        filtered.extend_from_slice(&out_row);
        prev_row = row.to_vec();
    }

    let compressed = zlib_compress(&filtered, DeflateLevel::Default);

    let mut out = Vec::with_capacity(SIGNATURE.len() + 8 + ihdr.len() + compressed.len() + 12 + 12);
    out.extend_from_slice(&SIGNATURE);
    write_chunk(&mut out, b"IHDR", &ihdr);
    write_chunk(&mut out, b"IDAT", &compressed);
    write_chunk(&mut out, b"IEND", &[]);
    Ok(out)
}

fn gray_pixels(image: &Image, with_alpha: bool) -> Vec<u8> {
    let width = image.width();
    let height = image.height();
    let bpp = image.format().bytes_per_pixel();
    let mut out = Vec::with_capacity(width as usize * height as usize * if with_alpha { 2 } else { 1 });
    for y in 0..height {
        let row = image.row(y);
        for x in 0..width as usize {
            let px = &row[x * bpp..x * bpp + bpp];
            out.push(px[0]);
            if with_alpha {
                out.push(*px.get(1).unwrap_or(&255));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelFormat;
    use crate::png::decode;

    #[test]
    fn roundtrip_2x2_rgba() {
        let pixels: Vec<u8> = vec![
            255, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 255,
        ];
        let img = Image::new(2, 2, PixelFormat::RGBA, pixels.clone()).unwrap();
        let encoded = encode(&img, &enough::Unstoppable).unwrap();
        assert_eq!(&encoded[0..8], &SIGNATURE);
        assert!(&encoded[encoded.len() - 12..encoded.len() - 8] == b"IEND");
        let decoded = decode::decode(&encoded, &enough::Unstoppable).unwrap();
        assert_eq!(decoded.width(), 2);
        assert_eq!(decoded.height(), 2);
        assert_eq!(decoded.data(), &pixels[..]);
    }

    #[test]
    fn roundtrip_gray_image() {
        let pixels = vec![0u8, 64, 128, 255];
        let img = Image::new(2, 2, PixelFormat::GRAY, pixels.clone()).unwrap();
        let encoded = encode(&img, &enough::Unstoppable).unwrap();
        let decoded = decode::decode(&encoded, &enough::Unstoppable).unwrap();
        assert_eq!(decoded.data(), &pixels[..]);
    }
}
