//! BMP encoder (§4.3.4): 24-bit BGR without alpha, 32-bit BGRA with
//! BITMAPV4HEADER color masks and `LCS_sRGB` colorspace tag when the source
//! has alpha and `preserve_alpha` is requested.

use enough::Stop;

use crate::error::ImageError;
use crate::image::Image;

const FILE_HEADER_SIZE: usize = 14;
const BITMAPINFOHEADER_SIZE: usize = 40;
const BITMAPV4HEADER_SIZE: usize = 108;

/// Encode an [`Image`] to a BMP byte stream. `preserve_alpha` selects the
/// 32-bit BGRA + BITMAPV4HEADER path when the source carries alpha;
/// otherwise (or when `preserve_alpha` is false) writes 24-bit BGR.
pub fn encode(image: &Image, preserve_alpha: bool, stop: &dyn Stop) -> Result<Vec<u8>, ImageError> {
    let use_alpha = preserve_alpha && image.format().alpha.has_alpha();
    if use_alpha {
        encode_32bit(image, stop)
    } else {
        encode_24bit(image, stop)
    }
}

fn encode_24bit(image: &Image, stop: &dyn Stop) -> Result<Vec<u8>, ImageError> {
    let width = image.width();
    let height = image.height();
    let row_stride = (width as usize * 3 + 3) & !3;
    let pixel_data_size = row_stride * height as usize;
    let pixel_offset = FILE_HEADER_SIZE + BITMAPINFOHEADER_SIZE;
    let file_size = pixel_offset + pixel_data_size;

    let mut out = Vec::with_capacity(file_size);
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_size as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(pixel_offset as u32).to_le_bytes());

    out.extend_from_slice(&(BITMAPINFOHEADER_SIZE as u32).to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // planes
    out.extend_from_slice(&24u16.to_le_bytes()); // bit count
    out.extend_from_slice(&0u32.to_le_bytes()); // BI_RGB
    out.extend_from_slice(&(pixel_data_size as u32).to_le_bytes());
    out.extend_from_slice(&2835i32.to_le_bytes()); // 72 DPI in pixels/meter
    out.extend_from_slice(&2835i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());

    let rgba = image.to_rgba8();
    for y in 0..height as usize {
        stop.check()?;
        // Bottom-up: the last source row is written first.
        let src_y = height as usize - 1 - y;
        let row = &rgba.data()[src_y * width as usize * 4..][..width as usize * 4];
        let mut written = 0usize;
        for px in row.chunks_exact(4) {
            out.push(px[2]);
            out.push(px[1]);
            out.push(px[0]);
            written += 3;
        }
        for _ in written..row_stride {
            out.push(0);
        }
    }
    Ok(out)
}

fn encode_32bit(image: &Image, stop: &dyn Stop) -> Result<Vec<u8>, ImageError> {
    let width = image.width();
    let height = image.height();
    let pixel_data_size = width as usize * 4 * height as usize;
    let pixel_offset = FILE_HEADER_SIZE + BITMAPV4HEADER_SIZE;
    let file_size = pixel_offset + pixel_data_size;

    let mut out = Vec::with_capacity(file_size);
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_size as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(pixel_offset as u32).to_le_bytes());

    out.extend_from_slice(&(BITMAPV4HEADER_SIZE as u32).to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&32u16.to_le_bytes());
    out.extend_from_slice(&3u32.to_le_bytes()); // BI_BITFIELDS
    out.extend_from_slice(&(pixel_data_size as u32).to_le_bytes());
    out.extend_from_slice(&2835i32.to_le_bytes());
    out.extend_from_slice(&2835i32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&0x00FF_0000u32.to_le_bytes()); // R
    out.extend_from_slice(&0x0000_FF00u32.to_le_bytes()); // G
    out.extend_from_slice(&0x0000_00FFu32.to_le_bytes()); // B
    out.extend_from_slice(&0xFF00_0000u32.to_le_bytes()); // A
    out.extend_from_slice(b"sRGB"); // LCS_sRGB colorspace tag (little-endian "BGRs" = 'sRGB' read back-to-front in the file, matching b"sRGB" as bytes)
    out.extend_from_slice(&[0u8; 36]); // CIEXYZTRIPLE endpoints, unused for sRGB
    out.extend_from_slice(&[0u8; 12]); // gamma R/G/B, unused for sRGB

    let rgba = image.to_rgba8();
    for y in 0..height as usize {
        stop.check()?;
        let src_y = height as usize - 1 - y;
        let row = &rgba.data()[src_y * width as usize * 4..][..width as usize * 4];
        for px in row.chunks_exact(4) {
            out.push(px[2]);
            out.push(px[1]);
            out.push(px[0]);
            out.push(px[3]);
        }
    }
    Ok(out)
}
