use enough::Stop;

use super::tags::*;
use crate::error::ImageError;
use crate::image::{ColorModel, Image};

struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    /// Either the inline 4-byte value, or raw bytes destined for the
    /// extra-data region (when longer than 4 bytes).
    data: Vec<u8>,
}

fn short_entry(tag: u16, value: u16) -> Entry {
    let mut data = vec![0u8; 4];
    data[0..2].copy_from_slice(&value.to_le_bytes());
    Entry { tag, field_type: TYPE_SHORT, count: 1, data }
}

fn long_entry(tag: u16, value: u32) -> Entry {
    Entry { tag, field_type: TYPE_LONG, count: 1, data: value.to_le_bytes().to_vec() }
}

fn short_array_entry(tag: u16, values: &[u16]) -> Entry {
    let mut data = Vec::with_capacity(values.len() * 2);
    for v in values {
        data.extend_from_slice(&v.to_le_bytes());
    }
    Entry { tag, field_type: TYPE_SHORT, count: values.len() as u32, data }
}

fn rational_entry(tag: u16, numerator: u32, denominator: u32) -> Entry {
    let mut data = Vec::with_capacity(8);
    data.extend_from_slice(&numerator.to_le_bytes());
    data.extend_from_slice(&denominator.to_le_bytes());
    Entry { tag, field_type: TYPE_RATIONAL, count: 1, data }
}

/// Lay out one page's IFD + extra-data + strip at `ifd_offset`, returning
/// the serialized bytes and the absolute offset one past the end of this
/// page (where the next page, if any, begins).
fn encode_page(image: &Image, ifd_offset: u32, next_ifd_offset: u32) -> (Vec<u8>, u32) {
    let width = image.width();
    let height = image.height();
    let has_alpha = image.format().alpha.has_alpha();
    let is_gray = image.format().color_model == ColorModel::Gray;

    let (samples, photometric, pixels) = if is_gray {
        (1u16, 1u16, gray_or_rgba_pixels(image, false))
    } else {
        let rgba = image.to_rgba8();
        if has_alpha {
            (4u16, 2u16, rgba.into_data())
        } else {
            let data = rgba.data();
            let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
            for px in data.chunks_exact(4) {
                rgb.extend_from_slice(&px[0..3]);
            }
            (3u16, 2u16, rgb)
        }
    };

    let bits_per_sample: Vec<u16> = vec![8; samples as usize];

    let mut entries = vec![
        long_entry(TAG_IMAGE_WIDTH, width),
        long_entry(TAG_IMAGE_LENGTH, height),
        short_array_entry(TAG_BITS_PER_SAMPLE, &bits_per_sample),
        short_entry(TAG_COMPRESSION, 1),
        short_entry(TAG_PHOTOMETRIC, photometric),
        // StripOffsets value is patched in below once the extra-data size
        // (and therefore the strip's absolute offset) is known.
        long_entry(TAG_STRIP_OFFSETS, 0),
        short_entry(TAG_SAMPLES_PER_PIXEL, samples),
        long_entry(TAG_ROWS_PER_STRIP, height),
        long_entry(TAG_STRIP_BYTE_COUNTS, pixels.len() as u32),
        rational_entry(TAG_X_RESOLUTION, 72, 1),
        rational_entry(TAG_Y_RESOLUTION, 72, 1),
        short_entry(TAG_RESOLUTION_UNIT, 2),
    ];
    if has_alpha {
        entries.push(short_entry(TAG_EXTRA_SAMPLES, 1));
    }
    entries.sort_by_key(|e| e.tag);

    let ifd_header_size = 2 + entries.len() * 12 + 4;
    let mut extra_data = Vec::new();
    let mut inline_values: Vec<[u8; 4]> = Vec::with_capacity(entries.len());
    for entry in &entries {
        if entry.data.len() <= 4 {
            let mut v = [0u8; 4];
            v[..entry.data.len()].copy_from_slice(&entry.data);
            inline_values.push(v);
        } else {
            let offset = ifd_offset + ifd_header_size as u32 + extra_data.len() as u32;
            extra_data.extend_from_slice(&entry.data);
            inline_values.push(offset.to_le_bytes());
        }
    }

    let strip_offset = ifd_offset + ifd_header_size as u32 + extra_data.len() as u32;
    let strip_offset_entry_idx = entries.iter().position(|e| e.tag == TAG_STRIP_OFFSETS).unwrap();
    inline_values[strip_offset_entry_idx] = strip_offset.to_le_bytes();

    let mut out = Vec::with_capacity(ifd_header_size + extra_data.len() + pixels.len());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (entry, value) in entries.iter().zip(&inline_values) {
        out.extend_from_slice(&entry.tag.to_le_bytes());
        out.extend_from_slice(&entry.field_type.to_le_bytes());
        out.extend_from_slice(&entry.count.to_le_bytes());
        out.extend_from_slice(value);
    }
    out.extend_from_slice(&next_ifd_offset.to_le_bytes());
    out.extend_from_slice(&extra_data);
    out.extend_from_slice(&pixels);

    let page_end = strip_offset + pixels.len() as u32;
    (out, page_end)
}

fn gray_or_rgba_pixels(image: &Image, _with_alpha: bool) -> Vec<u8> {
    let width = image.width();
    let height = image.height();
    let bpp = image.format().bytes_per_pixel();
    let mut out = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        let row = image.row(y);
        for x in 0..width as usize {
            out.push(row[x * bpp]);
        }
    }
    out
}

/// Encode one or more pages into a multi-page TIFF (§4.3.5). Always
/// little-endian, one IFD per page, chained by non-zero NextIFD offsets
/// ending in a zero offset on the last page.
pub fn encode(images: &[&Image], stop: &dyn Stop) -> Result<Vec<u8>, ImageError> {
    if images.is_empty() {
        return Err(ImageError::InvalidData("TIFF encode requires at least one page".into()));
    }
    let mut out = Vec::new();
    out.extend_from_slice(b"II\x2A\x00");
    let first_ifd_offset = 8u32;
    out.extend_from_slice(&first_ifd_offset.to_le_bytes());

    // Two-pass: page sizes depend only on their own pixel data, so offsets
    // can be computed sequentially in a single forward pass.
    let mut offset = first_ifd_offset;
    for (i, image) in images.iter().enumerate() {
        stop.check()?;
        let is_last = i == images.len() - 1;
        // Placeholder next-offset; patched below once this page's true end
        // is known (needed because encode_page must know its own start).
        let (page_bytes, page_end) = encode_page(image, offset, 0);
        let next_offset = if is_last { 0 } else { page_end };
        let (page_bytes, _) = if is_last {
            (page_bytes, page_end)
        } else {
            encode_page(image, offset, next_offset)
        };
        out.extend_from_slice(&page_bytes);
        offset = page_end;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelFormat;
    use crate::tiff::decode;

    #[test]
    fn roundtrip_single_page_rgb() {
        let pixels: Vec<u8> = (0..10 * 10 * 3).map(|i| (i % 256) as u8).collect();
        let img = Image::new(10, 10, PixelFormat::RGB, pixels.clone()).unwrap();
        let encoded = encode(&[&img], &enough::Unstoppable).unwrap();
        assert_eq!(&encoded[0..4], b"II\x2A\x00");
        let decoded = decode::decode(&encoded, &enough::Unstoppable).unwrap();
        assert_eq!(decoded.width(), 10);
        assert_eq!(decoded.height(), 10);
        assert_eq!(decoded.data(), &pixels[..]);
    }

    #[test]
    fn multi_page_chains_ifds_and_terminates_with_zero() {
        let mut pages = Vec::new();
        for v in [0u8, 64, 128] {
            pages.push(Image::new(10, 10, PixelFormat::RGB, vec![v; 10 * 10 * 3]).unwrap());
        }
        let refs: Vec<&Image> = pages.iter().collect();
        let encoded = encode(&refs, &enough::Unstoppable).unwrap();
        let decoded = decode::decode_all(&encoded, &enough::Unstoppable).unwrap();
        assert_eq!(decoded.len(), 3);
        for (page, expected) in decoded.iter().zip(&pages) {
            assert_eq!(page.data(), expected.data());
        }
    }
}
