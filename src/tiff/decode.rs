use enough::Stop;

use super::tags::*;
use crate::error::ImageError;
use crate::image::{Image, PixelFormat};

struct Endian {
    little: bool,
}

impl Endian {
    fn u16(&self, b: &[u8]) -> u16 {
        if self.little {
            u16::from_le_bytes([b[0], b[1]])
        } else {
            u16::from_be_bytes([b[0], b[1]])
        }
    }

    fn u32(&self, b: &[u8]) -> u32 {
        if self.little {
            u32::from_le_bytes([b[0], b[1], b[2], b[3]])
        } else {
            u32::from_be_bytes([b[0], b[1], b[2], b[3]])
        }
    }
}

struct IfdEntry {
    tag: u16,
    field_type: u16,
    count: u32,
    value_offset: [u8; 4],
}

impl IfdEntry {
    fn as_u32(&self, e: &Endian) -> u32 {
        match self.field_type {
            TYPE_SHORT => e.u16(&self.value_offset[0..2]) as u32,
            _ => e.u32(&self.value_offset),
        }
    }

    fn resolved_offset(&self, e: &Endian) -> u32 {
        e.u32(&self.value_offset)
    }
}

fn read_ifd(buf: &[u8], offset: usize, e: &Endian) -> Result<(Vec<IfdEntry>, u32), ImageError> {
    if offset + 2 > buf.len() {
        return Err(ImageError::UnexpectedEof);
    }
    let count = e.u16(&buf[offset..offset + 2]) as usize;
    let entries_start = offset + 2;
    let entries_end = entries_start
        .checked_add(count * 12)
        .ok_or_else(|| ImageError::InvalidData("TIFF IFD entry count overflow".into()))?;
    if entries_end + 4 > buf.len() {
        return Err(ImageError::UnexpectedEof);
    }
    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let start = entries_start + i * 12;
        let tag = e.u16(&buf[start..start + 2]);
        let field_type = e.u16(&buf[start + 2..start + 4]);
        let cnt = e.u32(&buf[start + 4..start + 8]);
        let mut value_offset = [0u8; 4];
        value_offset.copy_from_slice(&buf[start + 8..start + 12]);
        entries.push(IfdEntry { tag, field_type, count: cnt, value_offset });
    }
    let next_ifd = e.u32(&buf[entries_end..entries_end + 4]);
    Ok((entries, next_ifd))
}

fn find<'a>(entries: &'a [IfdEntry], tag: u16) -> Option<&'a IfdEntry> {
    entries.iter().find(|e| e.tag == tag)
}

/// Decode the first IFD's image of a TIFF byte stream (§4.3.5, baseline
/// uncompressed strips only).
pub fn decode(buf: &[u8], stop: &dyn Stop) -> Result<Image, ImageError> {
    stop.check()?;
    if buf.len() < 8 {
        return Err(ImageError::UnexpectedEof);
    }
    let little = match &buf[0..4] {
        [0x49, 0x49, 0x2A, 0x00] => true,
        [0x4D, 0x4D, 0x00, 0x2A] => false,
        _ => return Err(ImageError::UnrecognizedFormat),
    };
    let e = Endian { little };
    let first_ifd = e.u32(&buf[4..8]) as usize;
    let (entries, _next) = read_ifd(buf, first_ifd, &e)?;

    let width = find(&entries, TAG_IMAGE_WIDTH)
        .ok_or_else(|| ImageError::InvalidHeader("missing ImageWidth".into()))?
        .as_u32(&e);
    let height = find(&entries, TAG_IMAGE_LENGTH)
        .ok_or_else(|| ImageError::InvalidHeader("missing ImageLength".into()))?
        .as_u32(&e);
    let compression = find(&entries, TAG_COMPRESSION).map(|v| v.as_u32(&e)).unwrap_or(1);
    if compression != 1 {
        return Err(ImageError::UnsupportedFeature(format!("TIFF compression {compression}")));
    }
    let samples_per_pixel = find(&entries, TAG_SAMPLES_PER_PIXEL).map(|v| v.as_u32(&e)).unwrap_or(1);
    let strip_offset = find(&entries, TAG_STRIP_OFFSETS)
        .ok_or_else(|| ImageError::InvalidHeader("missing StripOffsets".into()))?
        .resolved_offset(&e) as usize;
    let strip_byte_count = find(&entries, TAG_STRIP_BYTE_COUNTS)
        .map(|v| v.resolved_offset(&e) as usize)
        .unwrap_or(0);

    let format = match samples_per_pixel {
        3 => PixelFormat::RGB,
        4 => PixelFormat::RGBA,
        1 => PixelFormat::GRAY,
        n => return Err(ImageError::UnsupportedFeature(format!("TIFF samples/pixel {n}"))),
    };
    let needed = width as usize
        * height as usize
        * format.bytes_per_pixel();
    let available = strip_byte_count.max(needed);
    if strip_offset + needed > buf.len() {
        return Err(ImageError::UnexpectedEof);
    }
    let _ = available;
    let pixels = buf[strip_offset..strip_offset + needed].to_vec();
    Image::new(width, height, format, pixels)
}

/// Decode every page (IFD chain) of a multi-page TIFF.
pub fn decode_all(buf: &[u8], stop: &dyn Stop) -> Result<Vec<Image>, ImageError> {
    if buf.len() < 8 {
        return Err(ImageError::UnexpectedEof);
    }
    let little = match &buf[0..4] {
        [0x49, 0x49, 0x2A, 0x00] => true,
        [0x4D, 0x4D, 0x00, 0x2A] => false,
        _ => return Err(ImageError::UnrecognizedFormat),
    };
    let e = Endian { little };
    let mut offset = e.u32(&buf[4..8]) as usize;
    let mut images = Vec::new();
    loop {
        stop.check()?;
        let (entries, next) = read_ifd(buf, offset, &e)?;
        let width = find(&entries, TAG_IMAGE_WIDTH)
            .ok_or_else(|| ImageError::InvalidHeader("missing ImageWidth".into()))?
            .as_u32(&e);
        let height = find(&entries, TAG_IMAGE_LENGTH)
            .ok_or_else(|| ImageError::InvalidHeader("missing ImageLength".into()))?
            .as_u32(&e);
        let samples_per_pixel =
            find(&entries, TAG_SAMPLES_PER_PIXEL).map(|v| v.as_u32(&e)).unwrap_or(1);
        let strip_offset = find(&entries, TAG_STRIP_OFFSETS)
            .ok_or_else(|| ImageError::InvalidHeader("missing StripOffsets".into()))?
            .resolved_offset(&e) as usize;
        let format = match samples_per_pixel {
            3 => PixelFormat::RGB,
            4 => PixelFormat::RGBA,
            1 => PixelFormat::GRAY,
            n => return Err(ImageError::UnsupportedFeature(format!("TIFF samples/pixel {n}"))),
        };
        let needed = width as usize * height as usize * format.bytes_per_pixel();
        if strip_offset + needed > buf.len() {
            return Err(ImageError::UnexpectedEof);
        }
        let pixels = buf[strip_offset..strip_offset + needed].to_vec();
        images.push(Image::new(width, height, format, pixels)?);
        if next == 0 {
            break;
        }
        offset = next as usize;
    }
    Ok(images)
}
