use enough::Stop;

use super::filter::unfilter_row;
use crate::checksum::crc32;
use crate::deflate::zlib_decompress;
use crate::error::ImageError;
use crate::image::{ColorModel, Image, PixelFormat};

const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

struct Chunk<'a> {
    kind: [u8; 4],
    data: &'a [u8],
}

fn parse_chunks(buf: &[u8]) -> Result<Vec<Chunk<'_>>, ImageError> {
    let mut chunks = Vec::new();
    let mut pos = 8;
    loop {
        if pos + 8 > buf.len() {
            return Err(ImageError::UnexpectedEof);
        }
        let len = u32::from_be_bytes(buf[pos..pos + 4].try_into().unwrap()) as usize;
        let kind: [u8; 4] = buf[pos + 4..pos + 8].try_into().unwrap();
        let data_start = pos + 8;
        let data_end = data_start
            .checked_add(len)
            .ok_or_else(|| ImageError::InvalidData("PNG chunk length overflow".into()))?;
        if data_end + 4 > buf.len() {
            return Err(ImageError::UnexpectedEof);
        }
        let data = &buf[data_start..data_end];
        let stored_crc = u32::from_be_bytes(buf[data_end..data_end + 4].try_into().unwrap());
        let mut crc_input = Vec::with_capacity(4 + len);
        crc_input.extend_from_slice(&kind);
        crc_input.extend_from_slice(data);
        let actual_crc = crc32(&crc_input);
        if actual_crc != stored_crc {
            return Err(ImageError::ChecksumMismatch { expected: stored_crc, actual: actual_crc });
        }
        let is_end = &kind == b"IEND";
        chunks.push(Chunk { kind, data });
        if is_end {
            break;
        }
        pos = data_end + 4;
    }
    Ok(chunks)
}

struct Ihdr {
    width: u32,
    height: u32,
    bit_depth: u8,
    color_type: u8,
}

fn parse_ihdr(data: &[u8]) -> Result<Ihdr, ImageError> {
    if data.len() < 13 {
        return Err(ImageError::InvalidHeader("IHDR too short".into()));
    }
    let width = u32::from_be_bytes(data[0..4].try_into().unwrap());
    let height = u32::from_be_bytes(data[4..8].try_into().unwrap());
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidHeader("zero dimension".into()));
    }
    let bit_depth = data[8];
    let color_type = data[9];
    let interlace = data[12];
    if interlace != 0 {
        return Err(ImageError::UnsupportedFeature("PNG interlacing".into()));
    }
    Ok(Ihdr { width, height, bit_depth, color_type })
}

fn channels_for_color_type(color_type: u8) -> Result<usize, ImageError> {
    match color_type {
        0 => Ok(1), // gray
        2 => Ok(3), // rgb
        3 => Ok(1), // palette (index)
        4 => Ok(2), // gray+alpha
        6 => Ok(4), // rgba
        _ => Err(ImageError::InvalidData(format!("unrecognized PNG color type {color_type}"))),
    }
}

/// Decode a full PNG byte stream to an [`Image`] (§4.3.1).
pub fn decode(buf: &[u8], stop: &dyn Stop) -> Result<Image, ImageError> {
    if buf.len() < 8 || buf[0..8] != SIGNATURE {
        return Err(ImageError::UnrecognizedFormat);
    }
    let chunks = parse_chunks(buf)?;

    let ihdr_chunk = chunks
        .iter()
        .find(|c| &c.kind == b"IHDR")
        .ok_or_else(|| ImageError::InvalidHeader("missing IHDR".into()))?;
    let ihdr = parse_ihdr(ihdr_chunk.data)?;
    if ihdr.bit_depth != 8 {
        return Err(ImageError::UnsupportedFeature(format!("PNG bit depth {}", ihdr.bit_depth)));
    }

    let mut idat = Vec::new();
    let mut palette: Option<Vec<[u8; 3]>> = None;
    let mut trns: Option<Vec<u8>> = None;
    for chunk in &chunks {
        match &chunk.kind {
            b"IDAT" => idat.extend_from_slice(chunk.data),
            b"PLTE" => {
                palette = Some(chunk.data.chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect());
            }
            b"tRNS" => trns = Some(chunk.data.to_vec()),
            b"IHDR" | b"IEND" | b"gAMA" | b"cHRM" | b"pHYs" => {}
            other => {
                // Unknown ancillary chunks (lowercase first letter of the
                // type) are skipped; unknown critical chunks are an error.
                if other[0].is_ascii_uppercase() {
                    return Err(ImageError::InvalidData(format!(
                        "unrecognized critical chunk {:?}",
                        String::from_utf8_lossy(other)
                    )));
                }
            }
        }
    }

    if ihdr.color_type == 3 && palette.is_none() {
        return Err(ImageError::InvalidHeader("palette color type without PLTE".into()));
    }

    let raw = zlib_decompress(&idat)?;
    let src_channels = channels_for_color_type(ihdr.color_type)?;
    let row_bytes = ihdr.width as usize * src_channels;
    let mut rows: Vec<u8> = Vec::with_capacity(row_bytes * ihdr.height as usize);
    let mut prev_row = vec![0u8; row_bytes];
    let mut pos = 0usize;
    for _ in 0..ihdr.height {
        stop.check()?;
        if pos >= raw.len() {
            return Err(ImageError::UnexpectedEof);
        }
        let filter_type = raw[pos];
        pos += 1;
        if pos + row_bytes > raw.len() {
            return Err(ImageError::UnexpectedEof);
        }
        let mut row = raw[pos..pos + row_bytes].to_vec();
        pos += row_bytes;
        unfilter_row(filter_type, &mut row, &prev_row, src_channels)
            .map_err(ImageError::InvalidData)?;
        rows.extend_from_slice(&row);
        prev_row = row;
    }

    let (format, pixels) = match ihdr.color_type {
        0 => (PixelFormat::GRAY, rows),
        4 => (PixelFormat::GRAY_ALPHA, rows),
        2 => (PixelFormat::RGB, rows),
        6 => (PixelFormat::RGBA, rows),
        3 => {
            let palette = palette.unwrap();
            let mut out = Vec::with_capacity(rows.len() * 3);
            for &idx in &rows {
                let color = palette.get(idx as usize).copied().unwrap_or([0, 0, 0]);
                out.extend_from_slice(&color);
            }
            if let Some(trns) = &trns {
                let mut rgba = Vec::with_capacity(rows.len() * 4);
                for (i, &idx) in rows.iter().enumerate() {
                    let c = &out[i * 3..i * 3 + 3];
                    let a = trns.get(idx as usize).copied().unwrap_or(255);
                    rgba.extend_from_slice(c);
                    rgba.push(a);
                }
                (PixelFormat::RGBA, rgba)
            } else {
                (PixelFormat::RGB, out)
            }
        }
        _ => unreachable!(),
    };

    Image::new(ihdr.width, ihdr.height, format, pixels)
}

/// Extract dimensions/color-model without fully decompressing pixel data
/// (used by the source handle's cheap `properties()` path).
pub fn peek_properties(buf: &[u8]) -> Result<(u32, u32, ColorModel, bool), ImageError> {
    if buf.len() < 8 || buf[0..8] != SIGNATURE {
        return Err(ImageError::UnrecognizedFormat);
    }
    let chunks = parse_chunks(buf)?;
    let ihdr_chunk = chunks
        .iter()
        .find(|c| &c.kind == b"IHDR")
        .ok_or_else(|| ImageError::InvalidHeader("missing IHDR".into()))?;
    let ihdr = parse_ihdr(ihdr_chunk.data)?;
    let (model, alpha) = match ihdr.color_type {
        0 => (ColorModel::Gray, false),
        4 => (ColorModel::Gray, true),
        2 | 3 => (ColorModel::Rgb, false),
        6 => (ColorModel::Rgb, true),
        _ => return Err(ImageError::InvalidData("unrecognized color type".into())),
    };
    Ok((ihdr.width, ihdr.height, model, alpha))
}
