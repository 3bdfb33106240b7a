use enough::Stop;

use crate::error::ImageError;
use crate::image::{Image, PixelFormat};
use crate::lzw;

/// One decoded animation frame: RGBA pixels plus its display delay.
pub struct Frame {
    pub image: Image,
    pub delay_centiseconds: u16,
}

pub struct DecodedGif {
    pub width: u16,
    pub height: u16,
    pub frames: Vec<Frame>,
    pub loop_count: Option<u16>,
}

fn read_color_table(buf: &[u8], pos: &mut usize, entries: usize) -> Result<Vec<[u8; 3]>, ImageError> {
    let size = entries * 3;
    if *pos + size > buf.len() {
        return Err(ImageError::UnexpectedEof);
    }
    let table = buf[*pos..*pos + size].chunks_exact(3).map(|c| [c[0], c[1], c[2]]).collect();
    *pos += size;
    Ok(table)
}

fn read_sub_blocks(buf: &[u8], pos: &mut usize) -> Result<Vec<u8>, ImageError> {
    let mut data = Vec::new();
    loop {
        if *pos >= buf.len() {
            return Err(ImageError::UnexpectedEof);
        }
        let len = buf[*pos] as usize;
        *pos += 1;
        if len == 0 {
            break;
        }
        if *pos + len > buf.len() {
            return Err(ImageError::UnexpectedEof);
        }
        data.extend_from_slice(&buf[*pos..*pos + len]);
        *pos += len;
    }
    Ok(data)
}

/// Decode a full GIF byte stream (§4.3.3).
pub fn decode(buf: &[u8], stop: &dyn Stop) -> Result<DecodedGif, ImageError> {
    if buf.len() < 13 || (&buf[0..6] != b"GIF87a" && &buf[0..6] != b"GIF89a") {
        return Err(ImageError::UnrecognizedFormat);
    }
    let width = u16::from_le_bytes([buf[6], buf[7]]);
    let height = u16::from_le_bytes([buf[8], buf[9]]);
    let packed = buf[10];
    let has_gct = packed & 0x80 != 0;
    let gct_size = 2usize << (packed & 0x07);

    let mut pos = 13usize;
    let global_table = if has_gct { Some(read_color_table(buf, &mut pos, gct_size)?) } else { None };

    let mut frames = Vec::new();
    let mut loop_count = None;
    let mut pending_delay = 0u16;
    let mut pending_transparent: Option<u8> = None;

    loop {
        stop.check()?;
        if pos >= buf.len() {
            return Err(ImageError::UnexpectedEof);
        }
        let marker = buf[pos];
        pos += 1;
        match marker {
            0x3B => break, // trailer
            0x21 => {
                if pos >= buf.len() {
                    return Err(ImageError::UnexpectedEof);
                }
                let label = buf[pos];
                pos += 1;
                match label {
                    0xF9 => {
                        let data = read_sub_blocks(buf, &mut pos)?;
                        if data.len() >= 4 {
                            pending_delay = u16::from_le_bytes([data[1], data[2]]);
                            pending_transparent =
                                if data[0] & 0x01 != 0 { Some(data[3]) } else { None };
                        }
                    }
                    0xFF => {
                        // Application extension: NETSCAPE2.0 carries a loop
                        // count in its one sub-block, byte 0 = 1, bytes 1..3
                        // = count LE.
                        let data = read_sub_blocks(buf, &mut pos)?;
                        if data.len() >= 14 && &data[0..11] == b"NETSCAPE2.0" && data[11] == 1 {
                            loop_count = Some(u16::from_le_bytes([data[12], data[13]]));
                        } else if data.len() >= 3 && data[0] == 1 {
                            loop_count = Some(u16::from_le_bytes([data[1], data[2]]));
                        }
                    }
                    _ => {
                        read_sub_blocks(buf, &mut pos)?;
                    }
                }
            }
            0x2C => {
                if pos + 9 > buf.len() {
                    return Err(ImageError::UnexpectedEof);
                }
                let img_width = u16::from_le_bytes([buf[pos + 4], buf[pos + 5]]);
                let img_height = u16::from_le_bytes([buf[pos + 6], buf[pos + 7]]);
                let img_packed = buf[pos + 8];
                pos += 9;
                let has_lct = img_packed & 0x80 != 0;
                let lct_size = 2usize << (img_packed & 0x07);
                let local_table =
                    if has_lct { Some(read_color_table(buf, &mut pos, lct_size)?) } else { None };
                if pos >= buf.len() {
                    return Err(ImageError::UnexpectedEof);
                }
                let min_code_size = buf[pos];
                pos += 1;
                let compressed = read_sub_blocks(buf, &mut pos)?;
                let indices = lzw::decode(&compressed, min_code_size)?;

                let table = local_table
                    .as_ref()
                    .or(global_table.as_ref())
                    .ok_or_else(|| ImageError::InvalidData("no color table for frame".into()))?;

                let mut rgba = vec![0u8; img_width as usize * img_height as usize * 4];
                for (i, &idx) in indices.iter().take(rgba.len() / 4).enumerate() {
                    let color = table.get(idx as usize).copied().unwrap_or([0, 0, 0]);
                    let alpha = match pending_transparent {
                        Some(t) if t == idx => 0,
                        _ => 255,
                    };
                    rgba[i * 4] = color[0];
                    rgba[i * 4 + 1] = color[1];
                    rgba[i * 4 + 2] = color[2];
                    rgba[i * 4 + 3] = alpha;
                }
                let image = Image::new(img_width as u32, img_height as u32, PixelFormat::RGBA, rgba)?;
                frames.push(Frame { image, delay_centiseconds: pending_delay });
                pending_delay = 0;
                pending_transparent = None;
            }
            _ => return Err(ImageError::InvalidData(format!("unrecognized GIF block marker {marker:#x}"))),
        }
    }

    Ok(DecodedGif { width, height, frames, loop_count })
}
