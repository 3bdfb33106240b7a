use enough::Stop;

use super::dct;
use super::tables::{
    build_codes, scale_quant_table, HuffSpec, BASE_CHROMA_QUANT, BASE_LUMA_QUANT, STD_AC_CHROMA,
    STD_AC_LUMA, STD_DC_CHROMA, STD_DC_LUMA, ZIGZAG,
};
use crate::bitio::MsbBitWriter;
use crate::error::ImageError;
use crate::image::Image;

fn write_marker(out: &mut Vec<u8>, marker: u8) {
    out.push(0xFF);
    out.push(marker);
}

fn write_segment(out: &mut Vec<u8>, marker: u8, payload: &[u8]) {
    write_marker(out, marker);
    let len = (payload.len() + 2) as u16;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(payload);
}

fn write_dqt(out: &mut Vec<u8>, id: u8, table: &[u16; 64]) {
    let mut payload = vec![id];
    for &nat_pos in &ZIGZAG {
        payload.push(table[nat_pos] as u8);
    }
    write_segment(out, 0xDB, &payload);
}

fn write_dht(out: &mut Vec<u8>, class: u8, id: u8, spec: &HuffSpec) {
    let mut payload = vec![(class << 4) | id];
    payload.extend_from_slice(&spec.bits);
    payload.extend_from_slice(spec.values);
    write_segment(out, 0xC4, &payload);
}

fn category_and_bits(value: i32) -> (u8, u32) {
    if value == 0 {
        return (0, 0);
    }
    let abs = value.unsigned_abs();
    let size = 32 - abs.leading_zeros();
    let bits = if value > 0 { value as u32 } else { (value - 1) as u32 & ((1 << size) - 1) };
    (size as u8, bits)
}

fn write_huffman(writer: &mut MsbBitWriter, codes: &[(u8, u16, u8)], symbol: u8) -> Result<(), ImageError> {
    let (_, code, length) = codes
        .iter()
        .find(|&&(s, _, _)| s == symbol)
        .copied()
        .ok_or_else(|| ImageError::InvalidData("symbol not in Huffman table".into()))?;
    writer.write_bits(code as u32, length as u32);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn encode_block(
    writer: &mut MsbBitWriter,
    block: &[i16; 64],
    quant_table: &[u16; 64],
    dc_codes: &[(u8, u16, u8)],
    ac_codes: &[(u8, u16, u8)],
    pred_dc: &mut i32,
) -> Result<(), ImageError> {
    let freq = dct::forward_dct_8x8(block);
    let quantized = dct::quantize(&freq, quant_table);
    let mut zigzag = [0i32; 64];
    for (zz, &nat_pos) in ZIGZAG.iter().enumerate() {
        zigzag[zz] = quantized[nat_pos];
    }

    let diff = zigzag[0] - *pred_dc;
    *pred_dc = zigzag[0];
    let (dc_size, dc_bits) = category_and_bits(diff);
    write_huffman(writer, dc_codes, dc_size)?;
    writer.write_bits(dc_bits, dc_size as u32);

    let mut run = 0u8;
    for &coeff in zigzag.iter().skip(1) {
        if coeff == 0 {
            run += 1;
            if run == 16 {
                write_huffman(writer, ac_codes, 0xF0)?;
                run = 0;
            }
            continue;
        }
        let (size, bits) = category_and_bits(coeff);
        write_huffman(writer, ac_codes, (run << 4) | size)?;
        writer.write_bits(bits, size as u32);
        run = 0;
    }
    if run > 0 {
        write_huffman(writer, ac_codes, 0x00)?;
    }
    Ok(())
}

fn level_shifted_block(plane: &[u8], plane_stride: usize, bx: usize, by: usize) -> [i16; 64] {
    let mut block = [0i16; 64];
    for y in 0..8 {
        for x in 0..8 {
            let px = (bx * 8 + x).min(plane_stride - 1);
            let py = by * 8 + y;
            let py = py.min(plane.len() / plane_stride - 1);
            block[y * 8 + x] = plane[py * plane_stride + px] as i16 - 128;
        }
    }
    block
}

/// Encode a baseline sequential 4:4:4 JPEG (§4.3.2) at the given quality
/// `[1, 100]`. Grayscale sources emit a single-component stream.
pub fn encode(image: &Image, quality: u8, stop: &dyn Stop) -> Result<Vec<u8>, ImageError> {
    let width = image.width();
    let height = image.height();
    let blocks_w = (width as usize).div_ceil(8);
    let blocks_h = (height as usize).div_ceil(8);
    let padded_w = blocks_w * 8;
    let padded_h = blocks_h * 8;

    let is_gray = image.format().color_model == crate::image::ColorModel::Gray
        && !image.format().alpha.has_alpha();

    let luma_quant = scale_quant_table(&BASE_LUMA_QUANT, quality);
    let chroma_quant = scale_quant_table(&BASE_CHROMA_QUANT, quality);

    let mut out = Vec::new();
    write_marker(&mut out, 0xD8);
    write_segment(
        &mut out,
        0xE0,
        &[b'J', b'F', b'I', b'F', 0, 1, 1, 0, 0, 1, 0, 1, 0, 0],
    );
    write_dqt(&mut out, 0, &luma_quant);
    if !is_gray {
        write_dqt(&mut out, 1, &chroma_quant);
    }

    let n_components: u8 = if is_gray { 1 } else { 3 };
    let mut sof = vec![8u8];
    sof.extend_from_slice(&(height as u16).to_be_bytes());
    sof.extend_from_slice(&(width as u16).to_be_bytes());
    sof.push(n_components);
    for id in 1..=n_components {
        let quant_id = if id == 1 { 0 } else { 1 };
        sof.extend_from_slice(&[id, 0x11, quant_id]);
    }
    write_segment(&mut out, 0xC0, &sof);

    write_dht(&mut out, 0, 0, &STD_DC_LUMA);
    write_dht(&mut out, 1, 0, &STD_AC_LUMA);
    if !is_gray {
        write_dht(&mut out, 0, 1, &STD_DC_CHROMA);
        write_dht(&mut out, 1, 1, &STD_AC_CHROMA);
    }

    let mut sos = vec![n_components];
    for id in 1..=n_components {
        let table_id = if id == 1 { 0x00 } else { 0x11 };
        sos.extend_from_slice(&[id, table_id]);
    }
    sos.extend_from_slice(&[0, 63, 0]);
    write_segment(&mut out, 0xDA, &sos);

    let dc_luma_codes = build_codes(&STD_DC_LUMA);
    let ac_luma_codes = build_codes(&STD_AC_LUMA);
    let dc_chroma_codes = build_codes(&STD_DC_CHROMA);
    let ac_chroma_codes = build_codes(&STD_AC_CHROMA);

    let planes: Vec<Vec<u8>> = if is_gray {
        vec![extract_gray_plane(image, padded_w, padded_h)]
    } else {
        extract_ycbcr_planes(image, padded_w, padded_h)
    };

    let mut writer = MsbBitWriter::new();
    let mut pred = vec![0i32; planes.len()];
    for by in 0..blocks_h {
        stop.check()?;
        for bx in 0..blocks_w {
            for (comp, plane) in planes.iter().enumerate() {
                let (quant, dc_codes, ac_codes) = if comp == 0 {
                    (&luma_quant, &dc_luma_codes, &ac_luma_codes)
                } else {
                    (&chroma_quant, &dc_chroma_codes, &ac_chroma_codes)
                };
                let block = level_shifted_block(plane, padded_w, bx, by);
                encode_block(&mut writer, &block, quant, dc_codes, ac_codes, &mut pred[comp])?;
            }
        }
    }
    out.extend_from_slice(&writer.into_bytes());
    write_marker(&mut out, 0xD9);
    Ok(out)
}

fn extract_gray_plane(image: &Image, padded_w: usize, padded_h: usize) -> Vec<u8> {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let bpp = image.format().bytes_per_pixel();
    let mut plane = vec![0u8; padded_w * padded_h];
    for y in 0..padded_h {
        let src_y = y.min(height - 1);
        let row = image.row(src_y as u32);
        for x in 0..padded_w {
            let src_x = x.min(width - 1);
            plane[y * padded_w + x] = row[src_x * bpp];
        }
    }
    plane
}

fn extract_ycbcr_planes(image: &Image, padded_w: usize, padded_h: usize) -> Vec<Vec<u8>> {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let rgba = image.to_rgba8();
    let mut y_plane = vec![0u8; padded_w * padded_h];
    let mut cb_plane = vec![0u8; padded_w * padded_h];
    let mut cr_plane = vec![0u8; padded_w * padded_h];
    for y in 0..padded_h {
        let src_y = y.min(height - 1);
        for x in 0..padded_w {
            let src_x = x.min(width - 1);
            let idx = (src_y * width + src_x) * 4;
            let r = rgba.data()[idx] as f32;
            let g = rgba.data()[idx + 1] as f32;
            let b = rgba.data()[idx + 2] as f32;
            let yv = 0.299 * r + 0.587 * g + 0.114 * b;
            let cb = 128.0 - 0.168736 * r - 0.331264 * g + 0.5 * b;
            let cr = 128.0 + 0.5 * r - 0.418688 * g - 0.081312 * b;
            let out_idx = y * padded_w + x;
            y_plane[out_idx] = yv.round().clamp(0.0, 255.0) as u8;
            cb_plane[out_idx] = cb.round().clamp(0.0, 255.0) as u8;
            cr_plane[out_idx] = cr.round().clamp(0.0, 255.0) as u8;
        }
    }
    vec![y_plane, cb_plane, cr_plane]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelFormat;
    use crate::jpeg::decode;

    #[test]
    fn encoded_stream_has_soi_and_eoi() {
        let img = Image::new(16, 16, PixelFormat::RGB, vec![128u8; 16 * 16 * 3]).unwrap();
        let encoded = encode(&img, 80, &enough::Unstoppable).unwrap();
        assert_eq!(&encoded[0..2], &[0xFF, 0xD8]);
        assert_eq!(&encoded[encoded.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn header_roundtrips_dimensions() {
        let img = Image::new(33, 17, PixelFormat::RGB, vec![10u8; 33 * 17 * 3]).unwrap();
        let encoded = encode(&img, 50, &enough::Unstoppable).unwrap();
        let (w, h, comps) = decode::peek_properties(&encoded).unwrap();
        assert_eq!((w, h, comps), (33, 17, 3));
    }

    #[test]
    fn flat_color_block_decodes_close_to_original() {
        let img = Image::new(8, 8, PixelFormat::RGB, vec![200u8, 100, 50].repeat(64)).unwrap();
        let encoded = encode(&img, 90, &enough::Unstoppable).unwrap();
        let decoded = decode::decode(&encoded, &enough::Unstoppable).unwrap();
        let original = img.data();
        let result = decoded.data();
        for (a, b) in original.iter().zip(result.iter()) {
            assert!((*a as i32 - *b as i32).abs() <= 6, "expected close match, got {a} vs {b}");
        }
    }

    #[test]
    fn grayscale_roundtrip_decodes_single_component() {
        let img = Image::new(8, 8, PixelFormat::GRAY, vec![77u8; 64]).unwrap();
        let encoded = encode(&img, 85, &enough::Unstoppable).unwrap();
        let decoded = decode::decode(&encoded, &enough::Unstoppable).unwrap();
        assert_eq!(decoded.format().color_model, crate::image::ColorModel::Gray);
        for (a, b) in img.data().iter().zip(decoded.data().iter()) {
            assert!((*a as i32 - *b as i32).abs() <= 6);
        }
    }
}
