use enough::Stop;

use super::dct;
use super::tables::ZIGZAG;
use crate::error::ImageError;
use crate::image::{Image, PixelFormat};

struct Component {
    id: u8,
    h: u8,
    v: u8,
    quant_table_id: u8,
}

struct FrameHeader {
    width: u32,
    height: u32,
    components: Vec<Component>,
}

struct HuffTable {
    /// codes[length - 1] = list of (code, symbol) for that bit length.
    codes: Vec<Vec<(u16, u8)>>,
}

fn build_huff_table(bits: &[u8; 16], values: &[u8]) -> HuffTable {
    let mut codes: Vec<Vec<(u16, u8)>> = vec![Vec::new(); 16];
    let mut code: u16 = 0;
    let mut value_idx = 0;
    for (len_idx, &count) in bits.iter().enumerate() {
        for _ in 0..count {
            codes[len_idx].push((code, values[value_idx]));
            value_idx += 1;
            code += 1;
        }
        code <<= 1;
    }
    HuffTable { codes }
}

/// MSB-first bit reader over the entropy-coded segment that transparently
/// destuffs `0xFF 0x00` and treats any other marker as end-of-data.
struct EntropyReader<'a> {
    data: &'a [u8],
    pos: usize,
    bit_buf: u32,
    bit_count: u32,
}

impl<'a> EntropyReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        EntropyReader { data, pos: 0, bit_buf: 0, bit_count: 0 }
    }

    fn next_byte(&mut self) -> Option<u8> {
        if self.pos >= self.data.len() {
            return None;
        }
        let b = self.data[self.pos];
        self.pos += 1;
        if b == 0xFF {
            if self.pos < self.data.len() && self.data[self.pos] == 0x00 {
                self.pos += 1;
            } else {
                // Any real marker ends the entropy-coded segment.
                self.pos = self.data.len();
                return None;
            }
        }
        Some(b)
    }

    fn read_bit(&mut self) -> Result<u32, ImageError> {
        if self.bit_count == 0 {
            let b = self.next_byte().ok_or(ImageError::UnexpectedEof)?;
            self.bit_buf = b as u32;
            self.bit_count = 8;
        }
        self.bit_count -= 1;
        Ok((self.bit_buf >> self.bit_count) & 1)
    }

    fn decode_huffman(&mut self, table: &HuffTable) -> Result<u8, ImageError> {
        let mut code: u16 = 0;
        for len in 0..16 {
            code = (code << 1) | self.read_bit()? as u16;
            for &(c, symbol) in &table.codes[len] {
                if c == code {
                    return Ok(symbol);
                }
            }
        }
        Err(ImageError::InvalidData("no matching Huffman code".into()))
    }

    fn receive_extend(&mut self, size: u8) -> Result<i32, ImageError> {
        if size == 0 {
            return Ok(0);
        }
        let mut value: i32 = 0;
        for _ in 0..size {
            value = (value << 1) | self.read_bit()? as i32;
        }
        let threshold = 1 << (size - 1);
        if value < threshold {
            value -= (1 << size) - 1;
        }
        Ok(value)
    }
}

/// Parse just enough of a JPEG to recover dimensions and component count
/// (§4.3.2's minimum decode contract), without requiring full entropy
/// decode. Returns `(width, height, component_count)`.
pub fn peek_properties(buf: &[u8]) -> Result<(u32, u32, usize), ImageError> {
    let frame = parse_frame_header(buf)?;
    Ok((frame.width, frame.height, frame.components.len()))
}

fn parse_frame_header(buf: &[u8]) -> Result<FrameHeader, ImageError> {
    if buf.len() < 4 || buf[0] != 0xFF || buf[1] != 0xD8 {
        return Err(ImageError::UnrecognizedFormat);
    }
    let mut pos = 2;
    while pos + 4 <= buf.len() {
        if buf[pos] != 0xFF {
            return Err(ImageError::InvalidData("expected marker".into()));
        }
        let marker = buf[pos + 1];
        pos += 2;
        if marker == 0xD8 || marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        if marker == 0xD9 {
            break;
        }
        if pos + 2 > buf.len() {
            return Err(ImageError::UnexpectedEof);
        }
        let len = u16::from_be_bytes([buf[pos], buf[pos + 1]]) as usize;
        if len < 2 || pos + len > buf.len() {
            return Err(ImageError::UnexpectedEof);
        }
        let segment = &buf[pos + 2..pos + len];
        if marker == 0xC0 {
            return parse_sof0_segment(segment);
        }
        if marker == 0xC2 {
            return Err(ImageError::UnsupportedFeature("progressive JPEG".into()));
        }
        pos += len;
    }
    Err(ImageError::InvalidHeader("no SOF0 marker found".into()))
}

fn parse_sof0_segment(segment: &[u8]) -> Result<FrameHeader, ImageError> {
    if segment.len() < 6 {
        return Err(ImageError::InvalidHeader("short SOF0".into()));
    }
    let height = u16::from_be_bytes([segment[1], segment[2]]) as u32;
    let width = u16::from_be_bytes([segment[3], segment[4]]) as u32;
    let count = segment[5] as usize;
    let mut components = Vec::with_capacity(count);
    for i in 0..count {
        let base = 6 + i * 3;
        if base + 3 > segment.len() {
            return Err(ImageError::InvalidHeader("short SOF0 component list".into()));
        }
        components.push(Component {
            id: segment[base],
            h: segment[base + 1] >> 4,
            v: segment[base + 1] & 0xF,
            quant_table_id: segment[base + 2],
        });
    }
    if width == 0 || height == 0 {
        return Err(ImageError::InvalidHeader("zero dimension".into()));
    }
    Ok(FrameHeader { width, height, components })
}

/// Full baseline decode. Only succeeds for 4:4:4 (all components sampled
/// 1x1) single-scan images; other subsampling ratios still resolve
/// dimensions via [`peek_properties`] but are rejected here.
pub fn decode(buf: &[u8], stop: &dyn Stop) -> Result<Image, ImageError> {
    if buf.len() < 4 || buf[0] != 0xFF || buf[1] != 0xD8 {
        return Err(ImageError::UnrecognizedFormat);
    }
    let mut pos = 2;
    let mut quant_tables: [[u16; 64]; 4] = [[1; 64]; 4];
    let mut dc_tables: Vec<Option<HuffTable>> = vec![None, None, None, None];
    let mut ac_tables: Vec<Option<HuffTable>> = vec![None, None, None, None];
    let mut frame: Option<FrameHeader> = None;

    loop {
        if pos + 2 > buf.len() {
            return Err(ImageError::UnexpectedEof);
        }
        if buf[pos] != 0xFF {
            return Err(ImageError::InvalidData("expected marker".into()));
        }
        let marker = buf[pos + 1];
        pos += 2;
        if marker == 0xD8 || marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        if marker == 0xD9 {
            return Err(ImageError::InvalidData("EOI before SOS".into()));
        }
        if pos + 2 > buf.len() {
            return Err(ImageError::UnexpectedEof);
        }
        let len = u16::from_be_bytes([buf[pos], buf[pos + 1]]) as usize;
        if len < 2 || pos + len > buf.len() {
            return Err(ImageError::UnexpectedEof);
        }
        let segment = &buf[pos + 2..pos + len];
        match marker {
            0xDB => parse_dqt(segment, &mut quant_tables)?,
            0xC4 => parse_dht(segment, &mut dc_tables, &mut ac_tables)?,
            0xC0 => frame = Some(parse_sof0_segment(segment)?),
            0xC2 => return Err(ImageError::UnsupportedFeature("progressive JPEG".into())),
            0xDA => {
                let frame = frame.ok_or_else(|| ImageError::InvalidHeader("SOS before SOF0".into()))?;
                if frame.components.iter().any(|c| c.h != 1 || c.v != 1) {
                    return Err(ImageError::UnsupportedFeature(
                        "chroma-subsampled JPEG full decode".into(),
                    ));
                }
                let scan_component_count = segment[0] as usize;
                let mut scan_dc = vec![0usize; scan_component_count];
                let mut scan_ac = vec![0usize; scan_component_count];
                let mut scan_order = Vec::with_capacity(scan_component_count);
                for i in 0..scan_component_count {
                    let cid = segment[1 + i * 2];
                    let sel = segment[2 + i * 2];
                    scan_dc[i] = (sel >> 4) as usize;
                    scan_ac[i] = (sel & 0xF) as usize;
                    let comp_idx = frame
                        .components
                        .iter()
                        .position(|c| c.id == cid)
                        .ok_or_else(|| ImageError::InvalidData("unknown scan component".into()))?;
                    scan_order.push(comp_idx);
                }
                let entropy_data = &buf[pos + len..];
                return decode_scan(
                    &frame,
                    entropy_data,
                    &quant_tables,
                    &dc_tables,
                    &ac_tables,
                    &scan_order,
                    &scan_dc,
                    &scan_ac,
                    stop,
                );
            }
            _ => {}
        }
        pos += len;
    }
}

fn parse_dqt(segment: &[u8], quant_tables: &mut [[u16; 64]; 4]) -> Result<(), ImageError> {
    let mut i = 0;
    while i < segment.len() {
        let pq_tq = segment[i];
        let precision = pq_tq >> 4;
        let id = (pq_tq & 0xF) as usize;
        i += 1;
        if id >= 4 {
            return Err(ImageError::InvalidData("quant table id out of range".into()));
        }
        let mut table_zigzag = [0u16; 64];
        for entry in table_zigzag.iter_mut() {
            if precision == 0 {
                *entry = *segment.get(i).ok_or(ImageError::UnexpectedEof)? as u16;
                i += 1;
            } else {
                let hi = *segment.get(i).ok_or(ImageError::UnexpectedEof)? as u16;
                let lo = *segment.get(i + 1).ok_or(ImageError::UnexpectedEof)? as u16;
                *entry = (hi << 8) | lo;
                i += 2;
            }
        }
        let mut natural = [0u16; 64];
        for (zz, &nat_pos) in ZIGZAG.iter().enumerate() {
            natural[nat_pos] = table_zigzag[zz];
        }
        quant_tables[id] = natural;
    }
    Ok(())
}

fn parse_dht(
    segment: &[u8],
    dc_tables: &mut [Option<HuffTable>],
    ac_tables: &mut [Option<HuffTable>],
) -> Result<(), ImageError> {
    let mut i = 0;
    while i < segment.len() {
        let tc_th = segment[i];
        let class = tc_th >> 4;
        let id = (tc_th & 0xF) as usize;
        i += 1;
        if i + 16 > segment.len() || id >= 4 {
            return Err(ImageError::UnexpectedEof);
        }
        let mut bits = [0u8; 16];
        bits.copy_from_slice(&segment[i..i + 16]);
        i += 16;
        let total: usize = bits.iter().map(|&b| b as usize).sum();
        if i + total > segment.len() {
            return Err(ImageError::UnexpectedEof);
        }
        let values = &segment[i..i + total];
        i += total;
        let table = build_huff_table(&bits, values);
        if class == 0 {
            dc_tables[id] = Some(table);
        } else {
            ac_tables[id] = Some(table);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn decode_scan(
    frame: &FrameHeader,
    entropy_data: &[u8],
    quant_tables: &[[u16; 64]; 4],
    dc_tables: &[Option<HuffTable>],
    ac_tables: &[Option<HuffTable>],
    scan_order: &[usize],
    scan_dc: &[usize],
    scan_ac: &[usize],
    stop: &dyn Stop,
) -> Result<Image, ImageError> {
    let width = frame.width;
    let height = frame.height;
    let blocks_w = width.div_ceil(8) as usize;
    let blocks_h = height.div_ceil(8) as usize;
    let n_components = frame.components.len();

    let mut planes: Vec<Vec<u8>> = vec![vec![0u8; blocks_w * 8 * blocks_h * 8]; n_components];
    let mut reader = EntropyReader::new(entropy_data);
    let mut pred_dc = vec![0i32; n_components];

    for by in 0..blocks_h {
        stop.check()?;
        for bx in 0..blocks_w {
            for (scan_i, &comp_idx) in scan_order.iter().enumerate() {
                let dc_table = dc_tables[scan_dc[scan_i]]
                    .as_ref()
                    .ok_or_else(|| ImageError::InvalidData("missing DC table".into()))?;
                let ac_table = ac_tables[scan_ac[scan_i]]
                    .as_ref()
                    .ok_or_else(|| ImageError::InvalidData("missing AC table".into()))?;
                let quant = &quant_tables[frame.components[comp_idx].quant_table_id as usize];

                let mut coeffs_zigzag = [0i32; 64];
                let size = reader.decode_huffman(dc_table)?;
                let diff = reader.receive_extend(size)?;
                pred_dc[comp_idx] += diff;
                coeffs_zigzag[0] = pred_dc[comp_idx];

                let mut k = 1;
                while k < 64 {
                    let rs = reader.decode_huffman(ac_table)?;
                    let run = rs >> 4;
                    let size = rs & 0xF;
                    if rs == 0x00 {
                        break; // EOB
                    }
                    if rs == 0xF0 {
                        k += 16;
                        continue;
                    }
                    k += run as usize;
                    if k >= 64 {
                        break;
                    }
                    coeffs_zigzag[k] = reader.receive_extend(size)?;
                    k += 1;
                }

                let mut coeffs_natural = [0f64; 64];
                for (zz, &nat_pos) in ZIGZAG.iter().enumerate() {
                    coeffs_natural[nat_pos] = (coeffs_zigzag[zz] * quant[nat_pos] as i32) as f64;
                }
                let samples = dct::inverse_dct_8x8(&coeffs_natural);

                let plane = &mut planes[comp_idx];
                for y in 0..8 {
                    for x in 0..8 {
                        let px = bx * 8 + x;
                        let py = by * 8 + y;
                        let value = (samples[y * 8 + x] as i32 + 128).clamp(0, 255) as u8;
                        plane[py * blocks_w * 8 + px] = value;
                    }
                }
            }
        }
    }

    let full_stride = blocks_w * 8;
    let mut out = vec![0u8; width as usize * height as usize * if n_components == 1 { 1 } else { 3 }];
    if n_components == 1 {
        for y in 0..height as usize {
            for x in 0..width as usize {
                out[y * width as usize + x] = planes[0][y * full_stride + x];
            }
        }
        Image::new(width, height, PixelFormat::GRAY, out)
    } else {
        for y in 0..height as usize {
            for x in 0..width as usize {
                let yv = planes[0][y * full_stride + x] as f32;
                let cb = planes[1][y * full_stride + x] as f32 - 128.0;
                let cr = planes[2][y * full_stride + x] as f32 - 128.0;
                let r = (yv + 1.402 * cr).round().clamp(0.0, 255.0) as u8;
                let g = (yv - 0.344136 * cb - 0.714136 * cr).round().clamp(0.0, 255.0) as u8;
                let b = (yv + 1.772 * cb).round().clamp(0.0, 255.0) as u8;
                let base = (y * width as usize + x) * 3;
                out[base] = r;
                out[base + 1] = g;
                out[base + 2] = b;
            }
        }
        Image::new(width, height, PixelFormat::RGB, out)
    }
}
