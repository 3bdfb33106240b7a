use super::huffman::{build_encode_table, fixed_litlen_lengths};
use crate::bitio::LsbBitWriter;

/// Supported encoder policies. Level 0 emits stored blocks; level >= 1
/// emits a single fixed-Huffman block (literals only, no LZ77 matching —
/// §4.4.1 permits this and explicitly allows richer matchers as long as
/// the decoder's contract is not narrowed).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeflateLevel {
    Stored,
    Fast,
    Default,
    Best,
}

const MAX_STORED_BLOCK: usize = 65535;

pub fn deflate(data: &[u8], level: DeflateLevel) -> Vec<u8> {
    match level {
        DeflateLevel::Stored => deflate_stored(data),
        _ => deflate_fixed_huffman(data),
    }
}

fn deflate_stored(data: &[u8]) -> Vec<u8> {
    let mut writer = LsbBitWriter::new();
    if data.is_empty() {
        writer.write_bits(1, 1); // BFINAL
        writer.write_bits(0, 2); // BTYPE=00
        writer.align_to_byte();
        let mut out = writer.finish();
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&0xFFFFu16.to_le_bytes());
        return out;
    }
    let mut out = Vec::with_capacity(data.len() + data.len() / MAX_STORED_BLOCK.max(1) * 5 + 16);
    let chunks: Vec<&[u8]> = data.chunks(MAX_STORED_BLOCK).collect();
    for (i, chunk) in chunks.iter().enumerate() {
        let is_final = i == chunks.len() - 1;
        let mut writer = LsbBitWriter::new();
        writer.write_bits(is_final as u32, 1);
        writer.write_bits(0, 2);
        writer.align_to_byte();
        out.extend_from_slice(&writer.finish());
        let len = chunk.len() as u16;
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&(!len).to_le_bytes());
        out.extend_from_slice(chunk);
    }
    out
}

/// A single fixed-Huffman block covering the whole input: literals only,
/// terminated by the end-of-block symbol 256.
fn deflate_fixed_huffman(data: &[u8]) -> Vec<u8> {
    let table = build_encode_table(&fixed_litlen_lengths());
    let mut writer = LsbBitWriter::new();
    writer.write_bits(1, 1); // BFINAL
    writer.write_bits(1, 2); // BTYPE=01 fixed Huffman
    for &byte in data {
        write_symbol(&mut writer, &table, byte as usize);
    }
    write_symbol(&mut writer, &table, 256); // end of block
    writer.finish()
}

fn write_symbol(writer: &mut LsbBitWriter, table: &[(u32, u8)], symbol: usize) {
    let (code, len) = table[symbol];
    // Huffman codes are packed MSB-of-the-code first; write bits one at a
    // time in that order into the LSB-first bitstream.
    for i in (0..len as u32).rev() {
        writer.write_bits((code >> i) & 1, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deflate::inflate;

    #[test]
    fn stored_large_input_splits_into_65535_byte_blocks() {
        let data = vec![0x42u8; 200_000];
        let compressed = deflate_stored(&data);
        assert_eq!(inflate(&compressed).unwrap(), data);
    }

    #[test]
    fn fixed_huffman_roundtrips_all_byte_values() {
        let data: Vec<u8> = (0..=255u8).collect();
        let compressed = deflate_fixed_huffman(&data);
        assert_eq!(inflate(&compressed).unwrap(), data);
    }
}
