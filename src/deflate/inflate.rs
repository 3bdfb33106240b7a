use super::huffman::{
    HuffmanDecoder, CODE_LENGTH_ORDER, DIST_BASE, DIST_EXTRA, LENGTH_BASE, LENGTH_EXTRA,
};
use crate::bitio::LsbBitReader;
use crate::error::ImageError;

/// Inflate a raw DEFLATE stream (no zlib wrapper). For all valid compressed
/// streams this never reads past the last byte; for all byte strings `s`,
/// `inflate(deflate(s)) == s`.
pub fn inflate(data: &[u8]) -> Result<Vec<u8>, ImageError> {
    let mut reader = LsbBitReader::new(data);
    let mut out = Vec::new();
    loop {
        let bfinal = reader.read_bits(1)?;
        let btype = reader.read_bits(2)?;
        match btype {
            0 => inflate_stored(&mut reader, &mut out)?,
            1 => inflate_huffman(&mut reader, &mut out, fixed_decoders()?)?,
            2 => {
                let decoders = read_dynamic_huffman_trees(&mut reader)?;
                inflate_huffman(&mut reader, &mut out, decoders)?;
            }
            _ => return Err(ImageError::InvalidData("reserved DEFLATE block type 3".into())),
        }
        if bfinal == 1 {
            break;
        }
    }
    Ok(out)
}

fn inflate_stored(reader: &mut LsbBitReader, out: &mut Vec<u8>) -> Result<(), ImageError> {
    reader.align_to_byte();
    let len = reader.read_aligned_bytes(2)?;
    let len = u16::from_le_bytes([len[0], len[1]]);
    let nlen = reader.read_aligned_bytes(2)?;
    let nlen = u16::from_le_bytes([nlen[0], nlen[1]]);
    if nlen != !len {
        return Err(ImageError::InvalidData("stored block LEN/NLEN mismatch".into()));
    }
    let bytes = reader.read_aligned_bytes(len as usize)?;
    out.extend_from_slice(bytes);
    Ok(())
}

struct Decoders {
    litlen: HuffmanDecoder,
    dist: HuffmanDecoder,
}

fn fixed_decoders() -> Result<Decoders, ImageError> {
    Ok(Decoders {
        litlen: HuffmanDecoder::from_lengths(&super::huffman::fixed_litlen_lengths())?,
        dist: HuffmanDecoder::from_lengths(&super::huffman::fixed_dist_lengths())?,
    })
}

fn read_dynamic_huffman_trees(reader: &mut LsbBitReader) -> Result<Decoders, ImageError> {
    let hlit = reader.read_bits(5)? as usize + 257;
    let hdist = reader.read_bits(5)? as usize + 1;
    let hclen = reader.read_bits(4)? as usize + 4;

    let mut cl_lengths = [0u8; 19];
    for &order_idx in CODE_LENGTH_ORDER.iter().take(hclen) {
        cl_lengths[order_idx] = reader.read_bits(3)? as u8;
    }
    let cl_decoder = HuffmanDecoder::from_lengths(&cl_lengths)?;

    let mut lengths = Vec::with_capacity(hlit + hdist);
    while lengths.len() < hlit + hdist {
        let sym = cl_decoder.decode(reader)?;
        match sym {
            0..=15 => lengths.push(sym as u8),
            16 => {
                let prev = *lengths.last().ok_or_else(|| {
                    ImageError::InvalidData("repeat code 16 with no previous length".into())
                })?;
                let count = 3 + reader.read_bits(2)?;
                for _ in 0..count {
                    lengths.push(prev);
                }
            }
            17 => {
                let count = 3 + reader.read_bits(3)?;
                for _ in 0..count {
                    lengths.push(0);
                }
            }
            18 => {
                let count = 11 + reader.read_bits(7)?;
                for _ in 0..count {
                    lengths.push(0);
                }
            }
            _ => return Err(ImageError::InvalidData("invalid code-length symbol".into())),
        }
    }
    if lengths.len() != hlit + hdist {
        return Err(ImageError::InvalidData("code length run overshot table size".into()));
    }
    let litlen = HuffmanDecoder::from_lengths(&lengths[..hlit])?;
    let dist = HuffmanDecoder::from_lengths(&lengths[hlit..])?;
    Ok(Decoders { litlen, dist })
}

fn inflate_huffman(
    reader: &mut LsbBitReader,
    out: &mut Vec<u8>,
    decoders: Decoders,
) -> Result<(), ImageError> {
    loop {
        let sym = decoders.litlen.decode(reader)?;
        match sym {
            0..=255 => out.push(sym as u8),
            256 => break,
            257..=285 => {
                let idx = (sym - 257) as usize;
                if idx >= LENGTH_BASE.len() {
                    return Err(ImageError::InvalidData("length symbol out of range".into()));
                }
                let length =
                    LENGTH_BASE[idx] as u32 + reader.read_bits(LENGTH_EXTRA[idx] as u32)?;
                let dist_sym = decoders.dist.decode(reader)? as usize;
                if dist_sym >= DIST_BASE.len() {
                    return Err(ImageError::InvalidData("distance symbol out of range".into()));
                }
                let distance =
                    DIST_BASE[dist_sym] as u32 + reader.read_bits(DIST_EXTRA[dist_sym] as u32)?;
                copy_match(out, length as usize, distance as usize)?;
            }
            _ => return Err(ImageError::InvalidData("invalid literal/length symbol".into())),
        }
    }
    Ok(())
}

/// Copy `length` bytes from `distance` bytes back, allowing overlap (LZ77's
/// run-length semantics: `output[start + i % distance]`).
fn copy_match(out: &mut Vec<u8>, length: usize, distance: usize) -> Result<(), ImageError> {
    if distance == 0 || distance > out.len() {
        return Err(ImageError::InvalidData("back-reference distance exceeds output".into()));
    }
    let start = out.len() - distance;
    out.reserve(length);
    for i in 0..length {
        let byte = out[start + i % distance];
        out.push(byte);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deflate::deflate_impl::{deflate, DeflateLevel};

    #[test]
    fn inflate_stored_roundtrip() {
        let data = b"hello, world!";
        let compressed = deflate(data, DeflateLevel::Stored);
        assert_eq!(inflate(&compressed).unwrap(), data);
    }

    #[test]
    fn inflate_fixed_huffman_roundtrip() {
        let data = b"aaaaaaaaaaaaaaaaaaaabbbbbbbbbbbbbbbbbbbbcccccccccccccccccccc";
        let compressed = deflate(data, DeflateLevel::Fast);
        assert_eq!(inflate(&compressed).unwrap(), data);
    }

    #[test]
    fn inflate_empty_input() {
        let compressed = deflate(b"", DeflateLevel::Stored);
        assert_eq!(inflate(&compressed).unwrap(), b"");
    }

    #[test]
    fn rejects_reserved_block_type() {
        // BFINAL=1, BTYPE=11 (reserved), rest zero padding.
        let data = [0b0000_0111u8];
        assert!(inflate(&data).is_err());
    }
}
