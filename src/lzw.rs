//! GIF-style variable-width LZW (§4.4.2): code size starts at
//! `min_code_size + 1` bits, clear code = `1 << min_code_size`,
//! end-of-information = clear + 1, first data code = clear + 2. Output is
//! packed LSB-first into 255-byte sub-blocks, each preceded by a length
//! byte (the GIF sub-block framing, left to the caller of `encode`).

use std::collections::HashMap;

use crate::bitio::LsbBitReader;
use crate::error::ImageError;

const MAX_CODE_BITS: u32 = 12;
const MAX_DICT_SIZE: usize = 1 << MAX_CODE_BITS;

/// Encode indexed pixel data to a raw LSB-packed LZW bitstream (no GIF
/// sub-block framing — the GIF encoder wraps this in 255-byte blocks).
pub fn encode(indices: &[u8], min_code_size: u8) -> Vec<u8> {
    let clear_code = 1u32 << min_code_size;
    let eoi_code = clear_code + 1;
    let mut next_code = clear_code + 2;
    let mut code_width = min_code_size as u32 + 1;

    let mut writer = crate::bitio::LsbBitWriter::new();
    writer.write_bits(clear_code, code_width);

    let mut dict: HashMap<Vec<u8>, u32> = HashMap::new();
    let reset_dict = |dict: &mut HashMap<Vec<u8>, u32>| {
        dict.clear();
        for i in 0..clear_code {
            dict.insert(vec![i as u8], i);
        }
    };
    reset_dict(&mut dict);

    if indices.is_empty() {
        writer.write_bits(eoi_code, code_width);
        return writer.finish();
    }

    let mut current = vec![indices[0]];
    for &index in &indices[1..] {
        let mut extended = current.clone();
        extended.push(index);
        if dict.contains_key(&extended) {
            current = extended;
        } else {
            let code = dict[&current];
            writer.write_bits(code, code_width);

            if next_code < MAX_DICT_SIZE as u32 {
                dict.insert(extended, next_code);
                next_code += 1;
                if next_code >= (1u32 << code_width) && code_width < MAX_CODE_BITS {
                    code_width += 1;
                }
            } else {
                writer.write_bits(clear_code, code_width);
                reset_dict(&mut dict);
                next_code = clear_code + 2;
                code_width = min_code_size as u32 + 1;
            }
            current = vec![index];
        }
    }
    let code = dict[&current];
    writer.write_bits(code, code_width);
    writer.write_bits(eoi_code, code_width);
    writer.finish()
}

/// Decode a raw LSB-packed LZW bitstream back to indexed pixel bytes.
pub fn decode(data: &[u8], min_code_size: u8) -> Result<Vec<u8>, ImageError> {
    let clear_code = 1u32 << min_code_size;
    let eoi_code = clear_code + 1;
    let mut code_width = min_code_size as u32 + 1;

    let mut reader = LsbBitReader::new(data);
    let mut dict: Vec<Vec<u8>> = Vec::new();
    let reset_dict = |dict: &mut Vec<Vec<u8>>| {
        dict.clear();
        for i in 0..clear_code {
            dict.push(vec![i as u8]);
        }
        dict.push(Vec::new()); // clear code placeholder
        dict.push(Vec::new()); // eoi code placeholder
    };
    reset_dict(&mut dict);

    let mut out = Vec::new();
    let mut prev: Option<Vec<u8>> = None;

    loop {
        let code = reader.read_bits(code_width)?;
        if code == clear_code {
            reset_dict(&mut dict);
            code_width = min_code_size as u32 + 1;
            prev = None;
            continue;
        }
        if code == eoi_code {
            break;
        }
        let entry = if (code as usize) < dict.len() {
            dict[code as usize].clone()
        } else if code as usize == dict.len() {
            // KwKwK case: code for a not-yet-emitted entry equals dict.len().
            let mut prev_entry = prev.clone().ok_or_else(|| {
                ImageError::InvalidData("LZW code referenced before any data".into())
            })?;
            let first = prev_entry[0];
            prev_entry.push(first);
            prev_entry
        } else {
            return Err(ImageError::InvalidData("LZW code out of range".into()));
        };
        out.extend_from_slice(&entry);

        if let Some(mut prev_entry) = prev.clone() {
            if dict.len() < MAX_DICT_SIZE {
                prev_entry.push(entry[0]);
                dict.push(prev_entry);
                if dict.len() >= (1usize << code_width) && code_width < MAX_CODE_BITS {
                    code_width += 1;
                }
            }
        }
        prev = Some(entry);
        if reader.is_exhausted() {
            // Tolerate a stream lacking an explicit EOI code once input runs dry.
            break;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_repeated_pattern() {
        let indices: Vec<u8> = (0..200).map(|i| (i % 4) as u8).collect();
        let encoded = encode(&indices, 2);
        let decoded = decode(&encoded, 2).unwrap();
        assert_eq!(decoded, indices);
    }

    #[test]
    fn roundtrip_single_pixel() {
        let indices = vec![3u8];
        let encoded = encode(&indices, 8);
        let decoded = decode(&encoded, 8).unwrap();
        assert_eq!(decoded, indices);
    }

    #[test]
    fn roundtrip_dictionary_grows_past_initial_width() {
        let mut indices = Vec::new();
        for i in 0..512u32 {
            indices.push((i % 8) as u8);
            indices.push(((i / 8) % 8) as u8);
        }
        let encoded = encode(&indices, 3);
        let decoded = decode(&encoded, 3).unwrap();
        assert_eq!(decoded, indices);
    }
}
