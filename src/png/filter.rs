//! PNG per-row filters (§4.3.1): None/Sub/Up/Average/Paeth, reversed on
//! decode and chosen per-row on encode to minimize the sum of signed
//! absolute byte values.

/// Paeth predictor: predicts from left (`a`), above (`b`), and above-left
/// (`c`), picking whichever of the three is closest to `a + b - c`.
fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i32 + b as i32 - c as i32;
    let pa = (p - a as i32).abs();
    let pb = (p - b as i32).abs();
    let pc = (p - c as i32).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Undo a single filtered row in place. `prev` is the previous
/// (already-unfiltered) row, or a zero-filled slice of the same length for
/// the first row of the image.
pub fn unfilter_row(filter_type: u8, row: &mut [u8], prev: &[u8], bpp: usize) -> Result<(), String> {
    match filter_type {
        0 => {}
        1 => {
            for i in bpp..row.len() {
                row[i] = row[i].wrapping_add(row[i - bpp]);
            }
        }
        2 => {
            for i in 0..row.len() {
                row[i] = row[i].wrapping_add(prev[i]);
            }
        }
        3 => {
            for i in 0..row.len() {
                let a = if i >= bpp { row[i - bpp] as u32 } else { 0 };
                let b = prev[i] as u32;
                row[i] = row[i].wrapping_add(((a + b) / 2) as u8);
            }
        }
        4 => {
            for i in 0..row.len() {
                let a = if i >= bpp { row[i - bpp] } else { 0 };
                let b = prev[i];
                let c = if i >= bpp { prev[i - bpp] } else { 0 };
                row[i] = row[i].wrapping_add(paeth(a, b, c));
            }
        }
        _ => return Err(format!("unrecognized PNG filter type {filter_type}")),
    }
    Ok(())
}

/// Apply all five filters to a row and return the one whose filtered bytes
/// minimize the sum of signed-absolute values (§4.3.1's encode heuristic),
/// along with its filter-type byte.
pub fn choose_filter(row: &[u8], prev: &[u8], bpp: usize) -> (u8, Vec<u8>) {
    let mut best_type = 0u8;
    let mut best_out = apply_filter(0, row, prev, bpp);
    let mut best_score = score(&best_out);
    for ft in 1..=4u8 {
        let out = apply_filter(ft, row, prev, bpp);
        let s = score(&out);
        if s < best_score {
            best_score = s;
            best_type = ft;
            best_out = out;
        }
    }
    (best_type, best_out)
}

fn score(bytes: &[u8]) -> i64 {
    bytes.iter().map(|&b| (b as i8 as i64).abs()).sum()
}

fn apply_filter(filter_type: u8, row: &[u8], prev: &[u8], bpp: usize) -> Vec<u8> {
    let mut out = vec![0u8; row.len()];
    match filter_type {
        0 => out.copy_from_slice(row),
        1 => {
            for i in 0..row.len() {
                let a = if i >= bpp { row[i - bpp] } else { 0 };
                out[i] = row[i].wrapping_sub(a);
            }
        }
        2 => {
            for i in 0..row.len() {
                out[i] = row[i].wrapping_sub(prev[i]);
            }
        }
        3 => {
            for i in 0..row.len() {
                let a = if i >= bpp { row[i - bpp] as u32 } else { 0 };
                let b = prev[i] as u32;
                out[i] = row[i].wrapping_sub(((a + b) / 2) as u8);
            }
        }
        4 => {
            for i in 0..row.len() {
                let a = if i >= bpp { row[i - bpp] } else { 0 };
                let b = prev[i];
                let c = if i >= bpp { prev[i - bpp] } else { 0 };
                out[i] = row[i].wrapping_sub(paeth(a, b, c));
            }
        }
        _ => unreachable!(),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_filter_roundtrips() {
        let prev = vec![0u8; 6];
        let row = vec![10u8, 20, 30, 40, 50, 60];
        let (ft, mut filtered) = apply_with_type(1, &row, &prev, 3);
        unfilter_row(ft, &mut filtered, &prev, 3).unwrap();
        assert_eq!(filtered, row);
    }

    #[test]
    fn paeth_filter_roundtrips() {
        let prev = vec![5u8, 6, 7, 8, 9, 10];
        let row = vec![10u8, 20, 30, 40, 50, 60];
        let (ft, mut filtered) = apply_with_type(4, &row, &prev, 3);
        unfilter_row(ft, &mut filtered, &prev, 3).unwrap();
        assert_eq!(filtered, row);
    }

    fn apply_with_type(ft: u8, row: &[u8], prev: &[u8], bpp: usize) -> (u8, Vec<u8>) {
        (ft, apply_filter(ft, row, prev, bpp))
    }
}
