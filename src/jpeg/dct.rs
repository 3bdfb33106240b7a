//! Forward 8x8 DCT-II over a level-shifted block (§4.3.2). A direct
//! separable implementation; not the fast AAN/Loeffler variant, but exact.

use std::f64::consts::PI;

fn basis() -> [[f64; 8]; 8] {
    let mut table = [[0f64; 8]; 8];
    for (u, row) in table.iter_mut().enumerate() {
        for (x, cell) in row.iter_mut().enumerate() {
            *cell = ((2.0 * x as f64 + 1.0) * u as f64 * PI / 16.0).cos();
        }
    }
    table
}

fn alpha(u: usize) -> f64 {
    if u == 0 {
        1.0 / std::f64::consts::SQRT_2
    } else {
        1.0
    }
}

/// Forward DCT on a row-major 8x8 block of level-shifted samples
/// (`[-128, 127]`), producing unquantized frequency coefficients.
pub fn forward_dct_8x8(block: &[i16; 64]) -> [f64; 64] {
    let cos = basis();
    let mut out = [0f64; 64];
    for v in 0..8 {
        for u in 0..8 {
            let mut sum = 0f64;
            for y in 0..8 {
                for x in 0..8 {
                    sum += block[y * 8 + x] as f64 * cos[u][x] * cos[v][y];
                }
            }
            out[v * 8 + u] = 0.25 * alpha(u) * alpha(v) * sum;
        }
    }
    out
}

/// Quantize a forward-DCT output block by `table` (in natural, not
/// zig-zag, order), rounding to nearest integer.
pub fn quantize(block: &[f64; 64], table: &[u16; 64]) -> [i32; 64] {
    let mut out = [0i32; 64];
    for i in 0..64 {
        out[i] = (block[i] / table[i] as f64).round() as i32;
    }
    out
}

/// Inverse DCT-II (the decode side), producing level-shifted samples from
/// dequantized coefficients in natural (not zig-zag) order.
pub fn inverse_dct_8x8(coeffs: &[f64; 64]) -> [i16; 64] {
    let cos = basis();
    let mut out = [0i16; 64];
    for y in 0..8 {
        for x in 0..8 {
            let mut sum = 0f64;
            for v in 0..8 {
                for u in 0..8 {
                    sum += alpha(u) * alpha(v) * coeffs[v * 8 + u] * cos[u][x] * cos[v][y];
                }
            }
            let sample = (0.25 * sum).round() as i32;
            out[y * 8 + x] = sample.clamp(-128, 127) as i16;
        }
    }
    out
}
