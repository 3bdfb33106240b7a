//! Median-Cut color quantization (§4.4.3) and Floyd-Steinberg dithering
//! (§4.4.4), shared by the GIF encoder (and any other indexed-color
//! container).

use std::collections::HashMap;

/// An RGB palette, sized as a power of two (min 2, max 256) with trailing
/// zero-padding entries.
#[derive(Clone, Debug)]
pub struct Palette {
    pub colors: Vec<[u8; 3]>,
}

impl Palette {
    /// Nearest-color search by squared Euclidean distance, early-exiting on
    /// an exact match.
    pub fn nearest_index(&self, rgb: [u8; 3]) -> u8 {
        let mut best = 0usize;
        let mut best_dist = u32::MAX;
        for (i, c) in self.colors.iter().enumerate() {
            let dist = sq_dist(rgb, *c);
            if dist == 0 {
                return i as u8;
            }
            if dist < best_dist {
                best_dist = dist;
                best = i;
            }
        }
        best as u8
    }
}

fn sq_dist(a: [u8; 3], b: [u8; 3]) -> u32 {
    let dr = a[0] as i32 - b[0] as i32;
    let dg = a[1] as i32 - b[1] as i32;
    let db = a[2] as i32 - b[2] as i32;
    (dr * dr + dg * dg + db * db) as u32
}

struct Box_ {
    colors: Vec<([u8; 3], u64)>, // color, pixel count
}

impl Box_ {
    fn bounds(&self) -> ([u8; 3], [u8; 3]) {
        let mut lo = [255u8, 255, 255];
        let mut hi = [0u8, 0, 0];
        for (c, _) in &self.colors {
            for ch in 0..3 {
                lo[ch] = lo[ch].min(c[ch]);
                hi[ch] = hi[ch].max(c[ch]);
            }
        }
        (lo, hi)
    }

    fn pixel_count(&self) -> u64 {
        self.colors.iter().map(|(_, n)| *n).sum()
    }

    fn volume_times_count(&self) -> u64 {
        let (lo, hi) = self.bounds();
        let vol = (hi[0] as u64 - lo[0] as u64 + 1)
            * (hi[1] as u64 - lo[1] as u64 + 1)
            * (hi[2] as u64 - lo[2] as u64 + 1);
        vol.saturating_mul(self.pixel_count())
    }

    fn longest_axis(&self) -> usize {
        let (lo, hi) = self.bounds();
        let ranges = [
            hi[0] as i32 - lo[0] as i32,
            hi[1] as i32 - lo[1] as i32,
            hi[2] as i32 - lo[2] as i32,
        ];
        // Ties broken red > green > blue: scan in that priority order.
        let mut best_axis = 0usize;
        let mut best_range = ranges[0];
        for axis in [1usize, 2] {
            if ranges[axis] > best_range {
                best_range = ranges[axis];
                best_axis = axis;
            }
        }
        best_axis
    }

    /// Split at the pixel-mass median along the longest axis, guaranteeing
    /// both halves non-empty.
    fn split(mut self) -> (Box_, Box_) {
        let axis = self.longest_axis();
        self.colors.sort_by(|a, b| a.0[axis].cmp(&b.0[axis]));
        let total: u64 = self.colors.iter().map(|(_, n)| *n).sum();
        let half = total / 2;
        let mut acc = 0u64;
        let mut split_at = 1usize;
        for (i, (_, n)) in self.colors.iter().enumerate() {
            acc += n;
            if acc >= half {
                split_at = i + 1;
                break;
            }
        }
        split_at = split_at.clamp(1, self.colors.len() - 1);
        let right = self.colors.split_off(split_at);
        (Box_ { colors: self.colors }, Box_ { colors: right })
    }

    fn mean_color(&self) -> [u8; 3] {
        let mut sum = [0u64; 3];
        let mut total = 0u64;
        for (c, n) in &self.colors {
            for ch in 0..3 {
                sum[ch] += c[ch] as u64 * n;
            }
            total += n;
        }
        if total == 0 {
            return [0, 0, 0];
        }
        [
            ((sum[0] + total / 2) / total).min(255) as u8,
            ((sum[1] + total / 2) / total).min(255) as u8,
            ((sum[2] + total / 2) / total).min(255) as u8,
        ]
    }
}

/// Build a palette of at most `max_colors` entries (clamped to [2, 256])
/// from an RGB pixel buffer. If the histogram already has `max_colors` or
/// fewer unique colors, uses them directly. Otherwise recursively splits
/// boxes by pixel-mass median until `max_colors` boxes exist.
///
/// The returned palette length is rounded up to the next power of two
/// (minimum 2, maximum 256), zero-padded.
pub fn median_cut(rgb_pixels: &[[u8; 3]], max_colors: usize) -> Palette {
    let max_colors = max_colors.clamp(2, 256);
    let mut histogram: HashMap<[u8; 3], u64> = HashMap::new();
    for &p in rgb_pixels {
        *histogram.entry(p).or_insert(0) += 1;
    }

    let mut colors: Vec<[u8; 3]> = if histogram.len() <= max_colors {
        histogram.keys().copied().collect()
    } else {
        let mut boxes = vec![Box_ { colors: histogram.into_iter().collect() }];
        while boxes.len() < max_colors {
            let split_idx = boxes
                .iter()
                .enumerate()
                .max_by_key(|(_, b)| b.volume_times_count())
                .map(|(i, _)| i)
                .unwrap();
            if boxes[split_idx].colors.len() <= 1 {
                break;
            }
            let target = boxes.remove(split_idx);
            let (a, b) = target.split();
            boxes.push(a);
            boxes.push(b);
        }
        boxes.iter().map(Box_::mean_color).collect()
    };

    let padded_len = colors.len().max(1).next_power_of_two().clamp(2, 256);
    colors.resize(padded_len, [0, 0, 0]);
    Palette { colors }
}

/// Map pixels to palette indices. Uses the direct histogram where the
/// color is exactly in the palette, else nearest-color search.
pub fn indexify(rgb_pixels: &[[u8; 3]], palette: &Palette) -> Vec<u8> {
    let mut cache: HashMap<[u8; 3], u8> = HashMap::new();
    rgb_pixels
        .iter()
        .map(|&p| *cache.entry(p).or_insert_with(|| palette.nearest_index(p)))
        .collect()
}

/// Floyd-Steinberg dithering with the perceptual distance weighting
/// `2*dr^2 + 4*dg^2 + 3*db^2`, left-to-right top-to-bottom, classic
/// 7/16, 3/16, 5/16, 1/16 error kernel.
pub fn floyd_steinberg_dither(
    rgb_pixels: &[[u8; 3]],
    width: usize,
    height: usize,
    palette: &Palette,
) -> Vec<u8> {
    let mut err_cur = vec![[0i32; 3]; width];
    let mut err_next = vec![[0i32; 3]; width];
    let mut indices = vec![0u8; width * height];

    for y in 0..height {
        for x in 0..width {
            let src = rgb_pixels[y * width + x];
            let mut adjusted = [0i32; 3];
            for ch in 0..3 {
                adjusted[ch] = (src[ch] as i32 + err_cur[x][ch]).clamp(0, 255);
            }
            let adjusted_u8 = [adjusted[0] as u8, adjusted[1] as u8, adjusted[2] as u8];
            let idx = nearest_perceptual(adjusted_u8, palette);
            indices[y * width + x] = idx;
            let chosen = palette.colors[idx as usize];
            let error = [
                adjusted[0] - chosen[0] as i32,
                adjusted[1] - chosen[1] as i32,
                adjusted[2] - chosen[2] as i32,
            ];
            distribute(&mut err_cur, &mut err_next, x, width, error);
        }
        std::mem::swap(&mut err_cur, &mut err_next);
        err_next.iter_mut().for_each(|e| *e = [0; 3]);
    }
    indices
}

fn distribute(cur: &mut [[i32; 3]], next: &mut [[i32; 3]], x: usize, width: usize, err: [i32; 3]) {
    let add = |slot: &mut [i32; 3], num: i32| {
        for ch in 0..3 {
            slot[ch] += err[ch] * num / 16;
        }
    };
    if x + 1 < width {
        add(&mut cur[x + 1], 7);
    }
    if x > 0 {
        add(&mut next[x - 1], 3);
    }
    add(&mut next[x], 5);
    if x + 1 < width {
        add(&mut next[x + 1], 1);
    }
}

fn nearest_perceptual(rgb: [u8; 3], palette: &Palette) -> u8 {
    let mut best = 0usize;
    let mut best_dist = u64::MAX;
    for (i, c) in palette.colors.iter().enumerate() {
        let dr = rgb[0] as i64 - c[0] as i64;
        let dg = rgb[1] as i64 - c[1] as i64;
        let db = rgb[2] as i64 - c[2] as i64;
        let dist = (2 * dr * dr + 4 * dg * dg + 3 * db * db) as u64;
        if dist == 0 {
            return i as u8;
        }
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_palette_uses_colors_directly() {
        let pixels = vec![[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 0, 0]];
        let palette = median_cut(&pixels, 256);
        // 3 unique colors -> padded to power-of-two 4
        assert_eq!(palette.colors.len(), 4);
    }

    #[test]
    fn large_palette_reduces_to_max_colors_power_of_two() {
        let mut pixels = Vec::new();
        for r in 0..16u16 {
            for g in 0..16u16 {
                pixels.push([(r * 16) as u8, (g * 16) as u8, 128]);
            }
        }
        let palette = median_cut(&pixels, 16);
        assert!(palette.colors.len() <= 16);
        assert!(palette.colors.len().is_power_of_two());
    }

    #[test]
    fn nearest_index_exact_match_short_circuits() {
        let palette = Palette { colors: vec![[0, 0, 0], [255, 255, 255]] };
        assert_eq!(palette.nearest_index([255, 255, 255]), 1);
    }

    #[test]
    fn dither_produces_one_index_per_pixel() {
        let pixels = vec![[10, 20, 30]; 9];
        let palette = Palette { colors: vec![[0, 0, 0], [255, 255, 255]] };
        let indices = floyd_steinberg_dither(&pixels, 3, 3, &palette);
        assert_eq!(indices.len(), 9);
    }
}
