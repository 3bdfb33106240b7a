//! EXIF-style orientation normalization (§4.2 destination `Orientation`
//! option): rotate/flip an image into upright layout before encode,
//! covering TIFF/EXIF tag 274's eight defined values. Operates directly in
//! the source `PixelFormat`, the same no-RGBA-detour approach as
//! [`crate::thumbnail`].

use crate::image::Image;

/// Apply EXIF orientation `value` (`1..=8`); `1` or anything unrecognized
/// is treated as already-upright and returned unchanged.
pub fn apply_orientation(image: &Image, value: i64) -> Image {
    match value {
        2 => flip_h(image),
        3 => rotate180(image),
        4 => flip_v(image),
        5 => flip_h(&rotate90(image)),
        6 => rotate90(image),
        7 => flip_h(&rotate270(image)),
        8 => rotate270(image),
        _ => image.clone(),
    }
}

fn pixel(row: &[u8], x: u32, bpp: usize) -> &[u8] {
    &row[x as usize * bpp..x as usize * bpp + bpp]
}

fn flip_h(image: &Image) -> Image {
    let (w, h) = (image.width(), image.height());
    let bpp = image.format().bytes_per_pixel();
    let mut out = vec![0u8; w as usize * h as usize * bpp];
    for y in 0..h {
        let row = image.row(y);
        let dst_row = &mut out[y as usize * w as usize * bpp..][..w as usize * bpp];
        for x in 0..w {
            let src = pixel(row, w - 1 - x, bpp);
            dst_row[x as usize * bpp..x as usize * bpp + bpp].copy_from_slice(src);
        }
    }
    Image::new(w, h, image.format(), out).expect("flipped compact buffer")
}

fn flip_v(image: &Image) -> Image {
    let (w, h) = (image.width(), image.height());
    let bpp = image.format().bytes_per_pixel();
    let mut out = vec![0u8; w as usize * h as usize * bpp];
    for y in 0..h {
        let row = image.row(h - 1 - y);
        out[y as usize * w as usize * bpp..][..w as usize * bpp].copy_from_slice(&row[..w as usize * bpp]);
    }
    Image::new(w, h, image.format(), out).expect("flipped compact buffer")
}

fn rotate180(image: &Image) -> Image {
    flip_v(&flip_h(image))
}

/// 90 degrees clockwise: `dst(x, y) = src(y, H-1-x)`.
fn rotate90(image: &Image) -> Image {
    let (w, h) = (image.width(), image.height());
    let bpp = image.format().bytes_per_pixel();
    let (new_w, new_h) = (h, w);
    let mut out = vec![0u8; new_w as usize * new_h as usize * bpp];
    for dst_y in 0..new_h {
        let src_x = dst_y;
        let dst_row = &mut out[dst_y as usize * new_w as usize * bpp..][..new_w as usize * bpp];
        for dst_x in 0..new_w {
            let src_y = h - 1 - dst_x;
            let src_row = image.row(src_y);
            let src = pixel(src_row, src_x, bpp);
            dst_row[dst_x as usize * bpp..dst_x as usize * bpp + bpp].copy_from_slice(src);
        }
    }
    Image::new(new_w, new_h, image.format(), out).expect("rotated compact buffer")
}

/// 90 degrees counterclockwise: `dst(x, y) = src(W-1-y, x)`.
fn rotate270(image: &Image) -> Image {
    let (w, h) = (image.width(), image.height());
    let bpp = image.format().bytes_per_pixel();
    let (new_w, new_h) = (h, w);
    let mut out = vec![0u8; new_w as usize * new_h as usize * bpp];
    for dst_y in 0..new_h {
        let src_x = new_h - 1 - dst_y;
        let dst_row = &mut out[dst_y as usize * new_w as usize * bpp..][..new_w as usize * bpp];
        for dst_x in 0..new_w {
            let src_y = dst_x;
            let src_row = image.row(src_y);
            let src = pixel(src_row, src_x, bpp);
            dst_row[dst_x as usize * bpp..dst_x as usize * bpp + bpp].copy_from_slice(src);
        }
    }
    Image::new(new_w, new_h, image.format(), out).expect("rotated compact buffer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelFormat;

    fn labeled(w: u32, h: u32) -> Image {
        // Single-channel gray image with pixel value = row-major index, so
        // rotations/flips can be checked by value rather than geometry.
        let mut data = vec![0u8; (w * h) as usize];
        for (i, b) in data.iter_mut().enumerate() {
            *b = i as u8;
        }
        Image::new(w, h, PixelFormat::GRAY, data).unwrap()
    }

    #[test]
    fn orientation_one_is_identity() {
        let img = labeled(3, 2);
        let out = apply_orientation(&img, 1);
        assert_eq!(out.data(), img.data());
    }

    #[test]
    fn orientation_three_is_180_rotation() {
        let img = labeled(3, 2);
        let out = apply_orientation(&img, 3);
        let expected: Vec<u8> = img.data().iter().rev().copied().collect();
        assert_eq!(out.data(), &expected[..]);
    }

    #[test]
    fn orientation_six_rotates_clockwise_and_swaps_dimensions() {
        let img = labeled(3, 2); // row0: 0 1 2 ; row1: 3 4 5
        let out = apply_orientation(&img, 6);
        assert_eq!((out.width(), out.height()), (2, 3));
        // Expected clockwise rotation: row0: 3 0 ; row1: 4 1 ; row2: 5 2
        assert_eq!(out.data(), &[3, 0, 4, 1, 5, 2]);
    }

    #[test]
    fn orientation_eight_rotates_counterclockwise() {
        let img = labeled(3, 2);
        let out = apply_orientation(&img, 8);
        assert_eq!((out.width(), out.height()), (2, 3));
        // Expected CCW rotation: row0: 2 5 ; row1: 1 4 ; row2: 0 3
        assert_eq!(out.data(), &[2, 5, 1, 4, 0, 3]);
    }

    #[test]
    fn orientation_two_flips_horizontally() {
        let img = labeled(3, 2);
        let out = apply_orientation(&img, 2);
        assert_eq!(out.data(), &[2, 1, 0, 5, 4, 3]);
    }
}
