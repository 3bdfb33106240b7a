//! Thumbnail scaling (§4.1 `create_thumbnail`): floor-rounded aspect-
//! preserving box/nearest resize, `dst = src * max / max(src.w, src.h)`.

use crate::image::Image;

/// Scale `image` so its longer side equals `max_pixel_size`, preserving
/// aspect ratio with floor rounding. If the image is already within bounds,
/// returns a full-resolution copy (§4.1: "without `max_pixel_size`, returns
/// a full-resolution copy").
pub fn scale_to_max_pixel_size(image: &Image, max_pixel_size: u32) -> Image {
    let (w, h) = (image.width(), image.height());
    let longer = w.max(h);
    if longer <= max_pixel_size || longer == 0 {
        return image.clone();
    }
    let dst_w = ((w as u64 * max_pixel_size as u64) / longer as u64).max(1) as u32;
    let dst_h = ((h as u64 * max_pixel_size as u64) / longer as u64).max(1) as u32;
    nearest_resize(image, dst_w, dst_h)
}

/// Nearest-neighbor resize to an exact destination size (§4.1: "simple
/// box/nearest scaling is acceptable").
pub fn nearest_resize(image: &Image, dst_w: u32, dst_h: u32) -> Image {
    let format = image.format();
    let bpp = format.bytes_per_pixel();
    let src_w = image.width().max(1);
    let src_h = image.height().max(1);
    let mut out = vec![0u8; dst_w as usize * dst_h as usize * bpp];

    for y in 0..dst_h {
        let src_y = ((y as u64 * src_h as u64) / dst_h.max(1) as u64).min(src_h as u64 - 1) as u32;
        let src_row = image.row(src_y);
        let dst_row = &mut out[y as usize * dst_w as usize * bpp..][..dst_w as usize * bpp];
        for x in 0..dst_w {
            let src_x =
                ((x as u64 * src_w as u64) / dst_w.max(1) as u64).min(src_w as u64 - 1) as usize;
            let src_px = &src_row[src_x * bpp..src_x * bpp + bpp];
            dst_row[x as usize * bpp..x as usize * bpp + bpp].copy_from_slice(src_px);
        }
    }
    Image::new(dst_w, dst_h, format, out).expect("resized compact buffer")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelFormat;

    #[test]
    fn longer_side_matches_max_pixel_size_floor_rounded() {
        let data = vec![0u8; 200 * 100 * 3];
        let img = Image::new(200, 100, PixelFormat::RGB, data).unwrap();
        let thumb = scale_to_max_pixel_size(&img, 50);
        assert_eq!(thumb.width(), 50);
        assert_eq!(thumb.height(), 25);
    }

    #[test]
    fn image_already_within_bounds_is_unchanged() {
        let data = vec![1u8; 10 * 10 * 3];
        let img = Image::new(10, 10, PixelFormat::RGB, data).unwrap();
        let thumb = scale_to_max_pixel_size(&img, 50);
        assert_eq!((thumb.width(), thumb.height()), (10, 10));
    }
}
