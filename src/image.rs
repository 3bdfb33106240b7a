//! The universal in-memory image carried between codecs (§3 of the design
//! notes): width, height, 8 bits per component, a byte stride that need not
//! equal `width * bytes_per_pixel`, and a tag describing where the alpha
//! channel lives.

use crate::error::ImageError;

/// Where (if anywhere) the alpha channel lives in a pixel, and whether it's
/// straight or premultiplied.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlphaLayout {
    /// No alpha channel at all (e.g. packed RGB/Gray).
    None,
    /// Alpha-sized padding after the color channels (XRGB/RGBX), ignored.
    NoneSkipLast,
    /// Alpha-sized padding before the color channels, ignored.
    NoneSkipFirst,
    /// Straight alpha, last channel (RGBA).
    Last,
    /// Straight alpha, first channel (ARGB).
    First,
    /// Premultiplied alpha, last channel.
    PremultipliedLast,
    /// Premultiplied alpha, first channel.
    PremultipliedFirst,
    /// Single-channel alpha-only mask.
    AlphaOnly,
}

impl AlphaLayout {
    pub fn has_alpha(&self) -> bool {
        !matches!(self, AlphaLayout::None | AlphaLayout::NoneSkipLast | AlphaLayout::NoneSkipFirst)
    }

    pub fn is_premultiplied(&self) -> bool {
        matches!(self, AlphaLayout::PremultipliedLast | AlphaLayout::PremultipliedFirst)
    }
}

/// The underlying color model, independent of the alpha layout.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
}

/// Color model + alpha layout together determine bytes-per-pixel and how a
/// codec must normalize pixels it reads or writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelFormat {
    pub color_model: ColorModel,
    pub alpha: AlphaLayout,
}

impl PixelFormat {
    pub const GRAY: PixelFormat = PixelFormat { color_model: ColorModel::Gray, alpha: AlphaLayout::None };
    pub const GRAY_ALPHA: PixelFormat = PixelFormat { color_model: ColorModel::Gray, alpha: AlphaLayout::Last };
    pub const RGB: PixelFormat = PixelFormat { color_model: ColorModel::Rgb, alpha: AlphaLayout::None };
    pub const RGBA: PixelFormat = PixelFormat { color_model: ColorModel::Rgb, alpha: AlphaLayout::Last };
    pub const ARGB: PixelFormat = PixelFormat { color_model: ColorModel::Rgb, alpha: AlphaLayout::First };
    pub const RGBX: PixelFormat = PixelFormat { color_model: ColorModel::Rgb, alpha: AlphaLayout::NoneSkipLast };
    pub const CMYK: PixelFormat = PixelFormat { color_model: ColorModel::Cmyk, alpha: AlphaLayout::None };

    /// Number of color channels (not counting a straight/premultiplied alpha
    /// channel, but counting the padding byte of the `*SkipFirst`/`*SkipLast`
    /// variants since it still occupies a byte).
    fn color_channels(&self) -> usize {
        match self.color_model {
            ColorModel::Gray => 1,
            ColorModel::Rgb => 3,
            ColorModel::Cmyk => 4,
        }
    }

    pub fn bytes_per_pixel(&self) -> usize {
        match self.alpha {
            AlphaLayout::None => self.color_channels(),
            AlphaLayout::AlphaOnly => 1,
            _ => self.color_channels() + 1,
        }
    }
}

/// sRGB is assumed everywhere unless a container explicitly tags otherwise.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ColorSpace {
    #[default]
    Srgb,
    Unknown,
}

/// The pixel buffer value type shared by every decoder and encoder.
///
/// *Invariants:* `stride >= width * bytes_per_pixel()`; `data.len() >=
/// stride * (height - 1) + width * bytes_per_pixel()`. Codecs must never
/// read past `data`.
#[derive(Clone, Debug)]
pub struct Image {
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
    color_space: ColorSpace,
    data: Vec<u8>,
}

impl Image {
    /// Build an image with a compact stride (`width * bytes_per_pixel`).
    pub fn new(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Result<Self, ImageError> {
        let stride = (width as usize)
            .checked_mul(format.bytes_per_pixel())
            .ok_or(ImageError::DimensionsTooLarge { width, height })?;
        Self::with_stride(width, height, stride, format, data)
    }

    /// Build an image honoring an explicit row stride (bytes per row, which
    /// may exceed `width * bytes_per_pixel` when the source padded rows).
    pub fn with_stride(
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Result<Self, ImageError> {
        let bpp = format.bytes_per_pixel();
        let min_stride = (width as usize)
            .checked_mul(bpp)
            .ok_or(ImageError::DimensionsTooLarge { width, height })?;
        if stride < min_stride {
            return Err(ImageError::InvalidData(format!(
                "stride {stride} smaller than width*bpp {min_stride}"
            )));
        }
        let needed = if height == 0 {
            0
        } else {
            stride
                .checked_mul(height as usize - 1)
                .and_then(|r| r.checked_add(min_stride))
                .ok_or(ImageError::DimensionsTooLarge { width, height })?
        };
        if data.len() < needed {
            return Err(ImageError::BufferTooSmall { needed, actual: data.len() });
        }
        Ok(Image {
            width,
            height,
            stride,
            format,
            color_space: ColorSpace::default(),
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn color_space(&self) -> ColorSpace {
        self.color_space
    }

    pub fn set_color_space(&mut self, cs: ColorSpace) {
        self.color_space = cs;
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Byte slice for row `y` (respects stride, not just `width * bpp`).
    pub fn row(&self, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * bpp]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let bpp = self.format.bytes_per_pixel();
        let stride = self.stride;
        let width = self.width as usize;
        let start = y as usize * stride;
        &mut self.data[start..start + width * bpp]
    }

    /// A same-size image in the compact (non-strided) RGBA8 layout, used as
    /// the normalization boundary between codecs that disagree on native
    /// pixel format (§3: "the pixel-format normalization the codecs perform
    /// at encode/decode boundaries").
    pub fn to_rgba8(&self) -> Image {
        let mut out = vec![0u8; self.width as usize * self.height as usize * 4];
        for y in 0..self.height {
            let row = self.row(y);
            let bpp = self.format.bytes_per_pixel();
            let dst_row = &mut out[y as usize * self.width as usize * 4..][..self.width as usize * 4];
            for x in 0..self.width as usize {
                let px = &row[x * bpp..x * bpp + bpp];
                let (r, g, b, a) = self.unpack_rgba(px);
                dst_row[x * 4] = r;
                dst_row[x * 4 + 1] = g;
                dst_row[x * 4 + 2] = b;
                dst_row[x * 4 + 3] = a;
            }
        }
        Image::new(self.width, self.height, PixelFormat::RGBA, out).expect("compact RGBA8 buffer")
    }

    fn unpack_rgba(&self, px: &[u8]) -> (u8, u8, u8, u8) {
        match (self.format.color_model, self.format.alpha) {
            (ColorModel::Gray, AlphaLayout::None) => (px[0], px[0], px[0], 255),
            (ColorModel::Gray, AlphaLayout::Last) => (px[0], px[0], px[0], px[1]),
            (ColorModel::Rgb, AlphaLayout::None) => (px[0], px[1], px[2], 255),
            (ColorModel::Rgb, AlphaLayout::NoneSkipLast) => (px[0], px[1], px[2], 255),
            (ColorModel::Rgb, AlphaLayout::NoneSkipFirst) => (px[1], px[2], px[3], 255),
            (ColorModel::Rgb, AlphaLayout::Last) => (px[0], px[1], px[2], px[3]),
            (ColorModel::Rgb, AlphaLayout::First) => (px[1], px[2], px[3], px[0]),
            (ColorModel::Rgb, AlphaLayout::PremultipliedLast) => {
                unpremultiply(px[0], px[1], px[2], px[3])
            }
            (ColorModel::Rgb, AlphaLayout::PremultipliedFirst) => {
                let (r, g, b, a) = unpremultiply(px[1], px[2], px[3], px[0]);
                (r, g, b, a)
            }
            (ColorModel::Cmyk, _) => cmyk_to_rgb(px[0], px[1], px[2], px[3]),
            _ => (px[0], px.get(1).copied().unwrap_or(px[0]), px.get(2).copied().unwrap_or(px[0]), 255),
        }
    }
}

fn unpremultiply(r: u8, g: u8, b: u8, a: u8) -> (u8, u8, u8, u8) {
    if a == 0 {
        return (0, 0, 0, 0);
    }
    let un = |c: u8| -> u8 { ((c as u32 * 255 + a as u32 / 2) / a as u32).min(255) as u8 };
    (un(r), un(g), un(b), a)
}

fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> (u8, u8, u8, u8) {
    let r = 255u32.saturating_sub(c as u32).saturating_sub(k as u32);
    let g = 255u32.saturating_sub(m as u32).saturating_sub(k as u32);
    let b = 255u32.saturating_sub(y as u32).saturating_sub(k as u32);
    (r as u8, g as u8, b as u8, 255)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_image_stride_matches_width() {
        let img = Image::new(2, 2, PixelFormat::RGB, vec![0u8; 12]).unwrap();
        assert_eq!(img.stride(), 6);
    }

    #[test]
    fn strided_image_rejects_short_buffer() {
        let err = Image::with_stride(2, 2, 6, PixelFormat::RGB, vec![0u8; 11]);
        assert!(err.is_err());
    }

    #[test]
    fn to_rgba8_expands_gray() {
        let img = Image::new(1, 1, PixelFormat::GRAY, vec![128]).unwrap();
        let rgba = img.to_rgba8();
        assert_eq!(rgba.data(), &[128, 128, 128, 255]);
    }
}
