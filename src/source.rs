//! The image source handle (§4.1): format detection, incremental-load
//! state machine, lazy-but-cached frame decode, thumbnail derivation.

use enough::Stop;

use crate::error::ImageError;
use crate::format::{detect_format, ImageFormatTag, DETECTION_MINIMUM};
use crate::image::{ColorModel, Image};
use crate::properties::{keys, source_keys, PropertyValue, Properties};
use crate::thumbnail;
use crate::{bmp, gif, jpeg, png, tiff, webp};

/// The incremental-parse status state machine (§4.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    ReadingHeader,
    Incomplete,
    UnknownType,
    InvalidData,
    UnexpectedEof,
    Complete,
}

struct Frame {
    image: Image,
    delay_centiseconds: u16,
}

/// Dimensions/color-model recovered via a format's `peek_properties` when
/// the full pixel decode fails (§4.3.2): lets `properties()` still answer
/// for a syntactically valid header the crate can't fully decode (e.g. a
/// progressive JPEG or a VP8-lossy WebP).
struct HeaderOnly {
    width: u32,
    height: u32,
    color_model: ColorModel,
    has_alpha: bool,
}

/// A stateful, single-owner handle over a buffer of encoded image bytes.
/// Not thread-safe for concurrent mutation (§5: externally synchronized).
pub struct ImageSource {
    buffer: Vec<u8>,
    finalized: bool,
    format: Option<ImageFormatTag>,
    status: Status,
    frames: Vec<Frame>,
    header_only: Option<HeaderOnly>,
    loop_count: Option<u16>,
    limits: crate::limits::Limits,
    stop: Box<dyn Stop>,
}

impl ImageSource {
    /// Construct from an immutable byte buffer (treated as a complete,
    /// final payload).
    pub fn from_data(data: Vec<u8>) -> Self {
        let mut source = Self::empty();
        source.update_data(&data, true);
        source
    }

    /// Construct from a file path, reading the whole file up front.
    pub fn from_path(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let data = std::fs::read(path)?;
        Ok(Self::from_data(data))
    }

    /// Construct empty, for incremental loading via [`Self::update_data`].
    pub fn empty() -> Self {
        ImageSource {
            buffer: Vec::new(),
            finalized: false,
            format: None,
            status: Status::Incomplete,
            frames: Vec::new(),
            header_only: None,
            loop_count: None,
            limits: crate::limits::Limits::default(),
            stop: Box::new(enough::Unstoppable),
        }
    }

    /// Attach resource limits, re-checked against every decoded frame's
    /// dimensions (a violation surfaces as `Status::InvalidData`).
    pub fn with_limits(mut self, limits: crate::limits::Limits) -> Self {
        self.limits = limits;
        self.reparse(self.finalized);
        self
    }

    /// Attach a cooperative cancellation token, checked while decoding each
    /// frame. A cancelled decode surfaces as `Status::InvalidData`, the same
    /// as any other decode failure (§7.2).
    pub fn with_stop(mut self, stop: impl Stop + 'static) -> Self {
        self.stop = Box::new(stop);
        self.reparse(self.finalized);
        self
    }

    /// Construct from a byte-producing callback, pulling chunks until it
    /// returns `None`.
    pub fn from_provider(mut provider: impl FnMut() -> Option<Vec<u8>>, final_data: bool) -> Self {
        let mut source = Self::empty();
        while let Some(chunk) = provider() {
            source.append(&chunk);
        }
        source.reparse(final_data);
        source
    }

    fn append(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Append bytes and re-run detection/header parsing.
    pub fn update_data(&mut self, bytes: &[u8], final_data: bool) {
        self.append(bytes);
        self.reparse(final_data);
    }

    /// Same as [`Self::update_data`] but pulling from a callback.
    pub fn update_provider(&mut self, mut provider: impl FnMut() -> Option<Vec<u8>>, final_data: bool) {
        while let Some(chunk) = provider() {
            self.append(&chunk);
        }
        self.reparse(final_data);
    }

    fn reparse(&mut self, final_data: bool) {
        self.finalized = final_data;
        if self.buffer.is_empty() {
            self.status = Status::Incomplete;
            return;
        }
        match detect_format(&self.buffer) {
            Some(tag) => {
                self.format = Some(tag);
                self.decode_all(tag, final_data);
            }
            None => {
                self.status = if self.buffer.len() >= DETECTION_MINIMUM {
                    Status::UnknownType
                } else if self.buffer.len() >= 4 && !could_still_match(&self.buffer) {
                    Status::InvalidData
                } else {
                    Status::ReadingHeader
                };
            }
        }
    }

    fn decode_all(&mut self, tag: ImageFormatTag, final_data: bool) {
        let stop = self.stop.as_ref();
        let result = match tag {
            ImageFormatTag::Png => png::decode(&self.buffer, stop).map(|img| {
                (vec![Frame { image: img, delay_centiseconds: 0 }], None)
            }),
            ImageFormatTag::Jpeg => jpeg::decode(&self.buffer, stop).map(|img| {
                (vec![Frame { image: img, delay_centiseconds: 0 }], None)
            }),
            ImageFormatTag::Bmp => bmp::decode(&self.buffer, stop).map(|img| {
                (vec![Frame { image: img, delay_centiseconds: 0 }], None)
            }),
            ImageFormatTag::Gif => gif::decode(&self.buffer, stop).map(|decoded| {
                let loop_count = decoded.loop_count;
                let frames = decoded
                    .frames
                    .into_iter()
                    .map(|f| Frame { image: f.image, delay_centiseconds: f.delay_centiseconds })
                    .collect();
                (frames, loop_count)
            }),
            ImageFormatTag::Tiff => tiff::decode_all(&self.buffer, stop).map(|pages| {
                let frames =
                    pages.into_iter().map(|img| Frame { image: img, delay_centiseconds: 0 }).collect();
                (frames, None)
            }),
            ImageFormatTag::WebP => webp::decode(&self.buffer, stop).map(|img| {
                (vec![Frame { image: img, delay_centiseconds: 0 }], None)
            }),
        };
        match result {
            Ok((frames, loop_count)) => {
                let exceeds_limits = frames.iter().any(|f| {
                    self.limits.check(f.image.width(), f.image.height()).is_err()
                        || self.limits.check_memory(f.image.data().len()).is_err()
                });
                if exceeds_limits {
                    self.status = Status::InvalidData;
                    return;
                }
                self.frames = frames;
                self.header_only = None;
                self.loop_count = loop_count;
                self.status = Status::Complete;
            }
            Err(ImageError::UnexpectedEof) if !final_data => {
                self.status = Status::Incomplete;
            }
            Err(ImageError::UnexpectedEof) => {
                self.status = Status::UnexpectedEof;
            }
            Err(_) => {
                // The header itself may still be syntactically valid (a
                // progressive JPEG, a VP8-lossy WebP): recover dimensions
                // via peek_properties so properties() doesn't go blind.
                self.header_only = peek_header_only(tag, &self.buffer);
                self.status = Status::InvalidData;
            }
        }
    }

    pub fn status(&self) -> Status {
        self.status
    }

    /// Whether the most recent `update_data`/`update_provider` call marked
    /// its payload as final.
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Number of frames (0 if status isn't `Complete`).
    pub fn count(&self) -> usize {
        if self.status == Status::Complete {
            self.frames.len()
        } else {
            0
        }
    }

    pub fn format_tag(&self) -> Option<ImageFormatTag> {
        self.format
    }

    pub fn loop_count(&self) -> Option<u16> {
        self.loop_count
    }

    pub fn primary_image_index(&self) -> usize {
        0
    }

    /// Property dictionary for `frame`, or `None` if out of range. Falls
    /// back to header-only properties (§4.3.2) for frame 0 when the full
    /// decode failed but the header still parsed.
    pub fn properties(&self, frame: usize) -> Option<Properties> {
        if let Some(f) = self.frames.get(frame) {
            let fmt = f.image.format();
            let delay = (f.delay_centiseconds > 0).then_some(f.delay_centiseconds);
            return Some(build_properties(fmt.color_model, f.image.width(), f.image.height(), fmt.alpha.has_alpha(), delay));
        }
        if frame == 0 {
            if let Some(h) = &self.header_only {
                return Some(build_properties(h.color_model, h.width, h.height, h.has_alpha, None));
            }
        }
        None
    }

    /// Decode the image at `frame`. Negative/out-of-range indices return
    /// `None`. Honors `source_keys::SHOULD_CACHE` in `options` (default
    /// true): when disabled, bypasses the frame decoded at parse time and
    /// re-decodes straight from the encoded buffer instead.
    pub fn create_image(&self, frame: usize, options: &Properties) -> Option<Image> {
        if frame >= self.frames.len() {
            return None;
        }
        let should_cache = options
            .get(source_keys::SHOULD_CACHE)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(true);
        if should_cache {
            return Some(self.frames[frame].image.clone());
        }
        let stop = self.stop.as_ref();
        match self.format? {
            ImageFormatTag::Png => png::decode(&self.buffer, stop).ok(),
            ImageFormatTag::Jpeg => jpeg::decode(&self.buffer, stop).ok(),
            ImageFormatTag::Bmp => bmp::decode(&self.buffer, stop).ok(),
            ImageFormatTag::Gif => {
                gif::decode(&self.buffer, stop).ok().and_then(|d| d.frames.into_iter().nth(frame)).map(|f| f.image)
            }
            ImageFormatTag::Tiff => tiff::decode_all(&self.buffer, stop).ok().and_then(|pages| pages.into_iter().nth(frame)),
            ImageFormatTag::WebP => webp::decode(&self.buffer, stop).ok(),
        }
    }

    /// Derive a thumbnail from frame `frame`. With
    /// `source_keys::THUMBNAIL_MAX_PIXEL_SIZE` present in `options`, the
    /// longer side is clamped preserving aspect ratio; without it, returns
    /// a full-resolution copy.
    pub fn create_thumbnail(&self, frame: usize, options: &Properties) -> Option<Image> {
        let image = self.create_image(frame, options)?;
        let max_pixel_size = options
            .get(source_keys::THUMBNAIL_MAX_PIXEL_SIZE)
            .and_then(PropertyValue::as_i64)
            .filter(|&v| v > 0)
            .map(|v| v as u32);
        Some(match max_pixel_size {
            Some(max) => thumbnail::scale_to_max_pixel_size(&image, max),
            None => image,
        })
    }
}

fn build_properties(color_model: ColorModel, width: u32, height: u32, has_alpha: bool, delay_centiseconds: Option<u16>) -> Properties {
    let mut props = Properties::new();
    props.set(keys::PIXEL_WIDTH, PropertyValue::Int(width as i64));
    props.set(keys::PIXEL_HEIGHT, PropertyValue::Int(height as i64));
    props.set(keys::DEPTH, PropertyValue::Int(8));
    props.set(
        keys::COLOR_MODEL,
        PropertyValue::Str(
            match color_model {
                ColorModel::Gray => "Gray",
                ColorModel::Rgb => "RGB",
                ColorModel::Cmyk => "CMYK",
            }
            .to_string(),
        ),
    );
    props.set(keys::HAS_ALPHA, PropertyValue::Bool(has_alpha));
    if let Some(d) = delay_centiseconds {
        props.set("DelayTime", PropertyValue::Int(d as i64));
    }
    props
}

/// Recover dimensions/color-model from a syntactically valid header when
/// the full pixel decode isn't possible. `None` for formats without a
/// `peek_properties` entry point (BMP/GIF/TIFF headers are cheap enough
/// that their full decode already doubles as the header parse).
fn peek_header_only(tag: ImageFormatTag, buf: &[u8]) -> Option<HeaderOnly> {
    match tag {
        ImageFormatTag::Png => png::peek_properties(buf)
            .ok()
            .map(|(width, height, color_model, has_alpha)| HeaderOnly { width, height, color_model, has_alpha }),
        ImageFormatTag::Jpeg => jpeg::peek_properties(buf).ok().map(|(width, height, components)| HeaderOnly {
            width,
            height,
            color_model: match components {
                1 => ColorModel::Gray,
                4 => ColorModel::Cmyk,
                _ => ColorModel::Rgb,
            },
            has_alpha: false,
        }),
        ImageFormatTag::WebP => webp::peek_properties(buf)
            .ok()
            .map(|(width, height)| HeaderOnly { width, height, color_model: ColorModel::Rgb, has_alpha: false }),
        ImageFormatTag::Bmp | ImageFormatTag::Gif | ImageFormatTag::Tiff => None,
    }
}

/// Magic-byte prefixes recognized by [`crate::format::detect_format`], used
/// to decide whether a short, as-yet-unmatched buffer could still resolve
/// to a known format once more bytes arrive.
const KNOWN_PREFIXES: &[&[u8]] = &[
    b"\x89PNG\r\n\x1a\n",
    b"\xFF\xD8\xFF",
    b"GIF87a",
    b"GIF89a",
    b"BM",
    b"\x49\x49\x2A\x00",
    b"\x4D\x4D\x00\x2A",
    b"RIFF",
];

fn could_still_match(buf: &[u8]) -> bool {
    KNOWN_PREFIXES.iter().any(|sig| {
        let n = buf.len().min(sig.len());
        buf[..n] == sig[..n]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::PixelFormat;

    #[test]
    fn empty_buffer_is_incomplete() {
        let source = ImageSource::empty();
        assert_eq!(source.status(), Status::Incomplete);
    }

    #[test]
    fn garbage_bytes_become_invalid_data() {
        let source = ImageSource::from_data(vec![0x00, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(source.status(), Status::InvalidData);
    }

    #[test]
    fn short_prefix_waits_for_more_header() {
        let source = ImageSource::from_data(b"\x89PN".to_vec());
        assert_eq!(source.status(), Status::ReadingHeader);
    }

    #[test]
    fn complete_png_reports_one_frame_and_properties() {
        let img = Image::new(3, 2, PixelFormat::RGB, vec![9u8; 18]).unwrap();
        let encoded = png::encode(&img, &enough::Unstoppable).unwrap();
        let source = ImageSource::from_data(encoded);
        assert_eq!(source.status(), Status::Complete);
        assert_eq!(source.count(), 1);
        let props = source.properties(0).unwrap();
        assert_eq!(props.get(keys::PIXEL_WIDTH).unwrap().as_i64(), Some(3));
        assert!(source.create_image(1, &Properties::new()).is_none());
    }

    #[test]
    fn limits_turn_an_oversized_decode_into_invalid_data() {
        let img = Image::new(8, 8, PixelFormat::RGB, vec![1u8; 8 * 8 * 3]).unwrap();
        let encoded = png::encode(&img, &enough::Unstoppable).unwrap();
        let source = ImageSource::from_data(encoded)
            .with_limits(crate::limits::Limits { max_pixels: Some(10), ..Default::default() });
        assert_eq!(source.status(), Status::InvalidData);
    }

    #[test]
    fn limits_reject_oversized_memory_even_within_pixel_budget() {
        let img = Image::new(8, 8, PixelFormat::RGB, vec![1u8; 8 * 8 * 3]).unwrap();
        let encoded = png::encode(&img, &enough::Unstoppable).unwrap();
        let source = ImageSource::from_data(encoded)
            .with_limits(crate::limits::Limits { max_memory_bytes: Some(10), ..Default::default() });
        assert_eq!(source.status(), Status::InvalidData);
    }

    #[test]
    fn thumbnail_scales_down_preserving_aspect() {
        let img = Image::new(200, 100, PixelFormat::RGB, vec![1u8; 200 * 100 * 3]).unwrap();
        let encoded = bmp::encode(&img, false, &enough::Unstoppable).unwrap();
        let source = ImageSource::from_data(encoded);
        let mut options = Properties::new();
        options.set(source_keys::THUMBNAIL_MAX_PIXEL_SIZE, PropertyValue::Int(50));
        let thumb = source.create_thumbnail(0, &options).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (50, 25));
    }

    #[test]
    fn should_cache_false_redecodes_instead_of_cloning_cache() {
        let img = Image::new(4, 3, PixelFormat::RGB, vec![7u8; 4 * 3 * 3]).unwrap();
        let encoded = png::encode(&img, &enough::Unstoppable).unwrap();
        let source = ImageSource::from_data(encoded);
        let mut options = Properties::new();
        options.set(source_keys::SHOULD_CACHE, PropertyValue::Bool(false));
        let decoded = source.create_image(0, &options).unwrap();
        assert_eq!(decoded.data(), img.data());
    }

    #[test]
    fn subsampled_jpeg_header_still_yields_properties() {
        // SOF0 with a 2x2-sampled component: the full decoder only handles
        // 4:4:4 and rejects this at the scan marker, but peek_properties
        // resolves dimensions from the SOF0 segment alone.
        #[rustfmt::skip]
        let bytes: Vec<u8> = vec![
            0xFF, 0xD8, // SOI
            0xFF, 0xC0, 0x00, 0x0B, 0x08, 0x00, 0x04, 0x00, 0x06, 0x01, 0x01, 0x22, 0x00, // SOF0, 6x4, 1 comp, h=v=2
            0xFF, 0xDA, 0x00, 0x04, 0x00, 0x00, // SOS (triggers the subsampling rejection)
        ];
        let source = ImageSource::from_data(bytes);
        assert_eq!(source.status(), Status::InvalidData);
        let props = source.properties(0).unwrap();
        assert_eq!(props.get(keys::PIXEL_WIDTH).unwrap().as_i64(), Some(6));
        assert_eq!(props.get(keys::PIXEL_HEIGHT).unwrap().as_i64(), Some(4));
    }
}
