//! The image destination handle (§4.2): accumulate images and properties
//! against a target container format, finalize once into the sink.

use enough::Stop;

use crate::bmp;
use crate::error::ImageError;
use crate::format::ImageFormatTag;
use crate::gif::{self, EncodeFrame};
use crate::image::{Image, PixelFormat};
use crate::jpeg;
use crate::orient;
use crate::png;
use crate::properties::{dest_keys, PropertyValue, Properties};
use crate::thumbnail;
use crate::tiff;
use crate::webp;

struct PendingImage {
    image: Image,
    properties: Properties,
}

/// A stateful, single-owner handle that accumulates images and finalizes
/// them into one encoded byte stream (§4.2). Not thread-safe for
/// concurrent mutation (§5: externally synchronized).
pub struct ImageDestination {
    format: ImageFormatTag,
    max_image_count: usize,
    images: Vec<PendingImage>,
    global_properties: Properties,
    finalized: bool,
    stop: Box<dyn Stop>,
}

impl ImageDestination {
    /// Construct a destination targeting `format_tag`, accepting at most
    /// `image_count` images. Returns `None` if `image_count` is zero or
    /// the format tag can't be encoded by this crate (currently all six
    /// tags support encoding, so only the zero-count case fails here).
    pub fn create(format_tag: ImageFormatTag, image_count: usize, options: &Properties) -> Option<Self> {
        if image_count == 0 {
            return None;
        }
        let mut global_properties = Properties::new();
        global_properties.merge_from(options);
        Some(ImageDestination {
            format: format_tag,
            max_image_count: image_count,
            images: Vec::new(),
            global_properties,
            finalized: false,
            stop: Box::new(enough::Unstoppable),
        })
    }

    /// Attach a cooperative cancellation token, checked while encoding each
    /// image at `finalize` time (§7.2).
    pub fn with_stop(mut self, stop: impl Stop + 'static) -> Self {
        self.stop = Box::new(stop);
        self
    }

    /// Append `image`, decorated with per-image `properties`. Returns
    /// `false` (no-op) once finalized or once `image_count` images have
    /// already been added.
    pub fn add_image(&mut self, image: Image, properties: Properties) -> bool {
        if self.finalized || self.images.len() >= self.max_image_count {
            return false;
        }
        self.images.push(PendingImage { image, properties });
        true
    }

    /// Append the decoded image at `index` from `source`, re-using its
    /// per-frame properties merged under `properties`.
    pub fn add_image_from_source(
        &mut self,
        source: &crate::source::ImageSource,
        index: usize,
        properties: Properties,
    ) -> bool {
        let Some(image) = source.create_image(index, &Properties::new()) else {
            return false;
        };
        let mut merged = source.properties(index).unwrap_or_default();
        merged.merge_from(&properties);
        self.add_image(image, merged)
    }

    /// Merge `dict` into the destination-wide property set (applies to
    /// every image at finalize time, overridden by that image's own
    /// properties — §4.2's per-image-overrides-global rule).
    pub fn set_properties(&mut self, dict: &Properties) {
        self.global_properties.merge_from(dict);
    }

    /// Record auxiliary (non-pixel) data, e.g. an ICC profile or EXIF
    /// blob, under `aux_type`. Stored as an opaque dictionary entry since
    /// none of this crate's container writers currently emit auxiliary
    /// chunks.
    pub fn add_auxiliary_data_info(&mut self, aux_type: &str, info: Properties) {
        self.global_properties.set(format!("aux:{aux_type}"), PropertyValue::Dict(info));
    }

    /// `dict` for image `idx` merged on top of the destination-wide
    /// properties (per-image overrides global, §4.2).
    fn merged_properties(&self, idx: usize) -> Properties {
        let mut merged = self.global_properties.clone();
        merged.merge_from(&self.images[idx].properties);
        merged
    }

    /// Encode and return the finalized byte stream. Returns `Ok(None)` if
    /// finalize was already called, or if no image was ever added
    /// (§4.2: "zero/all-invalid-image finalize returns false").
    pub fn finalize(&mut self) -> Result<Option<Vec<u8>>, ImageError> {
        if self.finalized || self.images.is_empty() {
            self.finalized = true;
            return Ok(None);
        }
        self.finalized = true;

        let quality = self
            .global_properties
            .get(dest_keys::LOSSY_COMPRESSION_QUALITY)
            .and_then(PropertyValue::as_i64)
            .map(|q| q.clamp(1, 100) as u8)
            .unwrap_or(85);
        let lossless = self
            .global_properties
            .get(dest_keys::LOSSLESS)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(true);
        let preserve_alpha = self
            .global_properties
            .get(dest_keys::PRESERVE_ALPHA)
            .and_then(PropertyValue::as_bool)
            .unwrap_or(true);
        let needs_opaque =
            matches!(self.format, ImageFormatTag::Jpeg) || (self.format == ImageFormatTag::Bmp && !preserve_alpha);

        let prepared: Vec<Image> = (0..self.images.len())
            .map(|i| prepare_image(&self.images[i].image, &self.merged_properties(i), needs_opaque))
            .collect();

        let stop = self.stop.as_ref();
        let bytes = match self.format {
            ImageFormatTag::Png => png::encode(&prepared[0], stop)?,
            ImageFormatTag::Jpeg => jpeg::encode(&prepared[0], quality, stop)?,
            ImageFormatTag::Bmp => bmp::encode(&prepared[0], preserve_alpha, stop)?,
            ImageFormatTag::WebP => {
                if lossless {
                    webp::encode_lossless(&prepared[0], stop)?
                } else {
                    webp::encode_lossy(&prepared[0], quality, stop)?
                }
            }
            ImageFormatTag::Tiff => {
                let refs: Vec<&Image> = prepared.iter().collect();
                tiff::encode(&refs, stop)?
            }
            ImageFormatTag::Gif => {
                let frames: Vec<EncodeFrame> = prepared
                    .iter()
                    .zip(self.images.iter())
                    .map(|(image, p)| EncodeFrame {
                        image,
                        delay_centiseconds: p
                            .properties
                            .get(dest_keys::DELAY)
                            .and_then(PropertyValue::as_i64)
                            .map(|d| d as u16)
                            .unwrap_or(0),
                    })
                    .collect();
                let (width, height) = (prepared[0].width() as u16, prepared[0].height() as u16);
                let dither = self
                    .global_properties
                    .get(dest_keys::DITHER)
                    .and_then(PropertyValue::as_bool)
                    .unwrap_or(false);
                gif::encode(width, height, &frames, dither, stop)?
            }
        };
        Ok(Some(bytes))
    }
}

/// Apply, in order, the orientation/downscale/background-flatten option keys
/// (§4.2, §6) merged for this image: rotate/flip to upright, downscale to
/// `ImageMaxPixelSize` if set, then flatten alpha onto `BackgroundColor` if
/// `needs_opaque` and the image still carries an alpha channel.
fn prepare_image(image: &Image, properties: &Properties, needs_opaque: bool) -> Image {
    let mut out = match properties.get(dest_keys::ORIENTATION).and_then(PropertyValue::as_i64) {
        Some(value) => orient::apply_orientation(image, value),
        None => image.clone(),
    };
    if let Some(max) = properties
        .get(dest_keys::IMAGE_MAX_PIXEL_SIZE)
        .and_then(PropertyValue::as_i64)
        .filter(|&v| v > 0)
    {
        out = thumbnail::scale_to_max_pixel_size(&out, max as u32);
    }
    if needs_opaque && out.format().alpha.has_alpha() {
        let packed = properties.get(dest_keys::BACKGROUND_COLOR).and_then(PropertyValue::as_i64).unwrap_or(0);
        let bg = [(packed >> 16) as u8, (packed >> 8) as u8, packed as u8];
        out = flatten_background(&out, bg);
    }
    out
}

/// Alpha-composite `image` onto an opaque `bg` (`[r, g, b]`), producing a
/// compact RGB image. Goes through [`Image::to_rgba8`], the same
/// normalization boundary codecs use when they disagree on pixel format.
fn flatten_background(image: &Image, bg: [u8; 3]) -> Image {
    let rgba = image.to_rgba8();
    let (w, h) = (rgba.width(), rgba.height());
    let mut out = vec![0u8; w as usize * h as usize * 3];
    for y in 0..h {
        let row = rgba.row(y);
        let dst_row = &mut out[y as usize * w as usize * 3..][..w as usize * 3];
        for x in 0..w as usize {
            let px = &row[x * 4..x * 4 + 4];
            let a = px[3] as u32;
            let blend = |c: u8, bg_c: u8| -> u8 { ((c as u32 * a + bg_c as u32 * (255 - a)) / 255) as u8 };
            dst_row[x * 3] = blend(px[0], bg[0]);
            dst_row[x * 3 + 1] = blend(px[1], bg[1]);
            dst_row[x * 3 + 2] = blend(px[2], bg[2]);
        }
    }
    Image::new(w, h, PixelFormat::RGB, out).expect("flattened compact buffer")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(w: u32, h: u32) -> Image {
        Image::new(w, h, PixelFormat::RGB, vec![128u8; w as usize * h as usize * 3]).unwrap()
    }

    #[test]
    fn zero_image_count_rejected() {
        assert!(ImageDestination::create(ImageFormatTag::Png, 0, &Properties::new()).is_none());
    }

    #[test]
    fn finalize_without_images_returns_none() {
        let mut dest = ImageDestination::create(ImageFormatTag::Png, 1, &Properties::new()).unwrap();
        assert_eq!(dest.finalize().unwrap(), None);
    }

    #[test]
    fn finalize_twice_returns_none_second_time() {
        let mut dest = ImageDestination::create(ImageFormatTag::Png, 1, &Properties::new()).unwrap();
        assert!(dest.add_image(solid(4, 4), Properties::new()));
        assert!(dest.finalize().unwrap().is_some());
        assert_eq!(dest.finalize().unwrap(), None);
    }

    #[test]
    fn add_image_past_capacity_is_rejected() {
        let mut dest = ImageDestination::create(ImageFormatTag::Png, 1, &Properties::new()).unwrap();
        assert!(dest.add_image(solid(2, 2), Properties::new()));
        assert!(!dest.add_image(solid(2, 2), Properties::new()));
    }

    #[test]
    fn png_destination_round_trips_through_decode() {
        let mut dest = ImageDestination::create(ImageFormatTag::Png, 1, &Properties::new()).unwrap();
        let img = solid(5, 3);
        dest.add_image(img.clone(), Properties::new());
        let bytes = dest.finalize().unwrap().unwrap();
        let decoded = png::decode(&bytes, &enough::Unstoppable).unwrap();
        assert_eq!(decoded.data(), img.data());
    }

    #[test]
    fn multi_page_tiff_encodes_all_added_images() {
        let mut dest = ImageDestination::create(ImageFormatTag::Tiff, 2, &Properties::new()).unwrap();
        dest.add_image(solid(4, 4), Properties::new());
        dest.add_image(solid(4, 4), Properties::new());
        let bytes = dest.finalize().unwrap().unwrap();
        let pages = tiff::decode_all(&bytes, &enough::Unstoppable).unwrap();
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn orientation_property_rotates_before_encode() {
        let mut dest = ImageDestination::create(ImageFormatTag::Png, 1, &Properties::new()).unwrap();
        let img = Image::new(3, 2, PixelFormat::GRAY, vec![0, 1, 2, 3, 4, 5]).unwrap();
        let mut props = Properties::new();
        props.set(dest_keys::ORIENTATION, PropertyValue::Int(6));
        dest.add_image(img, props);
        let bytes = dest.finalize().unwrap().unwrap();
        let decoded = png::decode(&bytes, &enough::Unstoppable).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (2, 3));
        assert_eq!(decoded.data(), &[3, 0, 4, 1, 5, 2]);
    }

    #[test]
    fn image_max_pixel_size_downscales_before_encode() {
        let mut dest = ImageDestination::create(ImageFormatTag::Png, 1, &Properties::new()).unwrap();
        dest.set_properties(&{
            let mut p = Properties::new();
            p.set(dest_keys::IMAGE_MAX_PIXEL_SIZE, PropertyValue::Int(50));
            p
        });
        dest.add_image(solid(200, 100), Properties::new());
        let bytes = dest.finalize().unwrap().unwrap();
        let decoded = png::decode(&bytes, &enough::Unstoppable).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (50, 25));
    }

    #[test]
    fn jpeg_destination_flattens_alpha_onto_background_color() {
        let mut dest = ImageDestination::create(ImageFormatTag::Jpeg, 1, &Properties::new()).unwrap();
        let img = Image::new(2, 2, PixelFormat::RGBA, vec![10, 20, 30, 0; 4]).unwrap();
        let mut props = Properties::new();
        props.set(dest_keys::BACKGROUND_COLOR, PropertyValue::Int(0x0000FF));
        dest.add_image(img, props);
        let bytes = dest.finalize().unwrap().unwrap();
        let decoded = jpeg::decode(&bytes, &enough::Unstoppable).unwrap();
        assert_eq!(decoded.format().color_model, crate::image::ColorModel::Rgb);
        assert!(!decoded.format().alpha.has_alpha());
        // fully transparent pixel composited onto blue should read close to blue.
        assert!(decoded.data()[2] > 200);
    }

    #[test]
    fn bmp_destination_flattens_alpha_when_preserve_alpha_false() {
        let mut dest = ImageDestination::create(ImageFormatTag::Bmp, 1, &Properties::new()).unwrap();
        let img = Image::new(2, 2, PixelFormat::RGBA, vec![200, 0, 0, 0; 4]).unwrap();
        let mut props = Properties::new();
        props.set(dest_keys::PRESERVE_ALPHA, PropertyValue::Bool(false));
        props.set(dest_keys::BACKGROUND_COLOR, PropertyValue::Int(0x00FF00));
        dest.add_image(img, props);
        let bytes = dest.finalize().unwrap().unwrap();
        let decoded = bmp::decode(&bytes, &enough::Unstoppable).unwrap();
        assert!(!decoded.format().alpha.has_alpha());
        assert_eq!(decoded.data()[1], 255);
    }
}
