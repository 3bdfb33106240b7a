//! Corpus tests: varied patterns/sizes across formats, plus limits,
//! incremental source feeding, and thumbnailing (§8's testable
//! properties).

use rasterpod::format::ImageFormatTag;
use rasterpod::properties::Properties;
use rasterpod::source::Status;
use rasterpod::{bmp, gif, png, tiff};
use rasterpod::{Image, ImageDestination, ImageSource, Limits, PixelFormat};

fn noise_pattern(w: u32, h: u32, format: PixelFormat) -> Image {
    let bpp = format.bytes_per_pixel();
    let mut pixels = vec![0u8; w as usize * h as usize * bpp];
    let mut state: u32 = 0xDEAD_BEEF;
    for p in pixels.iter_mut() {
        state ^= state << 13;
        state ^= state >> 17;
        state ^= state << 5;
        *p = state as u8;
    }
    Image::new(w, h, format, pixels).unwrap()
}

#[test]
fn png_noise_roundtrip_various_sizes() {
    for (w, h) in [(1u32, 1u32), (3, 1), (1, 5), (17, 13), (64, 64)] {
        let img = noise_pattern(w, h, PixelFormat::RGB);
        let encoded = png::encode(&img, &enough::Unstoppable).unwrap();
        let decoded = png::decode(&encoded, &enough::Unstoppable).unwrap();
        assert_eq!(decoded.data(), img.data(), "mismatch at {w}x{h}");
    }
}

#[test]
fn gif_noise_roundtrip_quantizes_to_palette() {
    let img = noise_pattern(20, 15, PixelFormat::RGB);
    let frame = gif::EncodeFrame { image: &img, delay_centiseconds: 0 };
    let encoded = gif::encode(20, 15, &[frame], false, &enough::Unstoppable).unwrap();
    let decoded = gif::decode(&encoded, &enough::Unstoppable).unwrap();
    assert_eq!(decoded.frames.len(), 1);
    assert_eq!(decoded.frames[0].image.width(), 20);
    assert_eq!(decoded.frames[0].image.height(), 15);
}

#[test]
fn bmp_noise_roundtrip_32bit() {
    let img = noise_pattern(9, 7, PixelFormat::RGBA);
    let encoded = bmp::encode(&img, true, &enough::Unstoppable).unwrap();
    let decoded = bmp::decode(&encoded, &enough::Unstoppable).unwrap();
    assert_eq!(decoded.data(), img.data());
}

#[test]
fn tiff_noise_roundtrip_single_page() {
    let img = noise_pattern(11, 9, PixelFormat::RGB);
    let encoded = tiff::encode(&[&img], &enough::Unstoppable).unwrap();
    let pages = tiff::decode_all(&encoded, &enough::Unstoppable).unwrap();
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].data(), img.data());
}

#[test]
fn limits_reject_oversized_dimensions() {
    let limits = Limits { max_pixels: Some(10), ..Default::default() };
    assert!(limits.check(100, 100).is_err());
    assert!(limits.check(3, 3).is_ok());
}

#[test]
fn source_with_limits_rejects_oversized_decode() {
    let img = noise_pattern(50, 50, PixelFormat::RGB);
    let encoded = png::encode(&img, &enough::Unstoppable).unwrap();
    let source = ImageSource::from_data(encoded).with_limits(Limits { max_pixels: Some(100), ..Default::default() });
    assert_eq!(source.status(), Status::InvalidData);
}

#[test]
fn source_incremental_feed_reaches_complete() {
    let img = noise_pattern(6, 6, PixelFormat::RGB);
    let full = png::encode(&img, &enough::Unstoppable).unwrap();

    let mut source = ImageSource::empty();
    assert_eq!(source.status(), Status::Incomplete);

    let (first, rest) = full.split_at(full.len() / 2);
    source.update_data(first, false);
    assert_ne!(source.status(), Status::Complete);

    source.update_data(rest, true);
    assert_eq!(source.status(), Status::Complete);
    assert_eq!(source.count(), 1);
    let decoded = source.create_image(0, &Properties::new()).unwrap();
    assert_eq!(decoded.data(), img.data());
}

#[test]
fn source_rejects_unknown_magic_once_detection_minimum_reached() {
    let source = ImageSource::from_data(vec![0xAB; 32]);
    assert_eq!(source.status(), Status::UnknownType);
}

#[test]
fn source_thumbnail_preserves_aspect_ratio() {
    let img = noise_pattern(400, 100, PixelFormat::RGB);
    let encoded = bmp::encode(&img, false, &enough::Unstoppable).unwrap();
    let source = ImageSource::from_data(encoded);
    let mut options = Properties::new();
    options.set(rasterpod::properties::source_keys::THUMBNAIL_MAX_PIXEL_SIZE, rasterpod::PropertyValue::Int(80));
    let thumb = source.create_thumbnail(0, &options).unwrap();
    assert_eq!(thumb.width(), 80);
    assert_eq!(thumb.height(), 20);
}

#[test]
fn source_out_of_range_frame_returns_none() {
    let img = noise_pattern(4, 4, PixelFormat::RGB);
    let encoded = png::encode(&img, &enough::Unstoppable).unwrap();
    let source = ImageSource::from_data(encoded);
    assert!(source.create_image(5, &Properties::new()).is_none());
    assert!(source.properties(5).is_none());
}

#[test]
fn destination_caps_image_count_at_configured_maximum() {
    let mut dest = ImageDestination::create(ImageFormatTag::Tiff, 2, &Properties::new()).unwrap();
    let img = noise_pattern(4, 4, PixelFormat::RGB);
    assert!(dest.add_image(img.clone(), Properties::new()));
    assert!(dest.add_image(img.clone(), Properties::new()));
    assert!(!dest.add_image(img, Properties::new()));
}

#[test]
fn destination_reuses_source_frame_properties() {
    let img = noise_pattern(5, 5, PixelFormat::RGB);
    let encoded = png::encode(&img, &enough::Unstoppable).unwrap();
    let source = ImageSource::from_data(encoded);

    let mut dest = ImageDestination::create(ImageFormatTag::Png, 1, &Properties::new()).unwrap();
    assert!(dest.add_image_from_source(&source, 0, Properties::new()));
    let bytes = dest.finalize().unwrap().unwrap();
    let roundtripped = png::decode(&bytes, &enough::Unstoppable).unwrap();
    assert_eq!(roundtripped.data(), img.data());
}
