//! Encode/decode round-trips across every container format, exercised
//! through the public codec entry points (§4.3) and the source/
//! destination handles (§4.1, §4.2).

use rasterpod::format::{detect_format, ImageFormatTag};
use rasterpod::properties::Properties;
use rasterpod::{bmp, gif, jpeg, png, tiff, webp};
use rasterpod::{ColorModel, Image, ImageDestination, ImageSource, PixelFormat};

fn checkerboard(w: u32, h: u32, format: PixelFormat) -> Image {
    let bpp = format.bytes_per_pixel();
    let mut pixels = vec![0u8; w as usize * h as usize * bpp];
    for y in 0..h as usize {
        for x in 0..w as usize {
            let off = (y * w as usize + x) * bpp;
            let on = (x + y) % 2 == 0;
            for c in 0..bpp {
                pixels[off + c] = if on { 200 + c as u8 * 20 } else { 10 + c as u8 * 30 };
            }
        }
    }
    Image::new(w, h, format, pixels).unwrap()
}

#[test]
fn png_roundtrip_rgb_is_exact() {
    let img = checkerboard(8, 6, PixelFormat::RGB);
    let encoded = png::encode(&img, &enough::Unstoppable).unwrap();
    let decoded = png::decode(&encoded, &enough::Unstoppable).unwrap();
    assert_eq!(decoded.data(), img.data());
    assert_eq!(decoded.format().color_model, ColorModel::Rgb);
}

#[test]
fn png_roundtrip_rgba_preserves_alpha() {
    let img = checkerboard(5, 5, PixelFormat::RGBA);
    let mut data = img.data().to_vec();
    for (i, b) in data.iter_mut().enumerate() {
        if i % 4 == 3 {
            *b = 128;
        }
    }
    let img = Image::new(5, 5, PixelFormat::RGBA, data).unwrap();
    let encoded = png::encode(&img, &enough::Unstoppable).unwrap();
    let decoded = png::decode(&encoded, &enough::Unstoppable).unwrap();
    assert_eq!(decoded.data(), img.data());
}

#[test]
fn png_roundtrip_gray() {
    let img = checkerboard(10, 3, PixelFormat::GRAY);
    let encoded = png::encode(&img, &enough::Unstoppable).unwrap();
    let decoded = png::decode(&encoded, &enough::Unstoppable).unwrap();
    assert_eq!(decoded.data(), img.data());
}

#[test]
fn jpeg_flat_color_survives_quantization_within_tolerance() {
    let img = Image::new(16, 16, PixelFormat::RGB, vec![120u8; 16 * 16 * 3]).unwrap();
    let encoded = jpeg::encode(&img, 90, &enough::Unstoppable).unwrap();
    let decoded = jpeg::decode(&encoded, &enough::Unstoppable).unwrap();
    for (a, b) in img.data().iter().zip(decoded.data()) {
        assert!((*a as i16 - *b as i16).abs() <= 6);
    }
}

#[test]
fn jpeg_peek_properties_matches_decoded_dimensions() {
    let img = Image::new(33, 21, PixelFormat::RGB, vec![30u8; 33 * 21 * 3]).unwrap();
    let encoded = jpeg::encode(&img, 80, &enough::Unstoppable).unwrap();
    let (w, h, components) = jpeg::peek_properties(&encoded).unwrap();
    assert_eq!((w, h), (33, 21));
    assert_eq!(components, 3);
}

#[test]
fn gif_static_single_frame_roundtrip() {
    let img = checkerboard(12, 8, PixelFormat::RGB);
    let frame = gif::EncodeFrame { image: &img, delay_centiseconds: 0 };
    let encoded = gif::encode(12, 8, &[frame], false, &enough::Unstoppable).unwrap();
    let decoded = gif::decode(&encoded, &enough::Unstoppable).unwrap();
    assert_eq!(decoded.frames.len(), 1);
    assert_eq!(decoded.width, 12);
    assert_eq!(decoded.height, 8);
}

#[test]
fn gif_multi_frame_animation_preserves_delays() {
    let a = checkerboard(6, 6, PixelFormat::RGB);
    let b = Image::new(6, 6, PixelFormat::RGB, vec![50u8; 6 * 6 * 3]).unwrap();
    let frames = [
        gif::EncodeFrame { image: &a, delay_centiseconds: 10 },
        gif::EncodeFrame { image: &b, delay_centiseconds: 20 },
    ];
    let encoded = gif::encode(6, 6, &frames, false, &enough::Unstoppable).unwrap();
    let decoded = gif::decode(&encoded, &enough::Unstoppable).unwrap();
    assert_eq!(decoded.frames.len(), 2);
    assert_eq!(decoded.frames[0].delay_centiseconds, 10);
    assert_eq!(decoded.frames[1].delay_centiseconds, 20);
    assert_eq!(decoded.loop_count, Some(0));
}

#[test]
fn bmp_roundtrip_rgb() {
    let img = checkerboard(5, 4, PixelFormat::RGB);
    let encoded = bmp::encode(&img, false, &enough::Unstoppable).unwrap();
    assert_eq!(&encoded[0..2], b"BM");
    let decoded = bmp::decode(&encoded, &enough::Unstoppable).unwrap();
    assert_eq!(decoded.to_rgba8().data(), img.to_rgba8().data());
}

#[test]
fn bmp_roundtrip_rgba_preserves_alpha() {
    let img = checkerboard(4, 4, PixelFormat::RGBA);
    let mut data = img.data().to_vec();
    for (i, b) in data.iter_mut().enumerate() {
        if i % 4 == 3 {
            *b = 64;
        }
    }
    let img = Image::new(4, 4, PixelFormat::RGBA, data).unwrap();
    let encoded = bmp::encode(&img, true, &enough::Unstoppable).unwrap();
    let decoded = bmp::decode(&encoded, &enough::Unstoppable).unwrap();
    assert_eq!(decoded.data(), img.data());
}

#[test]
fn tiff_multi_page_roundtrip() {
    let a = checkerboard(8, 6, PixelFormat::RGB);
    let b = Image::new(8, 6, PixelFormat::RGB, vec![77u8; 8 * 6 * 3]).unwrap();
    let encoded = tiff::encode(&[&a, &b], &enough::Unstoppable).unwrap();
    let pages = tiff::decode_all(&encoded, &enough::Unstoppable).unwrap();
    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].data(), a.data());
    assert_eq!(pages[1].data(), b.data());
}

#[test]
fn webp_lossless_roundtrip_is_exact() {
    let img = checkerboard(10, 7, PixelFormat::RGBA);
    let encoded = webp::encode_lossless(&img, &enough::Unstoppable).unwrap();
    let decoded = webp::decode(&encoded, &enough::Unstoppable).unwrap();
    assert_eq!(decoded.data(), img.to_rgba8().data());
}

#[test]
fn webp_lossy_decode_is_unsupported_but_header_parses() {
    let img = checkerboard(10, 7, PixelFormat::RGB);
    let encoded = webp::encode_lossy(&img, 60, &enough::Unstoppable).unwrap();
    let (w, h) = webp::peek_properties(&encoded).unwrap();
    assert_eq!((w, h), (10, 7));
    assert!(webp::decode(&encoded, &enough::Unstoppable).is_err());
}

#[test]
fn detect_format_recognizes_every_container() {
    let png_bytes = png::encode(&checkerboard(2, 2, PixelFormat::RGB), &enough::Unstoppable).unwrap();
    assert_eq!(detect_format(&png_bytes), Some(ImageFormatTag::Png));

    let jpeg_bytes = jpeg::encode(&checkerboard(16, 16, PixelFormat::RGB), 80, &enough::Unstoppable).unwrap();
    assert_eq!(detect_format(&jpeg_bytes), Some(ImageFormatTag::Jpeg));

    let img = checkerboard(4, 4, PixelFormat::RGB);
    let gif_bytes =
        gif::encode(4, 4, &[gif::EncodeFrame { image: &img, delay_centiseconds: 0 }], false, &enough::Unstoppable).unwrap();
    assert_eq!(detect_format(&gif_bytes), Some(ImageFormatTag::Gif));

    let bmp_bytes = bmp::encode(&img, false, &enough::Unstoppable).unwrap();
    assert_eq!(detect_format(&bmp_bytes), Some(ImageFormatTag::Bmp));

    let tiff_bytes = tiff::encode(&[&img], &enough::Unstoppable).unwrap();
    assert_eq!(detect_format(&tiff_bytes), Some(ImageFormatTag::Tiff));

    let webp_bytes = webp::encode_lossless(&img, &enough::Unstoppable).unwrap();
    assert_eq!(detect_format(&webp_bytes), Some(ImageFormatTag::WebP));
}

#[test]
fn source_and_destination_handles_round_trip_png_to_jpeg() {
    let img = checkerboard(20, 20, PixelFormat::RGB);
    let png_bytes = png::encode(&img, &enough::Unstoppable).unwrap();

    let source = ImageSource::from_data(png_bytes);
    assert_eq!(source.count(), 1);
    let decoded = source.create_image(0, &Properties::new()).unwrap();

    let mut dest = ImageDestination::create(ImageFormatTag::Jpeg, 1, &Properties::new()).unwrap();
    assert!(dest.add_image(decoded, Properties::new()));
    let jpeg_bytes = dest.finalize().unwrap().unwrap();

    let reloaded = ImageSource::from_data(jpeg_bytes);
    assert_eq!(reloaded.format_tag(), Some(ImageFormatTag::Jpeg));
    let reimg = reloaded.create_image(0, &Properties::new()).unwrap();
    assert_eq!((reimg.width(), reimg.height()), (20, 20));
}
