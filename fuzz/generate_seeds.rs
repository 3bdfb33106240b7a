#!/usr/bin/env -S cargo +nightly -Zscript
//! Generate seed corpus files for fuzzing.
//! Run: cargo +nightly -Zscript fuzz/generate_seeds.rs

fn main() {
    use std::fs;
    let dir = "fuzz/corpus/fuzz_decode";
    fs::create_dir_all(dir).unwrap();

    // Minimal 1x1 truecolor PNG (signature + IHDR + empty IDAT + IEND,
    // CRCs omitted — the decoder rejects it past the header, which still
    // exercises the chunk-walking path).
    let mut png = b"\x89PNG\r\n\x1a\n".to_vec();
    png.extend_from_slice(&13u32.to_be_bytes());
    png.extend_from_slice(b"IHDR");
    png.extend_from_slice(&1u32.to_be_bytes()); // width
    png.extend_from_slice(&1u32.to_be_bytes()); // height
    png.extend_from_slice(&[8, 2, 0, 0, 0]); // depth, color type, compr, filter, interlace
    png.extend_from_slice(&0u32.to_be_bytes()); // bogus CRC
    png.extend_from_slice(&0u32.to_be_bytes());
    png.extend_from_slice(b"IEND");
    png.extend_from_slice(&0u32.to_be_bytes());
    fs::write(format!("{dir}/png_1x1.png"), png).unwrap();

    // Minimal BMP 1x1 24-bit (BITMAPINFOHEADER).
    let mut bmp = vec![0u8; 58];
    bmp[0] = b'B';
    bmp[1] = b'M';
    bmp[2..6].copy_from_slice(&58u32.to_le_bytes());
    bmp[10..14].copy_from_slice(&54u32.to_le_bytes());
    bmp[14..18].copy_from_slice(&40u32.to_le_bytes());
    bmp[18..22].copy_from_slice(&1i32.to_le_bytes());
    bmp[22..26].copy_from_slice(&1i32.to_le_bytes());
    bmp[26..28].copy_from_slice(&1u16.to_le_bytes());
    bmp[28..30].copy_from_slice(&24u16.to_le_bytes());
    bmp[54] = 0xff;
    bmp[55] = 0x00;
    bmp[56] = 0x00;
    fs::write(format!("{dir}/bmp_1x1.bmp"), bmp).unwrap();

    // GIF87a header, logical screen descriptor, no image data.
    let gif = b"GIF87a\x01\x00\x01\x00\x00\x00\x00;".to_vec();
    fs::write(format!("{dir}/gif_header_only.gif"), gif).unwrap();

    // TIFF little-endian header with a dangling IFD offset.
    let mut tiff = vec![0u8; 8];
    tiff[0] = b'I';
    tiff[1] = b'I';
    tiff[2] = 42;
    tiff[4..8].copy_from_slice(&8u32.to_le_bytes());
    fs::write(format!("{dir}/tiff_header_only.tif"), tiff).unwrap();

    // WebP RIFF container wrapping a truncated VP8L chunk.
    let mut webp = b"RIFF".to_vec();
    webp.extend_from_slice(&20u32.to_le_bytes());
    webp.extend_from_slice(b"WEBPVP8L");
    webp.extend_from_slice(&4u32.to_le_bytes());
    webp.extend_from_slice(&[0x2f, 0x00, 0x00, 0x00]);
    fs::write(format!("{dir}/webp_vp8l_header_only.webp"), webp).unwrap();

    // JPEG SOI/EOI with no scan data.
    fs::write(format!("{dir}/jpeg_empty.jpg"), b"\xff\xd8\xff\xd9").unwrap();

    // Truncated/malformed seeds for edge coverage.
    fs::write(format!("{dir}/empty.bin"), b"").unwrap();
    fs::write(format!("{dir}/png_sig_only.bin"), b"\x89PNG\r\n\x1a\n").unwrap();
    fs::write(format!("{dir}/bm_short.bin"), b"BM\x00\x00").unwrap();
    fs::write(format!("{dir}/gif_no_trailer.bin"), b"GIF89a").unwrap();

    println!("Generated seed corpus in {dir}/");
}
