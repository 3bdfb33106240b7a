#![no_main]
use libfuzzer_sys::fuzz_target;
use rasterpod::{bmp, gif, jpeg, png, tiff, webp};

fuzz_target!(|data: &[u8]| {
    // None of these may panic on arbitrary bytes.
    let _ = png::decode(data, &enough::Unstoppable);
    let _ = jpeg::decode(data, &enough::Unstoppable);
    let _ = gif::decode(data, &enough::Unstoppable);
    let _ = bmp::decode(data, &enough::Unstoppable);
    let _ = tiff::decode_all(data, &enough::Unstoppable);
    let _ = webp::decode(data, &enough::Unstoppable);

    // The incremental source handle must also never panic, fed the whole
    // buffer at once or split across two updates.
    let _ = rasterpod::ImageSource::from_data(data.to_vec());
    let mid = data.len() / 2;
    let mut source = rasterpod::ImageSource::empty();
    source.update_data(&data[..mid], false);
    source.update_data(&data[mid..], true);
});
