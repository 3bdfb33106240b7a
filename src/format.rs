//! Format detection (§4.1): UTI-style tags and the fixed magic-byte table.

/// One of the six recognized container formats, tagged with its UTI-style
/// identifier string (§6, "Recognized format tags").
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageFormatTag {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Tiff,
    WebP,
}

impl ImageFormatTag {
    /// The UTI-style string identifier (case-sensitive, matches §6 exactly).
    pub fn identifier(&self) -> &'static str {
        match self {
            ImageFormatTag::Png => "public.png",
            ImageFormatTag::Jpeg => "public.jpeg",
            ImageFormatTag::Gif => "com.compuserve.gif",
            ImageFormatTag::Bmp => "com.microsoft.bmp",
            ImageFormatTag::Tiff => "public.tiff",
            ImageFormatTag::WebP => "org.webmproject.webp",
        }
    }
}

/// Minimum number of leading bytes needed before detection is attempted
/// (§4.1: "inspect the leading bytes ... once at least 12 bytes are
/// available").
pub const DETECTION_MINIMUM: usize = 12;

/// Sniff the format from a buffer's leading bytes. Longer/more specific
/// patterns are checked first so a shorter prefix of a longer signature
/// cannot misfire (monotonic-under-prefix-extension, §8).
///
/// Returns `None` if no recognized magic matches; callers distinguish
/// `unknown_type` from `invalid_data` by whether the buffer is at least
/// [`DETECTION_MINIMUM`] bytes long (see `source::Status`).
pub fn detect_format(buf: &[u8]) -> Option<ImageFormatTag> {
    if buf.starts_with(b"\x89PNG\r\n\x1a\n") {
        return Some(ImageFormatTag::Png);
    }
    if buf.starts_with(b"\xFF\xD8\xFF") {
        return Some(ImageFormatTag::Jpeg);
    }
    if buf.starts_with(b"GIF87a") || buf.starts_with(b"GIF89a") {
        return Some(ImageFormatTag::Gif);
    }
    if buf.len() >= 6 && &buf[0..2] == b"BM" {
        let file_size = u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]);
        // A BMP file size field of 0 is a common placeholder some encoders
        // leave behind; anything else must be at least the 14-byte file
        // header to be plausible.
        if file_size == 0 || file_size >= 14 {
            return Some(ImageFormatTag::Bmp);
        }
    }
    if buf.starts_with(b"\x49\x49\x2A\x00") || buf.starts_with(b"\x4D\x4D\x00\x2A") {
        return Some(ImageFormatTag::Tiff);
    }
    if buf.len() >= 12 && &buf[0..4] == b"RIFF" && &buf[8..12] == b"WEBP" {
        return Some(ImageFormatTag::WebP);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_png_signature() {
        let buf = b"\x89PNG\r\n\x1a\n\0\0\0\0extra";
        assert_eq!(detect_format(buf), Some(ImageFormatTag::Png));
    }

    #[test]
    fn detects_jpeg_prefix() {
        assert_eq!(detect_format(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormatTag::Jpeg));
    }

    #[test]
    fn detects_gif89a() {
        assert_eq!(detect_format(b"GIF89a rest of header"), Some(ImageFormatTag::Gif));
    }

    #[test]
    fn random_bytes_detect_nothing() {
        assert_eq!(detect_format(&[0x00, 0x01, 0x02, 0x03]), None);
    }

    #[test]
    fn detection_monotonic_under_prefix_extension() {
        let short = b"\x89PNG\r\n\x1a\n";
        let long = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
        assert_eq!(detect_format(short), detect_format(&long));
    }
}
