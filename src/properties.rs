//! The property dictionary (§3) returned by codec parsers and consumed by
//! destination handles at encode time.

use std::collections::BTreeMap;

/// A loosely-typed property value. Codecs populate/consume these by
/// well-known string keys rather than a closed struct, mirroring the
/// source/destination handles' "options dictionary" convention.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Dict(Properties),
}

impl PropertyValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            PropertyValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::Str(v) => Some(v),
            _ => None,
        }
    }
}

/// A string-keyed property dictionary. Ordered by key for deterministic
/// iteration (useful for tests and for stable TIFF/XMP emission order).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Properties {
    entries: BTreeMap<String, PropertyValue>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&PropertyValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Merge `other` into `self`, with `other`'s entries taking precedence —
    /// the per-image-overrides-global rule from §4.2's finalize dispatch.
    pub fn merge_from(&mut self, other: &Properties) {
        for (k, v) in &other.entries {
            self.entries.insert(k.clone(), v.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyValue)> {
        self.entries.iter()
    }
}

/// Well-known property keys populated by every codec's `properties()` call.
pub mod keys {
    pub const PIXEL_WIDTH: &str = "PixelWidth";
    pub const PIXEL_HEIGHT: &str = "PixelHeight";
    pub const DEPTH: &str = "Depth";
    pub const COLOR_MODEL: &str = "ColorModel";
    pub const ORIENTATION: &str = "Orientation";
    pub const HAS_ALPHA: &str = "HasAlpha";
}

/// Destination-side option keys consumed during `finalize()` (§6).
pub mod dest_keys {
    pub const LOSSY_COMPRESSION_QUALITY: &str = "LossyCompressionQuality";
    /// Packed `0xRRGGBB` (`PropertyValue::Int`), used to flatten alpha when
    /// the target format can't carry a channel of its own (JPEG always;
    /// BMP when `preserveAlpha` is false).
    pub const BACKGROUND_COLOR: &str = "BackgroundColor";
    /// EXIF tag 274 orientation value, `1..=8` (`PropertyValue::Int`).
    /// Applied as a rotate/flip before encode; `1` or absent is a no-op.
    pub const ORIENTATION: &str = "Orientation";
    /// Longer-side cap in pixels (`PropertyValue::Int`); the source image
    /// is downscaled (aspect-preserving) before encode if it exceeds this.
    pub const IMAGE_MAX_PIXEL_SIZE: &str = "ImageMaxPixelSize";
    pub const DELAY: &str = "delay";
    pub const PRESERVE_ALPHA: &str = "preserveAlpha";
    pub const LOSSLESS: &str = "lossless";
    /// `PropertyValue::Bool`, default false. GIF only: Floyd-Steinberg
    /// dither against the frame palette instead of flat nearest-color
    /// quantization.
    pub const DITHER: &str = "dither";
}

/// Source-side option keys recognized by `create_image`/`create_thumbnail`
/// (§4.1). The remaining keys §4.1 and §6 list (`TypeIdentifierHint`,
/// `ShouldCacheImmediately`, `CreateThumbnailFromImageAlways`,
/// `CreateThumbnailWithTransform`, `SubsampleFactor`) aren't consulted by
/// this crate's synchronous, single-shot decode path and were dropped
/// rather than carried as dead constants.
pub mod source_keys {
    /// `PropertyValue::Bool`, default true. When false, `create_image`
    /// bypasses the frame decoded at parse time and re-decodes straight
    /// from the encoded buffer instead of cloning the cached pixel data.
    pub const SHOULD_CACHE: &str = "ShouldCache";
    /// `PropertyValue::Int`, longer-side cap in pixels for
    /// `create_thumbnail`; absent means a full-resolution copy.
    pub const THUMBNAIL_MAX_PIXEL_SIZE: &str = "ThumbnailMaxPixelSize";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_prefers_other() {
        let mut base = Properties::new();
        base.set("a", PropertyValue::Int(1));
        let mut overlay = Properties::new();
        overlay.set("a", PropertyValue::Int(2));
        overlay.set("b", PropertyValue::Int(3));
        base.merge_from(&overlay);
        assert_eq!(base.get("a").unwrap().as_i64(), Some(2));
        assert_eq!(base.get("b").unwrap().as_i64(), Some(3));
    }
}
