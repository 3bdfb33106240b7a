use enough::StopReason;

/// Errors shared by every codec's decode/encode path.
///
/// Internally every parser classifies a failure as malformed-header,
/// truncated-input, unsupported-feature, checksum-mismatch,
/// bounds-violation, or allocator-failure; this enum is the externally
/// visible projection of that taxonomy.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ImageError {
    #[error("unrecognized format magic bytes")]
    UnrecognizedFormat,

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("invalid pixel or stream data: {0}")]
    InvalidData(String),

    #[error("dimensions too large: {width}x{height}")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("pixel format mismatch: expected {expected:?}, got {actual:?}")]
    FormatMismatch {
        expected: crate::image::PixelFormat,
        actual: crate::image::PixelFormat,
    },

    #[error("buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall { needed: usize, actual: usize },

    #[error("operation cancelled")]
    Cancelled(StopReason),
}

impl From<StopReason> for ImageError {
    fn from(r: StopReason) -> Self {
        ImageError::Cancelled(r)
    }
}

pub type Result<T> = core::result::Result<T, ImageError>;
