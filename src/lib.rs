//! # rasterpod
//!
//! Container codecs for PNG, JPEG, GIF, BMP, TIFF, and WebP behind a
//! single `ImageIO`-style source/destination handle pair, plus the shared
//! compression/entropy machinery (DEFLATE/zlib, LZW, JPEG Huffman, VP8
//! range coding) those codecs are built on.
//!
//! ## Overview
//!
//! - [`Image`] is the unified in-memory pixel buffer every codec decodes
//!   into and encodes from: width/height/stride, a [`PixelFormat`]
//!   (color model + alpha layout), and a [`ColorSpace`] tag.
//! - [`ImageSource`] wraps a buffer of encoded bytes — built all at once
//!   from a slice, a file path, or incrementally via `update_data` — and
//!   exposes per-frame decode, thumbnailing, and a status state machine
//!   for partial input.
//! - [`ImageDestination`] accumulates one or more images and finalizes
//!   them into a single encoded byte stream for a chosen container
//!   format.
//! - [`format::detect_format`] sniffs a format from its magic bytes;
//!   [`properties::Properties`] is the dynamically-typed option/metadata
//!   dictionary passed to and read from both handles.
//!
//! ## Errors
//!
//! Every fallible operation returns [`ImageError`], a `thiserror`-derived
//! enum distinguishing malformed input, unsupported bitstream features,
//! resource-limit violations, and cooperative cancellation (the last via
//! `enough::StopReason`, threaded through long-running decode loops).
//!
//! ## Example
//!
//! ```no_run
//! use rasterpod::{ImageSource, ImageDestination};
//! use rasterpod::format::ImageFormatTag;
//! use rasterpod::properties::Properties;
//!
//! let bytes = std::fs::read("photo.png")?;
//! let source = ImageSource::from_data(bytes);
//! let image = source.create_image(0, &Properties::new()).expect("decodable frame");
//!
//! let mut dest = ImageDestination::create(ImageFormatTag::Jpeg, 1, &Properties::new())
//!     .expect("non-zero image count");
//! dest.add_image(image, Properties::new());
//! let jpeg_bytes = dest.finalize()?.expect("at least one image was added");
//! # Ok::<(), rasterpod::error::ImageError>(())
//! ```

#![forbid(unsafe_code)]

pub mod bitio;
pub mod bmp;
pub mod checksum;
pub mod deflate;
pub mod destination;
pub mod error;
pub mod format;
pub mod gif;
pub mod image;
pub mod jpeg;
pub mod limits;
pub mod lzw;
pub mod metadata;
pub mod orient;
pub mod png;
pub mod properties;
pub mod quantize;
pub mod source;
pub mod thumbnail;
pub mod tiff;
pub mod webp;

pub use destination::ImageDestination;
pub use error::ImageError;
pub use format::ImageFormatTag;
pub use image::{AlphaLayout, ColorModel, ColorSpace, Image, PixelFormat};
pub use limits::Limits;
pub use properties::{PropertyValue, Properties};
pub use source::{ImageSource, Status as SourceStatus};
