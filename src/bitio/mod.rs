//! Bit-level readers and writers shared by every entropy coder: LSB-first
//! for DEFLATE/LZW/VP8L, MSB-first for JPEG, plus the VP8 arithmetic range
//! coder.

mod reader;
mod writer;
mod rangecoder;

pub use reader::LsbBitReader;
pub use writer::{LsbBitWriter, MsbBitWriter};
pub use rangecoder::{BoolReader, BoolWriter};
