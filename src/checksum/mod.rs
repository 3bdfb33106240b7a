//! CRC-32 (PNG) and Adler-32 (zlib) checksums.

mod adler32;
mod crc32;

pub use adler32::{adler32, Adler32};
pub use crc32::{combine as crc32_combine, crc32, Crc32};
