//! PNG container codec (§4.3.1): chunk parsing/writing, zlib/DEFLATE
//! payloads, and the five per-row filters.

mod decode;
mod encode;
mod filter;

pub use decode::{decode, peek_properties};
pub use encode::encode;
