//! TIFF container codec (§4.3.5): little-endian baseline strips, IFD tag
//! dispatch, multi-page chaining via NextIFD offsets.

mod decode;
mod encode;
mod tags;

pub use decode::{decode, decode_all};
pub use encode::encode;
