//! Baseline sequential JPEG codec (§4.3.2): FDCT/quantization/Huffman on
//! the encode side; header parsing plus full 4:4:4 entropy decode on the
//! decode side (subsampled/progressive streams resolve dimensions only).

mod dct;
mod decode;
mod encode;
mod tables;

pub use decode::{decode, peek_properties};
pub use encode::encode;
