//! GIF container codec (§4.3.3): LZW-compressed indexed frames, graphic
//! control/application extensions, NETSCAPE2.0 looping.

mod decode;
mod encode;

pub use decode::{decode, DecodedGif, Frame};
pub use encode::{encode, EncodeFrame};
