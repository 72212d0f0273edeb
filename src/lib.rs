//! # GIF decoder and encoder
//!
//! This crate reads GIF87a/89a files into fully composited RGBA frames and writes
//! sequences of RGBA frames back out as animated GIF89a files.
//!
//! Decoding parses the block structure eagerly but keeps image data compressed until a
//! frame is requested. Frames are then decompressed, deinterlaced and replayed onto a
//! canvas according to their disposal methods.
//!
//! Encoding samples all frames into one shared palette (median cut or NeuQuant), maps
//! every pixel to an index, crops each frame to the area that actually changed and
//! finally LZW-compresses the result into a GIF stream.
//!
//! Examplary use of the encoder and decoder:
//!
//! ```
//! use gifcodec::{decode, encode, EncoderOptions, Frame};
//!
//! let red = [255, 0, 0, 255].repeat(4);
//! let blue = [0, 0, 255, 255].repeat(4);
//! let frames = vec![Frame::new(red.clone()), Frame::new(blue)];
//!
//! let options = EncoderOptions::new(2, 2).with_max_colors(2);
//! let bytes = encode(&options, frames).unwrap();
//!
//! let decoded = decode(&bytes).unwrap();
//! assert_eq!(decoded.len(), 2);
//! assert_eq!(decoded[0].rgba, red);
//! ```
#![forbid(unsafe_code)]

pub(crate) const MAX_CODESIZE: u8 = 12;
pub(crate) const MAX_ENTRIES: usize = 1 << MAX_CODESIZE as usize;

/// Alias for a LZW code point
pub(crate) type Code = u16;

pub mod block;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod index;
pub mod lzw;
pub mod mux;
pub mod optimize;
pub mod parse;
pub mod quant;
pub mod stream;

pub use crate::block::{DisposalMethod, Gif, Palette, Rgb, Version};
pub use crate::decoder::{decode, decode_range, DecodedFrame, Decoder};
pub use crate::encoder::{encode, Algorithm, Encoder, EncoderOptions, Frame};
pub use crate::error::{DecodingError, EncodingError, Warning};
pub use crate::parse::parse;
