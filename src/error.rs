//! Error and warning types for both coding directions.
use thiserror::Error;

/// A fatal problem while reading a GIF stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodingError {
    /// The stream does not start with `GIF`.
    #[error("not a GIF stream: invalid signature")]
    InvalidSignature,
    /// The version is neither `87a` nor `89a`.
    #[error("unsupported GIF version {0:?}")]
    UnsupportedVersion(String),
    /// A read went past the end of the buffer.
    #[error("unexpected end of data at offset {offset} while reading {wanted} bytes")]
    UnexpectedEof { offset: usize, wanted: usize },
    /// An image descriptor declared a zero sized frame.
    #[error("frame {index} has invalid dimensions {width}x{height}")]
    InvalidFrameDimensions { index: usize, width: u16, height: u16 },
    /// A frame was requested that the document does not contain.
    #[error("frame index {index} out of range, the document has {count} frames")]
    FrameIndexOutOfRange { index: usize, count: usize },
}

/// A problem with the input of an encode, detected before any byte is written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Logical screen dimensions outside of `1..=65535`.
    #[error("invalid screen dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    /// A frame does not fit the logical screen or is empty.
    #[error("frame {index} has invalid dimensions {width}x{height}")]
    InvalidFrameDimensions { index: usize, width: u32, height: u32 },
    /// Color tables must hold a power of two between 2 and 256 entries.
    #[error("invalid color table length {0}, must be a power of two in 2..=256")]
    InvalidColorTableSize(usize),
    /// The background index does not address the global color table.
    #[error("background index {index} out of range for a table of {len} colors")]
    BackgroundIndexOutOfRange { index: usize, len: usize },
    /// The background index was explicitly set to zero while a table is declared.
    #[error("background index explicitly set to 0")]
    BackgroundIndexZero,
    /// A transparent index does not address the active color table.
    #[error("transparent index {index} out of range for a table of {len} colors")]
    TransparentIndexOutOfRange { index: usize, len: usize },
    /// `max_colors` outside of `2..=255`.
    #[error("max colors {0} out of range, must be in 2..=255")]
    InvalidMaxColors(usize),
    /// The RGBA buffer length does not match the frame dimensions.
    #[error("frame {index} expected {expected} bytes of RGBA data but got {actual}")]
    PixelBufferMismatch { index: usize, expected: usize, actual: usize },
    /// `flush` was called without any frame.
    #[error("no frames to encode")]
    NoFrames,
}

/// A non-fatal irregularity found while parsing.
///
/// Warnings are collected on the parsed document and logged, decoding continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A block introducer that is neither extension, image nor trailer.
    UnknownBlock { offset: usize, byte: u8 },
    /// An extension label this decoder does not interpret. Its sub-blocks were skipped.
    UnknownExtension { offset: usize, label: u8 },
    /// A known extension with an unexpected block size. Its sub-blocks were skipped.
    MalformedExtension { offset: usize, label: u8 },
    /// The logical screen is zero pixels wide or high. Nothing can be displayed.
    EmptyScreen { width: u16, height: u16 },
    /// The stream ended without a trailer.
    MissingTrailer,
}

impl core::fmt::Display for Warning {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match *self {
            Warning::UnknownBlock { offset, byte } => {
                write!(f, "unknown block 0x{:02x} at offset {}", byte, offset)
            }
            Warning::UnknownExtension { offset, label } => {
                write!(f, "unknown extension 0x{:02x} at offset {}", label, offset)
            }
            Warning::MalformedExtension { offset, label } => {
                write!(f, "malformed extension 0x{:02x} at offset {}", label, offset)
            }
            Warning::EmptyScreen { width, height } => {
                write!(f, "logical screen of {}x{} pixels", width, height)
            }
            Warning::MissingTrailer => f.write_str("missing trailer"),
        }
    }
}
