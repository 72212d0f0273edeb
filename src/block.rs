//! The GIF document model.
//!
//! A GIF file consists of a sequence of blocks in a specific order:
//!
//! * Header (signature and version)
//! * Logical screen descriptor
//! * Global color table *(optional)*
//! * Any number of frames, each:
//!   - extensions *(optional)*: graphic control, comment, application, plain text
//!   - image descriptor
//!   - local color table *(optional)*
//!   - LZW compressed image data
//! * Trailer
//!
//! [`Gif`] is the parsed form of that sequence. Image data is not decompressed while
//! parsing, a [`Frame`] only records where its compressed bytes live in the source.
use core::ops::Range;

use crate::error::Warning;

pub(crate) const SIGNATURE: &[u8; 3] = b"GIF";
pub(crate) const EXTENSION_INTRODUCER: u8 = 0x21;
pub(crate) const IMAGE_SEPARATOR: u8 = 0x2C;
pub(crate) const TRAILER: u8 = 0x3B;

pub(crate) const LABEL_PLAIN_TEXT: u8 = 0x01;
pub(crate) const LABEL_GRAPHIC_CONTROL: u8 = 0xF9;
pub(crate) const LABEL_COMMENT: u8 = 0xFE;
pub(crate) const LABEL_APPLICATION: u8 = 0xFF;

pub(crate) const APPLICATION_BLOCK_SIZE: u8 = 11;
pub(crate) const GRAPHIC_CONTROL_BLOCK_SIZE: u8 = 4;
pub(crate) const PLAIN_TEXT_BLOCK_SIZE: u8 = 12;

pub(crate) const NETSCAPE: &str = "NETSCAPE2.0";

/// Delay used when a frame declares none, in milliseconds.
pub const DEFAULT_DELAY_MS: u32 = 100;

/// An RGB color table entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Rgb { r, g, b }
    }
}

/// Ordered color table, the position of a color is its index.
pub type Palette = Vec<Rgb>;

/// The two versions of the format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Version {
    V87a,
    #[default]
    V89a,
}

impl Version {
    pub fn as_str(self) -> &'static str {
        match self {
            Version::V87a => "87a",
            Version::V89a => "89a",
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b"87a" => Some(Version::V87a),
            b"89a" => Some(Version::V89a),
            _ => None,
        }
    }
}

/// What happens to the area of a frame before the next frame is drawn.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DisposalMethod {
    /// No disposal specified, treated like `Keep`.
    #[default]
    Unspecified,
    /// Leave the frame in place.
    Keep,
    /// Clear the frame's area to the background.
    Background,
    /// Restore the area to what it was before the frame was drawn.
    Previous,
    /// Values 4 to 7, reserved by the format and treated like `Keep`.
    Reserved(u8),
}

impl From<u8> for DisposalMethod {
    fn from(n: u8) -> Self {
        match n & 0b0111 {
            0 => DisposalMethod::Unspecified,
            1 => DisposalMethod::Keep,
            2 => DisposalMethod::Background,
            3 => DisposalMethod::Previous,
            n => DisposalMethod::Reserved(n),
        }
    }
}

impl From<DisposalMethod> for u8 {
    fn from(d: DisposalMethod) -> Self {
        match d {
            DisposalMethod::Unspecified => 0,
            DisposalMethod::Keep => 1,
            DisposalMethod::Background => 2,
            DisposalMethod::Previous => 3,
            DisposalMethod::Reserved(n) => n & 0b0111,
        }
    }
}

/// Graphic control extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphicControl {
    /// Delay in 1/100 s as stored in the file.
    pub delay_cs: u16,
    pub disposal: DisposalMethod,
    pub user_input: bool,
    /// The transparent index, only present if the transparency flag is set.
    pub transparent_index: Option<u8>,
    pub reserved: u8,
}

/// Application extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Application {
    pub identifier: String,
    pub authentication_code: String,
    pub data: Vec<u8>,
}

/// Plain text extension. Carried along but never rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlainText {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub cell_width: u8,
    pub cell_height: u8,
    pub foreground_index: u8,
    pub background_index: u8,
    pub text: String,
}

/// One block of the stream body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extension {
    GraphicControl(GraphicControl),
    Comment(String),
    Application(Application),
    PlainText(PlainText),
    /// An extension label without interpretation, with its raw payload.
    Unknown { label: u8, data: Vec<u8> },
}

/// An image of the animation as described by the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    pub interlaced: bool,
    pub local_color_table: Option<Palette>,
    pub local_table_sorted: bool,
    pub lzw_min_code_size: u8,
    /// Payload ranges of the image data sub-blocks in the source buffer.
    pub data: Vec<Range<usize>>,
    /// Delay in milliseconds.
    pub delay_ms: u32,
    pub graphic_control: Option<GraphicControl>,
    pub comment: Option<String>,
    pub application: Option<Application>,
    pub plain_text: Option<PlainText>,
}

impl Frame {
    pub fn disposal(&self) -> DisposalMethod {
        self.graphic_control.map(|g| g.disposal).unwrap_or_default()
    }

    pub fn transparent_index(&self) -> Option<u8> {
        self.graphic_control.and_then(|g| g.transparent_index)
    }

    /// Number of compressed bytes over all sub-blocks.
    pub fn data_len(&self) -> usize {
        self.data.iter().map(|r| r.len()).sum()
    }

    pub(crate) fn pixel_count(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }
}

/// A parsed GIF document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gif {
    pub version: Version,
    pub width: u16,
    pub height: u16,
    pub global_color_table: Option<Palette>,
    pub global_table_sorted: bool,
    /// Bits per primary color of the source material, 1 to 8.
    pub color_resolution: u8,
    pub background_color_index: u8,
    pub pixel_aspect_ratio: u8,
    /// Whether a NETSCAPE2.0 looping extension was present.
    pub looped: bool,
    /// Loop count of the NETSCAPE2.0 extension, 0 means forever.
    pub loop_count: u16,
    pub frames: Vec<Frame>,
    /// Irregularities that were skipped while parsing.
    pub warnings: Vec<Warning>,
}

impl Gif {
    /// The color table that applies to the frame.
    pub fn palette_for<'a>(&'a self, frame: &'a Frame) -> Option<&'a Palette> {
        frame
            .local_color_table
            .as_ref()
            .or(self.global_color_table.as_ref())
    }

    /// Color of the background index, if there is a global table holding it.
    pub fn background_color(&self) -> Option<Rgb> {
        self.global_color_table
            .as_ref()
            .and_then(|t| t.get(usize::from(self.background_color_index)).copied())
    }
}

/// Size bits of the packed fields for a table of `len` entries.
///
/// `len` must be a power of two in `2..=256`.
pub(crate) fn table_size_bits(len: usize) -> u8 {
    (len.trailing_zeros() as u8).saturating_sub(1)
}

/// Whether `len` is a valid color table length.
pub(crate) fn is_valid_table_len(len: usize) -> bool {
    (2..=256).contains(&len) && len.is_power_of_two()
}
