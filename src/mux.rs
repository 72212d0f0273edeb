//! Writing the block structure of a GIF89a stream.
//!
//! The [`Muxer`] writes the header, logical screen descriptor, global color table and
//! looping extension when created, the frame blocks as they are pushed, and the trailer when
//! finished. All inputs are validated before anything is written for them.
use crate::block::{
    self, Palette, Rgb, Version, APPLICATION_BLOCK_SIZE, EXTENSION_INTRODUCER,
    GRAPHIC_CONTROL_BLOCK_SIZE, IMAGE_SEPARATOR, LABEL_APPLICATION, LABEL_GRAPHIC_CONTROL,
    NETSCAPE, SIGNATURE, TRAILER,
};
use crate::error::EncodingError;
use crate::lzw;
use crate::optimize::OptimizedFrame;
use crate::stream::ByteWriter;

/// Color resolution written to the screen descriptor, 8 bits per primary.
const COLOR_RESOLUTION: u8 = 7;

/// The global part of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: Version,
    pub width: u32,
    pub height: u32,
    /// Entries of the global color table, padded with black to `color_table_size`.
    pub global_color_table: Option<Palette>,
    pub color_table_size: usize,
    pub background_color_index: u8,
    pub pixel_aspect_ratio: u8,
    /// Loop count of the NETSCAPE2.0 extension, `None` writes no extension.
    pub loop_count: Option<u16>,
}

/// Incremental GIF writer.
#[derive(Debug)]
pub struct Muxer {
    writer: ByteWriter,
    width: u16,
    height: u16,
    global_table_len: Option<usize>,
}

impl Muxer {
    /// Validate the header and write everything before the first frame.
    pub fn new(header: &Header) -> Result<Self, EncodingError> {
        let (width, height) = match (u16::try_from(header.width), u16::try_from(header.height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
            _ => {
                return Err(EncodingError::InvalidDimensions {
                    width: header.width,
                    height: header.height,
                })
            }
        };

        let global = match &header.global_color_table {
            Some(table) => {
                let len = header.color_table_size;
                if !block::is_valid_table_len(len) || table.len() > len {
                    return Err(EncodingError::InvalidColorTableSize(len.max(table.len())));
                }
                let index = usize::from(header.background_color_index);
                if index >= len {
                    return Err(EncodingError::BackgroundIndexOutOfRange { index, len });
                }
                if index == 0 {
                    return Err(EncodingError::BackgroundIndexZero);
                }
                Some(padded(table, len))
            }
            None => None,
        };

        let mut writer = ByteWriter::new();
        writer.write_bytes(SIGNATURE);
        writer.write_str(header.version.as_str());

        writer.write_u16_le(width);
        writer.write_u16_le(height);
        let mut packed = COLOR_RESOLUTION << 4;
        if let Some(table) = &global {
            packed |= 0x80 | block::table_size_bits(table.len());
        }
        writer.write_u8(packed);
        writer.write_u8(header.background_color_index);
        writer.write_u8(header.pixel_aspect_ratio);
        if let Some(table) = &global {
            writer.write_color_table(table);
        }

        if let Some(loop_count) = header.loop_count {
            writer.write_u8(EXTENSION_INTRODUCER);
            writer.write_u8(LABEL_APPLICATION);
            writer.write_u8(APPLICATION_BLOCK_SIZE);
            writer.write_str(NETSCAPE);
            writer.write_u8(3);
            writer.write_u8(1);
            writer.write_u16_le(loop_count);
            writer.write_u8(0);
        }

        Ok(Muxer {
            writer,
            width,
            height,
            global_table_len: global.map(|t| t.len()),
        })
    }

    /// Validate and write one frame.
    pub fn write_frame(&mut self, index: usize, frame: &OptimizedFrame) -> Result<(), EncodingError> {
        let bytes = self.encode_frame(index, frame)?;
        self.push_encoded(&bytes);
        Ok(())
    }

    /// The complete blocks of one frame, to be written with [`push_encoded`].
    ///
    /// Frames do not depend on each other, so this can run for several frames at once.
    ///
    /// [`push_encoded`]: #method.push_encoded
    pub fn encode_frame(&self, index: usize, frame: &OptimizedFrame) -> Result<Vec<u8>, EncodingError> {
        let right = u32::from(frame.left) + u32::from(frame.width);
        let bottom = u32::from(frame.top) + u32::from(frame.height);
        if frame.width == 0
            || frame.height == 0
            || right > u32::from(self.width)
            || bottom > u32::from(self.height)
        {
            return Err(EncodingError::InvalidFrameDimensions {
                index,
                width: u32::from(frame.width),
                height: u32::from(frame.height),
            });
        }

        let expected = usize::from(frame.width) * usize::from(frame.height);
        if frame.indices.len() != expected {
            return Err(EncodingError::PixelBufferMismatch {
                index,
                expected,
                actual: frame.indices.len(),
            });
        }

        let local = match &frame.local_palette {
            Some(table) if !block::is_valid_table_len(table.len()) => {
                return Err(EncodingError::InvalidColorTableSize(table.len()))
            }
            Some(table) => Some(table),
            None => None,
        };
        let table_len = local
            .map(|t| t.len())
            .or(self.global_table_len)
            .unwrap_or(256);
        if usize::from(frame.transparent_index) >= table_len {
            return Err(EncodingError::TransparentIndexOutOfRange {
                index: usize::from(frame.transparent_index),
                len: table_len,
            });
        }

        let mut writer = ByteWriter::new();

        writer.write_u8(EXTENSION_INTRODUCER);
        writer.write_u8(LABEL_GRAPHIC_CONTROL);
        writer.write_u8(GRAPHIC_CONTROL_BLOCK_SIZE);
        // reserved 000, disposal, no user input, transparency flag set
        writer.write_u8((u8::from(frame.disposal) & 0b111) << 2 | 1);
        writer.write_u16_le((frame.delay_ms / 10).min(u32::from(u16::MAX)) as u16);
        writer.write_u8(frame.transparent_index);
        writer.write_u8(0);

        writer.write_u8(IMAGE_SEPARATOR);
        writer.write_u16_le(frame.left);
        writer.write_u16_le(frame.top);
        writer.write_u16_le(frame.width);
        writer.write_u16_le(frame.height);
        match local {
            Some(table) => {
                writer.write_u8(0x80 | block::table_size_bits(table.len()));
                writer.write_color_table(table);
            }
            None => writer.write_u8(0),
        }

        lzw::encode(lzw::min_code_size_for(table_len), &frame.indices, &mut writer);
        Ok(writer.finish())
    }

    /// Append the bytes produced by [`encode_frame`].
    ///
    /// [`encode_frame`]: #method.encode_frame
    pub fn push_encoded(&mut self, bytes: &[u8]) {
        self.writer.write_bytes(bytes);
    }

    /// Write the trailer and return the stream.
    pub fn finish(mut self) -> Vec<u8> {
        self.writer.write_u8(TRAILER);
        self.writer.finish()
    }
}

/// `table` padded with black to `len` entries.
pub fn padded(table: &[Rgb], len: usize) -> Palette {
    let mut table = table.to_vec();
    table.resize(len.max(table.len()), Rgb::default());
    table
}

#[cfg(test)]
mod tests {
    use super::{Header, Muxer};
    use crate::block::{DisposalMethod, Rgb, Version};
    use crate::error::EncodingError;
    use crate::optimize::OptimizedFrame;

    fn header() -> Header {
        Header {
            version: Version::V89a,
            width: 2,
            height: 2,
            global_color_table: Some(vec![Rgb::new(255, 0, 0)]),
            color_table_size: 4,
            background_color_index: 3,
            pixel_aspect_ratio: 0,
            loop_count: Some(0),
        }
    }

    fn frame() -> OptimizedFrame {
        OptimizedFrame {
            left: 0,
            top: 0,
            width: 2,
            height: 2,
            indices: vec![0; 4],
            transparent_index: 3,
            delay_ms: 70,
            disposal: DisposalMethod::Keep,
            local_palette: None,
        }
    }

    #[test]
    fn writes_header_and_screen() {
        let bytes = Muxer::new(&header()).unwrap().finish();
        assert_eq!(&bytes[..6], b"GIF89a");
        assert_eq!(&bytes[6..10], &[2, 0, 2, 0]);
        // table present, resolution 7, 4 entries
        assert_eq!(bytes[10], 0b1111_0001);
        assert_eq!(&bytes[11..13], &[3, 0]);
        assert_eq!(&bytes[13..25], &[255, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(&bytes[25..28], &[0x21, 0xFF, 11]);
        assert_eq!(&bytes[28..39], b"NETSCAPE2.0");
        assert_eq!(&bytes[39..44], &[3, 1, 0, 0, 0]);
        assert_eq!(&bytes[44..], &[0x3B]);
    }

    #[test]
    fn writes_graphic_control_and_descriptor() {
        let mut muxer = Muxer::new(&header()).unwrap();
        let block = muxer.encode_frame(0, &frame()).unwrap();
        assert_eq!(&block[..8], &[0x21, 0xF9, 4, 0b0000_0101, 7, 0, 3, 0]);
        assert_eq!(&block[8..18], &[0x2C, 0, 0, 0, 0, 2, 0, 2, 0, 0]);
        assert_eq!(block[18], 2);
        muxer.write_frame(0, &frame()).unwrap();
    }

    #[test]
    fn validates_header() {
        let mut h = header();
        h.width = 0;
        assert_eq!(
            Muxer::new(&h).unwrap_err(),
            EncodingError::InvalidDimensions { width: 0, height: 2 }
        );

        let mut h = header();
        h.height = 65536;
        assert!(matches!(Muxer::new(&h), Err(EncodingError::InvalidDimensions { .. })));

        let mut h = header();
        h.color_table_size = 3;
        assert_eq!(Muxer::new(&h).unwrap_err(), EncodingError::InvalidColorTableSize(3));

        let mut h = header();
        h.background_color_index = 4;
        assert_eq!(
            Muxer::new(&h).unwrap_err(),
            EncodingError::BackgroundIndexOutOfRange { index: 4, len: 4 }
        );

        let mut h = header();
        h.background_color_index = 0;
        assert_eq!(Muxer::new(&h).unwrap_err(), EncodingError::BackgroundIndexZero);
    }

    #[test]
    fn validates_frames() {
        let muxer = Muxer::new(&header()).unwrap();

        let mut f = frame();
        f.left = 1;
        assert!(matches!(
            muxer.encode_frame(2, &f),
            Err(EncodingError::InvalidFrameDimensions { index: 2, .. })
        ));

        let mut f = frame();
        f.transparent_index = 4;
        assert_eq!(
            muxer.encode_frame(0, &f).unwrap_err(),
            EncodingError::TransparentIndexOutOfRange { index: 4, len: 4 }
        );

        let mut f = frame();
        f.local_palette = Some(vec![Rgb::default(); 5]);
        assert_eq!(muxer.encode_frame(0, &f).unwrap_err(), EncodingError::InvalidColorTableSize(5));

        let mut f = frame();
        f.indices.pop();
        assert_eq!(
            muxer.encode_frame(0, &f).unwrap_err(),
            EncodingError::PixelBufferMismatch { index: 0, expected: 4, actual: 3 }
        );
    }
}
