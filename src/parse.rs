//! Block level parsing of a GIF stream into a [`Gif`] document.
//!
//! Parsing is a small state machine. The header and logical screen descriptor must be
//! well-formed, any problem there is fatal. After that the parser is forgiving: unknown
//! blocks and extensions are skipped with a [`Warning`] and a stream that ends early keeps
//! the frames found so far.
use std::time::Instant;

use log::{debug, warn};

use crate::block::{
    Application, Extension, Frame, Gif, GraphicControl, PlainText, Version,
    APPLICATION_BLOCK_SIZE, DEFAULT_DELAY_MS, EXTENSION_INTRODUCER, GRAPHIC_CONTROL_BLOCK_SIZE,
    IMAGE_SEPARATOR, LABEL_APPLICATION, LABEL_COMMENT, LABEL_GRAPHIC_CONTROL, LABEL_PLAIN_TEXT,
    NETSCAPE, PLAIN_TEXT_BLOCK_SIZE, SIGNATURE, TRAILER,
};
use crate::error::{DecodingError, Warning};
use crate::stream::ByteReader;

/// Parse the block structure of a complete GIF file.
///
/// Compressed image data is not touched, frames only record the ranges of their data
/// sub-blocks. Use [`Decoder`](crate::Decoder) to get pixels.
pub fn parse(data: &[u8]) -> Result<Gif, DecodingError> {
    let start = Instant::now();
    let mut parser = BlockParser::new(data);
    let gif = parser.run()?;
    debug!(
        "decode:parse {} frames, {} warnings in {:?}",
        gif.frames.len(),
        gif.warnings.len(),
        start.elapsed()
    );
    Ok(gif)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    LogicalScreenDescriptor,
    Blocks,
    Done,
}

/// What the main loop found after a block introducer.
enum Step {
    Continue,
    Trailer,
}

struct BlockParser<'a> {
    reader: ByteReader<'a>,
    state: State,
    gif: Gif,
    /// Extensions waiting for the next image descriptor.
    pending: Vec<Extension>,
}

impl<'a> BlockParser<'a> {
    fn new(data: &'a [u8]) -> Self {
        BlockParser {
            reader: ByteReader::new(data),
            state: State::Header,
            gif: Gif::default(),
            pending: Vec::new(),
        }
    }

    fn run(&mut self) -> Result<Gif, DecodingError> {
        loop {
            match self.state {
                State::Header => {
                    self.read_header()?;
                    self.state = State::LogicalScreenDescriptor;
                }
                State::LogicalScreenDescriptor => {
                    self.read_screen_descriptor()?;
                    self.state = State::Blocks;
                }
                State::Blocks => {
                    match self.read_block() {
                        Ok(Step::Continue) => {}
                        Ok(Step::Trailer) => self.state = State::Done,
                        Err(DecodingError::UnexpectedEof { offset, .. }) => {
                            self.warn(Warning::MissingTrailer);
                            debug!("stream ends without trailer at offset {}", offset);
                            self.state = State::Done;
                        }
                        Err(err) => return Err(err),
                    }
                }
                State::Done => return Ok(core::mem::take(&mut self.gif)),
            }
        }
    }

    fn read_header(&mut self) -> Result<(), DecodingError> {
        let signature = self
            .reader
            .read_bytes(3)
            .map_err(|_| DecodingError::InvalidSignature)?;
        if signature != SIGNATURE {
            return Err(DecodingError::InvalidSignature);
        }

        let version = self.reader.read_bytes(3)?;
        self.gif.version = Version::from_bytes(version).ok_or_else(|| {
            DecodingError::UnsupportedVersion(version.iter().map(|&b| char::from(b)).collect())
        })?;
        Ok(())
    }

    fn read_screen_descriptor(&mut self) -> Result<(), DecodingError> {
        self.gif.width = self.reader.read_u16_le()?;
        self.gif.height = self.reader.read_u16_le()?;
        let packed = self.reader.read_bits8()?;
        self.gif.background_color_index = self.reader.read_u8()?;
        self.gif.pixel_aspect_ratio = self.reader.read_u8()?;
        if self.gif.width == 0 || self.gif.height == 0 {
            self.warn(Warning::EmptyScreen {
                width: self.gif.width,
                height: self.gif.height,
            });
        }

        let has_table = packed[0];
        self.gif.color_resolution = bits_value(&packed[1..4]) + 1;
        self.gif.global_table_sorted = packed[4];
        let table_len = 1usize << (bits_value(&packed[5..8]) + 1);

        if has_table {
            self.gif.global_color_table = Some(self.reader.read_color_table(table_len)?);
        }
        Ok(())
    }

    fn read_block(&mut self) -> Result<Step, DecodingError> {
        let offset = self.reader.position();
        match self.reader.read_u8()? {
            EXTENSION_INTRODUCER => {
                let extension = self.read_extension()?;
                self.pending.push(extension);
                Ok(Step::Continue)
            }
            IMAGE_SEPARATOR => {
                self.read_image()?;
                Ok(Step::Continue)
            }
            TRAILER => Ok(Step::Trailer),
            byte => {
                self.warn(Warning::UnknownBlock { offset, byte });
                Ok(Step::Continue)
            }
        }
    }

    fn read_extension(&mut self) -> Result<Extension, DecodingError> {
        let offset = self.reader.position() - 1;
        let label = self.reader.read_u8()?;
        match label {
            LABEL_APPLICATION => self.read_application(offset),
            LABEL_GRAPHIC_CONTROL => self.read_graphic_control(offset),
            LABEL_COMMENT => {
                let text = self.reader.read_sub_blocks()?;
                Ok(Extension::Comment(latin1(&text)))
            }
            LABEL_PLAIN_TEXT => self.read_plain_text(offset),
            label => {
                self.warn(Warning::UnknownExtension { offset, label });
                let data = self.reader.read_sub_blocks()?;
                Ok(Extension::Unknown { label, data })
            }
        }
    }

    fn read_application(&mut self, offset: usize) -> Result<Extension, DecodingError> {
        let block_size = self.reader.read_u8()?;
        if block_size != APPLICATION_BLOCK_SIZE {
            return self.skip_malformed(offset, LABEL_APPLICATION, block_size);
        }

        let identifier = self.reader.read_string(8)?;
        let authentication_code = self.reader.read_string(3)?;

        let first_len = self.reader.read_u8()?;
        let first = self.reader.read_bytes(usize::from(first_len))?;
        let mut data = first.to_vec();
        if first_len != 0 {
            data.extend(self.reader.read_sub_blocks()?);
        }

        let is_netscape = identifier.len() + authentication_code.len() == NETSCAPE.len()
            && NETSCAPE.starts_with(&identifier)
            && NETSCAPE.ends_with(&authentication_code);
        if is_netscape && first_len == 3 && first[0] == 1 {
            self.gif.looped = true;
            self.gif.loop_count = u16::from_le_bytes([first[1], first[2]]);
        }

        Ok(Extension::Application(Application {
            identifier,
            authentication_code,
            data,
        }))
    }

    fn read_graphic_control(&mut self, offset: usize) -> Result<Extension, DecodingError> {
        let block_size = self.reader.read_u8()?;
        if block_size != GRAPHIC_CONTROL_BLOCK_SIZE {
            return self.skip_malformed(offset, LABEL_GRAPHIC_CONTROL, block_size);
        }

        let packed = self.reader.read_bits8()?;
        let delay_cs = self.reader.read_u16_le()?;
        let index = self.reader.read_u8()?;
        self.reader.skip_sub_blocks()?;

        Ok(Extension::GraphicControl(GraphicControl {
            delay_cs,
            disposal: bits_value(&packed[3..6]).into(),
            user_input: packed[6],
            transparent_index: if packed[7] { Some(index) } else { None },
            reserved: bits_value(&packed[0..3]),
        }))
    }

    fn read_plain_text(&mut self, offset: usize) -> Result<Extension, DecodingError> {
        let block_size = self.reader.read_u8()?;
        if block_size != PLAIN_TEXT_BLOCK_SIZE {
            return self.skip_malformed(offset, LABEL_PLAIN_TEXT, block_size);
        }

        let left = self.reader.read_u16_le()?;
        let top = self.reader.read_u16_le()?;
        let width = self.reader.read_u16_le()?;
        let height = self.reader.read_u16_le()?;
        let cell_width = self.reader.read_u8()?;
        let cell_height = self.reader.read_u8()?;
        let foreground_index = self.reader.read_u8()?;
        let background_index = self.reader.read_u8()?;
        let text = self.reader.read_sub_blocks()?;

        Ok(Extension::PlainText(PlainText {
            left,
            top,
            width,
            height,
            cell_width,
            cell_height,
            foreground_index,
            background_index,
            text: latin1(&text),
        }))
    }

    /// Skip an extension whose fixed block has the wrong size.
    ///
    /// The size byte doubles as the length of a first sub-block, so the remainder is just a
    /// run of sub-blocks.
    fn skip_malformed(
        &mut self,
        offset: usize,
        label: u8,
        block_size: u8,
    ) -> Result<Extension, DecodingError> {
        self.warn(Warning::MalformedExtension { offset, label });
        let mut data = self.reader.read_bytes(usize::from(block_size))?.to_vec();
        if block_size != 0 {
            data.extend(self.reader.read_sub_blocks()?);
        }
        Ok(Extension::Unknown { label, data })
    }

    fn read_image(&mut self) -> Result<(), DecodingError> {
        let index = self.gif.frames.len();
        let mut frame = Frame {
            left: self.reader.read_u16_le()?,
            top: self.reader.read_u16_le()?,
            width: self.reader.read_u16_le()?,
            height: self.reader.read_u16_le()?,
            delay_ms: DEFAULT_DELAY_MS,
            ..Frame::default()
        };

        if frame.width == 0 || frame.height == 0 {
            return Err(DecodingError::InvalidFrameDimensions {
                index,
                width: frame.width,
                height: frame.height,
            });
        }

        let packed = self.reader.read_bits8()?;
        frame.interlaced = packed[1];
        frame.local_table_sorted = packed[2];
        if packed[0] {
            let len = 1usize << (bits_value(&packed[5..8]) + 1);
            frame.local_color_table = Some(self.reader.read_color_table(len)?);
        }

        frame.lzw_min_code_size = self.reader.read_u8()?;
        let (data, complete) = self.reader.sub_block_ranges();
        frame.data = data;

        self.attach_pending(&mut frame);
        self.gif.frames.push(frame);

        if complete {
            Ok(())
        } else {
            Err(DecodingError::UnexpectedEof {
                offset: self.reader.position(),
                wanted: 1,
            })
        }
    }

    fn attach_pending(&mut self, frame: &mut Frame) {
        for extension in self.pending.drain(..) {
            match extension {
                Extension::GraphicControl(control) => {
                    frame.delay_ms = match control.delay_cs {
                        0 => DEFAULT_DELAY_MS,
                        cs => u32::from(cs) * 10,
                    };
                    frame.graphic_control = Some(control);
                }
                Extension::Comment(text) => frame.comment = Some(text),
                Extension::Application(application) => frame.application = Some(application),
                Extension::PlainText(text) => frame.plain_text = Some(text),
                Extension::Unknown { .. } => {}
            }
        }
    }

    fn warn(&mut self, warning: Warning) {
        warn!("{}", warning);
        self.gif.warnings.push(warning);
    }
}

fn bits_value(bits: &[bool]) -> u8 {
    bits.iter().fold(0, |acc, &bit| (acc << 1) | u8::from(bit))
}

fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}
