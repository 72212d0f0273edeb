//! Byte level reading and writing of GIF streams.
//!
//! GIF stores all multi-byte integers little endian and chunks variable length data into
//! sub-blocks of at most 255 bytes, each prefixed by its length and the whole run closed by
//! a zero length block. The reader and writer here know about that convention.
use core::ops::Range;

use crate::block::{Palette, Rgb};
use crate::error::DecodingError;

/// Size of one page of the chunked writer.
const PAGE_SIZE: usize = 4096;

/// Sequential cursor over an immutable byte slice.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

/// Append-only byte sink that grows in fixed pages.
///
/// Positions can be captured with [`cursor`] and patched later with [`write_at`], which is
/// how sub-block length bytes are filled in after their payload was written.
///
/// [`cursor`]: #method.cursor
/// [`write_at`]: #method.write_at
#[derive(Debug)]
pub struct ByteWriter {
    pages: Vec<Vec<u8>>,
}

/// A captured position of a [`ByteWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteCursor {
    page: usize,
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        ByteReader { data, pos: 0 }
    }

    /// The offset of the next byte to be read.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodingError> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => {
                let bytes = &self.data[self.pos..end];
                self.pos = end;
                Ok(bytes)
            }
            None => Err(DecodingError::UnexpectedEof {
                offset: self.pos,
                wanted: len,
            }),
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, DecodingError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, DecodingError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read `len` bytes as (latin-1) text.
    pub fn read_string(&mut self, len: usize) -> Result<String, DecodingError> {
        Ok(self.read_bytes(len)?.iter().map(|&b| char::from(b)).collect())
    }

    /// Read one byte as its bits, most significant first.
    pub fn read_bits8(&mut self) -> Result<[bool; 8], DecodingError> {
        let byte = self.read_u8()?;
        let mut bits = [false; 8];
        for (i, bit) in bits.iter_mut().enumerate() {
            *bit = byte & (0x80 >> i) != 0;
        }
        Ok(bits)
    }

    pub fn read_color_table(&mut self, len: usize) -> Result<Palette, DecodingError> {
        let bytes = self.read_bytes(3 * len)?;
        Ok(bytes
            .chunks_exact(3)
            .map(|c| Rgb::new(c[0], c[1], c[2]))
            .collect())
    }

    /// Read a run of data sub-blocks and concatenate their payloads.
    pub fn read_sub_blocks(&mut self) -> Result<Vec<u8>, DecodingError> {
        let mut payload = Vec::new();
        loop {
            let len = self.read_u8()?;
            if len == 0 {
                return Ok(payload);
            }
            payload.extend_from_slice(self.read_bytes(usize::from(len))?);
        }
    }

    /// Skip a run of data sub-blocks.
    pub fn skip_sub_blocks(&mut self) -> Result<(), DecodingError> {
        loop {
            let len = self.read_u8()?;
            if len == 0 {
                return Ok(());
            }
            self.read_bytes(usize::from(len))?;
        }
    }

    /// Record the payload ranges of a run of sub-blocks without copying them.
    ///
    /// A run cut off by the end of the data yields the ranges found so far, clamped to the
    /// data, and `false` as completion flag.
    pub fn sub_block_ranges(&mut self) -> (Vec<Range<usize>>, bool) {
        let mut ranges = Vec::new();
        loop {
            let len = match self.read_u8() {
                Ok(0) => return (ranges, true),
                Ok(len) => usize::from(len),
                Err(_) => return (ranges, false),
            };
            let start = self.pos;
            let end = (start + len).min(self.data.len());
            ranges.push(start..end);
            self.pos = end;
            if end - start < len {
                return (ranges, false);
            }
        }
    }
}

impl ByteWriter {
    pub fn new() -> Self {
        ByteWriter {
            pages: vec![Vec::with_capacity(PAGE_SIZE)],
        }
    }

    /// The position the next written byte will occupy.
    pub fn cursor(&self) -> WriteCursor {
        let page = self.pages.len() - 1;
        match self.pages[page].len() {
            // The next byte opens a fresh page.
            PAGE_SIZE => WriteCursor { page: page + 1, offset: 0 },
            offset => WriteCursor { page, offset },
        }
    }

    /// Total number of bytes written so far.
    pub fn len(&self) -> usize {
        self.absolute(self.cursor())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of bytes written since `cursor` was captured.
    pub fn distance(&self, cursor: WriteCursor) -> usize {
        self.len() - self.absolute(cursor)
    }

    pub fn write_u8(&mut self, byte: u8) {
        if self.pages[self.pages.len() - 1].len() == PAGE_SIZE {
            self.pages.push(Vec::with_capacity(PAGE_SIZE));
        }
        let last = self.pages.len() - 1;
        self.pages[last].push(byte);
    }

    /// Overwrite an already written byte.
    ///
    /// # Panics
    ///
    /// If the cursor points past the written data.
    pub fn write_at(&mut self, cursor: WriteCursor, byte: u8) {
        self.pages[cursor.page][cursor.offset] = byte;
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        let mut bytes = bytes;
        while !bytes.is_empty() {
            let last = self.pages.len() - 1;
            let room = PAGE_SIZE - self.pages[last].len();
            if room == 0 {
                self.pages.push(Vec::with_capacity(PAGE_SIZE));
                continue;
            }
            let (head, tail) = bytes.split_at(room.min(bytes.len()));
            self.pages[last].extend_from_slice(head);
            bytes = tail;
        }
    }

    pub fn write_u16_le(&mut self, value: u16) {
        self.write_bytes(&value.to_le_bytes());
    }

    pub fn write_str(&mut self, value: &str) {
        self.write_bytes(value.as_bytes());
    }

    pub fn write_color_table(&mut self, palette: &[Rgb]) {
        for color in palette {
            self.write_bytes(&[color.r, color.g, color.b]);
        }
    }

    /// Write `payload` as a run of sub-blocks including the terminator.
    pub fn write_sub_blocks(&mut self, payload: &[u8]) {
        for chunk in payload.chunks(255) {
            self.write_u8(chunk.len() as u8);
            self.write_bytes(chunk);
        }
        self.write_u8(0);
    }

    /// Drain all pages into one contiguous buffer and reset the writer.
    pub fn finish(&mut self) -> Vec<u8> {
        let pages = core::mem::replace(&mut self.pages, vec![Vec::with_capacity(PAGE_SIZE)]);
        let mut out = Vec::with_capacity(pages.iter().map(Vec::len).sum());
        for page in pages {
            out.extend_from_slice(&page);
        }
        out
    }

    fn absolute(&self, cursor: WriteCursor) -> usize {
        cursor.page * PAGE_SIZE + cursor.offset
    }
}

impl Default for ByteWriter {
    fn default() -> Self {
        ByteWriter::new()
    }
}
