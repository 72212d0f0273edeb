//! The LZW encoder.
use crate::stream::{ByteWriter, WriteCursor};
use crate::{Code, MAX_CODESIZE, MAX_ENTRIES};

/// Compress `indices` and write them as the image data of one frame.
///
/// Writes the minimum code size byte followed by the code stream chunked into sub-blocks, and
/// the terminating zero length block. Indices are masked to `min_code_size` bits, and
/// `min_code_size` itself is clamped to `2..=8`.
pub fn encode(min_code_size: u8, indices: &[u8], writer: &mut ByteWriter) {
    let min_size = min_code_size.clamp(2, 8);
    let mask = ((1u16 << min_size) - 1) as u8;

    writer.write_u8(min_size);
    let mut sink = SubBlocks::new(writer);
    let mut state = EncodeState::new(min_size);

    for &byte in indices {
        state.advance(byte & mask, &mut sink);
    }

    state.finish(&mut sink);
    sink.finish();
}

struct EncodeState {
    min_size: u8,

    /// The code of the indices read but not yet written, `None` right after a clear.
    current: Option<Code>,

    /// The code the next dictionary entry gets.
    next_code: Code,

    clear_code: Code,

    dictionary: Dictionary,

    buffer: LsbBuffer,
}

/// Codes waiting to be written, least significant bit first.
struct LsbBuffer {
    code_size: u8,
    buffer: u64,
    bits_in_buffer: u8,
}

/// Writes bytes as a run of sub-blocks, patching each length byte once the block is full.
struct SubBlocks<'w> {
    writer: &'w mut ByteWriter,
    length: WriteCursor,
}

/// Maps (prefix code, index) to the code of the extended string.
///
/// Open addressing with linear probing. There are never more than 4096 entries, so the
/// table stays at most half full.
struct Dictionary {
    keys: Box<[u32]>,
    codes: Box<[Code]>,
}

const SLOTS: usize = 2 * MAX_ENTRIES;
const EMPTY: u32 = u32::MAX;

impl EncodeState {
    fn new(min_size: u8) -> Self {
        let clear_code = 1 << min_size;
        let mut state = EncodeState {
            min_size,
            current: None,
            next_code: clear_code + 2,
            clear_code,
            dictionary: Dictionary::new(),
            buffer: LsbBuffer::new(min_size),
        };
        state.buffer.buffer_code(clear_code);
        state
    }

    fn advance(&mut self, byte: u8, sink: &mut SubBlocks<'_>) {
        let current = match self.current {
            Some(code) => code,
            None => {
                self.current = Some(Code::from(byte));
                return;
            }
        };

        if let Some(code) = self.dictionary.get(current, byte) {
            self.current = Some(code);
            return;
        }

        self.buffer.buffer_code(current);
        self.buffer.push_out(sink);

        if usize::from(self.next_code) >= MAX_ENTRIES {
            self.buffer.buffer_code(self.clear_code);
            self.buffer.push_out(sink);
            self.dictionary.clear();
            self.next_code = self.clear_code + 2;
            self.buffer.reset(self.min_size);
        } else {
            self.grow_for_next_code();
            self.dictionary.insert(current, byte, self.next_code);
            self.next_code += 1;
        }

        self.current = Some(Code::from(byte));
    }

    fn finish(&mut self, sink: &mut SubBlocks<'_>) {
        if let Some(code) = self.current.take() {
            self.buffer.buffer_code(code);
            // Reading this code makes the decoder add one more entry before it reads the
            // end code, which may widen the codes it expects.
            self.grow_for_next_code();
        }

        self.buffer.buffer_code(self.clear_code + 1);
        self.buffer.buffer_pad();
        self.buffer.push_out(sink);
    }

    fn grow_for_next_code(&mut self) {
        if self.next_code > self.buffer.max_code() && self.buffer.code_size < MAX_CODESIZE {
            self.buffer.code_size += 1;
        }
    }
}

impl LsbBuffer {
    fn new(min_size: u8) -> Self {
        LsbBuffer {
            code_size: min_size + 1,
            buffer: 0,
            bits_in_buffer: 0,
        }
    }

    fn reset(&mut self, min_size: u8) {
        self.code_size = min_size + 1;
    }

    fn buffer_code(&mut self, code: Code) {
        self.buffer |= u64::from(code) << self.bits_in_buffer;
        self.bits_in_buffer += self.code_size;
    }

    /// Move all complete bytes into the sink.
    fn push_out(&mut self, sink: &mut SubBlocks<'_>) {
        while self.bits_in_buffer >= 8 {
            sink.push((self.buffer & 0xff) as u8);
            self.buffer >>= 8;
            self.bits_in_buffer -= 8;
        }
    }

    fn buffer_pad(&mut self) {
        let to_byte = self.bits_in_buffer.wrapping_neg() & 0x7;
        self.bits_in_buffer += to_byte;
    }

    fn max_code(&self) -> Code {
        (1 << self.code_size) - 1
    }
}

impl<'w> SubBlocks<'w> {
    fn new(writer: &'w mut ByteWriter) -> Self {
        let length = writer.cursor();
        writer.write_u8(0);
        SubBlocks { writer, length }
    }

    fn push(&mut self, byte: u8) {
        self.writer.write_u8(byte);
        if self.writer.distance(self.length) == 256 {
            self.writer.write_at(self.length, 255);
            self.length = self.writer.cursor();
            self.writer.write_u8(0);
        }
    }

    fn finish(self) {
        let len = self.writer.distance(self.length) - 1;
        // An empty block left open doubles as the terminator.
        if len > 0 {
            self.writer.write_at(self.length, len as u8);
            self.writer.write_u8(0);
        }
    }
}

impl Dictionary {
    fn new() -> Self {
        Dictionary {
            keys: vec![EMPTY; SLOTS].into_boxed_slice(),
            codes: vec![0; SLOTS].into_boxed_slice(),
        }
    }

    fn clear(&mut self) {
        self.keys.fill(EMPTY);
    }

    fn get(&self, prefix: Code, byte: u8) -> Option<Code> {
        let key = Self::key(prefix, byte);
        let mut slot = Self::slot(key);
        loop {
            match self.keys[slot] {
                EMPTY => return None,
                k if k == key => return Some(self.codes[slot]),
                _ => slot = (slot + 1) % SLOTS,
            }
        }
    }

    fn insert(&mut self, prefix: Code, byte: u8, code: Code) {
        let key = Self::key(prefix, byte);
        let mut slot = Self::slot(key);
        while self.keys[slot] != EMPTY {
            slot = (slot + 1) % SLOTS;
        }
        self.keys[slot] = key;
        self.codes[slot] = code;
    }

    fn key(prefix: Code, byte: u8) -> u32 {
        u32::from(prefix) << 8 | u32::from(byte)
    }

    fn slot(key: u32) -> usize {
        // Fibonacci hashing down to the 13 bits of a slot index.
        (key.wrapping_mul(0x9E37_79B1) >> 19) as usize
    }
}
