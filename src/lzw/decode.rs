//! The LZW decoder.
use log::debug;

use super::MIN_CODE_SIZE_RANGE;
use crate::{Code, MAX_CODESIZE, MAX_ENTRIES};

/// Decompress exactly `pixel_count` color indices.
///
/// `data` is the concatenated payload of the image data sub-blocks. Decoding stops at the
/// end code, at the first invalid code or once enough indices were produced. A stream that
/// runs short is padded with index 0, and so is a stream with an unusable `min_code_size`.
pub fn decode(min_code_size: u8, data: &[u8], pixel_count: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixel_count);

    if MIN_CODE_SIZE_RANGE.contains(&min_code_size) {
        let mut state = DecodeState::new(min_code_size);
        state.advance(data, &mut out, pixel_count);
    } else {
        debug!("unusable LZW minimum code size {}", min_code_size);
    }

    if out.len() < pixel_count {
        debug!(
            "LZW stream ended after {} of {} indices, padding",
            out.len(),
            pixel_count
        );
        out.resize(pixel_count, 0);
    }
    out
}

struct DecodeState {
    /// The original minimum code size.
    min_size: u8,

    /// The current code size.
    code_size: u8,

    /// The code the next table entry will get.
    next_code: Code,

    /// Code to reset all tables.
    clear_code: Code,

    /// Code to signal the end of the stream.
    end_code: Code,

    /// Table of decoded codes as (prefix code, last byte) links.
    prefix: Box<[Code]>,
    suffix: Box<[u8]>,

    /// Decoded bytes of the current code, in reverse.
    stack: Vec<u8>,

    bit_buffer: u64,
    bits: u8,
}

impl DecodeState {
    fn new(min_size: u8) -> Self {
        let clear_code = 1 << min_size;
        let mut state = DecodeState {
            min_size,
            code_size: min_size + 1,
            next_code: clear_code + 2,
            clear_code,
            end_code: clear_code + 1,
            prefix: vec![0; MAX_ENTRIES].into_boxed_slice(),
            suffix: vec![0; MAX_ENTRIES].into_boxed_slice(),
            stack: Vec::with_capacity(MAX_ENTRIES),
            bit_buffer: 0,
            bits: 0,
        };
        for code in 0..clear_code {
            state.suffix[usize::from(code)] = code as u8;
        }
        state
    }

    fn reset_tables(&mut self) {
        self.code_size = self.min_size + 1;
        self.next_code = self.clear_code + 2;
    }

    fn advance(&mut self, mut inp: &[u8], out: &mut Vec<u8>, limit: usize) {
        // The previous code and the first byte of its string.
        let mut last: Option<(Code, u8)> = None;

        while out.len() < limit {
            if let Some(byte) = self.stack.pop() {
                out.push(byte);
                continue;
            }

            let code = match self.next_symbol(&mut inp) {
                Some(code) => code,
                None => break,
            };

            if code == self.clear_code {
                self.reset_tables();
                last = None;
                continue;
            }

            if code == self.end_code || code > self.next_code {
                break;
            }

            let (prev, prev_first) = match last {
                Some(link) => link,
                None => {
                    // The first code after a reset must be a plain index.
                    if code >= self.clear_code {
                        debug!("LZW stream starts with non-literal code {}", code);
                        break;
                    }
                    let byte = self.suffix[usize::from(code)];
                    self.stack.push(byte);
                    last = Some((code, byte));
                    continue;
                }
            };

            let mut current = code;
            if code == self.next_code {
                // The string of `prev` followed by its own first byte.
                self.stack.push(prev_first);
                current = prev;
            }

            while current > self.clear_code {
                self.stack.push(self.suffix[usize::from(current)]);
                current = self.prefix[usize::from(current)];
            }

            let first = self.suffix[usize::from(current)];
            self.stack.push(first);

            if usize::from(self.next_code) < MAX_ENTRIES {
                self.prefix[usize::from(self.next_code)] = prev;
                self.suffix[usize::from(self.next_code)] = first;
                self.next_code += 1;

                if self.next_code == 1 << self.code_size && self.code_size < MAX_CODESIZE {
                    self.code_size += 1;
                }
            }

            last = Some((code, first));
        }

        self.stack.clear();
    }

    fn next_symbol(&mut self, inp: &mut &[u8]) -> Option<Code> {
        if self.bits < self.code_size {
            self.refill_bits(inp);
        }

        self.get_bits()
    }

    fn refill_bits(&mut self, inp: &mut &[u8]) {
        let wish_count = (64 - self.bits) / 8;
        let mut buffer = [0u8; 8];
        let new_bits = match inp.get(..usize::from(wish_count)) {
            Some(bytes) => {
                buffer[..usize::from(wish_count)].copy_from_slice(bytes);
                *inp = &inp[usize::from(wish_count)..];
                wish_count * 8
            }
            None => {
                let new_bits = inp.len() * 8;
                buffer[..inp.len()].copy_from_slice(inp);
                *inp = &[];
                new_bits as u8
            }
        };
        self.bit_buffer |= u64::from_le_bytes(buffer) << self.bits;
        self.bits += new_bits;
    }

    fn get_bits(&mut self) -> Option<Code> {
        if self.bits < self.code_size {
            return None;
        }

        let mask = (1u64 << self.code_size) - 1;
        let code = (self.bit_buffer & mask) as Code;
        self.bit_buffer >>= self.code_size;
        self.bits -= self.code_size;
        Some(code)
    }
}
