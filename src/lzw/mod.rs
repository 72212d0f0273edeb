//! # GIF flavoured LZW
//!
//! Code words are packed least significant bit first, start at `min_code_size + 1` bits and
//! grow up to 12 bits. Two codes are reserved:
//!
//!  * `CLEAR_CODE == 1 << min_code_size`
//!  * `END_CODE   == CLEAR_CODE + 1`
//!
//! The encoder always starts its output with a clear code and ends it with an end code. It
//! emits another clear code whenever the dictionary reaches 4096 entries. The decoder accepts
//! the deferred clear convention, where a full dictionary simply stops growing until a clear
//! code arrives.
//!
//! ```
//! use gifcodec::lzw;
//! use gifcodec::stream::{ByteReader, ByteWriter};
//!
//! let indices = [0, 1, 1, 0, 2, 3, 3, 3, 3, 0];
//! let mut writer = ByteWriter::new();
//! lzw::encode(2, &indices, &mut writer);
//! let bytes = writer.finish();
//!
//! let mut reader = ByteReader::new(&bytes);
//! let min_code_size = reader.read_u8().unwrap();
//! let data = reader.read_sub_blocks().unwrap();
//! assert_eq!(lzw::decode(min_code_size, &data, indices.len()), indices);
//! ```
mod decode;
mod encode;

pub use self::decode::decode;
pub use self::encode::encode;

/// Smallest and largest supported `min_code_size`.
pub const MIN_CODE_SIZE_RANGE: core::ops::RangeInclusive<u8> = 1..=8;

/// The `min_code_size` to use for a color table of `table_len` entries.
pub fn min_code_size_for(table_len: usize) -> u8 {
    let bits = table_len.max(2).next_power_of_two().trailing_zeros() as u8;
    bits.clamp(2, 8)
}

#[cfg(test)]
mod tests {
    use super::min_code_size_for;

    #[test]
    fn code_size_for_tables() {
        assert_eq!(min_code_size_for(2), 2);
        assert_eq!(min_code_size_for(4), 2);
        assert_eq!(min_code_size_for(16), 4);
        assert_eq!(min_code_size_for(256), 8);
    }
}
