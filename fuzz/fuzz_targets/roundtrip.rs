#![no_main]
use libfuzzer_sys::fuzz_target;
use gifcodec::lzw;
use gifcodec::stream::{ByteReader, ByteWriter};

fuzz_target!(|data: &[u8]| {
    let (&min_code_size, data) = match data.split_first() {
        Some(split) => split,
        None => return,
    };
    let min_code_size = 2 + min_code_size % 7;
    let mask = ((1u16 << min_code_size) - 1) as u8;
    let indices: Vec<u8> = data.iter().map(|&b| b & mask).collect();

    let mut writer = ByteWriter::new();
    lzw::encode(min_code_size, &indices, &mut writer);
    let encoded = writer.finish();

    let mut reader = ByteReader::new(&encoded);
    assert_eq!(reader.read_u8().unwrap(), min_code_size);
    let payload = reader.read_sub_blocks().unwrap();
    assert_eq!(lzw::decode(min_code_size, &payload, indices.len()), indices);
});
