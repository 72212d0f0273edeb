extern crate criterion;
extern crate gifcodec;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gifcodec::stream::{ByteReader, ByteWriter};
use gifcodec::{decode, encode, lzw, Algorithm, EncoderOptions, Frame};

const WIDTH: u32 = 160;
const HEIGHT: u32 = 120;

/// A moving gradient with a block that changes position between frames.
fn frames(count: u32) -> Vec<Frame> {
    (0..count)
        .map(|n| {
            let mut rgba = Vec::with_capacity((WIDTH * HEIGHT * 4) as usize);
            for y in 0..HEIGHT {
                for x in 0..WIDTH {
                    let inside = (x / 20 == n % 8) && (y / 20 == n % 6);
                    let pixel = if inside {
                        [255, 255, 255, 255]
                    } else {
                        [(x * 255 / WIDTH) as u8, (y * 255 / HEIGHT) as u8, (n * 30) as u8, 255]
                    };
                    rgba.extend_from_slice(&pixel);
                }
            }
            Frame::new(rgba)
        })
        .collect()
}

fn indices(len: usize, bits: u8) -> Vec<u8> {
    let mask = ((1u16 << bits) - 1) as u8;
    let mut state = 0x2545_f491_u32;
    (0..len)
        .map(|i| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            // Runs make the dictionary grow past a few entries.
            if i % 7 < 3 {
                (i / 64) as u8 & mask
            } else {
                state as u8 & mask
            }
        })
        .collect()
}

pub fn bench_lzw(c: &mut Criterion) {
    let mut group = c.benchmark_group("lzw");
    for &bits in &[2u8, 4, 8] {
        let data = indices(1 << 18, bits);
        let mut writer = ByteWriter::new();
        lzw::encode(bits, &data, &mut writer);
        let encoded = writer.finish();

        group.throughput(Throughput::Bytes(data.len() as u64));
        group.bench_with_input(BenchmarkId::new("encode", bits), &data, |b, data| {
            b.iter(|| {
                let mut writer = ByteWriter::new();
                lzw::encode(bits, data, &mut writer);
                black_box(writer.finish());
            })
        });
        group.bench_with_input(BenchmarkId::new("decode", bits), &encoded, |b, encoded| {
            b.iter(|| {
                let mut reader = ByteReader::new(encoded);
                let min_code_size = reader.read_u8().expect("min code size");
                let payload = reader.read_sub_blocks().expect("sub-blocks");
                black_box(lzw::decode(min_code_size, &payload, data.len()));
            })
        });
    }
}

pub fn bench_encode(c: &mut Criterion) {
    let input = frames(8);
    let mut group = c.benchmark_group("encode");
    group.sample_size(10);
    group.throughput(Throughput::Elements(input.len() as u64));
    for &(name, algorithm) in &[("median-cut", Algorithm::MedianCut), ("neuquant", Algorithm::NeuQuant)] {
        let options = EncoderOptions::new(WIDTH, HEIGHT).with_algorithm(algorithm);
        group.bench_with_input(BenchmarkId::new(name, input.len()), &input, |b, input| {
            b.iter(|| black_box(encode(&options, input.iter().cloned()).expect("encode")))
        });
    }
}

pub fn bench_decode(c: &mut Criterion) {
    let options = EncoderOptions::new(WIDTH, HEIGHT).with_algorithm(Algorithm::MedianCut);
    let data = encode(&options, frames(8)).expect("encode");
    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(data.len() as u64));
    group.bench_with_input(BenchmarkId::new("composite", data.len()), &data, |b, data| {
        b.iter(|| black_box(decode(data).expect("decode")))
    });
}

criterion_group!(benches, bench_lzw, bench_encode, bench_decode);
criterion_main!(benches);
