use gifcodec::stream::{ByteReader, ByteWriter};
use gifcodec::{decode, encode, lzw, Algorithm, DisposalMethod, EncoderOptions, Frame};

struct XorShift(u32);

impl XorShift {
    fn next(&mut self) -> u32 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 17;
        self.0 ^= self.0 << 5;
        self.0
    }
}

#[test]
fn lzw_roundtrip_all_code_sizes() {
    let mut rng = XorShift(0x9E37_79B9);
    for min_code_size in 2..=8u8 {
        let mask = ((1u16 << min_code_size) - 1) as u8;
        let noise: Vec<u8> = (0..30_000).map(|_| rng.next() as u8 & mask).collect();
        let runs: Vec<u8> = (0..30_000).map(|i| (i / 97) as u8 & mask).collect();
        let mixed: Vec<u8> = (0..30_000)
            .map(|i| if i % 3 == 0 { rng.next() as u8 & mask } else { (i / 5) as u8 & mask })
            .collect();

        for data in [&[][..], &[mask][..], &noise[..], &runs[..], &mixed[..]] {
            assert_roundtrips(data, min_code_size);
        }
    }
}

fn assert_roundtrips(data: &[u8], min_code_size: u8) {
    let mut writer = ByteWriter::new();
    lzw::encode(min_code_size, data, &mut writer);
    let encoded = writer.finish();

    let mut reader = ByteReader::new(&encoded);
    assert_eq!(reader.read_u8().unwrap(), min_code_size);
    let payload = reader.read_sub_blocks().unwrap();
    assert!(reader.is_empty());

    let decoded = lzw::decode(min_code_size, &payload, data.len());
    assert!(decoded == data, "min code size {}, {} indices", min_code_size, data.len());
}

/// Expected decoder output for an input frame: alpha 0 becomes fully clear.
fn displayed(rgba: &[u8]) -> Vec<u8> {
    rgba.chunks_exact(4)
        .flat_map(|p| if p[3] == 0 { [0; 4] } else { [p[0], p[1], p[2], 255] })
        .collect()
}

fn random_frames(rng: &mut XorShift, count: usize, width: usize, height: usize) -> Vec<Vec<u8>> {
    let colors: Vec<[u8; 4]> = (0..40)
        .map(|_| {
            let c = rng.next();
            [c as u8, (c >> 8) as u8, (c >> 16) as u8, 255]
        })
        .collect();

    let mut frames: Vec<Vec<u8>> = Vec::new();
    for n in 0..count {
        let frame = match frames.last() {
            // Change a few pixels of the previous frame.
            Some(last) if n % 2 == 1 => {
                let mut frame = last.clone();
                for _ in 0..5 {
                    let at = (rng.next() as usize % (width * height)) * 4;
                    let color = colors[rng.next() as usize % colors.len()];
                    frame[at..at + 4].copy_from_slice(&color);
                }
                frame
            }
            _ => (0..width * height)
                .flat_map(|_| colors[rng.next() as usize % colors.len()])
                .collect(),
        };
        frames.push(frame);
    }
    frames
}

#[test]
fn few_colors_roundtrip_losslessly() {
    let mut rng = XorShift(0x1234_5678);
    let (width, height) = (9, 7);
    let input = random_frames(&mut rng, 6, width, height);

    for algorithm in [Algorithm::MedianCut, Algorithm::NeuQuant] {
        let options = EncoderOptions::new(width as u32, height as u32).with_algorithm(algorithm);
        let frames = input.iter().map(|rgba| Frame::new(rgba.clone()).with_delay_ms(40));
        let bytes = encode(&options, frames).unwrap();

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.len(), input.len());
        for (frame, rgba) in decoded.iter().zip(&input) {
            assert_eq!((frame.width, frame.height), (width as u16, height as u16));
            assert_eq!(frame.delay_ms, 40);
            assert!(frame.rgba == *rgba, "{:?}", algorithm);
        }
    }
}

#[test]
fn transparency_roundtrips() {
    let mut rng = XorShift(0xDEAD_BEEF);
    let (width, height) = (6, 5);
    let mut input = random_frames(&mut rng, 5, width, height);
    for (n, frame) in input.iter_mut().enumerate() {
        if n == 1 || n == 2 || n == 4 {
            for pixel in frame.chunks_exact_mut(4) {
                if rng.next() % 3 == 0 {
                    pixel[3] = 0;
                }
            }
        }
    }

    let frames = input.iter().map(|rgba| Frame::new(rgba.clone()));
    let bytes = encode(&EncoderOptions::new(width as u32, height as u32), frames).unwrap();

    let decoded = decode(&bytes).unwrap();
    for (i, (frame, rgba)) in decoded.iter().zip(&input).enumerate() {
        assert!(frame.rgba == displayed(rgba), "frame {}", i);
    }
}

#[test]
fn requested_disposal_survives() {
    let red = [255, 0, 0, 255].repeat(4);
    let blue = [0, 0, 255, 255].repeat(4);
    let frames = vec![
        Frame::new(red.clone()).with_disposal(DisposalMethod::Previous),
        Frame::new(blue.clone()),
    ];
    let bytes = encode(&EncoderOptions::new(2, 2), frames).unwrap();

    let gif = gifcodec::parse(&bytes).unwrap();
    assert_eq!(gif.frames[0].disposal(), DisposalMethod::Previous);

    let decoded = decode(&bytes).unwrap();
    assert_eq!(decoded[0].rgba, red);
    assert_eq!(decoded[1].rgba, blue);
}
