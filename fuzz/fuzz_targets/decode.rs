#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary input may be rejected but must never panic.
    if let Ok(decoder) = gifcodec::Decoder::new(data) {
        let gif = decoder.gif();
        // Keep huge screens from exhausting memory.
        let area = |w: u16, h: u16| usize::from(w) * usize::from(h);
        if area(gif.width, gif.height) > 1 << 20
            || gif.frames.iter().any(|f| area(f.width, f.height) > 1 << 20)
        {
            return;
        }
        for frame in decoder.frames() {
            assert_eq!(frame.rgba.len(), usize::from(gif.width) * usize::from(gif.height) * 4);
        }
    }
});
