//! Turning a parsed document into RGBA frames.
//!
//! [`Decoder`] keeps the source bytes and the parsed [`Gif`] and decompresses frames on
//! request. [`Frames`] replays them in order through a [`Compositor`], which owns the canvas
//! and applies disposal methods. Every yielded frame is an owned copy of the canvas.
use core::ops::Range;
use std::time::Instant;

use log::{debug, trace};

use crate::block::{self, DisposalMethod, Gif, Rgb};
use crate::error::DecodingError;
use crate::lzw;
use crate::parse::parse;

/// Row offsets and steps of the four interlace passes.
const INTERLACE_PASSES: [(usize, usize); 4] = [(0, 8), (4, 8), (2, 4), (1, 2)];

/// One output image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub width: u16,
    pub height: u16,
    /// Display duration in milliseconds.
    pub delay_ms: u32,
    /// `width * height` pixels of four bytes each.
    pub rgba: Vec<u8>,
}

/// Lazy access to the frames of a GIF held in memory.
#[derive(Debug, Clone)]
pub struct Decoder<'a> {
    data: &'a [u8],
    gif: Gif,
}

/// Iterator over the composited frames of a [`Decoder`].
#[derive(Debug)]
pub struct Frames<'d, 'a> {
    decoder: &'d Decoder<'a>,
    compositor: Compositor,
    next: usize,
}

/// The canvas of one decode session.
///
/// Frames have to be drawn in document order, the disposal of each frame is applied right
/// before the following one is drawn.
#[derive(Debug, Clone)]
pub struct Compositor {
    width: u16,
    height: u16,
    canvas: Vec<u8>,
    previous: Option<Drawn>,
    /// Canvas contents from before the last frame with disposal `Previous` was drawn.
    saved: Option<Vec<u8>>,
}

/// The rectangle and disposal of the last drawn frame.
#[derive(Debug, Clone, Copy)]
struct Drawn {
    left: u16,
    top: u16,
    width: u16,
    height: u16,
    disposal: DisposalMethod,
}

/// Decode all frames of a GIF file.
pub fn decode(data: &[u8]) -> Result<Vec<DecodedFrame>, DecodingError> {
    let decoder = Decoder::new(data)?;
    let start = Instant::now();
    let frames: Vec<_> = decoder.frames().collect();
    debug!(
        "decoded {} frames of {}x{} in {:?}",
        frames.len(),
        decoder.gif.width,
        decoder.gif.height,
        start.elapsed()
    );
    Ok(frames)
}

/// Decode the frames in `range`.
///
/// Compositing depends on all earlier frames, so every frame before the end of the range is
/// replayed, but only those inside it are returned.
pub fn decode_range(data: &[u8], range: Range<usize>) -> Result<Vec<DecodedFrame>, DecodingError> {
    let decoder = Decoder::new(data)?;
    let count = decoder.frame_count();
    if range.end > count {
        return Err(DecodingError::FrameIndexOutOfRange {
            index: range.end - 1,
            count,
        });
    }

    Ok(decoder
        .frames()
        .take(range.end)
        .skip(range.start)
        .collect())
}

impl<'a> Decoder<'a> {
    /// Parse the block structure of `data`.
    pub fn new(data: &'a [u8]) -> Result<Self, DecodingError> {
        let gif = parse(data)?;
        Ok(Decoder { data, gif })
    }

    /// The parsed document.
    pub fn gif(&self) -> &Gif {
        &self.gif
    }

    pub fn into_gif(self) -> Gif {
        self.gif
    }

    pub fn frame_count(&self) -> usize {
        self.gif.frames.len()
    }

    /// The color indices of a frame in row order.
    pub fn frame_indices(&self, index: usize) -> Result<Vec<u8>, DecodingError> {
        let frame = self.frame(index)?;
        Ok(self.indices_of(frame))
    }

    /// The pixels of a single frame without any compositing.
    ///
    /// The image covers only the frame's own rectangle. Transparent pixels are `[0, 0, 0, 0]`.
    pub fn frame_rgba(&self, index: usize) -> Result<DecodedFrame, DecodingError> {
        let frame = self.frame(index)?;
        let indices = self.indices_of(frame);
        let palette = self.gif.palette_for(frame).map(Vec::as_slice);
        let transparent = frame.transparent_index();

        let mut rgba = vec![0; indices.len() * 4];
        for (pixel, &idx) in rgba.chunks_exact_mut(4).zip(indices.iter()) {
            if Some(idx) == transparent {
                continue;
            }
            let color = lookup(palette, idx);
            pixel.copy_from_slice(&[color.r, color.g, color.b, 0xff]);
        }

        Ok(DecodedFrame {
            width: frame.width,
            height: frame.height,
            delay_ms: frame.delay_ms,
            rgba,
        })
    }

    /// Replay all frames from the start.
    pub fn frames(&self) -> Frames<'_, 'a> {
        Frames {
            decoder: self,
            compositor: Compositor::new(self.gif.width, self.gif.height),
            next: 0,
        }
    }

    fn frame(&self, index: usize) -> Result<&block::Frame, DecodingError> {
        self.gif
            .frames
            .get(index)
            .ok_or(DecodingError::FrameIndexOutOfRange {
                index,
                count: self.gif.frames.len(),
            })
    }

    fn indices_of(&self, frame: &block::Frame) -> Vec<u8> {
        let mut compressed = Vec::with_capacity(frame.data_len());
        for range in &frame.data {
            compressed.extend_from_slice(&self.data[range.clone()]);
        }

        let indices = lzw::decode(frame.lzw_min_code_size, &compressed, frame.pixel_count());
        if frame.interlaced {
            deinterlace(&indices, usize::from(frame.width))
        } else {
            indices
        }
    }
}

impl Iterator for Frames<'_, '_> {
    type Item = DecodedFrame;

    fn next(&mut self) -> Option<DecodedFrame> {
        let gif = &self.decoder.gif;
        let frame = gif.frames.get(self.next)?;
        self.next += 1;

        let indices = self.decoder.indices_of(frame);
        let palette = gif.palette_for(frame).map(Vec::as_slice);
        self.compositor.draw(frame, &indices, palette);

        Some(DecodedFrame {
            width: gif.width,
            height: gif.height,
            delay_ms: frame.delay_ms,
            rgba: self.compositor.canvas().to_vec(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.decoder.gif.frames.len() - self.next;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Frames<'_, '_> {}

impl Compositor {
    /// A fully transparent canvas.
    pub fn new(width: u16, height: u16) -> Self {
        Compositor {
            width,
            height,
            canvas: vec![0; usize::from(width) * usize::from(height) * 4],
            previous: None,
            saved: None,
        }
    }

    pub fn canvas(&self) -> &[u8] {
        &self.canvas
    }

    /// Dispose the previous frame, then draw `frame` with its decoded `indices`.
    ///
    /// Parts of the frame outside the canvas are clipped. Indices missing from the palette
    /// are drawn black.
    pub fn draw(&mut self, frame: &block::Frame, indices: &[u8], palette: Option<&[Rgb]>) {
        if let Some(previous) = self.previous.take() {
            self.dispose(previous);
        }

        if frame.disposal() == DisposalMethod::Previous {
            self.saved = Some(self.canvas.clone());
        }

        let transparent = frame.transparent_index();
        let canvas_width = usize::from(self.width);
        let frame_width = usize::from(frame.width);
        let (xs, ys) = self.clip(frame.left, frame.top, frame.width, frame.height);
        trace!(
            "drawing {}x{} at ({}, {}), disposal {:?}",
            frame.width,
            frame.height,
            frame.left,
            frame.top,
            frame.disposal()
        );

        for y in ys {
            let row = (y - usize::from(frame.top)) * frame_width;
            for x in xs.clone() {
                let idx = match indices.get(row + x - usize::from(frame.left)) {
                    Some(&idx) => idx,
                    None => continue,
                };
                if Some(idx) == transparent {
                    continue;
                }
                let color = lookup(palette, idx);
                let at = (y * canvas_width + x) * 4;
                self.canvas[at..at + 4].copy_from_slice(&[color.r, color.g, color.b, 0xff]);
            }
        }

        self.previous = Some(Drawn {
            left: frame.left,
            top: frame.top,
            width: frame.width,
            height: frame.height,
            disposal: frame.disposal(),
        });
    }

    fn dispose(&mut self, drawn: Drawn) {
        let (xs, ys) = self.clip(drawn.left, drawn.top, drawn.width, drawn.height);
        let canvas_width = usize::from(self.width);
        match drawn.disposal {
            DisposalMethod::Background => {
                for y in ys {
                    let row = y * canvas_width;
                    self.canvas[(row + xs.start) * 4..(row + xs.end) * 4].fill(0);
                }
            }
            DisposalMethod::Previous => {
                if let Some(saved) = self.saved.take() {
                    for y in ys {
                        let row = y * canvas_width;
                        let span = (row + xs.start) * 4..(row + xs.end) * 4;
                        self.canvas[span.clone()].copy_from_slice(&saved[span]);
                    }
                }
            }
            _ => {}
        }
    }

    /// The canvas columns and rows covered by a rectangle.
    fn clip(&self, left: u16, top: u16, width: u16, height: u16) -> (Range<usize>, Range<usize>) {
        let x_end = (usize::from(left) + usize::from(width)).min(usize::from(self.width));
        let y_end = (usize::from(top) + usize::from(height)).min(usize::from(self.height));
        let xs = usize::from(left).min(x_end)..x_end;
        let ys = usize::from(top).min(y_end)..y_end;
        (xs, ys)
    }
}

/// Reorder the rows of an interlaced image into top to bottom order.
pub fn deinterlace(indices: &[u8], width: usize) -> Vec<u8> {
    if width == 0 {
        return indices.to_vec();
    }

    let rows = indices.len() / width;
    let mut out = vec![0; indices.len()];
    let mut source_rows = indices.chunks_exact(width);
    for &(offset, step) in INTERLACE_PASSES.iter() {
        for row in (offset..rows).step_by(step) {
            if let Some(source) = source_rows.next() {
                out[row * width..(row + 1) * width].copy_from_slice(source);
            }
        }
    }
    out
}

fn lookup(palette: Option<&[Rgb]>, idx: u8) -> Rgb {
    palette
        .and_then(|p| p.get(usize::from(idx)))
        .copied()
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::{deinterlace, Compositor};
    use crate::block::{DisposalMethod, Frame, GraphicControl, Rgb};

    fn frame(left: u16, top: u16, width: u16, height: u16, disposal: DisposalMethod) -> Frame {
        Frame {
            left,
            top,
            width,
            height,
            graphic_control: Some(GraphicControl {
                disposal,
                transparent_index: Some(2),
                ..GraphicControl::default()
            }),
            ..Frame::default()
        }
    }

    const PALETTE: [Rgb; 3] = [Rgb::new(255, 0, 0), Rgb::new(0, 255, 0), Rgb::new(0, 0, 255)];

    fn pixel(c: &Compositor, x: usize, y: usize) -> [u8; 4] {
        let at = (y * 3 + x) * 4;
        let mut p = [0; 4];
        p.copy_from_slice(&c.canvas()[at..at + 4]);
        p
    }

    #[test]
    fn deinterlaces_passes() {
        let width = 1;
        // Rows 0..10 stored in pass order: 0 8 | 4 | 2 6 | 1 3 5 7 9
        let stored = [0, 8, 4, 2, 6, 1, 3, 5, 7, 9];
        let out = deinterlace(&stored, width);
        assert_eq!(out, (0..10).collect::<Vec<u8>>());
    }

    #[test]
    fn transparent_index_keeps_canvas() {
        let mut c = Compositor::new(3, 1);
        c.draw(&frame(0, 0, 3, 1, DisposalMethod::Keep), &[0, 0, 0], Some(&PALETTE));
        c.draw(&frame(0, 0, 3, 1, DisposalMethod::Keep), &[1, 2, 1], Some(&PALETTE));
        assert_eq!(pixel(&c, 0, 0), [0, 255, 0, 255]);
        assert_eq!(pixel(&c, 1, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn background_disposal_clears_rect() {
        let mut c = Compositor::new(3, 1);
        c.draw(&frame(0, 0, 3, 1, DisposalMethod::Keep), &[0, 0, 0], Some(&PALETTE));
        c.draw(&frame(1, 0, 1, 1, DisposalMethod::Background), &[1], Some(&PALETTE));
        assert_eq!(pixel(&c, 1, 0), [0, 255, 0, 255]);
        c.draw(&frame(0, 0, 1, 1, DisposalMethod::Keep), &[2], Some(&PALETTE));
        assert_eq!(pixel(&c, 0, 0), [255, 0, 0, 255]);
        assert_eq!(pixel(&c, 1, 0), [0, 0, 0, 0]);
        assert_eq!(pixel(&c, 2, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn previous_disposal_restores_rect() {
        let mut c = Compositor::new(3, 1);
        c.draw(&frame(0, 0, 3, 1, DisposalMethod::Keep), &[0, 0, 0], Some(&PALETTE));
        c.draw(&frame(0, 0, 2, 1, DisposalMethod::Previous), &[1, 1], Some(&PALETTE));
        assert_eq!(pixel(&c, 0, 0), [0, 255, 0, 255]);
        c.draw(&frame(2, 0, 1, 1, DisposalMethod::Keep), &[2], Some(&PALETTE));
        assert_eq!(pixel(&c, 0, 0), [255, 0, 0, 255]);
        assert_eq!(pixel(&c, 1, 0), [255, 0, 0, 255]);
    }

    #[test]
    fn out_of_canvas_parts_are_clipped() {
        let mut c = Compositor::new(3, 1);
        c.draw(&frame(2, 0, 2, 2, DisposalMethod::Keep), &[1, 1, 1, 1], Some(&PALETTE));
        assert_eq!(pixel(&c, 2, 0), [0, 255, 0, 255]);
        assert_eq!(pixel(&c, 1, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn missing_palette_entries_are_black() {
        let mut c = Compositor::new(3, 1);
        c.draw(&frame(0, 0, 1, 1, DisposalMethod::Keep), &[7], Some(&PALETTE));
        assert_eq!(pixel(&c, 0, 0), [0, 0, 0, 255]);
    }
}
