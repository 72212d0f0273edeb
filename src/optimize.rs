//! Shrinking frames to the area that changes.
//!
//! Frames that contain transparency, or that are followed by a frame that does, are cropped
//! to the bounding box of their non-transparent pixels and get disposal `Background`, so the
//! following frame starts from a cleared area. Other frames are compared with the last fully
//! drawn frame: unchanged border rows and columns are cropped away and unchanged pixels inside
//! the remaining rectangle become transparent.
//!
//! The comparison needs the indices the previous frame produced on the canvas, so frames are
//! processed strictly in order.
use log::trace;

use crate::block::{DisposalMethod, Palette};

/// A frame mapped to palette indices, covering the whole canvas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFrame {
    pub indices: Vec<u8>,
    /// Whether any pixel is transparent.
    pub transparent: bool,
    pub transparent_index: u8,
    pub delay_ms: u32,
    /// Disposal requested by the caller, overriding the computed one.
    pub disposal: Option<DisposalMethod>,
    /// The frame's own palette, `None` for the global one.
    pub local_palette: Option<Palette>,
}

/// A frame ready to be compressed and written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizedFrame {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    /// `width * height` indices of the cropped rectangle.
    pub indices: Vec<u8>,
    pub transparent_index: u8,
    pub delay_ms: u32,
    pub disposal: DisposalMethod,
    pub local_palette: Option<Palette>,
}

/// Inclusive bounds of a crop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    left: usize,
    top: usize,
    right: usize,
    bottom: usize,
}

/// Crop and delta encode `frames` of a `width` x `height` canvas.
///
/// Every frame must hold `width * height` indices.
pub fn optimize_frames(width: u16, height: u16, frames: &[IndexedFrame]) -> Vec<OptimizedFrame> {
    let (width, height) = (usize::from(width), usize::from(height));
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let mut out = Vec::with_capacity(frames.len());
    // The indices of the last frame that was drawn completely and kept on the canvas.
    let mut reference: Option<&IndexedFrame> = None;

    for (i, frame) in frames.iter().enumerate() {
        let next = frames.get(i + 1);
        let last = next.is_none();
        let transparent = frame.transparent || next.map_or(false, |f| f.transparent);

        let previous = reference
            .take()
            .filter(|r| r.local_palette == frame.local_palette);

        let (rect, indices) = if transparent {
            let rect = crop_transparent(width, height, &frame.indices, frame.transparent_index);
            (rect, extract(width, rect, &frame.indices, None, frame.transparent_index))
        } else if let Some(previous) = previous {
            let rect = crop_unchanged(width, height, &frame.indices, &previous.indices);
            let indices = extract(
                width,
                rect,
                &frame.indices,
                Some(&previous.indices),
                frame.transparent_index,
            );
            (rect, indices)
        } else {
            let rect = Rect {
                left: 0,
                top: 0,
                right: width - 1,
                bottom: height - 1,
            };
            (rect, frame.indices.clone())
        };

        let disposal = frame.disposal.unwrap_or(if transparent && !last {
            DisposalMethod::Background
        } else {
            DisposalMethod::Keep
        });

        if !transparent && matches!(disposal, DisposalMethod::Keep | DisposalMethod::Unspecified) {
            reference = Some(frame);
        }

        trace!(
            "frame {} cropped to {}x{} at ({}, {}), disposal {:?}",
            i,
            rect.right + 1 - rect.left,
            rect.bottom + 1 - rect.top,
            rect.left,
            rect.top,
            disposal
        );

        out.push(OptimizedFrame {
            left: rect.left as u16,
            top: rect.top as u16,
            width: (rect.right + 1 - rect.left) as u16,
            height: (rect.bottom + 1 - rect.top) as u16,
            indices,
            transparent_index: frame.transparent_index,
            delay_ms: frame.delay_ms,
            disposal,
            local_palette: frame.local_palette.clone(),
        });
    }

    out
}

/// Trim border rows and columns consisting only of `transparent_index`.
///
/// At least one pixel always remains.
fn crop_transparent(width: usize, height: usize, indices: &[u8], transparent_index: u8) -> Rect {
    let clear = |x: usize, y: usize| indices[y * width + x] == transparent_index;
    trim(width, height, clear)
}

/// Trim border rows and columns that equal `previous`.
fn crop_unchanged(width: usize, height: usize, indices: &[u8], previous: &[u8]) -> Rect {
    let same = |x: usize, y: usize| {
        let at = y * width + x;
        indices[at] == previous[at]
    };
    trim(width, height, same)
}

fn trim(width: usize, height: usize, skip: impl Fn(usize, usize) -> bool) -> Rect {
    let mut rect = Rect {
        left: 0,
        top: 0,
        right: width - 1,
        bottom: height - 1,
    };

    let row = |y: usize| (0..width).all(|x| skip(x, y));
    while rect.top < rect.bottom && row(rect.top) {
        rect.top += 1;
    }
    while rect.bottom > rect.top && row(rect.bottom) {
        rect.bottom -= 1;
    }

    let (top, bottom) = (rect.top, rect.bottom);
    let column = |x: usize| (top..=bottom).all(|y| skip(x, y));
    while rect.left < rect.right && column(rect.left) {
        rect.left += 1;
    }
    while rect.right > rect.left && column(rect.right) {
        rect.right -= 1;
    }

    rect
}

/// Copy the indices inside `rect`, making pixels equal to `previous` transparent.
fn extract(
    width: usize,
    rect: Rect,
    indices: &[u8],
    previous: Option<&[u8]>,
    transparent_index: u8,
) -> Vec<u8> {
    let mut out = Vec::with_capacity((rect.right + 1 - rect.left) * (rect.bottom + 1 - rect.top));
    for y in rect.top..=rect.bottom {
        let span = y * width + rect.left..y * width + rect.right + 1;
        match previous {
            Some(previous) => out.extend(
                indices[span.clone()]
                    .iter()
                    .zip(&previous[span])
                    .map(|(&now, &before)| if now == before { transparent_index } else { now }),
            ),
            None => out.extend_from_slice(&indices[span]),
        }
    }
    out
}
