//! Encoding sequences of RGBA frames into an animated GIF.
//!
//! An [`Encoder`] collects frames and samples their colors as they arrive. [`flush`] then
//! generates one shared palette, maps every frame onto it, crops the frames to what changed
//! and writes the stream.
//!
//! [`flush`]: struct.Encoder.html#method.flush
use std::time::Instant;

use log::debug;
#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::block::{DisposalMethod, Palette, Version, DEFAULT_DELAY_MS};
use crate::error::EncodingError;
use crate::index::index_pixels;
use crate::mux::{self, Header, Muxer};
use crate::optimize::{optimize_frames, IndexedFrame};
use crate::quant::{ColorMap, QuantizerSession};

pub use crate::quant::Algorithm;

/// Global settings of an encode.
///
/// Unset optional fields are derived from the others by [`resolve`].
///
/// [`resolve`]: #method.resolve
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct EncoderOptions {
    pub width: u32,
    pub height: u32,
    /// Colors of the generated palette, in `2..=255`.
    pub max_colors: usize,
    /// Length of the global color table. Defaults to the smallest power of two that leaves
    /// room for `max_colors` and the transparent index.
    pub color_table_size: Option<usize>,
    /// Defaults to the last table entry.
    pub background_color_index: Option<u8>,
    pub looped: bool,
    /// Repetitions, 0 loops forever. Ignored unless `looped`.
    pub loop_count: u16,
    pub algorithm: Algorithm,
    /// NeuQuant learns from every n-th pixel, clamped to `1..=30`.
    pub sample_factor: usize,
    pub pixel_aspect_ratio: u8,
    pub version: Version,
}

/// Validated options with every default filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub width: u16,
    pub height: u16,
    /// Colors the quantizer may produce, leaving the last table entry free.
    pub max_colors: usize,
    pub color_table_size: usize,
    pub background_color_index: u8,
    pub transparent_index: u8,
    pub loop_count: Option<u16>,
    pub algorithm: Algorithm,
    pub sample_factor: usize,
    pub pixel_aspect_ratio: u8,
    pub version: Version,
}

/// One input image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Four bytes per pixel, row major.
    pub rgba: Vec<u8>,
    /// Must equal the screen width if set.
    pub width: Option<u32>,
    /// Must equal the screen height if set.
    pub height: Option<u32>,
    pub delay_ms: u32,
    /// Overrides the disposal the optimizer would choose.
    ///
    /// The override is written as is. Pixels a later frame leaves fully transparent show
    /// whatever the chosen disposal leaves on the canvas: after `Previous` that is the
    /// canvas from before this frame, not a cleared area.
    pub disposal: Option<DisposalMethod>,
    /// Written as a local color table instead of using the shared palette.
    pub local_palette: Option<Palette>,
}

/// Incremental encoder, see the [module documentation](index.html).
#[derive(Debug)]
pub struct Encoder {
    options: ResolvedOptions,
    session: QuantizerSession,
    frames: Vec<Frame>,
}

impl Default for EncoderOptions {
    fn default() -> Self {
        EncoderOptions {
            width: 0,
            height: 0,
            max_colors: 255,
            color_table_size: None,
            background_color_index: None,
            looped: true,
            loop_count: 0,
            algorithm: Algorithm::default(),
            sample_factor: 10,
            pixel_aspect_ratio: 0,
            version: Version::default(),
        }
    }
}

impl EncoderOptions {
    /// Default options for a screen of `width` x `height` pixels.
    pub fn new(width: u32, height: u32) -> Self {
        EncoderOptions {
            width,
            height,
            ..EncoderOptions::default()
        }
    }

    pub fn with_max_colors(mut self, max_colors: usize) -> Self {
        self.max_colors = max_colors;
        self
    }

    pub fn with_color_table_size(mut self, size: usize) -> Self {
        self.color_table_size = Some(size);
        self
    }

    pub fn with_background_color_index(mut self, index: u8) -> Self {
        self.background_color_index = Some(index);
        self
    }

    /// Loop `count` times, 0 for forever.
    pub fn with_loop_count(mut self, count: u16) -> Self {
        self.looped = true;
        self.loop_count = count;
        self
    }

    /// Play once, without a looping extension.
    pub fn without_looping(mut self) -> Self {
        self.looped = false;
        self
    }

    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_sample_factor(mut self, sample_factor: usize) -> Self {
        self.sample_factor = sample_factor;
        self
    }

    pub fn with_pixel_aspect_ratio(mut self, ratio: u8) -> Self {
        self.pixel_aspect_ratio = ratio;
        self
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// Validate the options and fill in the defaults.
    pub fn resolve(&self) -> Result<ResolvedOptions, EncodingError> {
        let (width, height) = match (u16::try_from(self.width), u16::try_from(self.height)) {
            (Ok(w), Ok(h)) if w > 0 && h > 0 => (w, h),
            _ => {
                return Err(EncodingError::InvalidDimensions {
                    width: self.width,
                    height: self.height,
                })
            }
        };

        if !(2..=255).contains(&self.max_colors) {
            return Err(EncodingError::InvalidMaxColors(self.max_colors));
        }

        let color_table_size = match self.color_table_size {
            Some(size) if crate::block::is_valid_table_len(size) => size,
            Some(size) => return Err(EncodingError::InvalidColorTableSize(size)),
            None => (self.max_colors + 1).next_power_of_two(),
        };
        let max_colors = self.max_colors.min(color_table_size - 1);
        let transparent_index = (color_table_size - 1) as u8;

        let background_color_index = match self.background_color_index {
            Some(0) => return Err(EncodingError::BackgroundIndexZero),
            Some(index) if usize::from(index) >= color_table_size => {
                return Err(EncodingError::BackgroundIndexOutOfRange {
                    index: usize::from(index),
                    len: color_table_size,
                })
            }
            Some(index) => index,
            None => transparent_index,
        };

        Ok(ResolvedOptions {
            width,
            height,
            max_colors,
            color_table_size,
            background_color_index,
            transparent_index,
            loop_count: if self.looped { Some(self.loop_count) } else { None },
            algorithm: self.algorithm,
            sample_factor: self.sample_factor.clamp(1, 30),
            pixel_aspect_ratio: self.pixel_aspect_ratio,
            version: self.version,
        })
    }
}

impl Frame {
    /// A frame covering the whole screen, shown for the default delay.
    pub fn new(rgba: Vec<u8>) -> Self {
        Frame {
            rgba,
            width: None,
            height: None,
            delay_ms: DEFAULT_DELAY_MS,
            disposal: None,
            local_palette: None,
        }
    }

    /// Declare the frame size, checked against the screen.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u32) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Force the disposal of this frame, see [`Frame::disposal`].
    pub fn with_disposal(mut self, disposal: DisposalMethod) -> Self {
        self.disposal = Some(disposal);
        self
    }

    /// Use a palette of 1 to 255 colors for this frame only.
    pub fn with_local_palette(mut self, palette: Palette) -> Self {
        self.local_palette = Some(palette);
        self
    }
}

impl Encoder {
    pub fn new(options: &EncoderOptions) -> Result<Self, EncodingError> {
        let options = options.resolve()?;
        let session = begin_session(&options);
        Ok(Encoder {
            options,
            session,
            frames: Vec::new(),
        })
    }

    pub fn options(&self) -> &ResolvedOptions {
        &self.options
    }

    /// Number of frames waiting for the next [`flush`].
    ///
    /// [`flush`]: #method.flush
    pub fn pending(&self) -> usize {
        self.frames.len()
    }

    /// Check a frame and add its colors to the shared palette.
    pub fn encode(&mut self, frame: Frame) -> Result<(), EncodingError> {
        let index = self.frames.len();
        let (width, height) = (u32::from(self.options.width), u32::from(self.options.height));
        if frame.width.map_or(false, |w| w != width) || frame.height.map_or(false, |h| h != height)
        {
            return Err(EncodingError::InvalidFrameDimensions {
                index,
                width: frame.width.unwrap_or(width),
                height: frame.height.unwrap_or(height),
            });
        }

        let expected = width as usize * height as usize * 4;
        if frame.rgba.len() != expected {
            return Err(EncodingError::PixelBufferMismatch {
                index,
                expected,
                actual: frame.rgba.len(),
            });
        }

        match &frame.local_palette {
            Some(palette) if palette.is_empty() || palette.len() > 255 => {
                return Err(EncodingError::InvalidColorTableSize(palette.len()))
            }
            Some(_) => {}
            None => {
                let start = Instant::now();
                self.session.add_sample(&frame.rgba);
                debug!("palette:sample frame {} in {:?}", index, start.elapsed());
            }
        }

        self.frames.push(frame);
        Ok(())
    }

    /// Write all pending frames as one GIF stream.
    ///
    /// The encoder is empty afterwards and can be reused for another stream.
    pub fn flush(&mut self) -> Result<Vec<u8>, EncodingError> {
        if self.frames.is_empty() {
            return Err(EncodingError::NoFrames);
        }
        let frames = core::mem::take(&mut self.frames);
        let session = core::mem::replace(&mut self.session, begin_session(&self.options));
        let options = &self.options;

        let map = session.finish();

        let start = Instant::now();
        #[cfg(feature = "rayon")]
        let iter = frames.par_iter();
        #[cfg(not(feature = "rayon"))]
        let iter = frames.iter();
        let indexed: Vec<IndexedFrame> = iter.map(|frame| index_frame(options, &map, frame)).collect();
        debug!("frames:index {} frames in {:?}", indexed.len(), start.elapsed());
        drop(frames);

        let start = Instant::now();
        let optimized = optimize_frames(options.width, options.height, &indexed);
        debug!("frames:optimize {} frames in {:?}", optimized.len(), start.elapsed());

        let start = Instant::now();
        let header = Header {
            version: options.version,
            width: u32::from(options.width),
            height: u32::from(options.height),
            global_color_table: Some(map.palette().to_vec()),
            color_table_size: options.color_table_size,
            background_color_index: options.background_color_index,
            pixel_aspect_ratio: options.pixel_aspect_ratio,
            loop_count: options.loop_count,
        };
        let mut muxer = Muxer::new(&header)?;

        #[cfg(feature = "rayon")]
        let iter = optimized.par_iter();
        #[cfg(not(feature = "rayon"))]
        let iter = optimized.iter();
        let blocks = iter
            .enumerate()
            .map(|(i, frame)| muxer.encode_frame(i, frame))
            .collect::<Result<Vec<_>, _>>()?;
        for block in &blocks {
            muxer.push_encoded(block);
        }
        let bytes = muxer.finish();
        debug!(
            "frames:encode {} frames into {} bytes in {:?}",
            blocks.len(),
            bytes.len(),
            start.elapsed()
        );

        Ok(bytes)
    }
}

/// Encode `frames` into a GIF stream in one go.
pub fn encode(
    options: &EncoderOptions,
    frames: impl IntoIterator<Item = Frame>,
) -> Result<Vec<u8>, EncodingError> {
    let mut encoder = Encoder::new(options)?;
    for frame in frames {
        encoder.encode(frame)?;
    }
    encoder.flush()
}

fn begin_session(options: &ResolvedOptions) -> QuantizerSession {
    QuantizerSession::begin(options.algorithm, options.max_colors, options.sample_factor)
}

fn index_frame(options: &ResolvedOptions, map: &ColorMap, frame: &Frame) -> IndexedFrame {
    match &frame.local_palette {
        Some(palette) => {
            // One spare entry for transparency.
            let len = (palette.len() + 1).next_power_of_two().max(2);
            let transparent_index = (len - 1) as u8;
            let local = ColorMap::Fixed(palette.clone());
            let indexed = index_pixels(&local, &frame.rgba, transparent_index);
            IndexedFrame {
                indices: indexed.indices,
                transparent: indexed.transparent,
                transparent_index,
                delay_ms: frame.delay_ms,
                disposal: frame.disposal,
                local_palette: Some(mux::padded(palette, len)),
            }
        }
        None => {
            let indexed = index_pixels(map, &frame.rgba, options.transparent_index);
            IndexedFrame {
                indices: indexed.indices,
                transparent: indexed.transparent,
                transparent_index: options.transparent_index,
                delay_ms: frame.delay_ms,
                disposal: frame.disposal,
                local_palette: None,
            }
        }
    }
}
