//! Reducing the colors of a set of frames to one palette.
//!
//! A [`QuantizerSession`] accumulates samples from every frame and produces a [`ColorMap`]
//! once all frames were seen. The map knows its palette and how to find the palette entry
//! closest to an arbitrary color.
use std::collections::HashMap;
use std::time::Instant;

use log::debug;

use crate::block::{Palette, Rgb};

pub mod mmcq;
pub mod neuquant;

pub use self::mmcq::Histogram;
pub use self::neuquant::NeuQuant;

/// The quantization algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Algorithm {
    /// Modified median cut over a 15 bit histogram.
    MedianCut,
    /// Kohonen neural network.
    #[default]
    NeuQuant,
}

/// A palette together with its nearest color search.
#[derive(Debug, Clone)]
pub enum ColorMap {
    /// Median cut palette, searched linearly.
    MedianCut(Palette),
    /// Trained network with its green index.
    NeuQuant(NeuQuant),
    /// A palette holding every color it will be asked for, or one given by the caller.
    /// Searched linearly.
    Fixed(Palette),
}

/// Sample accumulation of one encode.
///
/// Created with [`begin`], fed with [`add_sample`] and consumed by [`finish`].
///
/// [`begin`]: #method.begin
/// [`add_sample`]: #method.add_sample
/// [`finish`]: #method.finish
#[derive(Debug, Clone)]
pub struct QuantizerSession {
    algorithm: Algorithm,
    max_colors: usize,
    sample_factor: usize,
    samples: Samples,
    /// Counts of every distinct opaque color, until there are more than `max_colors`.
    distinct: Option<HashMap<Rgb, u64>>,
    transparent: bool,
}

#[derive(Debug, Clone)]
enum Samples {
    Histogram(Histogram),
    Pixels(Vec<Rgb>),
}

impl QuantizerSession {
    /// Start a session producing at most `max_colors` colors, clamped to `1..=256`.
    ///
    /// `sample_factor` controls how many pixels NeuQuant learns from, 1 means all of them.
    pub fn begin(algorithm: Algorithm, max_colors: usize, sample_factor: usize) -> Self {
        let samples = match algorithm {
            Algorithm::MedianCut => Samples::Histogram(Histogram::new()),
            Algorithm::NeuQuant => Samples::Pixels(Vec::new()),
        };
        QuantizerSession {
            algorithm,
            max_colors: max_colors.clamp(1, 256),
            sample_factor: sample_factor.max(1),
            samples,
            distinct: Some(HashMap::new()),
            transparent: false,
        }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Add the pixels of an RGBA buffer. Fully transparent pixels are not sampled.
    pub fn add_sample(&mut self, rgba: &[u8]) {
        for pixel in rgba.chunks_exact(4) {
            if pixel[3] == 0 {
                self.transparent = true;
                continue;
            }
            let color = Rgb::new(pixel[0], pixel[1], pixel[2]);

            if let Some(distinct) = &mut self.distinct {
                *distinct.entry(color).or_insert(0) += 1;
                if distinct.len() > self.max_colors {
                    self.distinct = None;
                }
            }

            match &mut self.samples {
                Samples::Histogram(histogram) => histogram.add(color),
                Samples::Pixels(pixels) => pixels.push(color),
            }
        }
    }

    /// Whether any sampled pixel was fully transparent.
    pub fn saw_transparency(&self) -> bool {
        self.transparent
    }

    /// Generate the palette.
    ///
    /// If the samples hold no more distinct colors than allowed, the palette holds exactly
    /// those colors, most frequent first.
    pub fn finish(self) -> ColorMap {
        let start = Instant::now();
        let map = match (self.distinct, self.samples) {
            (Some(distinct), _) => {
                let mut colors: Vec<_> = distinct.into_iter().collect();
                colors.sort_by_key(|&(c, n)| (core::cmp::Reverse(n), c.r, c.g, c.b));
                ColorMap::Fixed(colors.into_iter().map(|(c, _)| c).collect())
            }
            (None, Samples::Histogram(histogram)) => {
                ColorMap::MedianCut(mmcq::quantize(&histogram, self.max_colors))
            }
            (None, Samples::Pixels(pixels)) => ColorMap::NeuQuant(NeuQuant::new(
                self.sample_factor,
                self.max_colors,
                &pixels,
            )),
        };
        debug!(
            "palette:generate {:?} produced {} colors in {:?}",
            self.algorithm,
            map.len(),
            start.elapsed()
        );
        map
    }
}

impl ColorMap {
    pub fn palette(&self) -> &[Rgb] {
        match self {
            ColorMap::MedianCut(palette) | ColorMap::Fixed(palette) => palette,
            ColorMap::NeuQuant(nq) => nq.palette(),
        }
    }

    pub fn len(&self) -> usize {
        self.palette().len()
    }

    pub fn is_empty(&self) -> bool {
        self.palette().is_empty()
    }

    /// The index of the palette entry closest to `color`.
    pub fn index_of(&self, color: Rgb) -> u8 {
        match self {
            ColorMap::NeuQuant(nq) => nq.index_of(color),
            ColorMap::MedianCut(palette) | ColorMap::Fixed(palette) => nearest(palette, color),
        }
    }
}

/// Linear search for the entry with the smallest squared euclidean distance.
///
/// Ties go to the lower index, an empty palette yields 0.
pub fn nearest(palette: &[Rgb], color: Rgb) -> u8 {
    let mut best = 0;
    let mut best_distance = u32::MAX;
    for (i, entry) in palette.iter().enumerate() {
        let dr = i32::from(entry.r) - i32::from(color.r);
        let dg = i32::from(entry.g) - i32::from(color.g);
        let db = i32::from(entry.b) - i32::from(color.b);
        let distance = (dr * dr + dg * dg + db * db) as u32;
        if distance < best_distance {
            best = i;
            best_distance = distance;
            if distance == 0 {
                break;
            }
        }
    }
    best as u8
}

#[cfg(test)]
mod tests {
    use super::{nearest, Algorithm, ColorMap, QuantizerSession};
    use crate::block::Rgb;

    fn rgba(colors: &[[u8; 4]]) -> Vec<u8> {
        colors.concat()
    }

    #[test]
    fn few_colors_give_an_exact_palette() {
        let mut session = QuantizerSession::begin(Algorithm::NeuQuant, 4, 10);
        session.add_sample(&rgba(&[[1, 2, 3, 255], [9, 9, 9, 255], [9, 9, 9, 255], [0, 0, 0, 0]]));
        assert!(session.saw_transparency());
        match session.finish() {
            ColorMap::Fixed(palette) => {
                assert_eq!(palette, vec![Rgb::new(9, 9, 9), Rgb::new(1, 2, 3)]);
            }
            other => panic!("expected a fixed palette, got {:?}", other),
        }
    }

    #[test]
    fn many_colors_use_the_algorithm() {
        let pixels: Vec<u8> = (0..=255u8).flat_map(|v| [v, 255 - v, v / 2, 255]).collect();

        let mut session = QuantizerSession::begin(Algorithm::MedianCut, 16, 1);
        session.add_sample(&pixels);
        let map = session.finish();
        assert!(matches!(map, ColorMap::MedianCut(_)));
        assert!(map.len() <= 16);

        let mut session = QuantizerSession::begin(Algorithm::NeuQuant, 16, 1);
        session.add_sample(&pixels);
        let map = session.finish();
        assert!(matches!(map, ColorMap::NeuQuant(_)));
        assert_eq!(map.len(), 16);
    }

    #[test]
    fn linear_search_prefers_lower_index() {
        let palette = [Rgb::new(0, 0, 0), Rgb::new(10, 10, 10), Rgb::new(10, 10, 10)];
        assert_eq!(nearest(&palette, Rgb::new(8, 8, 8)), 1);
        assert_eq!(nearest(&palette, Rgb::new(1, 1, 1)), 0);
        assert_eq!(nearest(&[], Rgb::new(1, 1, 1)), 0);
    }
}
