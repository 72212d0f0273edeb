//! Modified median cut quantization.
//!
//! Colors are counted in a histogram over 5 significant bits per channel. Starting from the
//! box that bounds all sampled colors, the most populated box is repeatedly split at the
//! population median of its longest axis. Once three quarters of the colors exist, boxes are
//! ranked by population times volume instead, which favors splitting large sparse regions.
use crate::block::{Palette, Rgb};

const SIGBITS: u32 = 5;
const RSHIFT: u32 = 8 - SIGBITS;
const HISTOGRAM_SIZE: usize = 1 << (3 * SIGBITS);
const MAX_ITERATIONS: usize = 1000;
const FRACT_BY_POPULATION: f64 = 0.75;

/// Pixel counts over the reduced color space.
#[derive(Debug, Clone)]
pub struct Histogram {
    counts: Vec<u64>,
    min: [u8; 3],
    max: [u8; 3],
    total: u64,
}

/// An axis aligned box in the reduced color space, bounds inclusive.
#[derive(Debug, Clone, Copy)]
struct VBox {
    lo: [u8; 3],
    hi: [u8; 3],
    count: u64,
}

fn color_index(r: u8, g: u8, b: u8) -> usize {
    (usize::from(r) << (2 * SIGBITS)) + (usize::from(g) << SIGBITS) + usize::from(b)
}

impl Histogram {
    pub fn new() -> Self {
        Histogram {
            counts: vec![0; HISTOGRAM_SIZE],
            min: [u8::MAX; 3],
            max: [0; 3],
            total: 0,
        }
    }

    pub fn add(&mut self, color: Rgb) {
        let cell = [color.r >> RSHIFT, color.g >> RSHIFT, color.b >> RSHIFT];
        for axis in 0..3 {
            self.min[axis] = self.min[axis].min(cell[axis]);
            self.max[axis] = self.max[axis].max(cell[axis]);
        }
        self.counts[color_index(cell[0], cell[1], cell[2])] += 1;
        self.total += 1;
    }

    /// Number of colors added.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    fn get(&self, cell: [u8; 3]) -> u64 {
        self.counts[color_index(cell[0], cell[1], cell[2])]
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Histogram::new()
    }
}

impl VBox {
    fn new(lo: [u8; 3], hi: [u8; 3], histogram: &Histogram) -> Self {
        let mut vbox = VBox { lo, hi, count: 0 };
        vbox.count = vbox.cells().map(|cell| histogram.get(cell)).sum();
        vbox
    }

    fn cells(&self) -> impl Iterator<Item = [u8; 3]> {
        let VBox { lo, hi, .. } = *self;
        (lo[0]..=hi[0]).flat_map(move |r| {
            (lo[1]..=hi[1]).flat_map(move |g| (lo[2]..=hi[2]).map(move |b| [r, g, b]))
        })
    }

    fn width(&self, axis: usize) -> u64 {
        u64::from(self.hi[axis] - self.lo[axis]) + 1
    }

    fn volume(&self) -> u64 {
        self.width(0) * self.width(1) * self.width(2)
    }

    fn priority(&self) -> u64 {
        self.count * self.volume()
    }

    /// The population weighted mean color, or the center for an empty box.
    fn average(&self, histogram: &Histogram) -> Rgb {
        let mult = 1u64 << RSHIFT;
        let mut total = 0;
        let mut sum = [0u64; 3];
        for cell in self.cells() {
            let weight = histogram.get(cell);
            total += weight;
            for axis in 0..3 {
                // The center of the cell, (i + 0.5) * mult.
                sum[axis] += weight * (u64::from(cell[axis]) * mult + mult / 2);
            }
        }

        let channel = |axis: usize| -> u8 {
            let value = if total > 0 {
                sum[axis] / total
            } else {
                mult * (u64::from(self.lo[axis]) + u64::from(self.hi[axis]) + 1) / 2
            };
            value.min(255) as u8
        };
        Rgb::new(channel(0), channel(1), channel(2))
    }

    /// Split at the population median of the widest axis.
    ///
    /// Returns `None` for boxes that cannot be split any further.
    fn split(&self, histogram: &Histogram) -> Option<(VBox, VBox)> {
        if self.count < 2 {
            return None;
        }

        // Ties prefer red, then green.
        let axis = (0..3)
            .rev()
            .max_by_key(|&axis| self.width(axis))
            .unwrap_or(0);
        let (lo, hi) = (usize::from(self.lo[axis]), usize::from(self.hi[axis]));
        if lo == hi {
            return None;
        }

        let mut partial = vec![0u64; hi - lo + 1];
        let mut total = 0;
        for cell in self.cells() {
            total += histogram.get(cell);
            partial[usize::from(cell[axis]) - lo] += histogram.get(cell);
        }
        for i in 1..partial.len() {
            partial[i] += partial[i - 1];
        }
        let partial_at = |i: usize| partial[i - lo];

        let median = (lo..=hi).find(|&i| 2 * partial_at(i) > total)?;
        let left = median - lo;
        let right = hi - median;
        let mut cut = if left <= right {
            (hi - 1).min(median + right / 2)
        } else {
            lo.max(median - 1 - left / 2)
        };

        // Avoid boxes without population.
        while partial_at(cut) == 0 {
            cut += 1;
        }
        while total == partial_at(cut) && cut > lo && partial_at(cut - 1) != 0 {
            cut -= 1;
        }
        let cut = cut.min(hi - 1) as u8;

        let mut hi1 = self.hi;
        hi1[axis] = cut;
        let mut lo2 = self.lo;
        lo2[axis] = cut + 1;
        Some((
            VBox::new(self.lo, hi1, histogram),
            VBox::new(lo2, self.hi, histogram),
        ))
    }
}

/// Build a palette of at most `max_colors` colors.
pub fn quantize(histogram: &Histogram, max_colors: usize) -> Palette {
    if histogram.is_empty() || max_colors == 0 {
        return Palette::new();
    }

    let mut queue = vec![VBox::new(histogram.min, histogram.max, histogram)];
    let mut done = Vec::new();

    let target = (FRACT_BY_POPULATION * max_colors as f64).ceil() as usize;
    iterate(histogram, &mut queue, &mut done, target, |b| b.count);
    iterate(histogram, &mut queue, &mut done, max_colors, VBox::priority);

    queue.extend(done);
    queue.sort_by_key(|b| core::cmp::Reverse(b.priority()));
    queue
        .iter()
        .filter(|b| b.count > 0)
        .map(|b| b.average(histogram))
        .collect()
}

fn iterate(
    histogram: &Histogram,
    queue: &mut Vec<VBox>,
    done: &mut Vec<VBox>,
    target: usize,
    key: impl Fn(&VBox) -> u64,
) {
    let mut iterations = 0;
    while queue.len() + done.len() < target && iterations < MAX_ITERATIONS {
        iterations += 1;

        let largest = queue
            .iter()
            .enumerate()
            .max_by_key(|&(_, b)| key(b))
            .map(|(i, _)| i);
        let vbox = match largest {
            Some(i) => queue.remove(i),
            None => return,
        };

        match vbox.split(histogram) {
            Some((first, second)) => {
                // Empty halves are dropped, the populated one is split further later.
                queue.extend([first, second].into_iter().filter(|b| b.count > 0));
            }
            None => done.push(vbox),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{quantize, Histogram};
    use crate::block::Rgb;

    fn histogram(colors: &[(Rgb, usize)]) -> Histogram {
        let mut histogram = Histogram::new();
        for &(color, n) in colors {
            for _ in 0..n {
                histogram.add(color);
            }
        }
        histogram
    }

    #[test]
    fn empty_histogram_gives_empty_palette() {
        assert!(quantize(&Histogram::new(), 16).is_empty());
    }

    #[test]
    fn single_color_is_kept() {
        let h = histogram(&[(Rgb::new(200, 16, 40), 10)]);
        let palette = quantize(&h, 4);
        // Cell centers: (200 >> 3) * 8 + 4 = 204, 20, 44
        assert_eq!(palette, vec![Rgb::new(204, 20, 44)]);
    }

    #[test]
    fn separates_distinct_clusters() {
        let h = histogram(&[
            (Rgb::new(250, 0, 0), 50),
            (Rgb::new(0, 0, 250), 30),
            (Rgb::new(0, 250, 0), 20),
        ]);
        let palette = quantize(&h, 3);
        assert_eq!(palette.len(), 3);
        for target in [Rgb::new(250, 0, 0), Rgb::new(0, 0, 250), Rgb::new(0, 250, 0)] {
            assert!(palette.iter().any(|c| {
                (i32::from(c.r) - i32::from(target.r)).abs() < 8
                    && (i32::from(c.g) - i32::from(target.g)).abs() < 8
                    && (i32::from(c.b) - i32::from(target.b)).abs() < 8
            }));
        }
    }

    #[test]
    fn never_exceeds_max_colors() {
        let mut h = Histogram::new();
        for r in (0..=255).step_by(5) {
            for g in (0..=255).step_by(17) {
                h.add(Rgb::new(r as u8, g as u8, (r ^ g) as u8));
            }
        }
        for max in [2, 7, 16, 100, 255] {
            let palette = quantize(&h, max);
            assert!(!palette.is_empty());
            assert!(palette.len() <= max);
        }
    }
}
