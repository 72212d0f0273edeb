//! NeuQuant palettes through the `color_quant` network.
use std::fmt;
use std::sync::Arc;

use crate::block::{Palette, Rgb};

/// A trained network and the palette it produced.
///
/// The network is shared, cloning only bumps a reference count.
#[derive(Clone)]
pub struct NeuQuant {
    network: Arc<color_quant::NeuQuant>,
    palette: Palette,
}

impl NeuQuant {
    /// Train a network of `colors` neurons on `pixels`.
    ///
    /// Only every `samplefac`-th pixel is used for learning, 1 uses all of them. `samplefac`
    /// is clamped to `1..=30` and `colors` to `1..=256`.
    pub fn new(samplefac: usize, colors: usize, pixels: &[Rgb]) -> Self {
        let rgba: Vec<u8> = pixels.iter().flat_map(|c| [c.r, c.g, c.b, 255]).collect();
        let network = color_quant::NeuQuant::new(
            samplefac.clamp(1, 30) as i32,
            colors.clamp(1, 256),
            &rgba,
        );
        let palette = network
            .color_map_rgb()
            .chunks_exact(3)
            .map(|c| Rgb::new(c[0], c[1], c[2]))
            .collect();
        NeuQuant {
            network: Arc::new(network),
            palette,
        }
    }

    /// The trained colors, in neuron order.
    pub fn palette(&self) -> &[Rgb] {
        &self.palette
    }

    /// The palette index of the neuron nearest to `color`.
    pub fn index_of(&self, color: Rgb) -> u8 {
        self.network.index_of(&[color.r, color.g, color.b, 255]) as u8
    }

    pub fn lookup(&self, index: usize) -> Option<Rgb> {
        self.palette.get(index).copied()
    }
}

impl fmt::Debug for NeuQuant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeuQuant")
            .field("palette", &self.palette)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::NeuQuant;
    use crate::block::Rgb;

    fn distance(a: Rgb, b: Rgb) -> i32 {
        (i32::from(a.r) - i32::from(b.r)).abs()
            + (i32::from(a.g) - i32::from(b.g)).abs()
            + (i32::from(a.b) - i32::from(b.b)).abs()
    }

    #[test]
    fn learns_dominant_colors() {
        let colors = [
            Rgb::new(255, 0, 0),
            Rgb::new(0, 255, 0),
            Rgb::new(0, 0, 255),
            Rgb::new(255, 255, 255),
        ];
        let pixels: Vec<Rgb> = (0..4000).map(|i| colors[i % 4]).collect();
        let nq = NeuQuant::new(1, 16, &pixels);
        assert_eq!(nq.palette().len(), 16);
        for &color in &colors {
            let index = usize::from(nq.index_of(color));
            let found = nq.lookup(index).unwrap();
            assert!(distance(found, color) < 48, "{:?} mapped to {:?}", color, found);
        }
    }

    #[test]
    fn search_finds_the_closest_entry() {
        let pixels: Vec<Rgb> = (0..3000u32)
            .map(|i| Rgb::new((i * 7) as u8, (i * 13) as u8, (i * 29) as u8))
            .collect();
        let nq = NeuQuant::new(3, 32, &pixels);
        for color in pixels.iter().step_by(97) {
            let found = nq.lookup(usize::from(nq.index_of(*color))).unwrap();
            let best = nq
                .palette()
                .iter()
                .map(|&c| distance(c, *color))
                .min()
                .unwrap();
            assert_eq!(distance(found, *color), best);
        }
    }

    #[test]
    fn clones_share_the_network() {
        let pixels: Vec<Rgb> = (0..600u32).map(|i| Rgb::new(i as u8, 0, (i / 3) as u8)).collect();
        let nq = NeuQuant::new(10, 8, &pixels);
        let copy = nq.clone();
        assert_eq!(copy.palette(), nq.palette());
        assert_eq!(copy.index_of(Rgb::new(40, 0, 20)), nq.index_of(Rgb::new(40, 0, 20)));
    }
}
