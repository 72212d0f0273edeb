//! Mapping RGBA pixels to palette indices.
use crate::block::Rgb;
use crate::quant::ColorMap;

/// The palette indices of one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedPixels {
    pub indices: Vec<u8>,
    /// Whether any pixel was fully transparent.
    pub transparent: bool,
}

/// Index every pixel of `rgba` against `map`.
///
/// Pixels with alpha 0 get `transparent_index` without any search. All other pixels are
/// treated as opaque, whatever their alpha.
pub fn index_pixels(map: &ColorMap, rgba: &[u8], transparent_index: u8) -> IndexedPixels {
    let mut indices = Vec::with_capacity(rgba.len() / 4);
    let mut transparent = false;
    // Neighbouring pixels are often equal.
    let mut last: Option<(Rgb, u8)> = None;

    for pixel in rgba.chunks_exact(4) {
        if pixel[3] == 0 {
            transparent = true;
            indices.push(transparent_index);
            continue;
        }

        let color = Rgb::new(pixel[0], pixel[1], pixel[2]);
        let index = match last {
            Some((c, index)) if c == color => index,
            _ => {
                let index = map.index_of(color);
                last = Some((color, index));
                index
            }
        };
        indices.push(index);
    }

    IndexedPixels {
        indices,
        transparent,
    }
}

#[cfg(test)]
mod tests {
    use super::index_pixels;
    use crate::block::Rgb;
    use crate::quant::ColorMap;

    #[test]
    fn transparent_pixels_short_circuit() {
        let map = ColorMap::Fixed(vec![Rgb::new(255, 0, 0), Rgb::new(0, 0, 255)]);
        let rgba = [
            250, 5, 5, 255, //
            0, 0, 0, 0, //
            10, 10, 200, 128, //
            10, 10, 200, 255,
        ];
        let indexed = index_pixels(&map, &rgba, 3);
        assert_eq!(indexed.indices, vec![0, 3, 1, 1]);
        assert!(indexed.transparent);
    }

    #[test]
    fn opaque_frames_are_not_flagged() {
        let map = ColorMap::MedianCut(vec![Rgb::new(0, 0, 0), Rgb::new(255, 255, 255)]);
        let indexed = index_pixels(&map, &[200, 200, 200, 255, 20, 20, 20, 255], 3);
        assert_eq!(indexed.indices, vec![1, 0]);
        assert!(!indexed.transparent);
    }
}
