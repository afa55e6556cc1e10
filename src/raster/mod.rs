//! Single-channel float rasters and the passes applied to them.

pub mod bands;
pub mod blur;
pub mod luminance;
pub mod resample;

pub use bands::AbortSignal;
pub use blur::gaussian_blur;
pub use luminance::{extract_luminance, luma};
pub use resample::{fit_into, resample};

/// Row-major grid of normalized luminance samples
#[derive(Debug, Clone, PartialEq)]
pub struct Plane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f32>,
}

impl Plane {
    pub fn new(width: usize, height: usize, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }
}

/// Round to the nearest integer, halves away from zero (inputs are >= 0)
pub fn round_half_up(x: f64) -> usize {
    (x + 0.5).floor().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(2.49), 2);
        assert_eq!(round_half_up(0.0), 0);
        assert_eq!(round_half_up(1000.0), 1000);
    }
}
