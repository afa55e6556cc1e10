//! Antialiased bilinear resampling.
//!
//! Each axis is filtered with a triangle kernel. When shrinking, the kernel is
//! widened by the scale factor so every source pixel contributes; when
//! enlarging it is plain bilinear interpolation with clamped edges.

use super::bands::{AbortSignal, fill_rows};
use super::{Plane, round_half_up};
use crate::error::Result;

/// Source window and normalized weights for one output sample
#[derive(Debug, Clone)]
struct Taps {
    start: usize,
    weights: Vec<f32>,
}

fn triangle(t: f64) -> f64 {
    (1.0 - t.abs()).max(0.0)
}

fn axis_taps(src_len: usize, dst_len: usize) -> Vec<Taps> {
    let scale = src_len as f64 / dst_len as f64;
    let filter_scale = scale.max(1.0);
    let support = filter_scale;

    (0..dst_len)
        .map(|i| {
            let center = (i as f64 + 0.5) * scale;
            let lo = ((center - support).floor().max(0.0) as usize).min(src_len - 1);
            let hi = ((center + support).ceil() as usize).clamp(lo + 1, src_len);

            let raw: Vec<f64> = (lo..hi)
                .map(|x| triangle((x as f64 + 0.5 - center) / filter_scale))
                .collect();
            let sum: f64 = raw.iter().sum();
            if sum <= 0.0 {
                // Only reachable for degenerate windows; take the nearest sample
                let nearest = (center.floor() as usize).min(src_len - 1);
                return Taps {
                    start: nearest,
                    weights: vec![1.0],
                };
            }
            Taps {
                start: lo,
                weights: raw.iter().map(|w| (w / sum) as f32).collect(),
            }
        })
        .collect()
}

/// Resample `src` to `width x height`
pub fn resample(src: &Plane, width: usize, height: usize, abort: Option<&AbortSignal>) -> Result<Plane> {
    if src.width == width && src.height == height {
        return Ok(src.clone());
    }

    let x_taps = axis_taps(src.width, width);
    let y_taps = axis_taps(src.height, height);

    // Horizontal pass: src.height rows of `width` samples
    let mut across = vec![0.0f32; width * src.height];
    fill_rows(&mut across, width, abort, |y, row| {
        let src_row = &src.data[y * src.width..(y + 1) * src.width];
        for (out, taps) in row.iter_mut().zip(&x_taps) {
            *out = taps
                .weights
                .iter()
                .enumerate()
                .map(|(k, w)| w * src_row[taps.start + k])
                .sum();
        }
    })?;

    // Vertical pass
    let mut data = vec![0.0f32; width * height];
    fill_rows(&mut data, width, abort, |y, row| {
        let taps = &y_taps[y];
        for (x, out) in row.iter_mut().enumerate() {
            let v: f32 = taps
                .weights
                .iter()
                .enumerate()
                .map(|(k, w)| w * across[(taps.start + k) * width + x])
                .sum();
            *out = v.clamp(0.0, 1.0);
        }
    })?;

    Ok(Plane::new(width, height, data))
}

/// Scale `src` to fit inside `width x height` keeping its aspect ratio
///
/// The scaled image is centered; uncovered samples are set to `fill`.
pub fn fit_into(
    src: &Plane,
    width: usize,
    height: usize,
    fill: f32,
    abort: Option<&AbortSignal>,
) -> Result<Plane> {
    let (fit_w, fit_h) = fitted_size(src.width, src.height, width, height);
    let scaled = resample(src, fit_w, fit_h, abort)?;

    let off_x = (width - fit_w) / 2;
    let off_y = (height - fit_h) / 2;

    let mut data = vec![fill; width * height];
    for y in 0..fit_h {
        let dst = (off_y + y) * width + off_x;
        data[dst..dst + fit_w].copy_from_slice(&scaled.data[y * fit_w..(y + 1) * fit_w]);
    }
    Ok(Plane::new(width, height, data))
}

/// Largest size with the source aspect ratio that fits the target
fn fitted_size(src_w: usize, src_h: usize, width: usize, height: usize) -> (usize, usize) {
    // Compare src_w / src_h against width / height without division
    if src_w * height >= width * src_h {
        let h = round_half_up(width as f64 * src_h as f64 / src_w as f64);
        (width, h.clamp(1, height))
    } else {
        let w = round_half_up(height as f64 * src_w as f64 / src_h as f64);
        (w.clamp(1, width), height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taps_identity() {
        for taps in axis_taps(5, 5) {
            let nonzero: Vec<f32> = taps.weights.iter().copied().filter(|w| *w > 0.0).collect();
            assert_eq!(nonzero, vec![1.0]);
        }
    }

    #[test]
    fn test_taps_normalized_when_shrinking() {
        for taps in axis_taps(100, 7) {
            let sum: f32 = taps.weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
            assert!(taps.weights.len() > 2);
        }
    }

    #[test]
    fn test_upscale_keeps_flat_regions() {
        // Left half black, right half white
        let src = Plane::new(2, 1, vec![0.0, 1.0]);
        let out = resample(&src, 10, 4, None).unwrap();
        assert_eq!(out.width, 10);
        assert_eq!(out.height, 4);
        for y in 0..4 {
            assert_eq!(out.get(0, y), 0.0);
            assert_eq!(out.get(9, y), 1.0);
            // Monotonic ramp in between
            for x in 1..10 {
                assert!(out.get(x, y) >= out.get(x - 1, y));
            }
        }
    }

    #[test]
    fn test_downscale_averages() {
        // Checkerboard averages to mid gray
        let data = (0..64 * 64)
            .map(|i| ((i % 64 + i / 64) % 2) as f32)
            .collect();
        let src = Plane::new(64, 64, data);
        let out = resample(&src, 8, 8, None).unwrap();
        for v in &out.data {
            assert!((v - 0.5).abs() < 0.05, "got {v}");
        }
    }

    #[test]
    fn test_uniform_stays_uniform() {
        let src = Plane::new(13, 7, vec![0.25; 91]);
        let out = resample(&src, 31, 5, None).unwrap();
        assert!(out.data.iter().all(|v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn test_fitted_size() {
        assert_eq!(fitted_size(200, 100, 50, 50), (50, 25));
        assert_eq!(fitted_size(100, 200, 50, 50), (25, 50));
        assert_eq!(fitted_size(100, 100, 40, 20), (20, 20));
        assert_eq!(fitted_size(1000, 1, 10, 10), (10, 1));
    }

    #[test]
    fn test_fit_into_pads_with_fill() {
        let src = Plane::new(2, 1, vec![0.0, 0.0]);
        let out = fit_into(&src, 4, 4, 1.0, None).unwrap();
        // 2:1 into 4x4 -> 4x2 band centered vertically
        for x in 0..4 {
            assert_eq!(out.get(x, 0), 1.0);
            assert_eq!(out.get(x, 1), 0.0);
            assert_eq!(out.get(x, 2), 0.0);
            assert_eq!(out.get(x, 3), 1.0);
        }
    }
}
