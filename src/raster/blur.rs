use super::Plane;
use super::bands::{AbortSignal, fill_rows};
use crate::error::{LithoError, Result};

/// Normalized 1D Gaussian kernel for standard deviation `sigma` (pixels)
///
/// Half-width is `ceil(3 * sigma)`, so the kernel has `2 * half + 1` taps.
/// Callers bound the half-width first.
fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let half = (3.0 * sigma).ceil().max(0.0) as isize;
    let denom = 2.0 * sigma * sigma;
    let raw: Vec<f32> = (-half..=half)
        .map(|k| (-((k * k) as f32) / denom).exp())
        .collect();
    let sum: f32 = raw.iter().sum();
    raw.into_iter().map(|w| w / sum).collect()
}

/// Blur with a separable Gaussian, horizontal pass then vertical pass
///
/// Edges are clamped. Each pass reads the previous buffer and writes a new
/// one. `sigma <= 0` returns the input unchanged. A kernel whose half-width
/// exceeds the larger side of the plane (or a non-finite `sigma`) is an
/// `InvalidParameter` error.
pub fn gaussian_blur(src: &Plane, sigma: f32, abort: Option<&AbortSignal>) -> Result<Plane> {
    if sigma <= 0.0 || src.data.is_empty() {
        return Ok(src.clone());
    }
    let (width, height) = (src.width, src.height);
    let half_width = (3.0 * sigma as f64).ceil();
    if !(half_width <= width.max(height) as f64) {
        return Err(LithoError::invalid_parameter(format!(
            "blur sigma of {sigma} px needs {half_width} taps either side, \
             wider than the {width}x{height} grid"
        )));
    }
    let kernel = gaussian_kernel(sigma);
    let half = (kernel.len() / 2) as isize;
    let clamp = |i: isize, len: usize| i.clamp(0, len as isize - 1) as usize;

    let mut across = vec![0.0f32; width * height];
    fill_rows(&mut across, width, abort, |y, row| {
        let src_row = &src.data[y * width..(y + 1) * width];
        for (x, out) in row.iter_mut().enumerate() {
            *out = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| w * src_row[clamp(x as isize + k as isize - half, width)])
                .sum();
        }
    })?;

    let mut data = vec![0.0f32; width * height];
    fill_rows(&mut data, width, abort, |y, row| {
        for (x, out) in row.iter_mut().enumerate() {
            *out = kernel
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    let sy = clamp(y as isize + k as isize - half, height);
                    w * across[sy * width + x]
                })
                .sum();
        }
    })?;

    Ok(Plane::new(width, height, data))
}
