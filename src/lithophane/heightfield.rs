use std::time::Instant;
use tracing::debug;

use crate::domain::{CropMode, CropRegion, HeightField, Image, LithophaneParameters};
use crate::error::{LithoError, Result};
use crate::raster::bands::{AbortSignal, check, fill_rows};
use crate::raster::{Plane, extract_luminance, fit_into, gaussian_blur, resample, round_half_up};

/// Luminance given to grid cells the image does not cover in pad mode
pub const PAD_LUMINANCE: f32 = 1.0;

/// Most samples a grid may hold: the solid doubles them into vertices and
/// indexes those with `u32`
pub const MAX_GRID_SAMPLES: usize = (u32::MAX / 2) as usize;

/// Turns a cropped image into a grid of thicknesses
///
/// ```no_run
/// use lithophane::domain::{Image, LithophaneParameters};
/// use lithophane::lithophane::HeightFieldBuilder;
///
/// let image = Image::from_gray8(2, 2, vec![0, 255, 255, 0]).unwrap();
/// let params = LithophaneParameters::new(100.0, 100.0, 0.8, 5.0);
/// let field = HeightFieldBuilder::new(&image, params).build().unwrap();
/// assert_eq!(field.width(), 1000);
/// ```
#[derive(Debug, Clone)]
pub struct HeightFieldBuilder<'a> {
    image: &'a Image,
    params: LithophaneParameters,
    crop: Option<CropRegion>,
    invert: bool,
    abort: Option<&'a AbortSignal>,
}

impl<'a> HeightFieldBuilder<'a> {
    pub fn new(image: &'a Image, params: LithophaneParameters) -> Self {
        Self {
            image,
            params,
            crop: None,
            invert: false,
            abort: None,
        }
    }

    /// Restrict the source to a rectangle; the whole image is used otherwise
    pub fn with_crop(mut self, crop: Option<CropRegion>) -> Self {
        self.crop = crop;
        self
    }

    /// Map bright to thick instead of bright to thin
    pub fn with_invert(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    pub fn with_abort(mut self, abort: Option<&'a AbortSignal>) -> Self {
        self.abort = abort;
        self
    }

    /// Grid dimensions (columns, rows) the parameters call for
    pub fn grid_size(params: &LithophaneParameters) -> Result<(usize, usize)> {
        let res = params.resolution_px_per_mm as f64;
        let cols = round_half_up(params.width_mm as f64 * res);
        let rows = round_half_up(params.height_mm as f64 * res);
        if cols == 0 || rows == 0 {
            return Err(LithoError::invalid_parameter(format!(
                "{} x {} mm at {} px/mm rounds to an empty {}x{} grid",
                params.width_mm, params.height_mm, params.resolution_px_per_mm, cols, rows
            )));
        }
        match cols.checked_mul(rows) {
            Some(n) if n <= MAX_GRID_SAMPLES => Ok((cols, rows)),
            _ => Err(LithoError::invalid_parameter(format!(
                "{} x {} mm at {} px/mm needs a {}x{} grid, more than {} samples",
                params.width_mm,
                params.height_mm,
                params.resolution_px_per_mm,
                cols,
                rows,
                MAX_GRID_SAMPLES
            ))),
        }
    }

    pub fn build(self) -> Result<HeightField> {
        let start = Instant::now();
        let crop = self.crop.unwrap_or_else(|| self.image.bounds());
        crop.validate(self.image)?;
        self.params.validate()?;
        let (cols, rows) = Self::grid_size(&self.params)?;
        check(self.abort)?;

        let luminance = Plane::new(
            crop.w as usize,
            crop.h as usize,
            extract_luminance(self.image, &crop, self.invert),
        );

        // Padding is added after inversion so it always maps to the thinnest material
        let grid = match self.params.crop_mode {
            CropMode::Exact => resample(&luminance, cols, rows, self.abort)?,
            CropMode::Pad => fit_into(&luminance, cols, rows, PAD_LUMINANCE, self.abort)?,
        };

        let sigma = self.params.blur_mm * self.params.resolution_px_per_mm;
        let grid = gaussian_blur(&grid, sigma, self.abort)?;

        let min = self.params.min_thickness_mm;
        let max = self.params.max_thickness_mm;
        let mut values = vec![0.0f32; cols * rows];
        fill_rows(&mut values, cols, self.abort, |y, row| {
            let src = &grid.data[y * cols..(y + 1) * cols];
            for (out, &v) in row.iter_mut().zip(src) {
                *out = thickness(v, min, max);
            }
        })?;

        debug!(
            crop_w = crop.w,
            crop_h = crop.h,
            cols,
            rows,
            sigma_px = sigma,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "built height field"
        );

        HeightField::with_range(
            cols,
            rows,
            1.0 / self.params.resolution_px_per_mm,
            values,
            min,
            max,
        )
    }
}

/// Thickness for normalized luminance `v`
///
/// `min + (1 - v) * (max - min)`, evaluated as a blend of the two bounds so
/// that v = 1 and v = 0 land exactly on `min` and `max`.
pub fn thickness(v: f32, min: f32, max: f32) -> f32 {
    v * min + (1.0 - v) * max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PixelData;

    fn params() -> LithophaneParameters {
        LithophaneParameters::new(2.0, 1.0, 0.8, 5.0).with_resolution(2.0)
    }

    fn all(value: u8, width: u32, height: u32) -> Image {
        Image::from_gray8(width, height, vec![value; (width * height) as usize]).unwrap()
    }

    #[test]
    fn test_thickness_mapping() {
        assert_eq!(thickness(1.0, 0.8, 5.0), 0.8);
        assert_eq!(thickness(0.0, 0.8, 5.0), 5.0);
        assert!((thickness(0.5, 0.8, 5.0) - 2.9).abs() < 1e-6);
    }

    #[test]
    fn test_grid_size_rounds_half_up() {
        let p = LithophaneParameters::new(10.25, 3.0, 0.8, 5.0).with_resolution(2.0);
        assert_eq!(HeightFieldBuilder::grid_size(&p).unwrap(), (21, 6));
        let tiny = LithophaneParameters::new(0.01, 3.0, 0.8, 5.0).with_resolution(1.0);
        assert!(HeightFieldBuilder::grid_size(&tiny).is_err());
    }

    #[test]
    fn test_grid_size_capped() {
        let at_cap = LithophaneParameters::new(65_535.0, 32_768.0, 0.8, 5.0).with_resolution(1.0);
        assert_eq!(
            HeightFieldBuilder::grid_size(&at_cap).unwrap(),
            (65_535, 32_768)
        );
        for (w, h) in [(65_536.0, 32_768.0), (1e30, 1.0), (1e30, 1e30)] {
            let p = LithophaneParameters::new(w, h, 0.8, 5.0).with_resolution(1.0);
            assert!(p.validate().is_ok());
            assert!(matches!(
                HeightFieldBuilder::grid_size(&p),
                Err(LithoError::InvalidParameter { .. })
            ));
        }
    }

    #[test]
    fn test_huge_blur_rejected() {
        let image = all(0, 4, 2);
        let p = params().with_blur(1e30);
        assert!(p.validate().is_ok());
        let err = HeightFieldBuilder::new(&image, p).build().unwrap_err();
        assert!(matches!(err, LithoError::InvalidParameter { .. }));
    }

    #[test]
    fn test_white_is_thin_black_is_thick() {
        let white = all(255, 4, 2);
        let field = HeightFieldBuilder::new(&white, params()).build().unwrap();
        assert_eq!((field.width(), field.height()), (4, 2));
        assert!(field.values().iter().all(|&t| t == 0.8));

        let black = all(0, 4, 2);
        let field = HeightFieldBuilder::new(&black, params()).build().unwrap();
        assert!(field.values().iter().all(|&t| t == 5.0));
        assert_eq!(field.pitch_mm(), 0.5);
    }

    #[test]
    fn test_invert_applied_once() {
        let white = all(255, 4, 2);
        let field = HeightFieldBuilder::new(&white, params())
            .with_invert(true)
            .build()
            .unwrap();
        assert!(field.values().iter().all(|&t| t == 5.0));
    }

    #[test]
    fn test_uniform_gray_is_uniform() {
        let gray = all(128, 7, 5);
        // sigma 1 px on the 4x2 grid
        let field = HeightFieldBuilder::new(&gray, params().with_blur(0.5))
            .build()
            .unwrap();
        let first = field.values()[0];
        assert!(field.values().iter().all(|t| (t - first).abs() < 1e-5));
    }

    #[test]
    fn test_range_preserved_for_black_and_white_halves() {
        // 4x2 image: left half black, right half white, sampled 1:1
        let image = Image::from_gray8(4, 2, vec![0, 0, 255, 255, 0, 0, 255, 255]).unwrap();
        let field = HeightFieldBuilder::new(&image, params()).build().unwrap();
        assert_eq!(field.get(0, 0), 5.0);
        assert_eq!(field.get(3, 1), 0.8);
        assert_eq!(field.min_thickness_mm(), 0.8);
        assert_eq!(field.max_thickness_mm(), 5.0);
    }

    #[test]
    fn test_crop_selects_region() {
        // Black column on the left, rest white; crop away the black column
        let mut data = vec![255u8; 5 * 2];
        data[0] = 0;
        data[5] = 0;
        let image = Image::from_gray8(5, 2, data).unwrap();
        let field = HeightFieldBuilder::new(&image, params())
            .with_crop(Some(CropRegion::new(1, 0, 4, 2)))
            .build()
            .unwrap();
        assert!(field.values().iter().all(|&t| t == 0.8));
    }

    #[test]
    fn test_invalid_crop_rejected() {
        let image = all(0, 4, 2);
        let err = HeightFieldBuilder::new(&image, params())
            .with_crop(Some(CropRegion::new(0, 0, 0, 2)))
            .build()
            .unwrap_err();
        assert!(matches!(err, LithoError::InvalidCrop { .. }));
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let image = all(0, 4, 2);
        let bad = LithophaneParameters::new(2.0, 1.0, 5.0, 0.8);
        let err = HeightFieldBuilder::new(&image, bad).build().unwrap_err();
        assert!(matches!(err, LithoError::InvalidParameter { .. }));
    }

    #[test]
    fn test_pad_mode_fills_thin() {
        // Square black image into a 2:1 grid -> black square centered, thin bars either side
        let image = all(0, 3, 3);
        let p = LithophaneParameters::new(4.0, 2.0, 0.8, 5.0)
            .with_resolution(1.0)
            .with_crop_mode(CropMode::Pad);
        let field = HeightFieldBuilder::new(&image, p).build().unwrap();
        assert_eq!((field.width(), field.height()), (4, 2));
        for y in 0..2 {
            assert_eq!(field.get(0, y), 0.8);
            assert_eq!(field.get(1, y), 5.0);
            assert_eq!(field.get(2, y), 5.0);
            assert_eq!(field.get(3, y), 0.8);
        }
    }

    #[test]
    fn test_pad_stays_thin_when_inverted() {
        let image = all(255, 3, 3);
        let p = LithophaneParameters::new(4.0, 2.0, 0.8, 5.0)
            .with_resolution(1.0)
            .with_crop_mode(CropMode::Pad);
        let field = HeightFieldBuilder::new(&image, p)
            .with_invert(true)
            .build()
            .unwrap();
        assert_eq!(field.get(0, 0), 0.8);
        assert_eq!(field.get(1, 0), 5.0);
    }

    #[test]
    fn test_rgb_source() {
        let image = Image::new(1, 1, 3, PixelData::U8(vec![255, 255, 255])).unwrap();
        let p = LithophaneParameters::new(1.0, 1.0, 0.8, 5.0).with_resolution(2.0);
        let field = HeightFieldBuilder::new(&image, p).build().unwrap();
        assert!(field.values().iter().all(|&t| t == 0.8));
    }

    #[test]
    fn test_abort_before_work() {
        let image = all(0, 4, 2);
        let signal = AbortSignal::new();
        signal.abort();
        let err = HeightFieldBuilder::new(&image, params())
            .with_abort(Some(&signal))
            .build()
            .unwrap_err();
        assert!(matches!(err, LithoError::Aborted));
    }
}
