use crate::error::{LithoError, Result};

/// Dense grid of material thickness values in mm
///
/// Row-major, row 0 is the top row of the source image.
#[derive(Debug, Clone, PartialEq)]
pub struct HeightField {
    width: usize,
    height: usize,
    pitch_mm: f32,
    values: Vec<f32>,
    min_thickness_mm: f32,
    max_thickness_mm: f32,
}

impl HeightField {
    /// Build a field from raw thickness values
    ///
    /// The recorded thickness range is the actual min/max of the finite
    /// values. Values are not otherwise checked here; the solid builder
    /// rejects non-finite or non-positive ones.
    pub fn from_values(width: usize, height: usize, pitch_mm: f32, values: Vec<f32>) -> Result<Self> {
        let (lo, hi) = values
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::MAX, f32::MIN), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Self::with_range(width, height, pitch_mm, values, lo, hi)
    }

    /// Build a field whose values were mapped into `[min_mm, max_mm]`
    pub(crate) fn with_range(
        width: usize,
        height: usize,
        pitch_mm: f32,
        values: Vec<f32>,
        min_thickness_mm: f32,
        max_thickness_mm: f32,
    ) -> Result<Self> {
        if values.len() != width * height {
            return Err(LithoError::invalid_height_field(format!(
                "{} values do not fill a {}x{} grid",
                values.len(),
                width,
                height
            )));
        }
        if !(pitch_mm.is_finite() && pitch_mm > 0.0) {
            return Err(LithoError::invalid_height_field(format!(
                "pitch must be positive, got {pitch_mm}"
            )));
        }
        Ok(Self {
            width,
            height,
            pitch_mm,
            values,
            min_thickness_mm,
            max_thickness_mm,
        })
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.height
    }

    /// Physical distance between neighbouring samples
    pub fn pitch_mm(&self) -> f32 {
        self.pitch_mm
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Thickness at column `x`, row `y`
    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.values[y * self.width + x]
    }

    /// Lower bound of the thickness range the field was mapped into
    pub fn min_thickness_mm(&self) -> f32 {
        self.min_thickness_mm
    }

    /// Upper bound of the thickness range the field was mapped into
    pub fn max_thickness_mm(&self) -> f32 {
        self.max_thickness_mm
    }

    /// Physical size spanned by the sample grid, (x, y) in mm
    pub fn span_mm(&self) -> (f32, f32) {
        (
            self.width.saturating_sub(1) as f32 * self.pitch_mm,
            self.height.saturating_sub(1) as f32 * self.pitch_mm,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_values_records_range() {
        let field = HeightField::from_values(2, 2, 0.5, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(field.min_thickness_mm(), 1.0);
        assert_eq!(field.max_thickness_mm(), 4.0);
        assert_eq!(field.get(1, 1), 4.0);
        assert_eq!(field.span_mm(), (0.5, 0.5));
    }

    #[test]
    fn test_size_mismatch() {
        assert!(matches!(
            HeightField::from_values(3, 2, 0.5, vec![1.0; 5]),
            Err(LithoError::InvalidHeightField { .. })
        ));
    }

    #[test]
    fn test_bad_pitch() {
        assert!(HeightField::from_values(1, 1, 0.0, vec![1.0]).is_err());
        assert!(HeightField::from_values(1, 1, f32::NAN, vec![1.0]).is_err());
    }
}
