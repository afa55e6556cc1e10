use crate::domain::{CropRegion, Image};

/// Rec. 601 luma weights for (R, G, B)
///
/// Same weighting PIL uses when converting to mode "L".
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Luminance of a normalized RGB triple, clamped to [0, 1]
///
/// Neutral grays pass through unchanged.
pub fn luma([r, g, b]: [f32; 3]) -> f32 {
    if r == g && g == b {
        return r;
    }
    (LUMA_WEIGHTS[0] * r + LUMA_WEIGHTS[1] * g + LUMA_WEIGHTS[2] * b).clamp(0.0, 1.0)
}

/// Copy the crop region out of `image` as one luminance channel
///
/// Returns a row-major `crop.w x crop.h` buffer. With `invert` set each value
/// becomes `1 - v`. The crop must already be validated against the image.
pub fn extract_luminance(image: &Image, crop: &CropRegion, invert: bool) -> Vec<f32> {
    let mut out = Vec::with_capacity(crop.w as usize * crop.h as usize);
    for y in crop.y..crop.y + crop.h {
        for x in crop.x..crop.x + crop.w {
            let v = luma(image.rgb(x, y));
            out.push(if invert { 1.0 - v } else { v });
        }
    }
    out
}
