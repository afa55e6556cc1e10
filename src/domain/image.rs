use crate::error::{LithoError, Result};

/// Raw sample storage of an [`Image`]
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    /// 8-bit samples, 0 = black, 255 = full intensity
    U8(Vec<u8>),
    /// Float samples, nominally in [0, 1]
    F32(Vec<f32>),
}

impl PixelData {
    fn len(&self) -> usize {
        match self {
            PixelData::U8(data) => data.len(),
            PixelData::F32(data) => data.len(),
        }
    }

    /// Sample at `index` normalized to [0, 1]
    fn normalized(&self, index: usize) -> f32 {
        match self {
            PixelData::U8(data) => data[index] as f32 / 255.0,
            PixelData::F32(data) => data[index].clamp(0.0, 1.0),
        }
    }
}

/// An interleaved pixel buffer owned by the caller
///
/// Channel layouts: 1 = gray, 2 = gray + alpha, 3 = RGB, 4 = RGBA.
/// Alpha is carried but never read.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    channels: u8,
    data: PixelData,
}

impl Image {
    /// Wrap a pixel buffer, checking that its length matches the dimensions
    pub fn new(width: u32, height: u32, channels: u8, data: PixelData) -> Result<Self> {
        if !(1..=4).contains(&channels) {
            return Err(LithoError::invalid_parameter(format!(
                "image must have 1 to 4 channels, got {channels}"
            )));
        }
        let expected = width as usize * height as usize * channels as usize;
        if data.len() != expected {
            return Err(LithoError::invalid_parameter(format!(
                "pixel buffer holds {} samples, {}x{}x{} image needs {}",
                data.len(),
                width,
                height,
                channels,
                expected
            )));
        }
        Ok(Self {
            width,
            height,
            channels,
            data,
        })
    }

    /// Single-channel 8-bit image
    pub fn from_gray8(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        Self::new(width, height, 1, PixelData::U8(data))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// Full-image crop rectangle
    pub fn bounds(&self) -> CropRegion {
        CropRegion::new(0, 0, self.width, self.height)
    }

    /// Color samples of pixel (x, y) as normalized (r, g, b)
    ///
    /// Gray images report the same value on all three channels.
    pub fn rgb(&self, x: u32, y: u32) -> [f32; 3] {
        let base = (y as usize * self.width as usize + x as usize) * self.channels as usize;
        match self.channels {
            1 | 2 => {
                let v = self.data.normalized(base);
                [v, v, v]
            }
            _ => [
                self.data.normalized(base),
                self.data.normalized(base + 1),
                self.data.normalized(base + 2),
            ],
        }
    }
}

impl From<&::image::DynamicImage> for Image {
    fn from(img: &::image::DynamicImage) -> Self {
        use ::image::DynamicImage;

        let (width, height) = (img.width(), img.height());
        let (channels, data) = match img {
            DynamicImage::ImageLuma8(buf) => (1, PixelData::U8(buf.as_raw().clone())),
            DynamicImage::ImageLumaA8(buf) => (2, PixelData::U8(buf.as_raw().clone())),
            DynamicImage::ImageRgb8(buf) => (3, PixelData::U8(buf.as_raw().clone())),
            DynamicImage::ImageRgba8(buf) => (4, PixelData::U8(buf.as_raw().clone())),
            // 16-bit and float sources keep their precision as f32
            other => (3, PixelData::F32(other.to_rgb32f().into_raw())),
        };
        Self {
            width,
            height,
            channels,
            data,
        }
    }
}

/// Integer rectangle inside an image, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl CropRegion {
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Build a crop from fractions of the image size
    ///
    /// Edges are truncated to whole pixels and clamped to the image, the way
    /// the crop overlay hands them over. The result still has to pass
    /// [`CropRegion::validate`].
    pub fn from_normalized(image: &Image, x: f64, y: f64, w: f64, h: f64) -> Self {
        let iw = image.width() as f64;
        let ih = image.height() as f64;
        let clamp_x = |v: f64| (v * iw).floor().clamp(0.0, iw) as u32;
        let clamp_y = |v: f64| (v * ih).floor().clamp(0.0, ih) as u32;

        let left = clamp_x(x);
        let top = clamp_y(y);
        let right = clamp_x(x + w);
        let bottom = clamp_y(y + h);
        Self::new(
            left,
            top,
            right.saturating_sub(left),
            bottom.saturating_sub(top),
        )
    }

    /// Check the rectangle has positive area and lies within the image
    pub fn validate(&self, image: &Image) -> Result<()> {
        if self.w == 0 || self.h == 0 {
            return Err(LithoError::invalid_crop(format!(
                "crop {}x{} at ({}, {}) has no area",
                self.w, self.h, self.x, self.y
            )));
        }
        let right = self.x as u64 + self.w as u64;
        let bottom = self.y as u64 + self.h as u64;
        if right > image.width() as u64 || bottom > image.height() as u64 {
            return Err(LithoError::invalid_crop(format!(
                "crop {}x{} at ({}, {}) exceeds {}x{} image",
                self.w,
                self.h,
                self.x,
                self.y,
                image.width(),
                image.height()
            )));
        }
        Ok(())
    }
}
