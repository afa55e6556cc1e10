pub mod heightfield;
pub mod image;
pub mod operation;

pub use heightfield::HeightField;
pub use image::{CropRegion, Image, PixelData};
pub use operation::{
    CropMode, GrayscaleParameters, LithophaneParameters, Operation, Process, RawOperation,
};
