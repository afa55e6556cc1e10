//! Image to height field to closed solid.

pub mod heightfield;
pub mod solid;
pub mod walls;

pub use heightfield::{HeightFieldBuilder, thickness};
pub use solid::{build_solid, expected_triangle_count};
