//! lithophane - Turn images into watertight, 3D-printable lithophane STL meshes
//!
//! The pipeline runs image -> height field -> closed solid -> STL. See
//! [`pipeline::build`] and [`pipeline::export`] for the entry points.

pub mod config;
pub mod domain;
pub mod error;
pub mod lithophane;
pub mod mesh;
pub mod pipeline;
pub mod raster;

pub use error::{LithoError, Result};
