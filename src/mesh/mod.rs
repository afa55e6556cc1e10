pub mod builder;
pub mod stl;
pub mod validation;

pub use builder::{Mesh, MeshBuilder, MeshStats, Triangle, calculate_normal};
pub use stl::{StlFormat, decode, encode, estimate_stl_size, read_stl, write_stl};
pub use validation::{ValidationResult, validate_mesh};
