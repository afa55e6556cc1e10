//! Closed solid from a height field.
//!
//! Grid coordinates: `i` is the column (x), `j` counts rows from the bottom of
//! the image, so image row `r` sits at `j = height - 1 - r` and the relief
//! reads right-side-up from +z. Cell corners are
//! `a = (i, j)`, `b = (i + 1, j)`, `c = (i + 1, j + 1)`, `d = (i, j + 1)` and
//! every cell is split along the `a -> c` diagonal.

use std::time::Instant;
use tracing::debug;

use super::walls::perimeter;
use crate::domain::HeightField;
use crate::error::{LithoError, Result};
use crate::mesh::{Mesh, MeshBuilder};
use crate::raster::bands::{AbortSignal, check, collect_rows};

/// Triangles a `width x height` grid produces: top, back, then side walls
pub fn expected_triangle_count(width: usize, height: usize) -> usize {
    if width < 2 || height < 2 {
        return 0;
    }
    let cells = (width - 1) * (height - 1);
    2 * cells + 2 * cells + 4 * (width - 1) + 4 * (height - 1)
}

/// Height of the back surface along +y for a build angle
#[derive(Debug, Clone, Copy)]
struct BackRamp {
    slope: f32,
}

impl BackRamp {
    fn z(&self, y_mm: f32) -> f32 {
        self.slope * y_mm
    }
}

/// Build the watertight solid for `field`
///
/// The back surface is flat at z = 0 for `build_angle_deg = 0`, otherwise a
/// ramp `tan(angle) * y`. A ramp that would reach the thinnest point of the
/// relief is a `Geometry` error.
pub fn build_solid(
    field: &HeightField,
    build_angle_deg: f32,
    abort: Option<&AbortSignal>,
) -> Result<Mesh> {
    let start = Instant::now();
    let (width, height) = (field.width(), field.height());
    if width < 2 || height < 2 {
        return Err(LithoError::empty_mesh(width, height));
    }
    let back_offset = index_base(width, height)?;
    check_values(field)?;
    let ramp = back_ramp(field, build_angle_deg)?;
    check(abort)?;

    let pitch = field.pitch_mm();
    // Every index is below 2 * back_offset, which fits in u32
    let top = |i: usize, j: usize| (j * width + i) as u32;
    let back = |i: usize, j: usize| back_offset + top(i, j);

    let mut builder = MeshBuilder::with_capacity(
        2 * width * height,
        expected_triangle_count(width, height),
    );
    for j in 0..height {
        for i in 0..width {
            let z = field.get(i, height - 1 - j);
            builder.add_vertex([i as f32 * pitch, j as f32 * pitch, z]);
        }
    }
    for j in 0..height {
        let z = ramp.z(j as f32 * pitch);
        for i in 0..width {
            builder.add_vertex([i as f32 * pitch, j as f32 * pitch, z]);
        }
    }

    // Top faces up: (a, b, c), (a, c, d)
    let top_faces: Vec<[u32; 3]> = collect_rows(height - 1, abort, |j| {
        (0..width - 1)
            .flat_map(|i| {
                let (a, b, c, d) = (top(i, j), top(i + 1, j), top(i + 1, j + 1), top(i, j + 1));
                [[a, b, c], [a, c, d]]
            })
            .collect()
    })?;
    builder.extend(top_faces);

    // Back faces down: same split, reversed winding
    let back_faces: Vec<[u32; 3]> = collect_rows(height - 1, abort, |j| {
        (0..width - 1)
            .flat_map(|i| {
                let (a, b, c, d) = (
                    back(i, j),
                    back(i + 1, j),
                    back(i + 1, j + 1),
                    back(i, j + 1),
                );
                [[a, c, b], [a, d, c]]
            })
            .collect()
    })?;
    builder.extend(back_faces);

    check(abort)?;
    // The top surface traverses its boundary counter-clockwise; each wall
    // quad runs the shared edges the opposite way.
    let ring = perimeter(width, height);
    for (k, &(pi, pj)) in ring.iter().enumerate() {
        let (qi, qj) = ring[(k + 1) % ring.len()];
        let (pt, qt) = (top(pi, pj), top(qi, qj));
        let (pb, qb) = (back(pi, pj), back(qi, qj));
        builder.add_quad(qt, pt, pb, qb);
    }

    let mesh = builder.finish();
    debug!(
        width,
        height,
        triangles = mesh.triangle_count(),
        build_angle_deg,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "built solid"
    );
    Ok(mesh)
}

/// Index of the first back vertex, checking all `2 * width * height`
/// vertex indices fit in a `u32`
fn index_base(width: usize, height: usize) -> Result<u32> {
    width
        .checked_mul(height)
        .filter(|n| n.checked_mul(2).is_some_and(|all| u32::try_from(all).is_ok()))
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| {
            LithoError::invalid_height_field(format!(
                "{width}x{height} grid needs more vertex indices than a u32 holds"
            ))
        })
}

fn check_values(field: &HeightField) -> Result<()> {
    if let Some((k, v)) = field
        .values()
        .iter()
        .enumerate()
        .find(|(_, v)| !(v.is_finite() && **v > 0.0))
    {
        return Err(LithoError::invalid_height_field(format!(
            "thickness {} at column {}, row {} is not a positive finite number",
            v,
            k % field.width(),
            k / field.width()
        )));
    }
    Ok(())
}

fn back_ramp(field: &HeightField, build_angle_deg: f32) -> Result<BackRamp> {
    if !(0.0..90.0).contains(&build_angle_deg) {
        return Err(LithoError::invalid_parameter(format!(
            "build_angle_deg must be in [0, 90), got {build_angle_deg}"
        )));
    }
    if build_angle_deg == 0.0 {
        return Ok(BackRamp { slope: 0.0 });
    }

    let slope = build_angle_deg.to_radians().tan();
    let (_, span_y) = field.span_mm();
    let rise = slope * span_y;
    let thinnest = field
        .values()
        .iter()
        .copied()
        .fold(field.min_thickness_mm(), f32::min);
    if rise >= thinnest {
        return Err(LithoError::geometry(format!(
            "build angle {build_angle_deg} deg raises the back {rise:.3} mm over {span_y:.3} mm, \
             reaching the {thinnest:.3} mm minimum thickness"
        )));
    }
    Ok(BackRamp { slope })
}
