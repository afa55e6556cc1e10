//! Build and export entry points.
//!
//! A build takes an image, an optional crop rectangle and an operation
//! sequence. The sequence is resolved into settings up front so unsupported
//! or malformed steps fail before any pixel is touched.

use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::domain::operation::SET_LITHOPHANE_PARAMETERS;
use crate::domain::{CropRegion, HeightField, Image, LithophaneParameters, Operation};
use crate::error::{LithoError, OperationRef, Result};
use crate::lithophane::{HeightFieldBuilder, build_solid};
use crate::mesh::{Mesh, MeshStats, StlFormat, estimate_stl_size, write_stl};
use crate::raster::AbortSignal;

/// Parameters a build runs with, gathered from an operation sequence
#[derive(Debug, Clone, PartialEq)]
pub struct LithophaneSettings {
    pub params: LithophaneParameters,
    pub invert: bool,
    /// The step the parameters came from, named in geometry errors
    source: OperationRef,
}

impl LithophaneSettings {
    /// Resolve `operations` in order; later steps of a kind replace earlier ones
    ///
    /// Every step is checked where it stands, so the first bad step is the
    /// one reported even when a later step would have replaced it.
    pub fn resolve(operations: &[Operation]) -> Result<Self> {
        let mut params: Option<(usize, LithophaneParameters)> = None;
        let mut invert: Option<bool> = None;

        for (index, op) in operations.iter().enumerate() {
            match op {
                Operation::Grayscale(p) => invert = Some(p.invert),
                Operation::SetLithophaneParameters(p) => {
                    p.validate().map_err(|e| {
                        e.in_operation(&OperationRef::new(index, SET_LITHOPHANE_PARAMETERS))
                    })?;
                    if p.invert.is_some() {
                        invert = p.invert;
                    }
                    params = Some((index, *p));
                }
                Operation::Unsupported { kind, .. } => {
                    return Err(LithoError::UnsupportedOperation {
                        operation: OperationRef::new(index, kind.clone()),
                    });
                }
            }
        }

        let (index, params) = params.ok_or_else(|| {
            LithoError::invalid_parameter(format!(
                "operation sequence has no {SET_LITHOPHANE_PARAMETERS} step"
            ))
        })?;
        Ok(Self {
            params,
            invert: invert.unwrap_or(false),
            source: OperationRef::new(index, SET_LITHOPHANE_PARAMETERS),
        })
    }
}

/// Everything a build produces
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub height_field: HeightField,
    pub mesh: Mesh,
    pub stats: MeshStats,
}

/// Build a lithophane from `image`
///
/// `crop` defaults to the whole image.
pub fn build(image: &Image, crop: Option<CropRegion>, operations: &[Operation]) -> Result<BuildOutput> {
    run(image, crop, operations, None)
}

/// Like [`build`], stopping with [`LithoError::Aborted`] once `abort` is raised
pub fn build_with_abort(
    image: &Image,
    crop: Option<CropRegion>,
    operations: &[Operation],
    abort: &AbortSignal,
) -> Result<BuildOutput> {
    run(image, crop, operations, Some(abort))
}

fn run(
    image: &Image,
    crop: Option<CropRegion>,
    operations: &[Operation],
    abort: Option<&AbortSignal>,
) -> Result<BuildOutput> {
    let start = Instant::now();
    let settings = LithophaneSettings::resolve(operations)?;
    if let Some(crop) = &crop {
        crop.validate(image)?;
    }

    let height_field = HeightFieldBuilder::new(image, settings.params)
        .with_crop(crop)
        .with_invert(settings.invert)
        .with_abort(abort)
        .build()
        .map_err(|e| e.in_operation(&settings.source))?;

    let mesh = build_solid(&height_field, settings.params.build_angle_deg, abort)
        .map_err(|e| e.in_operation(&settings.source))?;
    let stats = mesh.stats();

    debug!(
        triangles = stats.triangle_count,
        vertices = stats.vertex_count,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "build finished"
    );
    Ok(BuildOutput {
        height_field,
        mesh,
        stats,
    })
}

/// Write `mesh` to `path` in `format`, atomically
pub fn export(mesh: &Mesh, path: &Path, format: StlFormat) -> Result<()> {
    let start = Instant::now();
    write_stl(path, mesh, format)?;
    info!(
        path = %path.display(),
        ?format,
        triangles = mesh.triangle_count(),
        binary_size = estimate_stl_size(mesh.triangle_count()),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "exported mesh"
    );
    Ok(())
}
