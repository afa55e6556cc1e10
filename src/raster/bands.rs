//! Row-band scheduling shared by the raster passes and triangulation.

use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{LithoError, Result};

/// Rows processed between two abort checks
pub const BAND_ROWS: usize = 64;

/// Cancellation flag shared between the caller and a running build
///
/// Cloning yields another handle to the same flag.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the running build to stop at the next band boundary
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Fail with `Aborted` if the signal is raised
pub fn check(abort: Option<&AbortSignal>) -> Result<()> {
    match abort {
        Some(signal) if signal.is_aborted() => Err(LithoError::Aborted),
        _ => Ok(()),
    }
}

/// Fill `dst` row by row, `row_len` samples per row
///
/// Rows inside a band run in parallel; the abort signal is checked before
/// each band. `fill` receives the absolute row index and that row's slice and
/// must only read from buffers other than `dst`.
pub fn fill_rows<F>(dst: &mut [f32], row_len: usize, abort: Option<&AbortSignal>, fill: F) -> Result<()>
where
    F: Fn(usize, &mut [f32]) + Sync,
{
    if row_len == 0 {
        return Ok(());
    }
    for (band, rows) in dst.chunks_mut(row_len * BAND_ROWS).enumerate() {
        check(abort)?;
        let first = band * BAND_ROWS;
        rows.par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(i, row)| fill(first + i, row));
    }
    Ok(())
}

/// Map `0..rows` to items in parallel, band by band, preserving row order
pub fn collect_rows<T, F>(rows: usize, abort: Option<&AbortSignal>, produce: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Vec<T> + Sync,
{
    let mut out = Vec::new();
    let mut start = 0;
    while start < rows {
        check(abort)?;
        let end = (start + BAND_ROWS).min(rows);
        let band: Vec<Vec<T>> = (start..end).into_par_iter().map(&produce).collect();
        out.extend(band.into_iter().flatten());
        start = end;
    }
    Ok(out)
}
