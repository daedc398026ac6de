//! Block-mean reduction of a grid to a coarser geometry
//!
//! Each target cell is the mean of the non-`NaN` source samples of its
//! `scale_x x scale_y` block, and `NaN` only when the whole block is missing.

use super::{ArrayGrid, Grid, GridDef, SampleKind};
use crate::errors::{Result, SstAggError};
use rayon::prelude::*;

/// Downscale `source` by independent factors along x and y
///
/// The result is a continuous grid: boolean access on it fails.
///
/// # Errors
///
/// Returns an error if a factor is zero or does not divide the matching
/// source dimension, or if a source sample cannot be read.
pub fn downscale(source: &dyn Grid, scale_x: usize, scale_y: usize) -> Result<ArrayGrid> {
    let src_def = source.grid_def();
    let (src_w, src_h) = (src_def.width(), src_def.height());
    if scale_x == 0 || scale_y == 0 {
        return Err(SstAggError::InvalidArgument(format!(
            "scale factors must be positive, got {} x {}",
            scale_x, scale_y
        )));
    }
    if src_w % scale_x != 0 {
        return Err(SstAggError::InvalidArgument(format!(
            "source width {} is not a multiple of scale {}",
            src_w, scale_x
        )));
    }
    if src_h % scale_y != 0 {
        return Err(SstAggError::InvalidArgument(format!(
            "source height {} is not a multiple of scale {}",
            src_h, scale_y
        )));
    }

    let target_def = coarser_def(src_def, scale_x, scale_y)?;
    let (w, h) = (target_def.width(), target_def.height());

    let rows: Vec<Vec<f64>> = (0..h)
        .into_par_iter()
        .map(|ty| {
            (0..w)
                .map(|tx| block_mean(source, tx * scale_x, ty * scale_y, scale_x, scale_y))
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<_>>()?;

    let data: Vec<f64> = rows.into_iter().flatten().collect();
    Ok(ArrayGrid::from_vec(target_def, data, None, 1.0, 0.0)?.with_kind(SampleKind::Continuous))
}

/// Downscale `source` by the same factor along both axes
///
/// # Errors
///
/// See [`downscale`].
pub fn downscale_uniform(source: &dyn Grid, scale: usize) -> Result<ArrayGrid> {
    downscale(source, scale, scale)
}

/// Downscale `source` onto `target`, inferring the factors from the widths and heights
///
/// # Errors
///
/// Returns an error if the target is not an integer reduction of the source.
pub fn downscale_to(source: &dyn Grid, target: &GridDef) -> Result<ArrayGrid> {
    let src_def = source.grid_def();
    if target.width() > src_def.width() || target.height() > src_def.height() {
        return Err(SstAggError::InvalidArgument(format!(
            "target {} x {} is larger than source {} x {}",
            target.width(),
            target.height(),
            src_def.width(),
            src_def.height()
        )));
    }
    downscale(
        source,
        src_def.width() / target.width(),
        src_def.height() / target.height(),
    )
}

fn coarser_def(src: &GridDef, scale_x: usize, scale_y: usize) -> Result<GridDef> {
    let (w, h) = (src.width() / scale_x, src.height() / scale_y);
    let is_global = src.easting() == -180.0
        && src.northing() == 90.0
        && (src.resolution_x() * src.width() as f64 - 360.0).abs() < 1e-9
        && (src.resolution_y() * src.height() as f64 - 180.0).abs() < 1e-9;
    if is_global {
        return GridDef::create_global_with_size(w, h);
    }
    GridDef::new(
        w,
        h,
        src.easting(),
        src.northing(),
        src.resolution_x() * scale_x as f64,
        src.resolution_y() * scale_y as f64,
    )
}

fn block_mean(source: &dyn Grid, x0: usize, y0: usize, sx: usize, sy: usize) -> Result<f64> {
    let mut sum = 0.0;
    let mut count = 0_usize;
    for y in y0..y0 + sy {
        for x in x0..x0 + sx {
            let value = source.sample_double(x, y)?;
            if !value.is_nan() {
                sum += value;
                count += 1;
            }
        }
    }
    if count == 0 {
        return Ok(f64::NAN);
    }
    Ok(sum / count as f64)
}
