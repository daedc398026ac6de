//! Bilinear resampling of a grid onto another geometry

use super::{ArrayGrid, Grid, GridDef, SampleKind};
use crate::errors::Result;
use rayon::prelude::*;

/// Lazy bilinear view of `source` on the geometry `target`
///
/// Every target sample is computed on access from the four source cell
/// centers surrounding the target cell center. Longitudes wrap around the
/// anti-meridian; latitudes are clamped to the outermost source rows.
/// Missing source samples are left out and the remaining weights renormalized.
pub struct Interpolation<'a> {
    source: &'a dyn Grid,
    target: GridDef,
}

impl<'a> Interpolation<'a> {
    #[must_use]
    pub fn new(source: &'a dyn Grid, target: GridDef) -> Self {
        Self { source, target }
    }

    /// Evaluate every target sample into an array grid
    ///
    /// # Errors
    ///
    /// Returns an error if a sample cannot be interpolated.
    pub fn to_array_grid(&self) -> Result<ArrayGrid> {
        let (w, h) = (self.target.width(), self.target.height());
        let rows: Vec<Vec<f64>> = (0..h)
            .into_par_iter()
            .map(|y| (0..w).map(|x| self.interpolate(x, y)).collect::<Result<Vec<f64>>>())
            .collect::<Result<_>>()?;
        let data = rows.into_iter().flatten().collect();
        Ok(ArrayGrid::from_vec(self.target, data, None, 1.0, 0.0)?.with_kind(SampleKind::Continuous))
    }

    fn interpolate(&self, x: usize, y: usize) -> Result<f64> {
        self.target.check_index(x as i64, y as i64)?;
        let src = self.source.grid_def();
        let src_w = src.width() as i64;
        let src_h = src.height() as i64;

        let target_lon = self.target.center_lon(x as i64)?;
        let target_lat = self.target.center_lat(y as i64)?;

        let mut sx = src.grid_x(target_lon, true)?;
        if sx == src_w - 1 {
            sx -= 1;
        }
        let mut sy = src.grid_y(target_lat, true)?;
        if sy == src_h - 1 {
            sy -= 1;
        }

        let source_lon = src.center_lon(sx)?;
        let source_lat = src.center_lat(sy)?;

        let mut wx = (target_lon - source_lon) / src.resolution_x();
        if wx < 0.0 {
            wx += 1.0;
            sx -= 1;
        } else if wx > 1.0 {
            wx -= 1.0;
            sx += 1;
        }
        let wy = ((source_lat - target_lat) / src.resolution_y()).clamp(0.0, 1.0);

        let x0 = src.wrap_x(sx);
        let x1 = src.wrap_x(sx + 1);
        let y0 = sy as usize;
        let y1 = y0 + 1;

        let w11 = wx * wy;
        let w00 = w11 - wx - wy + 1.0;
        let w10 = wx - w11;
        let w01 = wy - w11;

        let corners = [
            (self.source.sample_double(x0, y0)?, w00),
            (self.source.sample_double(x1, y0)?, w10),
            (self.source.sample_double(x0, y1)?, w01),
            (self.source.sample_double(x1, y1)?, w11),
        ];

        let (vs, ws) = corners
            .iter()
            .filter(|(v, _)| !v.is_nan())
            .fold((0.0, 0.0), |(vs, ws), (v, w)| (vs + w * v, ws + w));

        if ws > 0.0 {
            Ok(vs / ws)
        } else {
            Ok(f64::NAN)
        }
    }
}

impl Grid for Interpolation<'_> {
    fn grid_def(&self) -> &GridDef {
        &self.target
    }

    fn kind(&self) -> SampleKind {
        SampleKind::Continuous
    }

    fn sample_double(&self, x: usize, y: usize) -> Result<f64> {
        self.interpolate(x, y)
    }

    fn sample_int(&self, x: usize, y: usize) -> Result<i32> {
        Ok(self.interpolate(x, y)? as i32)
    }
}
