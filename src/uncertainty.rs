//! Resolution-dependent uncertainty models
//!
//! - [`CoverageUncertainty`]: sampling uncertainty of a cell that is only
//!   partially observed, with the scalar model [`ScalarCoverageUncertaintyProvider`]
//!   and the variance-driven [`RegriddingCoverageUncertaintyProvider`]
//! - [`SynopticUncertaintyProvider`]: reduction of correlated uncertainty by the
//!   effective number of independent samples in a cell

use crate::errors::{Result, SstAggError};
use crate::grid::{Grid, GridDef};
use crate::resolution::TemporalResolution;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Nominal pixel count of a fully sea-covered 5° cell at native sensor resolution
pub const FULL_CELL5_SAMPLE_COUNT: f64 = 77500.0;

/// Model of the coverage uncertainty of a cell
pub trait CoverageUncertainty: Send + Sync {
    /// Coverage uncertainty of cell `(cell_x, cell_y)` at `resolution` degrees
    ///
    /// `variance` is the mean pixel variance accumulated for the cell; models
    /// that do not depend on it may ignore it.
    fn calculate(
        &self,
        cell_x: usize,
        cell_y: usize,
        sample_count: usize,
        variance: f64,
        resolution: f64,
    ) -> f64;
}

/// Coverage uncertainty depending only on the sample count
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalarCoverageUncertaintyProvider {
    pub magnitude90: f64,
    pub magnitude5: f64,
    pub exponent5: f64,
}

impl ScalarCoverageUncertaintyProvider {
    #[must_use]
    pub const fn new(magnitude90: f64, magnitude5: f64, exponent5: f64) -> Self {
        Self {
            magnitude90,
            magnitude5,
            exponent5,
        }
    }
}

impl Default for ScalarCoverageUncertaintyProvider {
    fn default() -> Self {
        Self::new(1.1, 1.2, 0.5)
    }
}

impl CoverageUncertainty for ScalarCoverageUncertaintyProvider {
    fn calculate(
        &self,
        _cell_x: usize,
        _cell_y: usize,
        sample_count: usize,
        _variance: f64,
        resolution: f64,
    ) -> f64 {
        if resolution == 5.0 {
            if sample_count == 0 {
                return f64::NAN;
            }
            let fraction = sample_count as f64 / FULL_CELL5_SAMPLE_COUNT;
            self.magnitude5 * (1.0 - fraction.powf(self.exponent5))
        } else if resolution == 90.0 {
            if sample_count == 0 {
                return f64::NAN;
            }
            self.magnitude90 / (sample_count as f64).sqrt()
        } else {
            0.0
        }
    }
}

/// Correlation length, either global or looked up per target cell
#[derive(Clone)]
pub enum CorrelationLength {
    Constant(f64),
    /// Lengths on the target cell geometry; fill values yield `NaN`
    PerCell(Arc<dyn Grid>),
}

impl CorrelationLength {
    #[must_use]
    pub fn at(&self, x: usize, y: usize) -> f64 {
        match self {
            Self::Constant(length) => *length,
            Self::PerCell(grid) => grid.sample_double(x, y).unwrap_or(f64::NAN),
        }
    }
}

/// Spatial (km) and temporal (days) correlation lengths of the SST field
#[derive(Clone)]
pub struct CorrelationLengths {
    pub space_km: CorrelationLength,
    pub time_days: CorrelationLength,
}

/// Coverage uncertainty of regridded cells from the pixel variance
///
/// With the mean correlation `r̄ = r̄_space · r̄_time` between the samples of a
/// cell, where `r̄_space = (x0/d)(1 − e^(−d/x0))` for the cell diagonal `d`
/// and `r̄_time` likewise for the step length (1 for daily steps), the
/// coverage uncertainty of `n` samples with variance `σ²` is
/// `sqrt(σ² · r̄(1 − r̄) / (1 + (n − 1) r̄))`.
#[derive(Clone)]
pub struct RegriddingCoverageUncertaintyProvider {
    grid_def: GridDef,
    lengths: CorrelationLengths,
    step_days: f64,
}

impl RegriddingCoverageUncertaintyProvider {
    /// Model for cells of `grid_def` over steps of `step_days` days, 0 for daily steps
    #[must_use]
    pub fn new(grid_def: GridDef, lengths: CorrelationLengths, step_days: f64) -> Self {
        Self {
            grid_def,
            lengths,
            step_days,
        }
    }

    /// Model for the step `[start, end)` of `temporal` resolution
    ///
    /// # Errors
    ///
    /// Returns [`SstAggError::UnsupportedOperation`] for seasonal and annual
    /// steps, which are combined from monthly cells instead.
    pub fn for_period(
        grid_def: GridDef,
        lengths: CorrelationLengths,
        start: NaiveDate,
        end: NaiveDate,
        temporal: TemporalResolution,
    ) -> Result<Self> {
        let step_days = match temporal {
            TemporalResolution::Daily => 0.0,
            TemporalResolution::Seasonal | TemporalResolution::Annual => {
                return Err(SstAggError::UnsupportedOperation(format!(
                    "regridding coverage uncertainty for {} periods",
                    temporal
                )));
            }
            _ => (end - start).num_days() as f64,
        };
        Ok(Self::new(grid_def, lengths, step_days))
    }

    #[must_use]
    pub const fn step_days(&self) -> f64 {
        self.step_days
    }

    /// Mean spatial correlation of the samples of cell `(x, y)`
    #[must_use]
    pub fn r_bar_space(&self, x: usize, y: usize) -> f64 {
        let x0 = self.lengths.space_km.at(x, y);
        match self.grid_def.diagonal(x as i64, y as i64) {
            Ok(d) => mean_correlation(x0, d),
            Err(_) => f64::NAN,
        }
    }

    /// Mean temporal correlation of the samples of cell `(x, y)`
    #[must_use]
    pub fn r_bar_time(&self, x: usize, y: usize) -> f64 {
        if self.step_days == 0.0 {
            return 1.0;
        }
        mean_correlation(self.lengths.time_days.at(x, y), self.step_days)
    }
}

/// Mean of `e^(−s/x0)` over `s` in `[0, extent]`
fn mean_correlation(x0: f64, extent: f64) -> f64 {
    (x0 / extent) * (1.0 - (-extent / x0).exp())
}

impl CoverageUncertainty for RegriddingCoverageUncertaintyProvider {
    fn calculate(
        &self,
        cell_x: usize,
        cell_y: usize,
        sample_count: usize,
        variance: f64,
        _resolution: f64,
    ) -> f64 {
        if sample_count == 0 {
            return f64::NAN;
        }
        let r = self.r_bar_space(cell_x, cell_y) * self.r_bar_time(cell_x, cell_y);
        let n = sample_count as f64;
        (variance * r * (1.0 - r) / (1.0 + (n - 1.0) * r)).sqrt()
    }
}

/// Effective sample count model for synoptically correlated uncertainty
///
/// Samples of a cell are correlated with `r = exp(-0.5 * (dxy/100 + dt))`,
/// where `dxy` is a latitude-dependent spatial scale in km and `dt` a
/// temporal scale looked up for the spatial and temporal resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynopticUncertaintyProvider {
    spatial_resolution: f64,
    temporal_resolution: TemporalResolution,
}

impl SynopticUncertaintyProvider {
    #[must_use]
    pub const fn new(spatial_resolution: f64, temporal_resolution: TemporalResolution) -> Self {
        Self {
            spatial_resolution,
            temporal_resolution,
        }
    }

    /// Correlated uncertainty `a` of row `y` reduced for `n` samples
    #[must_use]
    pub fn calculate(&self, y: usize, n: usize, a: f64) -> f64 {
        a / self.eta(y, n)
    }

    /// Spatial correlation scale of row `y` in km
    #[must_use]
    pub fn dxy(&self, y: usize) -> f64 {
        let res = self.spatial_resolution;
        let d_pole = 37.2069 * res - 0.101691;
        let d_equator = 57.8881 * res + 0.272744;
        let lat = 90.0 - res * (y as f64 + 0.5);
        let f = lat.abs() / 90.0;
        d_pole * f + d_equator * (1.0 - f)
    }

    /// Temporal correlation scale in days
    #[must_use]
    pub fn dt(&self) -> f64 {
        let res = self.spatial_resolution;
        match self.temporal_resolution {
            TemporalResolution::Daily
            | TemporalResolution::Seasonal
            | TemporalResolution::Annual => 0.0,
            TemporalResolution::Weekly5d => step(res, &[(1.5, 2.0), (2.5, 1.0)]),
            TemporalResolution::Weekly7d => step(res, &[(1.75, 2.0), (2.5, 1.0)]),
            TemporalResolution::Monthly => step(
                res,
                &[
                    (0.5, 10.0),
                    (0.75, 9.0),
                    (0.8, 8.5),
                    (1.0, 6.0),
                    (1.2, 3.5),
                    (1.25, 3.0),
                    (2.0, 0.5),
                    (2.25, 0.25),
                    (2.5, 0.2),
                    (3.0, 0.1),
                ],
            ),
        }
    }

    #[must_use]
    pub fn r(&self, y: usize) -> f64 {
        (-0.5 * (self.dxy(y) / 100.0 + self.dt())).exp()
    }

    /// Effective number of independent samples among `n`
    #[must_use]
    pub fn eta(&self, y: usize, n: usize) -> f64 {
        let n = n as f64;
        n / (1.0 + self.r(y) * (n - 1.0))
    }
}

fn step(res: f64, table: &[(f64, f64)]) -> f64 {
    table
        .iter()
        .find(|(limit, _)| res <= *limit)
        .map_or(0.0, |&(_, value)| value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monthly_dt_steps_down_with_resolution() {
        let dt = |res| SynopticUncertaintyProvider::new(res, TemporalResolution::Monthly).dt();
        assert_eq!(dt(0.05), 10.0);
        assert_eq!(dt(0.75), 9.0);
        assert_eq!(dt(1.0), 6.0);
        assert_eq!(dt(2.4), 0.2);
        assert_eq!(dt(5.0), 0.0);
    }

    #[test]
    fn daily_steps_are_fully_correlated_in_time() {
        let lengths = CorrelationLengths {
            space_km: CorrelationLength::Constant(500.0),
            time_days: CorrelationLength::Constant(3.0),
        };
        let grid_def = GridDef::create_global(10.0).unwrap();
        let provider = RegriddingCoverageUncertaintyProvider::new(grid_def, lengths, 0.0);
        assert_eq!(provider.r_bar_time(3, 4), 1.0);
    }

    #[test]
    fn single_sample_is_not_reduced() {
        let provider = SynopticUncertaintyProvider::new(5.0, TemporalResolution::Monthly);
        assert!((provider.calculate(10, 1, 0.7) - 0.7).abs() < 1e-12);
    }
}
