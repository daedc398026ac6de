//! Cells accumulating rectangles of source pixels

use super::accumulator::{ArithmeticMean, NumberAccumulator, WeightedUncertainty};
use super::{Aggregate, Cell, CellResults};
use crate::errors::{Result, SstAggError};
use crate::grid::{Grid, GridDef, GridRect};
use crate::uncertainty::{CoverageUncertainty, SynopticUncertaintyProvider};
use std::fmt;
use std::sync::Arc;

/// Quality level a pixel must carry to be used
pub const BEST_QUALITY_LEVEL: i32 = 5;

/// Source grids and models shared by all cells of one spatial pass
///
/// All grids are expected on the geometry of `sst`; see [`AggregationContext::validate`].
#[derive(Clone)]
pub struct AggregationContext {
    pub sst: Arc<dyn Grid>,
    pub climatology_sst: Arc<dyn Grid>,
    pub sea_coverage: Arc<dyn Grid>,
    pub quality: Option<Arc<dyn Grid>>,
    pub random_uncertainty: Option<Arc<dyn Grid>>,
    pub large_scale_uncertainty: Option<Arc<dyn Grid>>,
    pub adjustment_uncertainty: Option<Arc<dyn Grid>>,
    pub synoptic_uncertainty: Option<Arc<dyn Grid>>,
    pub standard_deviation: Option<Arc<dyn Grid>>,
    pub sea_ice_fraction: Option<Arc<dyn Grid>>,
    pub coverage_uncertainty_provider: Arc<dyn CoverageUncertainty>,
    pub synoptic_uncertainty_provider: Option<SynopticUncertaintyProvider>,
    pub min_coverage: f64,
}

impl AggregationContext {
    #[must_use]
    pub fn new(
        sst: Arc<dyn Grid>,
        climatology_sst: Arc<dyn Grid>,
        sea_coverage: Arc<dyn Grid>,
        coverage_uncertainty_provider: Arc<dyn CoverageUncertainty>,
    ) -> Self {
        Self {
            sst,
            climatology_sst,
            sea_coverage,
            quality: None,
            random_uncertainty: None,
            large_scale_uncertainty: None,
            adjustment_uncertainty: None,
            synoptic_uncertainty: None,
            standard_deviation: None,
            sea_ice_fraction: None,
            coverage_uncertainty_provider,
            synoptic_uncertainty_provider: None,
            min_coverage: 0.0,
        }
    }

    /// Geometry of the source pixels
    #[must_use]
    pub fn source_grid_def(&self) -> &GridDef {
        self.sst.grid_def()
    }

    /// Fail unless every grid shares the geometry of the SST grid
    ///
    /// # Errors
    ///
    /// Returns [`SstAggError::InvalidArgument`] naming the first mismatching grid.
    pub fn validate(&self) -> Result<()> {
        let expected = self.source_grid_def();
        let optional = [
            ("quality", &self.quality),
            ("random uncertainty", &self.random_uncertainty),
            ("large scale uncertainty", &self.large_scale_uncertainty),
            ("adjustment uncertainty", &self.adjustment_uncertainty),
            ("synoptic uncertainty", &self.synoptic_uncertainty),
            ("standard deviation", &self.standard_deviation),
            ("sea ice fraction", &self.sea_ice_fraction),
        ];
        let required = [
            ("climatology SST", Some(&self.climatology_sst)),
            ("sea coverage", Some(&self.sea_coverage)),
        ];
        let all = required
            .into_iter()
            .chain(optional.into_iter().map(|(name, grid)| (name, grid.as_ref())));
        for (name, grid) in all {
            if let Some(grid) = grid {
                if grid.grid_def() != expected {
                    return Err(SstAggError::InvalidArgument(format!(
                        "{} grid is {} x {}, SST grid is {} x {}",
                        name,
                        grid.width(),
                        grid.height(),
                        expected.width(),
                        expected.height()
                    )));
                }
            }
        }
        if !(0.0..=1.0).contains(&self.min_coverage) {
            return Err(SstAggError::InvalidArgument(format!(
                "minimum coverage {} outside [0, 1]",
                self.min_coverage
            )));
        }
        Ok(())
    }

    /// Per-cell settings for cells of `resolution` degrees
    #[must_use]
    pub fn cell_config(&self, resolution: f64) -> SpatialCellConfig {
        SpatialCellConfig {
            resolution,
            coverage_uncertainty_provider: Arc::clone(&self.coverage_uncertainty_provider),
            synoptic_uncertainty_provider: self.synoptic_uncertainty_provider,
        }
    }
}

impl fmt::Debug for AggregationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let grid_def = self.source_grid_def();
        f.debug_struct("AggregationContext")
            .field("source", &format_args!("{} x {}", grid_def.width(), grid_def.height()))
            .field("quality", &self.quality.is_some())
            .field("standard_deviation", &self.standard_deviation.is_some())
            .field("sea_ice_fraction", &self.sea_ice_fraction.is_some())
            .field("min_coverage", &self.min_coverage)
            .finish()
    }
}

/// Models a spatial cell consults when deriving its results
#[derive(Clone)]
pub struct SpatialCellConfig {
    /// Cell size in degrees
    pub resolution: f64,
    pub coverage_uncertainty_provider: Arc<dyn CoverageUncertainty>,
    pub synoptic_uncertainty_provider: Option<SynopticUncertaintyProvider>,
}

/// Whether a spatial cell saw enough valid pixels for its results to be defined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleCoverage {
    /// Nothing accumulated yet
    Unaccumulated,
    /// More valid pixels than the minimum coverage fraction of the last rectangle
    Sufficient,
    Insufficient,
}

/// Cell accumulating the valid pixels of source rectangles
///
/// A pixel is valid when its sea coverage and SST are positive, its
/// climatology SST is defined and, if a quality grid is present, its quality
/// level is [`BEST_QUALITY_LEVEL`]. SST and anomaly thus share one pixel set.
/// Valid pixels are weighted by sea coverage. Sea-ice fraction is averaged
/// over all pixels regardless of validity.
#[derive(Clone)]
pub struct SpatialCell {
    x: usize,
    y: usize,
    config: SpatialCellConfig,
    coverage: SampleCoverage,
    sst: ArithmeticMean,
    sst_anomaly: ArithmeticMean,
    random_uncertainty: WeightedUncertainty,
    variance: ArithmeticMean,
    large_scale_uncertainty: ArithmeticMean,
    adjustment_uncertainty: ArithmeticMean,
    synoptic_uncertainty: ArithmeticMean,
    sea_ice_fraction: ArithmeticMean,
}

impl SpatialCell {
    #[must_use]
    pub fn new(x: usize, y: usize, config: SpatialCellConfig) -> Self {
        Self {
            x,
            y,
            config,
            coverage: SampleCoverage::Unaccumulated,
            sst: ArithmeticMean::default(),
            sst_anomaly: ArithmeticMean::default(),
            random_uncertainty: WeightedUncertainty::default(),
            variance: ArithmeticMean::default(),
            large_scale_uncertainty: ArithmeticMean::default(),
            adjustment_uncertainty: ArithmeticMean::default(),
            synoptic_uncertainty: ArithmeticMean::default(),
            sea_ice_fraction: ArithmeticMean::default(),
        }
    }

    /// Accumulate every pixel of `rect`, given in source grid coordinates
    ///
    /// Afterwards the cell's [`SampleCoverage`] compares the total valid pixel
    /// count with `min_coverage` times the area of `rect`.
    ///
    /// # Errors
    ///
    /// Returns an error if `rect` reaches outside the source grids.
    pub fn accumulate(&mut self, context: &AggregationContext, rect: &GridRect) -> Result<()> {
        if rect.x < 0 || rect.y < 0 {
            return Err(SstAggError::IndexOutOfRange {
                x: rect.x,
                y: rect.y,
                width: context.sst.width(),
                height: context.sst.height(),
            });
        }
        if rect.area() > 0 {
            let (min_x, min_y) = (rect.x as usize, rect.y as usize);
            let (max_x, max_y) = (rect.max_x() as usize, rect.max_y() as usize);
            for y in min_y..=max_y {
                for x in min_x..=max_x {
                    self.accumulate_pixel(context, x, y)?;
                }
            }
        }

        let max_sample_count = rect.area() as f64;
        self.coverage = if self.sample_count() as f64 > context.min_coverage * max_sample_count {
            SampleCoverage::Sufficient
        } else {
            SampleCoverage::Insufficient
        };
        Ok(())
    }

    fn accumulate_pixel(&mut self, context: &AggregationContext, x: usize, y: usize) -> Result<()> {
        let sea_coverage = context.sea_coverage.sample_double(x, y)?;
        let sst = context.sst.sample_double(x, y)?;
        let climatology_sst = context.climatology_sst.sample_double(x, y)?;
        if is_valid(context, x, y, sea_coverage, sst, climatology_sst)? {
            self.sst.accumulate(sst, sea_coverage);
            self.sst_anomaly.accumulate(sst - climatology_sst, sea_coverage);
            if let Some(grid) = &context.random_uncertainty {
                self.random_uncertainty
                    .accumulate(grid.sample_double(x, y)?, sea_coverage);
            }
            if let Some(grid) = &context.standard_deviation {
                let sd = grid.sample_double(x, y)?;
                self.variance.accumulate(sd * sd, sea_coverage);
            }
            if let Some(grid) = &context.large_scale_uncertainty {
                self.large_scale_uncertainty
                    .accumulate(grid.sample_double(x, y)?, sea_coverage);
            }
            if let Some(grid) = &context.adjustment_uncertainty {
                self.adjustment_uncertainty
                    .accumulate_unweighted(grid.sample_double(x, y)?);
            }
            if let Some(grid) = &context.synoptic_uncertainty {
                self.synoptic_uncertainty
                    .accumulate_unweighted(grid.sample_double(x, y)?);
            }
        }
        if let Some(grid) = &context.sea_ice_fraction {
            self.sea_ice_fraction
                .accumulate_unweighted(grid.sample_double(x, y)?);
        }
        Ok(())
    }

    #[must_use]
    pub const fn sample_coverage(&self) -> SampleCoverage {
        self.coverage
    }

    fn has_enough_samples(&self) -> bool {
        self.coverage == SampleCoverage::Sufficient
    }

    fn if_enough(&self, value: f64) -> f64 {
        if self.has_enough_samples() {
            value
        } else {
            f64::NAN
        }
    }

    #[must_use]
    pub fn sea_surface_temperature(&self) -> f64 {
        self.if_enough(self.sst.combine())
    }

    #[must_use]
    pub fn sea_surface_temperature_anomaly(&self) -> f64 {
        self.if_enough(self.sst_anomaly.combine())
    }

    #[must_use]
    pub fn random_uncertainty(&self) -> f64 {
        self.if_enough(self.random_uncertainty.combine())
    }

    #[must_use]
    pub fn large_scale_uncertainty(&self) -> f64 {
        self.if_enough(self.large_scale_uncertainty.combine())
    }

    /// Coverage uncertainty, defined as soon as any valid pixel was seen
    #[must_use]
    pub fn coverage_uncertainty(&self) -> f64 {
        let n = self.sample_count();
        if n == 0 {
            return f64::NAN;
        }
        self.config.coverage_uncertainty_provider.calculate(
            self.x,
            self.y,
            n,
            self.variance.combine(),
            self.config.resolution,
        )
    }

    #[must_use]
    pub fn adjustment_uncertainty(&self) -> f64 {
        self.if_enough(self.correlated(self.adjustment_uncertainty.combine()))
    }

    #[must_use]
    pub fn synoptic_uncertainty(&self) -> f64 {
        self.if_enough(self.correlated(self.synoptic_uncertainty.combine()))
    }

    #[must_use]
    pub fn sea_ice_fraction(&self) -> f64 {
        self.sea_ice_fraction.combine()
    }

    fn correlated(&self, value: f64) -> f64 {
        match &self.config.synoptic_uncertainty_provider {
            Some(provider) => provider.calculate(self.y, self.sample_count(), value),
            None => value,
        }
    }
}

fn is_valid(
    context: &AggregationContext,
    x: usize,
    y: usize,
    sea_coverage: f64,
    sst: f64,
    climatology_sst: f64,
) -> Result<bool> {
    if !(sea_coverage > 0.0 && sst > 0.0) || climatology_sst.is_nan() {
        return Ok(false);
    }
    match &context.quality {
        Some(quality) => Ok(quality.sample_int(x, y)? == BEST_QUALITY_LEVEL),
        None => Ok(true),
    }
}

impl Aggregate for SpatialCell {
    fn sample_count(&self) -> usize {
        self.sst.sample_count()
    }

    fn results(&self) -> CellResults {
        CellResults {
            sst: self.sea_surface_temperature(),
            sst_anomaly: self.sea_surface_temperature_anomaly(),
            random_uncertainty: self.random_uncertainty(),
            large_scale_uncertainty: self.large_scale_uncertainty(),
            coverage_uncertainty: self.coverage_uncertainty(),
            adjustment_uncertainty: self.adjustment_uncertainty(),
            synoptic_uncertainty: self.synoptic_uncertainty(),
            sea_ice_fraction: self.sea_ice_fraction(),
        }
    }
}

impl Cell for SpatialCell {
    fn x(&self) -> usize {
        self.x
    }

    fn y(&self) -> usize {
        self.y
    }
}

impl fmt::Debug for SpatialCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpatialCell")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("sample_count", &self.sample_count())
            .field("coverage", &self.coverage)
            .finish()
    }
}
