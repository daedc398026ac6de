//! Aggregation cells and their combination rules
//!
//! # Organization
//!
//! - [`accumulator`]: NaN-skipping weighted accumulators
//! - [`spatial`]: cells accumulating source pixels ([`SpatialCell`])
//! - [`cell_of_cells`]: coarse cells accumulating finer cells ([`CellOfCells`])
//! - [`aggregation`]: region-wide and multi-period aggregates
//!
//! Every aggregate reports the same eight [`ResultField`]s through
//! [`CellResults`]; undefined results are `NaN`.

pub mod accumulator;
pub mod aggregation;
pub mod cell_of_cells;
pub mod spatial;

pub use accumulator::{ArithmeticMean, NumberAccumulator, WeightedUncertainty};
pub use aggregation::{MultiPeriodAggregation, SamePeriodAggregation};
pub use cell_of_cells::CellOfCells;
pub use spatial::{AggregationContext, SampleCoverage, SpatialCell, SpatialCellConfig};

/// One of the eight aggregated quantities, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResultField {
    Sst,
    SstAnomaly,
    RandomUncertainty,
    LargeScaleUncertainty,
    CoverageUncertainty,
    AdjustmentUncertainty,
    SynopticUncertainty,
    SeaIceFraction,
}

impl ResultField {
    pub const ALL: [ResultField; 8] = [
        Self::Sst,
        Self::SstAnomaly,
        Self::RandomUncertainty,
        Self::LargeScaleUncertainty,
        Self::CoverageUncertainty,
        Self::AdjustmentUncertainty,
        Self::SynopticUncertainty,
        Self::SeaIceFraction,
    ];

    /// Output variable name
    #[must_use]
    pub const fn netcdf_name(self) -> &'static str {
        match self {
            Self::Sst => "sst",
            Self::SstAnomaly => "sst_anomaly",
            Self::RandomUncertainty => "uncorrelated_uncertainty",
            Self::LargeScaleUncertainty => "large_scale_correlated_uncertainty",
            Self::CoverageUncertainty => "coverage_uncertainty",
            Self::AdjustmentUncertainty => "adjustment_uncertainty",
            Self::SynopticUncertainty => "synoptically_correlated_uncertainty",
            Self::SeaIceFraction => "sea_ice_fraction",
        }
    }

    #[must_use]
    pub const fn long_name(self) -> &'static str {
        match self {
            Self::Sst => "mean of sea surface temperature",
            Self::SstAnomaly => "mean of sea surface temperature anomaly",
            Self::RandomUncertainty => "uncorrelated uncertainty",
            Self::LargeScaleUncertainty => "large scale correlated uncertainty",
            Self::CoverageUncertainty => "coverage uncertainty",
            Self::AdjustmentUncertainty => "adjustment uncertainty",
            Self::SynopticUncertainty => "synoptically correlated uncertainty",
            Self::SeaIceFraction => "mean of sea ice fraction",
        }
    }

    #[must_use]
    pub const fn units(self) -> &'static str {
        match self {
            Self::SeaIceFraction => "1",
            _ => "kelvin",
        }
    }
}

/// Results of one aggregate, `NaN` where undefined
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellResults {
    pub sst: f64,
    pub sst_anomaly: f64,
    pub random_uncertainty: f64,
    pub large_scale_uncertainty: f64,
    pub coverage_uncertainty: f64,
    pub adjustment_uncertainty: f64,
    pub synoptic_uncertainty: f64,
    pub sea_ice_fraction: f64,
}

impl CellResults {
    /// All results undefined
    #[must_use]
    pub const fn missing() -> Self {
        Self {
            sst: f64::NAN,
            sst_anomaly: f64::NAN,
            random_uncertainty: f64::NAN,
            large_scale_uncertainty: f64::NAN,
            coverage_uncertainty: f64::NAN,
            adjustment_uncertainty: f64::NAN,
            synoptic_uncertainty: f64::NAN,
            sea_ice_fraction: f64::NAN,
        }
    }

    #[must_use]
    pub const fn get(&self, field: ResultField) -> f64 {
        match field {
            ResultField::Sst => self.sst,
            ResultField::SstAnomaly => self.sst_anomaly,
            ResultField::RandomUncertainty => self.random_uncertainty,
            ResultField::LargeScaleUncertainty => self.large_scale_uncertainty,
            ResultField::CoverageUncertainty => self.coverage_uncertainty,
            ResultField::AdjustmentUncertainty => self.adjustment_uncertainty,
            ResultField::SynopticUncertainty => self.synoptic_uncertainty,
            ResultField::SeaIceFraction => self.sea_ice_fraction,
        }
    }

    /// Results in [`ResultField::ALL`] order
    #[must_use]
    pub const fn to_array(&self) -> [f64; 8] {
        [
            self.sst,
            self.sst_anomaly,
            self.random_uncertainty,
            self.large_scale_uncertainty,
            self.coverage_uncertainty,
            self.adjustment_uncertainty,
            self.synoptic_uncertainty,
            self.sea_ice_fraction,
        ]
    }
}

impl Default for CellResults {
    fn default() -> Self {
        Self::missing()
    }
}

/// Anything that accumulates samples into [`CellResults`]
pub trait Aggregate: Send + Sync {
    fn sample_count(&self) -> usize;

    /// Current results, derived from the accumulated state on every call
    fn results(&self) -> CellResults;

    fn is_empty(&self) -> bool {
        self.sample_count() == 0
    }
}

/// An aggregate located at cell `(x, y)` of its grid
pub trait Cell: Aggregate {
    fn x(&self) -> usize;

    fn y(&self) -> usize;
}
