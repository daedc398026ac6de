//! Coarse cells combining finer cells

use super::accumulator::{ArithmeticMean, NumberAccumulator, WeightedUncertainty};
use super::{Aggregate, Cell, CellResults};
use crate::uncertainty::CoverageUncertainty;
use std::fmt;
use std::sync::Arc;

/// Resolution in degrees of the cells built from 5° cells
pub const CELL90_RESOLUTION: f64 = 90.0;

/// Cell of the 90° grid accumulating 5° cells
///
/// SST, anomaly and large-scale uncertainty are weighted means of the child
/// results; random, coverage, adjustment and synoptic uncertainties combine
/// as independent errors, `sqrt(Σ(u·w)²) / Σw`. The sample count is the number of children
/// that contributed an SST value. The reported coverage uncertainty adds the
/// child coverage uncertainty and the 90° sampling uncertainty in quadrature.
#[derive(Clone)]
pub struct CellOfCells {
    x: usize,
    y: usize,
    coverage_uncertainty_provider: Arc<dyn CoverageUncertainty>,
    sst: ArithmeticMean,
    sst_anomaly: ArithmeticMean,
    random_uncertainty: WeightedUncertainty,
    large_scale_uncertainty: ArithmeticMean,
    coverage_uncertainty: WeightedUncertainty,
    adjustment_uncertainty: WeightedUncertainty,
    synoptic_uncertainty: WeightedUncertainty,
    sea_ice_fraction: ArithmeticMean,
}

impl CellOfCells {
    #[must_use]
    pub fn new(x: usize, y: usize, coverage_uncertainty_provider: Arc<dyn CoverageUncertainty>) -> Self {
        Self {
            x,
            y,
            coverage_uncertainty_provider,
            sst: ArithmeticMean::default(),
            sst_anomaly: ArithmeticMean::default(),
            random_uncertainty: WeightedUncertainty::default(),
            large_scale_uncertainty: ArithmeticMean::default(),
            coverage_uncertainty: WeightedUncertainty::default(),
            adjustment_uncertainty: WeightedUncertainty::default(),
            synoptic_uncertainty: WeightedUncertainty::default(),
            sea_ice_fraction: ArithmeticMean::default(),
        }
    }

    /// Add the results of `child` with `weight`, typically its sea coverage
    pub fn accumulate<A: Aggregate + ?Sized>(&mut self, child: &A, weight: f64) {
        let r = child.results();
        self.sst.accumulate(r.sst, weight);
        self.sst_anomaly.accumulate(r.sst_anomaly, weight);
        self.random_uncertainty.accumulate(r.random_uncertainty, weight);
        self.large_scale_uncertainty
            .accumulate(r.large_scale_uncertainty, weight);
        self.coverage_uncertainty
            .accumulate(r.coverage_uncertainty, weight);
        self.adjustment_uncertainty
            .accumulate(r.adjustment_uncertainty, weight);
        self.synoptic_uncertainty
            .accumulate(r.synoptic_uncertainty, weight);
        self.sea_ice_fraction.accumulate_unweighted(r.sea_ice_fraction);
    }

    fn combined_coverage_uncertainty(&self) -> f64 {
        let cu5 = self.coverage_uncertainty.combine();
        let cu90 = self.coverage_uncertainty_provider.calculate(
            self.x,
            self.y,
            self.sample_count(),
            f64::NAN,
            CELL90_RESOLUTION,
        );
        (cu5 * cu5 + cu90 * cu90).sqrt()
    }
}

impl Aggregate for CellOfCells {
    fn sample_count(&self) -> usize {
        self.sst.sample_count()
    }

    fn results(&self) -> CellResults {
        CellResults {
            sst: self.sst.combine(),
            sst_anomaly: self.sst_anomaly.combine(),
            random_uncertainty: self.random_uncertainty.combine(),
            large_scale_uncertainty: self.large_scale_uncertainty.combine(),
            coverage_uncertainty: self.combined_coverage_uncertainty(),
            adjustment_uncertainty: self.adjustment_uncertainty.combine(),
            synoptic_uncertainty: self.synoptic_uncertainty.combine(),
            sea_ice_fraction: self.sea_ice_fraction.combine(),
        }
    }
}

impl Cell for CellOfCells {
    fn x(&self) -> usize {
        self.x
    }

    fn y(&self) -> usize {
        self.y
    }
}

impl fmt::Debug for CellOfCells {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellOfCells")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("sample_count", &self.sample_count())
            .finish()
    }
}
