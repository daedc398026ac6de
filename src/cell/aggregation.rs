//! Region-wide aggregates for one period and across periods

use super::accumulator::{ArithmeticMean, NumberAccumulator, WeightedUncertainty};
use super::{Aggregate, CellResults};

/// Accumulators shared by both aggregation levels
#[derive(Debug, Clone, Default)]
struct Accumulators {
    sst: ArithmeticMean,
    sst_anomaly: ArithmeticMean,
    random_uncertainty: WeightedUncertainty,
    large_scale_uncertainty: ArithmeticMean,
    coverage_uncertainty: WeightedUncertainty,
    adjustment_uncertainty: WeightedUncertainty,
    synoptic_uncertainty: WeightedUncertainty,
    sea_ice_fraction: ArithmeticMean,
}

impl Accumulators {
    fn accumulate(&mut self, r: &CellResults, weight: f64) {
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

    fn results(&self) -> CellResults {
        CellResults {
            sst: self.sst.combine(),
            sst_anomaly: self.sst_anomaly.combine(),
            random_uncertainty: self.random_uncertainty.combine(),
            large_scale_uncertainty: self.large_scale_uncertainty.combine(),
            coverage_uncertainty: self.coverage_uncertainty.combine(),
            adjustment_uncertainty: self.adjustment_uncertainty.combine(),
            synoptic_uncertainty: self.synoptic_uncertainty.combine(),
            sea_ice_fraction: self.sea_ice_fraction.combine(),
        }
    }
}

/// Aggregate of the cells of one region within one period
///
/// Cells are weighted, usually by sea coverage. Uncertainties combine as
/// independent errors of the weighted mean, sea-ice fraction as a plain mean.
#[derive(Debug, Clone, Default)]
pub struct SamePeriodAggregation {
    acc: Accumulators,
}

impl SamePeriodAggregation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate<A: Aggregate + ?Sized>(&mut self, cell: &A, weight: f64) {
        self.acc.accumulate(&cell.results(), weight);
    }
}

impl Aggregate for SamePeriodAggregation {
    fn sample_count(&self) -> usize {
        self.acc.sst.sample_count()
    }

    fn results(&self) -> CellResults {
        self.acc.results()
    }
}

/// Aggregate of several same-period aggregates of one region
///
/// Every period counts equally, so uncertainties combine as `sqrt(Σu²) / n`.
#[derive(Debug, Clone, Default)]
pub struct MultiPeriodAggregation {
    acc: Accumulators,
}

impl MultiPeriodAggregation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accumulate<A: Aggregate + ?Sized>(&mut self, period: &A) {
        self.acc.accumulate(&period.results(), 1.0);
    }

    /// Add one period's results directly
    pub fn accumulate_results(&mut self, results: &CellResults) {
        self.acc.accumulate(results, 1.0);
    }
}

impl Aggregate for MultiPeriodAggregation {
    fn sample_count(&self) -> usize {
        self.acc.sst.sample_count()
    }

    fn results(&self) -> CellResults {
        self.acc.results()
    }
}
