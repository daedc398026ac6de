//! Aggregation pipeline from source pixels to regional time series
//!
//! The passes, from finest to coarsest:
//!
//! 1. [`aggregate_sources`]: source pixels into spatial cells (5° for
//!    regional averages, any [`SpatialResolution`] for regridding)
//! 2. [`aggregate_to_coarser`]: 5° cells into 90° cells, for regions covering
//!    the globe or a hemisphere ([`must_aggregate_to_90`])
//! 3. [`aggregate_cell_grid`]: cells of one region into one [`SamePeriodAggregation`]
//! 4. [`aggregate_multi_period`]: monthly aggregates into seasonal or annual ones
//!
//! [`Aggregator`] drives these passes over the sources returned by a
//! [`SourceProvider`] for every [`TimeStep`].

use crate::cell::{
    Aggregate, AggregationContext, CellOfCells, CellResults, MultiPeriodAggregation,
    SamePeriodAggregation, SpatialCell,
};
use crate::cell_grid::CellGrid;
use crate::errors::{Result, SstAggError};
use crate::grid::{downscale_to, ArrayGrid, Grid, GridDef};
use crate::region_mask::{Coverage, RegionMask, RegionMaskList};
use crate::resolution::{SpatialResolution, TemporalResolution};
use crate::uncertainty::{
    CorrelationLengths, CoverageUncertainty, RegriddingCoverageUncertaintyProvider,
    SynopticUncertaintyProvider,
};
use chrono::{Datelike, Days, Months, NaiveDate};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cell size in degrees of the regional averaging pass
pub const CELL5_RESOLUTION: f64 = 5.0;

/// Accumulate the source pixels under every cell set in `mask`
///
/// Each mask cell's lon/lat rectangle is mapped onto the source grid and
/// accumulated into the matching cell of `cell_grid`, created on demand.
/// Cells are disjoint and processed in parallel.
///
/// # Errors
///
/// Returns an error if `mask` and `cell_grid` use different geometries or a
/// source grid cannot be read.
pub fn aggregate_sources(
    context: &AggregationContext,
    mask: &RegionMask,
    cell_grid: &mut CellGrid<SpatialCell>,
) -> Result<()> {
    let mask_def = *mask.grid_def();
    if mask_def != *cell_grid.grid_def() {
        return Err(SstAggError::InvalidArgument(format!(
            "region mask {} is {} x {}, cell grid is {} x {}",
            mask.name(),
            mask_def.width(),
            mask_def.height(),
            cell_grid.width(),
            cell_grid.height()
        )));
    }
    let source_def = *context.source_grid_def();
    let config = context.cell_config(mask_def.resolution()?);

    cell_grid.try_par_for_each_slot(|x, y, slot| {
        if !mask.contains(x, y) {
            return Ok(());
        }
        let lon_lat = mask_def.lon_lat_rectangle(x as i64, y as i64)?;
        let rect = source_def.grid_rectangle_of(&lon_lat)?;
        let cell = slot.get_or_insert_with(|| SpatialCell::new(x, y, config.clone()));
        cell.accumulate(context, &rect)
    })
}

/// Copy of the non-empty cells of `combined` selected by `mask`
///
/// # Errors
///
/// Returns an error if `mask` and `combined` use different geometries.
pub fn cell_grid_for_region<C: Aggregate + Clone>(combined: &CellGrid<C>, mask: &RegionMask) -> Result<CellGrid<C>> {
    if mask.grid_def() != combined.grid_def() {
        return Err(SstAggError::InvalidArgument(format!(
            "region mask {} does not match the cell grid geometry",
            mask.name()
        )));
    }
    let mut regional = CellGrid::new(*combined.grid_def());
    for (x, y, cell) in combined.non_empty() {
        if mask.contains(x, y) {
            regional.set(x, y, cell.clone())?;
        }
    }
    Ok(regional)
}

/// Accumulate every non-empty source cell into the coarser target cell containing it
///
/// Source cell `(x, y)` lands in target cell `(x·Wt/Ws, y·Ht/Hs)` with the
/// weight `sea_coverage(x, y)`; `sea_coverage` is given on the source cell geometry.
///
/// # Errors
///
/// Returns an error if `sea_coverage` does not cover the source cells.
pub fn aggregate_to_coarser<S: Aggregate>(
    source: &CellGrid<S>,
    sea_coverage: &dyn Grid,
    target: &mut CellGrid<CellOfCells>,
    coverage_uncertainty_provider: &Arc<dyn CoverageUncertainty>,
) -> Result<()> {
    let (source_w, source_h) = (source.width(), source.height());
    let (target_w, target_h) = (target.width(), target.height());
    for (x, y, cell) in source.non_empty() {
        let tx = x * target_w / source_w;
        let ty = y * target_h / source_h;
        let weight = sea_coverage.sample_double(x, y)?;
        target
            .get_or_create(tx, ty, |cx, cy| {
                CellOfCells::new(cx, cy, Arc::clone(coverage_uncertainty_provider))
            })?
            .accumulate(cell, weight);
    }
    Ok(())
}

/// Fold all non-empty cells into `aggregation`, weighted by `sea_coverage`
///
/// # Errors
///
/// Returns an error if `sea_coverage` does not cover the cells.
pub fn aggregate_cell_grid<C: Aggregate>(
    cells: &CellGrid<C>,
    sea_coverage: &dyn Grid,
    aggregation: &mut SamePeriodAggregation,
) -> Result<()> {
    for (x, y, cell) in cells.non_empty() {
        aggregation.accumulate(cell, sea_coverage.sample_double(x, y)?);
    }
    Ok(())
}

/// Whether a region is averaged through 90° cells
#[must_use]
pub fn must_aggregate_to_90(mask: &RegionMask) -> bool {
    matches!(
        mask.coverage(),
        Coverage::Globe | Coverage::NHemisphere | Coverage::SHemisphere
    )
}

/// One same-period aggregation per region, in list order
///
/// # Errors
///
/// Returns an error if a region mask or sea coverage grid does not match its
/// cell grid.
pub fn aggregate_regions(
    cell5_grid: &CellGrid<SpatialCell>,
    masks: &RegionMaskList,
    sea_coverage5: &dyn Grid,
    sea_coverage90: &dyn Grid,
    coverage_uncertainty_provider: &Arc<dyn CoverageUncertainty>,
) -> Result<Vec<SamePeriodAggregation>> {
    let grid90 = GridDef::create_global(90.0)?;
    let mut aggregations = Vec::with_capacity(masks.len());
    for mask in masks {
        let regional = cell_grid_for_region(cell5_grid, mask)?;
        let mut aggregation = SamePeriodAggregation::new();
        if must_aggregate_to_90(mask) {
            let mut cell90_grid = CellGrid::new(grid90);
            aggregate_to_coarser(
                &regional,
                sea_coverage5,
                &mut cell90_grid,
                coverage_uncertainty_provider,
            )?;
            aggregate_cell_grid(&cell90_grid, sea_coverage90, &mut aggregation)?;
        } else {
            aggregate_cell_grid(&regional, sea_coverage5, &mut aggregation)?;
        }
        debug!(
            region = mask.name(),
            cells = regional.non_empty_count(),
            via_90 = must_aggregate_to_90(mask),
            "aggregated region"
        );
        aggregations.push(aggregation);
    }
    Ok(aggregations)
}

/// Half-open period `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeStep {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeStep {
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }

    /// Step following `start` for `resolution`
    ///
    /// # Errors
    ///
    /// Returns an error if the end date is not representable.
    pub fn starting_at(start: NaiveDate, resolution: TemporalResolution) -> Result<Self> {
        let end = match resolution {
            TemporalResolution::Daily => start.checked_add_days(Days::new(1)),
            TemporalResolution::Weekly5d => start.checked_add_days(Days::new(5)),
            TemporalResolution::Weekly7d => start.checked_add_days(Days::new(7)),
            TemporalResolution::Monthly => start.checked_add_months(Months::new(1)),
            TemporalResolution::Seasonal => start.checked_add_months(Months::new(3)),
            TemporalResolution::Annual => start.checked_add_months(Months::new(12)),
        }
        .ok_or_else(|| SstAggError::InvalidArgument(format!("date overflow after {}", start)))?;
        Ok(Self { start, end })
    }

    /// Midpoint of the period, used as its time coordinate
    #[must_use]
    pub fn center(&self) -> NaiveDate {
        let days = (self.end - self.start).num_days() / 2;
        self.start + chrono::Duration::days(days)
    }
}

/// Consecutive steps from `start` while the step start is not after `end`
///
/// `end` is inclusive: a step starting on `end` is still produced.
///
/// # Errors
///
/// Returns an error if `end` precedes `start`.
pub fn time_steps(start: NaiveDate, end: NaiveDate, resolution: TemporalResolution) -> Result<Vec<TimeStep>> {
    if end < start {
        return Err(SstAggError::InvalidArgument(format!(
            "end date {} precedes start date {}",
            end, start
        )));
    }
    let mut steps = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        let step = TimeStep::starting_at(cursor, resolution)?;
        cursor = step.end;
        steps.push(step);
    }
    Ok(steps)
}

/// Results of all regions for one time step
#[derive(Debug, Clone)]
pub struct RegionalTimeStep {
    pub step: TimeStep,
    /// One entry per region, in region list order
    pub results: Vec<CellResults>,
}

/// Combine monthly steps region by region
#[must_use]
pub fn aggregate_multi_period(monthly: &[RegionalTimeStep], region_count: usize) -> Vec<CellResults> {
    (0..region_count)
        .map(|region| {
            let mut aggregation = MultiPeriodAggregation::new();
            for step in monthly {
                if let Some(results) = step.results.get(region) {
                    aggregation.accumulate_results(results);
                }
            }
            aggregation.results()
        })
        .collect()
}

/// Grids of one source product on a shared geometry
#[derive(Clone)]
pub struct SourceGrids {
    pub date: NaiveDate,
    pub sst: Arc<dyn Grid>,
    pub quality: Option<Arc<dyn Grid>>,
    pub random_uncertainty: Option<Arc<dyn Grid>>,
    pub large_scale_uncertainty: Option<Arc<dyn Grid>>,
    pub adjustment_uncertainty: Option<Arc<dyn Grid>>,
    pub synoptic_uncertainty: Option<Arc<dyn Grid>>,
    pub standard_deviation: Option<Arc<dyn Grid>>,
    pub sea_ice_fraction: Option<Arc<dyn Grid>>,
}

impl SourceGrids {
    #[must_use]
    pub fn new(date: NaiveDate, sst: Arc<dyn Grid>) -> Self {
        Self {
            date,
            sst,
            quality: None,
            random_uncertainty: None,
            large_scale_uncertainty: None,
            adjustment_uncertainty: None,
            synoptic_uncertainty: None,
            standard_deviation: None,
            sea_ice_fraction: None,
        }
    }
}

/// Supplier of dated source products
pub trait SourceProvider: Sync {
    /// Handle identifying one product before it is loaded
    type Source: Send + Sync;

    /// Products observed within `step`
    ///
    /// # Errors
    ///
    /// Returns an error if the product inventory cannot be listed.
    fn sources(&self, step: &TimeStep) -> Result<Vec<Self::Source>>;

    /// Load the grids of one product
    ///
    /// # Errors
    ///
    /// Returns an error if the product cannot be read.
    fn load(&self, source: &Self::Source) -> Result<SourceGrids>;

    /// Name used in log messages
    fn describe(&self, source: &Self::Source) -> String;
}

/// Products held in memory
#[derive(Clone, Default)]
pub struct InMemorySources {
    products: Vec<SourceGrids>,
}

impl InMemorySources {
    #[must_use]
    pub fn new(products: Vec<SourceGrids>) -> Self {
        Self { products }
    }

    pub fn push(&mut self, product: SourceGrids) {
        self.products.push(product);
    }
}

impl SourceProvider for InMemorySources {
    type Source = usize;

    fn sources(&self, step: &TimeStep) -> Result<Vec<usize>> {
        Ok(self
            .products
            .iter()
            .enumerate()
            .filter(|(_, p)| step.contains(p.date))
            .map(|(i, _)| i)
            .collect())
    }

    fn load(&self, source: &usize) -> Result<SourceGrids> {
        self.products
            .get(*source)
            .cloned()
            .ok_or_else(|| SstAggError::Generic(format!("no in-memory product {}", source)))
    }

    fn describe(&self, source: &usize) -> String {
        format!("in-memory product #{}", source)
    }
}

/// Reference SST and sea coverage on the source geometry
///
/// The sea coverage is also kept downscaled to the 5° and 90° cell grids
/// for weighting cells.
#[derive(Clone)]
pub struct Climatology {
    analysed_sst: Arc<dyn Grid>,
    sea_coverage: Arc<dyn Grid>,
    sea_coverage5: Arc<ArrayGrid>,
    sea_coverage90: Arc<ArrayGrid>,
}

impl Climatology {
    /// # Errors
    ///
    /// Returns an error if the grids differ in geometry or the sea coverage
    /// cannot be downscaled to 5° and 90° cells.
    pub fn new(analysed_sst: Arc<dyn Grid>, sea_coverage: Arc<dyn Grid>) -> Result<Self> {
        if analysed_sst.grid_def() != sea_coverage.grid_def() {
            return Err(SstAggError::InvalidArgument(
                "climatology SST and sea coverage grids differ in geometry".to_string(),
            ));
        }
        let sea_coverage5 = downscale_to(sea_coverage.as_ref(), &GridDef::create_global(CELL5_RESOLUTION)?)?;
        let sea_coverage90 = downscale_to(sea_coverage.as_ref(), &GridDef::create_global(90.0)?)?;
        Ok(Self {
            analysed_sst,
            sea_coverage,
            sea_coverage5: Arc::new(sea_coverage5),
            sea_coverage90: Arc::new(sea_coverage90),
        })
    }

    #[must_use]
    pub fn analysed_sst(&self) -> &Arc<dyn Grid> {
        &self.analysed_sst
    }

    #[must_use]
    pub fn sea_coverage(&self) -> &Arc<dyn Grid> {
        &self.sea_coverage
    }

    #[must_use]
    pub fn sea_coverage5(&self) -> &ArrayGrid {
        &self.sea_coverage5
    }

    #[must_use]
    pub fn sea_coverage90(&self) -> &ArrayGrid {
        &self.sea_coverage90
    }
}

/// Regional averaging and regridding over a [`SourceProvider`]
///
/// Regridding uses a [`RegriddingCoverageUncertaintyProvider`] once
/// correlation lengths are set with [`Aggregator::with_correlation_lengths`],
/// and the regional coverage model otherwise.
pub struct Aggregator<P: SourceProvider> {
    provider: P,
    climatology: Climatology,
    coverage_uncertainty_provider: Arc<dyn CoverageUncertainty>,
    correlation_lengths: Option<CorrelationLengths>,
    min_coverage: f64,
}

impl<P: SourceProvider> Aggregator<P> {
    #[must_use]
    pub fn new(
        provider: P,
        climatology: Climatology,
        coverage_uncertainty_provider: Arc<dyn CoverageUncertainty>,
        min_coverage: f64,
    ) -> Self {
        Self {
            provider,
            climatology,
            coverage_uncertainty_provider,
            correlation_lengths: None,
            min_coverage,
        }
    }

    #[must_use]
    pub fn with_correlation_lengths(mut self, lengths: CorrelationLengths) -> Self {
        self.correlation_lengths = Some(lengths);
        self
    }

    /// Regional averages for every time step between `start` and `end`
    ///
    /// Seasonal and annual steps combine the monthly steps they span.
    ///
    /// # Errors
    ///
    /// Returns an error if the regions do not use the 5° geometry, or the
    /// aggregation of a step fails.
    pub fn aggregate(
        &self,
        regions: &RegionMaskList,
        start: NaiveDate,
        end: NaiveDate,
        resolution: TemporalResolution,
    ) -> Result<Vec<RegionalTimeStep>> {
        let combined = regions
            .combined()?
            .ok_or_else(|| SstAggError::RegionList("no regions given".to_string()))?;
        self.aggregate_with_mask(regions, &combined, start, end, resolution)
    }

    fn aggregate_with_mask(
        &self,
        regions: &RegionMaskList,
        combined: &RegionMask,
        start: NaiveDate,
        end: NaiveDate,
        resolution: TemporalResolution,
    ) -> Result<Vec<RegionalTimeStep>> {
        let mut results = Vec::new();
        for step in time_steps(start, end, resolution)? {
            let regional = if resolution.is_multi_month() {
                let last_day = step.end.pred_opt().unwrap_or(step.end);
                let monthly = self.aggregate_with_mask(
                    regions,
                    combined,
                    step.start,
                    last_day,
                    TemporalResolution::Monthly,
                )?;
                aggregate_multi_period(&monthly, regions.len())
            } else {
                self.aggregate_step(regions, combined, &step, resolution)?
            };
            results.push(RegionalTimeStep {
                step,
                results: regional,
            });
        }
        Ok(results)
    }

    fn aggregate_step(
        &self,
        regions: &RegionMaskList,
        combined: &RegionMask,
        step: &TimeStep,
        resolution: TemporalResolution,
    ) -> Result<Vec<CellResults>> {
        let grid5 = GridDef::create_global(CELL5_RESOLUTION)?;
        let synoptic = SynopticUncertaintyProvider::new(CELL5_RESOLUTION, resolution);
        let cell5_grid = self.spatial_pass(
            combined,
            grid5,
            step,
            synoptic,
            &self.coverage_uncertainty_provider,
        )?;
        let aggregations = aggregate_regions(
            &cell5_grid,
            regions,
            self.climatology.sea_coverage5(),
            self.climatology.sea_coverage90(),
            &self.coverage_uncertainty_provider,
        )?;
        Ok(aggregations.iter().map(|a| a.results()).collect())
    }

    /// Spatial cells at `resolution` for every time step, covering the globe
    ///
    /// # Errors
    ///
    /// Returns [`SstAggError::UnsupportedOperation`] for seasonal and annual
    /// steps, or an error if a step cannot be aggregated.
    pub fn regrid(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        spatial: SpatialResolution,
        temporal: TemporalResolution,
    ) -> Result<Vec<(TimeStep, CellGrid<SpatialCell>)>> {
        if temporal.is_multi_month() {
            return Err(SstAggError::UnsupportedOperation(format!(
                "regridding to {} periods",
                temporal
            )));
        }
        let grid_def = spatial.grid_def()?;
        let globe = RegionMask::from_bounds("Global", -180.0, 90.0, 180.0, -90.0, &grid_def)?;
        let synoptic = SynopticUncertaintyProvider::new(spatial.value(), temporal);
        time_steps(start, end, temporal)?
            .into_iter()
            .map(|step| {
                let coverage = self.regridding_coverage(grid_def, &step, temporal)?;
                let cells = self.spatial_pass(&globe, grid_def, &step, synoptic, &coverage)?;
                Ok((step, cells))
            })
            .collect()
    }

    fn regridding_coverage(
        &self,
        grid_def: GridDef,
        step: &TimeStep,
        temporal: TemporalResolution,
    ) -> Result<Arc<dyn CoverageUncertainty>> {
        match &self.correlation_lengths {
            Some(lengths) => {
                let provider = RegriddingCoverageUncertaintyProvider::for_period(
                    grid_def,
                    lengths.clone(),
                    step.start,
                    step.end,
                    temporal,
                )?;
                debug!(step_days = provider.step_days(), "regridding coverage model");
                Ok(Arc::new(provider))
            }
            None => Ok(Arc::clone(&self.coverage_uncertainty_provider)),
        }
    }

    fn spatial_pass(
        &self,
        mask: &RegionMask,
        grid_def: GridDef,
        step: &TimeStep,
        synoptic: SynopticUncertaintyProvider,
        coverage: &Arc<dyn CoverageUncertainty>,
    ) -> Result<CellGrid<SpatialCell>> {
        let sources = self.provider.sources(step)?;
        info!(
            start = %step.start,
            end = %step.end,
            files = sources.len(),
            "computing output time step"
        );
        let mut cell_grid = CellGrid::new(grid_def);
        for source in &sources {
            let name = self.provider.describe(source);
            let t0 = Instant::now();
            let grids = match self.provider.load(source) {
                Ok(grids) => grids,
                Err(e) => {
                    warn!(source = %name, error = %e, "skipping unreadable source");
                    continue;
                }
            };
            let context = self.context_for(grids, synoptic, coverage);
            context.validate()?;
            aggregate_sources(&context, mask, &mut cell_grid)?;
            debug!(
                source = %name,
                day_of_year = step.start.ordinal(),
                elapsed_ms = t0.elapsed().as_millis() as u64,
                "aggregated source"
            );
        }
        Ok(cell_grid)
    }

    fn context_for(
        &self,
        grids: SourceGrids,
        synoptic: SynopticUncertaintyProvider,
        coverage: &Arc<dyn CoverageUncertainty>,
    ) -> AggregationContext {
        let mut context = AggregationContext::new(
            grids.sst,
            Arc::clone(self.climatology.analysed_sst()),
            Arc::clone(self.climatology.sea_coverage()),
            Arc::clone(coverage),
        );
        context.quality = grids.quality;
        context.random_uncertainty = grids.random_uncertainty;
        context.large_scale_uncertainty = grids.large_scale_uncertainty;
        context.adjustment_uncertainty = grids.adjustment_uncertainty;
        context.synoptic_uncertainty = grids.synoptic_uncertainty;
        context.standard_deviation = grids.standard_deviation;
        context.sea_ice_fraction = grids.sea_ice_fraction;
        context.synoptic_uncertainty_provider = Some(synoptic);
        context.min_coverage = self.min_coverage;
        context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn monthly_steps_follow_calendar_months() {
        let steps = time_steps(date(2000, 1, 1), date(2000, 12, 31), TemporalResolution::Monthly).unwrap();
        assert_eq!(steps.len(), 12);
        assert_eq!(steps[1].start, date(2000, 2, 1));
        assert_eq!(steps[1].end, date(2000, 3, 1));
    }

    #[test]
    fn end_date_is_inclusive() {
        let steps = time_steps(date(2000, 1, 1), date(2000, 1, 3), TemporalResolution::Daily).unwrap();
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2].end, date(2000, 1, 4));
    }

    #[test]
    fn seasonal_steps_span_three_months() {
        let steps = time_steps(date(2001, 12, 1), date(2002, 11, 30), TemporalResolution::Seasonal).unwrap();
        assert_eq!(steps.len(), 4);
        assert_eq!(steps[0].end, date(2002, 3, 1));
    }
}
