use chrono::NaiveDate;
use sst_aggregator::cell::SampleCoverage;
use sst_aggregator::grid::GridRect;
use sst_aggregator::prelude::*;
use std::sync::Arc;

const EPS: f64 = 1e-6;

fn constant(grid_def: GridDef, value: f64) -> Result<Arc<dyn Grid>> {
    Ok(Arc::new(ArrayGrid::constant(grid_def, value)?))
}

fn provider(magnitude90: f64, magnitude5: f64, exponent5: f64) -> Arc<dyn CoverageUncertainty> {
    Arc::new(ScalarCoverageUncertaintyProvider::new(magnitude90, magnitude5, exponent5))
}

/// Context over constant grids: SST 292.0, climatology 291.5, sea coverage 0.8
fn context(grid_def: GridDef, coverage: Arc<dyn CoverageUncertainty>) -> Result<AggregationContext> {
    let mut context = AggregationContext::new(
        constant(grid_def, 292.0)?,
        constant(grid_def, 291.5)?,
        constant(grid_def, 0.8)?,
        coverage,
    );
    context.quality = Some(constant(grid_def, 5.0)?);
    Ok(context)
}

fn cell5(context: &AggregationContext, rect: GridRect) -> Result<SpatialCell> {
    let mut cell = SpatialCell::new(0, 0, context.cell_config(5.0));
    cell.accumulate(context, &rect)?;
    Ok(cell)
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < EPS,
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn test_spatial_cell_over_valid_pixels() -> Result<()> {
    let grid_def = GridDef::create_global_with_size(20, 10)?;
    let mut context = context(grid_def, provider(1.1, 1.2, 0.5))?;
    context.random_uncertainty = Some(constant(grid_def, 0.1)?);
    context.validate()?;

    let cell = cell5(&context, GridRect::new(0, 0, 10, 10))?;
    assert_eq!(cell.sample_count(), 100);
    assert_eq!(cell.sample_coverage(), SampleCoverage::Sufficient);

    let results = cell.results();
    assert_close(results.sst, 292.0);
    assert_close(results.sst_anomaly, 0.5);
    let expected_random = (100.0 * (0.1_f64 * 0.8).powi(2) / (100.0_f64 * 0.8).powi(2)).sqrt();
    assert_close(results.random_uncertainty, expected_random);
    assert_close(results.coverage_uncertainty, 1.2 * (1.0 - (100.0_f64 / 77500.0).sqrt()));
    assert!(results.large_scale_uncertainty.is_nan());
    assert!(results.sea_ice_fraction.is_nan());
    Ok(())
}

#[test]
fn test_spatial_cell_skips_pixels_without_climatology() -> Result<()> {
    let grid_def = GridDef::create_global_with_size(20, 10)?;
    let (w, h) = (grid_def.width(), grid_def.height());
    let sst: Vec<f64> = (0..w * h).map(|i| if i < w { 300.0 } else { 292.0 }).collect();
    let climatology: Vec<f64> = (0..w * h).map(|i| if i < w { f64::NAN } else { 291.5 }).collect();
    let mut context = context(grid_def, provider(1.1, 1.2, 0.5))?;
    context.sst = Arc::new(ArrayGrid::create_f64(grid_def, Some(sst))?);
    context.climatology_sst = Arc::new(ArrayGrid::create_f64(grid_def, Some(climatology))?);

    let cell = cell5(&context, GridRect::new(0, 0, 10, 10))?;
    assert_eq!(cell.sample_count(), 90);
    let results = cell.results();
    assert_close(results.sst, 292.0);
    assert_close(results.sst_anomaly, 0.5);
    assert_close(results.sst - results.sst_anomaly, 291.5);
    Ok(())
}

#[test]
fn test_spatial_cell_over_full_5_degree_block() -> Result<()> {
    let grid_def = GridDef::create_global_with_size(100, 100)?;
    let mut context = context(grid_def, provider(1.1, 1.2, 0.5))?;
    context.random_uncertainty = Some(constant(grid_def, 1.0)?);
    context.large_scale_uncertainty = Some(constant(grid_def, 2.0)?);

    let cell = cell5(&context, GridRect::new(0, 0, 100, 100))?;
    assert_eq!(cell.sample_count(), 10000);
    let results = cell.results();
    assert_close(results.sst, 292.0);
    assert_close(results.sst_anomaly, 0.5);
    assert_close(results.coverage_uncertainty, 0.7689472751357401);
    assert_close(results.random_uncertainty, 0.01);
    assert_close(results.large_scale_uncertainty, 2.0);
    assert!(results.synoptic_uncertainty.is_nan());
    assert!(results.adjustment_uncertainty.is_nan());
    Ok(())
}

#[test]
fn test_invalid_pixels_are_skipped() -> Result<()> {
    let grid_def = GridDef::create_global_with_size(4, 1)?;
    let sst = ArrayGrid::from_vec(grid_def, vec![292.0, 0.0, 294.0, 296.0], None, 1.0, 0.0)?;
    let quality = ArrayGrid::from_vec(grid_def, vec![5.0, 5.0, 5.0, 3.0], None, 1.0, 0.0)?;
    let sea_ice = ArrayGrid::from_vec(grid_def, vec![0.0, 0.4, 0.2, 0.6], None, 1.0, 0.0)?;

    let mut context = context(grid_def, provider(1.1, 1.2, 0.5))?;
    context.sst = Arc::new(sst);
    context.quality = Some(Arc::new(quality));
    context.sea_ice_fraction = Some(Arc::new(sea_ice));

    let cell = cell5(&context, GridRect::new(0, 0, 4, 1))?;
    assert_eq!(cell.sample_count(), 2);
    let results = cell.results();
    assert_close(results.sst, 293.0);
    assert_close(results.sst_anomaly, 1.5);
    // Sea ice is averaged over every pixel, valid or not
    assert_close(results.sea_ice_fraction, 0.3);
    Ok(())
}

#[test]
fn test_insufficient_coverage_yields_nan() -> Result<()> {
    let grid_def = GridDef::create_global_with_size(10, 10)?;
    let data: Vec<f64> = (0..100).map(|i| if i < 40 { 292.0 } else { f64::NAN }).collect();
    let mut context = context(grid_def, provider(1.1, 1.2, 0.5))?;
    context.sst = Arc::new(ArrayGrid::from_vec(grid_def, data, Some(f64::NAN), 1.0, 0.0)?);
    context.random_uncertainty = Some(constant(grid_def, 0.1)?);
    context.min_coverage = 0.5;
    context.validate()?;

    let cell = cell5(&context, GridRect::new(0, 0, 10, 10))?;
    assert_eq!(cell.sample_count(), 40);
    assert_eq!(cell.sample_coverage(), SampleCoverage::Insufficient);
    let results = cell.results();
    assert!(results.sst.is_nan());
    assert!(results.sst_anomaly.is_nan());
    assert!(results.random_uncertainty.is_nan());
    assert_close(results.coverage_uncertainty, 1.2 * (1.0 - (40.0_f64 / 77500.0).sqrt()));

    context.min_coverage = 0.3;
    let cell = cell5(&context, GridRect::new(0, 0, 10, 10))?;
    assert_eq!(cell.sample_coverage(), SampleCoverage::Sufficient);
    assert_close(cell.results().sst, 292.0);
    Ok(())
}

#[test]
fn test_empty_cell_has_no_results() -> Result<()> {
    let grid_def = GridDef::create_global_with_size(4, 4)?;
    let context = context(grid_def, provider(1.1, 1.2, 0.5))?;
    let cell = SpatialCell::new(1, 2, context.cell_config(5.0));
    assert!(cell.is_empty());
    assert_eq!(cell.sample_coverage(), SampleCoverage::Unaccumulated);
    assert_eq!((cell.x(), cell.y()), (1, 2));
    assert!(cell.results().to_array().iter().all(|v| v.is_nan()));
    Ok(())
}

#[test]
fn test_rectangles_outside_the_source_fail() -> Result<()> {
    let grid_def = GridDef::create_global_with_size(4, 4)?;
    let context = context(grid_def, provider(1.1, 1.2, 0.5))?;
    let mut cell = SpatialCell::new(0, 0, context.cell_config(5.0));
    assert!(cell.accumulate(&context, &GridRect::new(2, 2, 4, 4)).is_err());
    assert!(cell.accumulate(&context, &GridRect::new(-1, 0, 2, 2)).is_err());
    Ok(())
}

#[test]
fn test_mismatched_context_grids_are_rejected() -> Result<()> {
    let grid_def = GridDef::create_global_with_size(4, 4)?;
    let mut context = context(grid_def, provider(1.1, 1.2, 0.5))?;
    context.random_uncertainty = Some(constant(GridDef::create_global_with_size(8, 4)?, 0.1)?);
    assert!(context.validate().is_err());
    Ok(())
}

#[test]
fn test_synoptic_uncertainty_is_reduced_by_effective_sample_count() -> Result<()> {
    let grid_def = GridDef::create_global_with_size(10, 10)?;
    let synoptic = SynopticUncertaintyProvider::new(5.0, TemporalResolution::Monthly);
    let mut context = context(grid_def, provider(1.1, 1.2, 0.5))?;
    context.synoptic_uncertainty = Some(constant(grid_def, 0.4)?);
    context.adjustment_uncertainty = Some(constant(grid_def, 0.2)?);
    context.synoptic_uncertainty_provider = Some(synoptic);

    let mut cell = SpatialCell::new(3, 7, context.cell_config(5.0));
    cell.accumulate(&context, &GridRect::new(0, 0, 5, 5))?;
    let results = cell.results();
    assert_close(results.synoptic_uncertainty, synoptic.calculate(7, 25, 0.4));
    assert_close(results.adjustment_uncertainty, synoptic.calculate(7, 25, 0.2));
    assert!(results.synoptic_uncertainty < 0.4);
    Ok(())
}

#[test]
fn test_cell_of_cells_weights_child_results() -> Result<()> {
    let grid_def = GridDef::create_global_with_size(40, 20)?;
    let data: Vec<f64> = (0..20 * 40)
        .map(|i| 290.0 + 2.0 * ((i % 40) / 10) as f64)
        .collect();
    let mut context = context(grid_def, provider(1.1, 1.2, 0.5))?;
    context.sst = Arc::new(ArrayGrid::from_vec(grid_def, data, None, 1.0, 0.0)?);

    let rects = [
        GridRect::new(0, 0, 10, 10),
        GridRect::new(10, 0, 10, 10),
        GridRect::new(20, 0, 10, 10),
        GridRect::new(30, 0, 10, 20),
    ];
    let weights = [0.25, 0.5, 0.25, 1.0];

    let mut cell90 = CellOfCells::new(0, 0, provider(1.1, 1.2, 0.5));
    for (rect, weight) in rects.iter().zip(weights) {
        let child = cell5(&context, *rect)?;
        cell90.accumulate(&child, weight);
    }
    let counts: Vec<usize> = rects
        .iter()
        .map(|r| cell5(&context, *r).map(|c| c.sample_count()))
        .collect::<Result<_>>()?;
    assert_eq!(counts, vec![100, 100, 100, 200]);

    assert_eq!(cell90.sample_count(), 4);
    let results = cell90.results();
    let expected_sst = (290.0 * 0.25 + 292.0 * 0.5 + 294.0 * 0.25 + 296.0 * 1.0) / 2.0;
    assert_close(results.sst, expected_sst);
    assert_close(results.sst_anomaly, expected_sst - 291.5);
    Ok(())
}

#[test]
fn test_cell_of_cells_adds_sampling_uncertainty() -> Result<()> {
    let grid_def = GridDef::create_global_with_size(100, 100)?;
    let mut context = context(grid_def, provider(1.1, 1.2, 0.5))?;
    context.random_uncertainty = Some(constant(grid_def, 1.0)?);
    context.large_scale_uncertainty = Some(constant(grid_def, 2.0)?);
    let child = cell5(&context, GridRect::new(0, 0, 100, 100))?;

    let mut cell90 = CellOfCells::new(0, 0, provider(1.1, 3.0, 2.5));
    cell90.accumulate(&child, 1.0);

    assert_eq!(cell90.sample_count(), 1);
    let results = cell90.results();
    assert_close(results.sst, 292.0);
    assert_close(results.sst_anomaly, 0.5);
    assert_close(results.coverage_uncertainty, 1.3421176967534105);
    assert_close(results.random_uncertainty, 0.01);
    assert_close(results.large_scale_uncertainty, 2.0);
    assert!(results.synoptic_uncertainty.is_nan());
    assert!(results.adjustment_uncertainty.is_nan());
    Ok(())
}

#[test]
fn test_cell_of_cells_uncertainty_falls_with_independent_children() -> Result<()> {
    let grid_def = GridDef::create_global_with_size(100, 100)?;
    let mut context = context(grid_def, provider(1.1, 1.2, 0.5))?;
    context.random_uncertainty = Some(constant(grid_def, 1.0)?);
    let child = cell5(&context, GridRect::new(0, 0, 100, 100))?;
    assert_close(child.results().random_uncertainty, 0.01);

    let mut cell90 = CellOfCells::new(0, 0, provider(1.1, 1.2, 0.5));
    for _ in 0..4 {
        cell90.accumulate(&child, 1.0);
    }
    assert_eq!(cell90.sample_count(), 4);
    let results = cell90.results();
    assert_close(results.random_uncertainty, 0.005);
    let cu5 = child.results().coverage_uncertainty / 2.0;
    let cu90 = 1.1 / 2.0;
    assert_close(results.coverage_uncertainty, (cu5 * cu5 + cu90 * cu90).sqrt());
    Ok(())
}

#[test]
fn test_same_period_aggregation_of_cells() -> Result<()> {
    let grid_def = GridDef::create_global_with_size(20, 10)?;
    let mut context = context(grid_def, provider(1.1, 1.2, 0.5))?;
    context.random_uncertainty = Some(constant(grid_def, 0.1)?);
    let a = cell5(&context, GridRect::new(0, 0, 10, 10))?;
    let b = cell5(&context, GridRect::new(10, 0, 10, 10))?;

    let mut aggregation = SamePeriodAggregation::new();
    aggregation.accumulate(&a, 1.0);
    aggregation.accumulate(&b, 0.5);
    assert_eq!(aggregation.sample_count(), 2);
    let results = aggregation.results();
    assert_close(results.sst, 292.0);
    // Equal uncertainties combine as sqrt(Σ(u·w)²) / Σw
    assert_close(results.random_uncertainty, 0.007453559924999299);
    let cu = a.results().coverage_uncertainty;
    assert_close(results.coverage_uncertainty, cu * 1.25_f64.sqrt() / 1.5);
    Ok(())
}

#[test]
fn test_multi_period_aggregation() {
    let month = |sst: f64, random: f64| CellResults {
        sst,
        sst_anomaly: sst - 291.0,
        random_uncertainty: random,
        synoptic_uncertainty: random,
        sea_ice_fraction: 0.0,
        ..CellResults::missing()
    };
    let (a, b) = (0.3, 0.4);

    let mut season = MultiPeriodAggregation::new();
    season.accumulate_results(&month(292.0, a));
    season.accumulate_results(&month(294.0, b));
    season.accumulate_results(&CellResults::missing());

    assert_eq!(season.sample_count(), 2);
    let results = season.results();
    let combined = (a * a + b * b).sqrt() / 2.0;
    assert_close(combined, 0.25);
    assert_close(results.sst, 293.0);
    assert_close(results.sst_anomaly, 2.0);
    assert_close(results.random_uncertainty, combined);
    assert_close(results.synoptic_uncertainty, combined);
    assert_close(results.sea_ice_fraction, 0.0);
    assert!(results.large_scale_uncertainty.is_nan());
}

#[test]
fn test_multi_period_uncertainty_falls_with_months() {
    let month = CellResults {
        sst: 292.0,
        random_uncertainty: 0.3,
        adjustment_uncertainty: 0.3,
        ..CellResults::missing()
    };
    let mut season = MultiPeriodAggregation::new();
    for _ in 0..3 {
        season.accumulate_results(&month);
    }
    let results = season.results();
    assert_close(results.random_uncertainty, 0.17320508075688776);
    assert_close(results.adjustment_uncertainty, 0.17320508075688776);
}

#[test]
fn test_scalar_coverage_uncertainty() {
    let p = ScalarCoverageUncertaintyProvider::new(1.1, 1.2, 0.5);
    assert_close(p.calculate(0, 0, 300, f64::NAN, 5.0), 1.2 * (1.0 - (300.0_f64 / 77500.0).sqrt()));
    assert_close(p.calculate(0, 0, 4, f64::NAN, 90.0), 1.1 / 2.0);
    assert!(p.calculate(0, 0, 0, f64::NAN, 5.0).is_nan());
    assert!(p.calculate(0, 0, 0, f64::NAN, 90.0).is_nan());
    assert_eq!(p.calculate(0, 0, 10, 0.5, 1.0), 0.0);
}

fn correlation_lengths(space_km: f64, time_days: f64) -> CorrelationLengths {
    CorrelationLengths {
        space_km: CorrelationLength::Constant(space_km),
        time_days: CorrelationLength::Constant(time_days),
    }
}

#[test]
fn test_regridding_coverage_uncertainty() -> Result<()> {
    let grid10 = GridDef::create_global(10.0)?;
    assert!((grid10.diagonal(0, 8)? - 1568.52).abs() < 1e-2);

    let january = RegriddingCoverageUncertaintyProvider::for_period(
        grid10,
        correlation_lengths(500.0, 3.0),
        NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date"),
        NaiveDate::from_ymd_opt(2000, 2, 1).expect("valid date"),
        TemporalResolution::Monthly,
    )?;
    assert_eq!(january.step_days(), 31.0);
    assert_close(january.r_bar_space(0, 8), 0.3049335054653789);
    assert_close(january.r_bar_time(0, 8), 0.09677104543827361);
    assert_close(january.calculate(0, 8, 100, 0.25, 10.0), 0.04272897681108512);
    assert!(january.calculate(0, 8, 0, 0.25, 10.0).is_nan());

    let daily = RegriddingCoverageUncertaintyProvider::new(grid10, correlation_lengths(500.0, 3.0), 0.0);
    assert_close(daily.calculate(0, 8, 100, 0.25, 10.0), 0.041218206253906854);

    let february = |start: NaiveDate, end: NaiveDate| {
        RegriddingCoverageUncertaintyProvider::for_period(
            grid10,
            correlation_lengths(500.0, 3.0),
            start,
            end,
            TemporalResolution::Monthly,
        )
        .map(|p| p.step_days())
    };
    let day = |y, m| NaiveDate::from_ymd_opt(y, m, 1).expect("valid date");
    assert_eq!(february(day(2012, 2), day(2012, 3))?, 29.0);
    assert_eq!(february(day(2013, 2), day(2013, 3))?, 28.0);

    assert!(RegriddingCoverageUncertaintyProvider::for_period(
        grid10,
        correlation_lengths(500.0, 3.0),
        day(2000, 1),
        day(2000, 4),
        TemporalResolution::Seasonal,
    )
    .is_err());
    Ok(())
}

#[test]
fn test_regridding_correlation_lengths_per_cell() -> Result<()> {
    let grid10 = GridDef::create_global(10.0)?;
    let mut space = vec![500.0; grid10.cell_count()];
    space[8 * grid10.width()] = f64::NAN;
    let lengths = CorrelationLengths {
        space_km: CorrelationLength::PerCell(Arc::new(ArrayGrid::create_f64(grid10, Some(space))?)),
        time_days: CorrelationLength::Constant(3.0),
    };
    let provider = RegriddingCoverageUncertaintyProvider::new(grid10, lengths, 0.0);
    assert!(provider.calculate(0, 8, 100, 0.25, 10.0).is_nan());
    assert_close(provider.calculate(1, 8, 100, 0.25, 10.0), 0.041218206253906854);
    Ok(())
}

#[test]
fn test_synoptic_spatial_scale() {
    let p = SynopticUncertaintyProvider::new(5.0, TemporalResolution::Monthly);
    assert_close(p.dxy(0), 188.815598);
    assert_close(p.dxy(18), 286.830454);
    assert_close(p.dxy(35), 188.815598);
    assert_close(p.dxy(9), 240.705816);
    assert_close(p.dxy(27), 234.940236);
}

#[test]
fn test_synoptic_temporal_scale() {
    let dt = |res: f64, temporal| SynopticUncertaintyProvider::new(res, temporal).dt();
    for temporal in [TemporalResolution::Weekly5d, TemporalResolution::Weekly7d] {
        assert_eq!(dt(0.05, temporal), 2.0);
        assert_eq!(dt(1.25, temporal), 2.0);
        assert_eq!(dt(2.0, temporal), 1.0);
        assert_eq!(dt(2.5, temporal), 1.0);
        assert_eq!(dt(3.0, temporal), 0.0);
    }
    assert_eq!(dt(0.5, TemporalResolution::Monthly), 10.0);
    assert_eq!(dt(0.8, TemporalResolution::Monthly), 8.5);
    assert_eq!(dt(1.2, TemporalResolution::Monthly), 3.5);
    assert_eq!(dt(2.25, TemporalResolution::Monthly), 0.25);
    assert_eq!(dt(3.0, TemporalResolution::Monthly), 0.1);
    assert_eq!(dt(3.75, TemporalResolution::Monthly), 0.0);
    for res in SpatialResolution::all() {
        assert_eq!(dt(res.value(), TemporalResolution::Daily), 0.0);
    }
}
