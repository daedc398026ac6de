use chrono::NaiveDate;
use ndarray::{Array1, Array3};
use netcdf::AttributeValue;
use sst_aggregator::config::{ClimatologyVariables, SourceVariables};
use sst_aggregator::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn grid5() -> GridDef {
    GridDef::create_global(5.0).expect("Failed to create 5 degree grid")
}

fn constant(value: f64) -> Result<Arc<dyn Grid>> {
    Ok(Arc::new(ArrayGrid::constant(grid5(), value)?))
}

fn climatology() -> Result<Climatology> {
    Climatology::new(constant(291.5)?, constant(1.0)?)
}

fn product(day: NaiveDate, sst: f64) -> Result<SourceGrids> {
    let mut grids = SourceGrids::new(day, constant(sst)?);
    grids.quality = Some(constant(5.0)?);
    grids.random_uncertainty = Some(constant(0.1)?);
    Ok(grids)
}

fn aggregator(products: Vec<SourceGrids>) -> Result<Aggregator<InMemorySources>> {
    let coverage: Arc<dyn CoverageUncertainty> = Arc::new(ScalarCoverageUncertaintyProvider::default());
    Ok(Aggregator::new(InMemorySources::new(products), climatology()?, coverage, 0.0))
}

#[test]
fn test_globe_and_hemispheres_go_through_90_degree_cells() -> Result<()> {
    let regions = RegionMaskList::parse(
        "Global=-180,90,180,-90;North=-180,90,180,0;South=-180,0,180,-90;Atlantic=-60,60,0,0",
        &RegionMask::default_grid_def()?,
    )?;
    let via_90: Vec<bool> = regions.iter().map(must_aggregate_to_90).collect();
    assert_eq!(via_90, vec![true, true, true, false]);
    Ok(())
}

#[test]
fn test_monthly_regional_averages() -> Result<()> {
    let aggregator = aggregator(vec![product(date(2000, 1, 15), 292.0)?])?;
    let regions = RegionMaskList::parse("Global=-180,90,180,-90;NW=-180,90,0,0", &RegionMask::default_grid_def()?)?;

    let steps = aggregator.aggregate(&regions, date(2000, 1, 1), date(2000, 1, 31), TemporalResolution::Monthly)?;
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].step.start, date(2000, 1, 1));
    assert_eq!(steps[0].step.end, date(2000, 2, 1));
    assert_eq!(steps[0].results.len(), 2);

    let global = steps[0].results[0];
    let nw = steps[0].results[1];
    for results in [global, nw] {
        assert!((results.sst - 292.0).abs() < 1e-9);
        assert!((results.sst_anomaly - 0.5).abs() < 1e-9);
        assert!(results.large_scale_uncertainty.is_nan());
    }

    // One pixel per 5° cell, 18 x 18 cells per 90° cell, 8 cells on the globe
    // and 36 x 18 cells in the north-western quarter
    let cu5 = 1.2 * (1.0 - (1.0_f64 / 77500.0).sqrt());
    let cu90 = 1.1 / 18.0;
    let cell90_coverage = ((cu5 / 18.0).powi(2) + cu90 * cu90).sqrt();
    let eight = 8.0_f64.sqrt();
    let quarter = 648.0_f64.sqrt();
    assert!((global.random_uncertainty - 0.1 / 18.0 / eight).abs() < 1e-9);
    assert!((global.coverage_uncertainty - cell90_coverage / eight).abs() < 1e-9);
    assert!((nw.random_uncertainty - 0.1 / quarter).abs() < 1e-9);
    assert!((nw.coverage_uncertainty - cu5 / quarter).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_months_without_sources_yield_nan() -> Result<()> {
    let aggregator = aggregator(vec![product(date(2000, 1, 15), 292.0)?])?;
    let regions = RegionMaskList::parse("Global=-180,90,180,-90", &RegionMask::default_grid_def()?)?;
    let steps = aggregator.aggregate(&regions, date(2000, 1, 1), date(2000, 2, 29), TemporalResolution::Monthly)?;
    assert_eq!(steps.len(), 2);
    assert!(steps[0].results[0].sst.is_finite());
    assert!(steps[1].results[0].sst.is_nan());
    Ok(())
}

#[test]
fn test_seasonal_averages_combine_months() -> Result<()> {
    let aggregator = aggregator(vec![
        product(date(2000, 1, 15), 292.0)?,
        product(date(2000, 2, 15), 294.0)?,
    ])?;
    let regions = RegionMaskList::parse("Global=-180,90,180,-90;Box=-60,60,0,0", &RegionMask::default_grid_def()?)?;

    let steps = aggregator.aggregate(&regions, date(2000, 1, 1), date(2000, 3, 31), TemporalResolution::Seasonal)?;
    assert_eq!(steps.len(), 1);
    assert_eq!(steps[0].step.end, date(2000, 4, 1));
    for results in &steps[0].results {
        assert!((results.sst - 293.0).abs() < 1e-9);
        assert!((results.sst_anomaly - 1.5).abs() < 1e-9);
    }
    // Two months with data, March is empty
    let global = steps[0].results[0];
    let boxed = steps[0].results[1];
    assert!((global.random_uncertainty - 0.1 / 72.0).abs() < 1e-9);
    assert!((boxed.random_uncertainty - 0.1 / 12.0 / 2.0_f64.sqrt()).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_regrid_keeps_one_cell_per_source_pixel() -> Result<()> {
    let aggregator = aggregator(vec![product(date(2000, 1, 15), 292.0)?])?;
    let resolution = SpatialResolution::from_value(5.0)?;

    let steps = aggregator.regrid(date(2000, 1, 1), date(2000, 1, 31), resolution, TemporalResolution::Monthly)?;
    assert_eq!(steps.len(), 1);
    let (_, cells) = &steps[0];
    assert_eq!(cells.non_empty_count(), 72 * 36);
    let cell = cells.get(10, 20).expect("cell (10, 20)");
    assert_eq!(cell.sample_count(), 1);
    assert!((cell.results().sst - 292.0).abs() < 1e-9);

    assert!(aggregator
        .regrid(date(2000, 1, 1), date(2000, 3, 31), resolution, TemporalResolution::Seasonal)
        .is_err());
    Ok(())
}

#[test]
fn test_regrid_coverage_uncertainty_from_standard_deviation() -> Result<()> {
    let mut grids = product(date(2000, 1, 15), 292.0)?;
    grids.standard_deviation = Some(constant(0.5)?);
    let lengths = CorrelationLengths {
        space_km: CorrelationLength::Constant(500.0),
        time_days: CorrelationLength::Constant(3.0),
    };
    let resolution = SpatialResolution::from_value(5.0)?;

    let scalar = aggregator(vec![grids.clone()])?;
    let (_, cells) = scalar
        .regrid(date(2000, 1, 1), date(2000, 1, 31), resolution, TemporalResolution::Monthly)?
        .remove(0);
    let cell = cells.get(10, 20).expect("cell (10, 20)");
    let cu5 = 1.2 * (1.0 - (1.0_f64 / 77500.0).sqrt());
    assert!((cell.results().coverage_uncertainty - cu5).abs() < 1e-9);

    let regridding = aggregator(vec![grids])?.with_correlation_lengths(lengths);
    let (_, cells) = regridding
        .regrid(date(2000, 1, 1), date(2000, 1, 31), resolution, TemporalResolution::Monthly)?
        .remove(0);
    let cell = cells.get(10, 20).expect("cell (10, 20)");
    // One pixel of variance 0.25 over a 31-day step
    assert!((cell.results().coverage_uncertainty - 0.10805196541736248).abs() < 1e-9);
    assert!((cell.results().sst - 292.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_aggregate_to_coarser_counts_children() -> Result<()> {
    let aggregator = aggregator(vec![product(date(2000, 1, 15), 292.0)?])?;
    let (_, cells5) = aggregator
        .regrid(date(2000, 1, 15), date(2000, 1, 15), SpatialResolution::from_value(5.0)?, TemporalResolution::Daily)?
        .remove(0);
    let sea_coverage5 = ArrayGrid::constant(grid5(), 1.0)?;
    let provider: Arc<dyn CoverageUncertainty> = Arc::new(ScalarCoverageUncertaintyProvider::default());

    let mut cells90 = CellGrid::new(GridDef::create_global(90.0)?);
    aggregate_to_coarser(&cells5, &sea_coverage5, &mut cells90, &provider)?;
    assert_eq!(cells90.non_empty_count(), 8);
    for (_, _, cell) in cells90.iter() {
        assert_eq!(cell.sample_count(), 18 * 18);
    }
    Ok(())
}

#[test]
fn test_cell_grid_for_region_selects_mask_cells() -> Result<()> {
    let aggregator = aggregator(vec![product(date(2000, 1, 15), 292.0)?])?;
    let (_, cells5) = aggregator
        .regrid(date(2000, 1, 15), date(2000, 1, 15), SpatialResolution::from_value(5.0)?, TemporalResolution::Daily)?
        .remove(0);

    let nw = RegionMask::from_bounds("NW", -180.0, 90.0, 0.0, 0.0, &grid5())?;
    let regional = cell_grid_for_region(&cells5, &nw)?;
    assert_eq!(regional.non_empty_count(), 36 * 18);
    assert!(regional.get(40, 5).is_none());

    let coarse = RegionMask::from_bounds("NW", -180.0, 90.0, 0.0, 0.0, &GridDef::create_global(10.0)?)?;
    assert!(cell_grid_for_region(&cells5, &coarse).is_err());
    Ok(())
}

fn days_since_epoch(day: NaiveDate) -> f64 {
    (day - date(1981, 1, 1)).num_days() as f64
}

fn write_source(path: &Path, day: NaiveDate, sst: f32) -> std::result::Result<(), netcdf::Error> {
    let mut file = netcdf::create(path)?;
    file.add_dimension("time", 1)?;
    file.add_dimension("lat", 36)?;
    file.add_dimension("lon", 72)?;

    {
        let mut time = file.add_variable::<f64>("time", &["time"])?;
        time.put_attribute("units", "seconds since 1981-01-01 00:00:00")?;
        time.put(Array1::from_elem(1, days_since_epoch(day) * 86400.0).view(), ..)?;
    }
    {
        let mut var = file.add_variable::<i16>("sea_surface_temperature", &["time", "lat", "lon"])?;
        var.put_attribute("_FillValue", -32768_i16)?;
        var.put_attribute("scale_factor", 0.01_f32)?;
        var.put_attribute("add_offset", 273.15_f32)?;
        let raw = ((sst - 273.15) / 0.01).round() as i16;
        var.put(Array3::from_elem((1, 36, 72), raw).view(), ..)?;
    }
    let mut quality = file.add_variable::<i8>("quality_level", &["time", "lat", "lon"])?;
    quality.put(Array3::from_elem((1, 36, 72), 5_i8).view(), ..)?;
    Ok(())
}

fn write_climatology(path: &Path) -> std::result::Result<(), netcdf::Error> {
    let mut file = netcdf::create(path)?;
    file.add_dimension("time", 1)?;
    file.add_dimension("lat", 36)?;
    file.add_dimension("lon", 72)?;

    {
        let mut sst = file.add_variable::<f32>("analysed_sst", &["time", "lat", "lon"])?;
        sst.put(Array3::from_elem((1, 36, 72), 291.5_f32).view(), ..)?;
    }
    let mut fraction = file.add_variable::<f32>("sea_area_fraction", &["time", "lat", "lon"])?;
    fraction.put(Array3::from_elem((1, 36, 72), 1.0_f32).view(), ..)?;
    Ok(())
}

#[test]
fn test_netcdf_round_trip() -> Result<()> {
    let temp_dir = tempdir()?;
    let source_path = temp_dir.path().join("20000115-sst.nc");
    let climatology_path = temp_dir.path().join("climatology.nc");
    let output_path = temp_dir.path().join("regavg.nc");
    write_source(&source_path, date(2000, 1, 15), 292.0)?;
    write_climatology(&climatology_path)?;

    let source = netcdf::open(&source_path)?;
    assert_eq!(read_time(&source)?, date(2000, 1, 15));
    let sst = read_grid(&source, "sea_surface_temperature", &grid5(), false)?;
    assert!((sst.sample_double(5, 5)? - 292.0).abs() < 1e-3);

    let sources = NetCDFSources::scan(&[source_path], SourceVariables::default(), false)?;
    assert_eq!(sources.date_range(), Some((date(2000, 1, 15), date(2000, 1, 15))));
    let climatology = read_climatology(&climatology_path, &ClimatologyVariables::default(), false)?;
    let coverage: Arc<dyn CoverageUncertainty> = Arc::new(ScalarCoverageUncertaintyProvider::default());
    let aggregator = Aggregator::new(sources, climatology, coverage, 0.0);

    let regions = RegionMaskList::parse("Global=-180,90,180,-90;Tropics=-180,20,180,-20", &RegionMask::default_grid_def()?)?;
    let steps = aggregator.aggregate(&regions, date(2000, 1, 1), date(2000, 1, 31), TemporalResolution::Monthly)?;
    NetCDFWriter::new(&output_path).write_regional_averages(&steps, &regions.names())?;

    let output = netcdf::open(&output_path)?;
    assert_eq!(read_time(&output)?, date(2000, 1, 16));
    let values = output
        .variable("sst")
        .ok_or_else(|| SstAggError::VariableNotFound { var: "sst".to_string() })?
        .get_values::<f32, _>(..)?;
    assert_eq!(values.len(), 2);
    for value in values {
        assert!((value - 292.0).abs() < 1e-3);
    }
    let region = output
        .variable("region")
        .ok_or_else(|| SstAggError::VariableNotFound { var: "region".to_string() })?;
    let names = region
        .attribute("region_names")
        .map(|a| a.value())
        .transpose()?;
    assert!(matches!(
        names,
        Some(AttributeValue::Strs(ref names)) if names == &["Global".to_string(), "Tropics".to_string()]
    ));
    Ok(())
}

#[test]
fn test_cell_grid_output() -> Result<()> {
    let temp_dir = tempdir()?;
    let output_path = temp_dir.path().join("regrid.nc");
    let aggregator = aggregator(vec![product(date(2000, 1, 15), 292.0)?])?;
    let steps = aggregator.regrid(
        date(2000, 1, 1),
        date(2000, 1, 31),
        SpatialResolution::from_value(5.0)?,
        TemporalResolution::Monthly,
    )?;
    let (step, cells) = &steps[0];
    NetCDFWriter::new(&output_path).write_cell_grid(step, cells)?;

    let output = netcdf::open(&output_path)?;
    let lat = output
        .variable("lat")
        .ok_or_else(|| SstAggError::VariableNotFound { var: "lat".to_string() })?
        .get_values::<f64, _>(..)?;
    assert_eq!(lat.len(), 36);
    assert!((lat[0] - 87.5).abs() < 1e-9);
    let counts = output
        .variable("sample_count")
        .ok_or_else(|| SstAggError::VariableNotFound { var: "sample_count".to_string() })?
        .get_values::<i32, _>(..)?;
    assert_eq!(counts.len(), 72 * 36);
    assert!(counts.iter().all(|&n| n == 1));
    let anomaly = output
        .variable("sst_anomaly")
        .ok_or_else(|| SstAggError::VariableNotFound { var: "sst_anomaly".to_string() })?
        .get_values::<f32, _>(..)?;
    assert!(anomaly.iter().all(|a| (a - 0.5).abs() < 1e-4));
    Ok(())
}
