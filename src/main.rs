//! Entry point of `sst-aggregator`
//! Parses the command line, loads configuration and inputs, and runs regional
//! averaging or regridding.

use clap::Parser;
use sst_aggregator::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Args, Mode};

fn init_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sst_aggregator={}", level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn load_config(args: &Args) -> Result<AggregationConfig> {
    let mut config = match &args.config {
        Some(path) => AggregationConfig::from_json_file(path)?,
        None => AggregationConfig::default(),
    };
    if let Some(regions) = &args.regions {
        config.regions = regions.clone();
    }
    if let Some(resolution) = args.temporal_resolution {
        config.temporal_resolution = resolution;
    }
    if let Some(resolution) = args.spatial_resolution {
        config.spatial_resolution = resolution;
    }
    if let Some(min_coverage) = args.min_coverage {
        config.min_coverage = min_coverage;
    }
    config.validate()?;
    Ok(config)
}

fn required<'a>(value: &'a Option<PathBuf>, flag: &str) -> Result<&'a Path> {
    value
        .as_deref()
        .ok_or_else(|| SstAggError::InvalidArgument(format!("{} is required", flag)))
}

/// Output path of one regridded time step
fn step_output_path(output: &Path, step: &TimeStep, step_count: usize) -> PathBuf {
    if step_count == 1 {
        return output.to_path_buf();
    }
    let stem = output
        .file_stem()
        .map_or_else(|| "regrid".to_string(), |s| s.to_string_lossy().into_owned());
    output.with_file_name(format!("{}-{}.nc", stem, step.start.format("%Y%m%d")))
}

fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    ParallelConfig::new(args.threads).setup_global_pool()?;

    let output = required(&args.output, "--output")?;
    let climatology_path = required(&args.climatology, "--climatology")?;

    let t0 = Instant::now();
    let sources = NetCDFSources::scan(&args.input, config.variables.clone(), config.flip_y)?;
    let (first, last) = sources
        .date_range()
        .ok_or_else(|| SstAggError::InvalidArgument("no input files given".to_string()))?;
    let start = args.start_date.unwrap_or(first);
    let end = args.end_date.unwrap_or(last);
    info!(files = sources.len(), %start, %end, "scanned inputs");

    let climatology = read_climatology(climatology_path, &config.climatology_variables, config.flip_y)?;
    let coverage: Arc<dyn CoverageUncertainty> = Arc::new(config.coverage_uncertainty_provider());
    let mut aggregator = Aggregator::new(sources, climatology, coverage, config.min_coverage);
    match config.correlation_lengths() {
        Some(lengths) => {
            info!("regridding coverage uncertainty from pixel standard deviation");
            aggregator = aggregator.with_correlation_lengths(lengths);
        }
        None if config.variables.standard_deviation.is_some() => {
            warn!("standard deviation read but correlation lengths unset, regridding keeps the scalar coverage model");
        }
        None => {}
    }

    match args.mode {
        Mode::Regavg => {
            let regions = RegionMaskList::parse(&config.regions, &RegionMask::default_grid_def()?)?;
            println!(
                "⚡ Averaging {} region(s), {} steps from {} to {}",
                regions.len(),
                config.temporal_resolution,
                start,
                end
            );
            let steps = aggregator.aggregate(&regions, start, end, config.temporal_resolution)?;
            NetCDFWriter::new(output).write_regional_averages(&steps, &regions.names())?;
            println!("✅ Saved {} time step(s) to {}", steps.len(), output.display());
        }
        Mode::Regrid => {
            println!(
                "⚡ Regridding to {}°, {} steps from {} to {}",
                config.spatial_resolution, config.temporal_resolution, start, end
            );
            let steps = aggregator.regrid(
                start,
                end,
                config.spatial_resolution,
                config.temporal_resolution,
            )?;
            for (step, cells) in &steps {
                if cells.non_empty_count() == 0 {
                    warn!(start = %step.start, "no valid cells in time step");
                }
                let path = step_output_path(output, step, steps.len());
                NetCDFWriter::new(&path).write_cell_grid(step, cells)?;
                println!("✅ Saved {}", path.display());
            }
        }
    }

    info!(elapsed_s = t0.elapsed().as_secs_f64(), "finished");
    Ok(())
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log_level);

    if args.list_resolutions {
        println!("📊 Supported spatial resolutions (degrees):");
        println!("   {}", SpatialResolution::values_as_string());
        ParallelInfo::collect().print_info();
        return Ok(());
    }

    run(args)?;
    Ok(())
}
