//! Command-line options of the `sst-aggregator` binary

use chrono::NaiveDate;
use clap::{Parser, ValueEnum};
use sst_aggregator::resolution::{SpatialResolution, TemporalResolution};
use std::path::PathBuf;

/// Aggregates satellite SST products into regional averages or coarser grids
#[derive(Parser, Debug)]
#[command(
    name = "sst-aggregator",
    version,
    about = "Regional averaging and regridding of satellite SST products"
)]
pub struct Args {
    /// Source NetCDF files
    #[arg(short, long, num_args = 1.., required_unless_present = "list_resolutions")]
    pub input: Vec<PathBuf>,

    /// NetCDF file holding analysed SST and sea area fraction on the source grid
    #[arg(long, required_unless_present = "list_resolutions")]
    pub climatology: Option<PathBuf>,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Regions as Name=W,N,E,S;Name=mask-file;...
    #[arg(short, long)]
    pub regions: Option<String>,

    /// Output period: daily, weekly5d, weekly7d, monthly, seasonal or annual
    #[arg(long, value_parser = parse_temporal_resolution)]
    pub temporal_resolution: Option<TemporalResolution>,

    /// Cell size in degrees for regridding
    #[arg(long, value_parser = parse_spatial_resolution)]
    pub spatial_resolution: Option<SpatialResolution>,

    /// Fraction of valid pixels a cell needs for defined results
    #[arg(long, value_parser = parse_min_coverage)]
    pub min_coverage: Option<f64>,

    /// First day to process (YYYY-MM-DD), defaults to the earliest input
    #[arg(long, value_parser = parse_date)]
    pub start_date: Option<NaiveDate>,

    /// Last day to process (YYYY-MM-DD), defaults to the latest input
    #[arg(long, value_parser = parse_date)]
    pub end_date: Option<NaiveDate>,

    /// Processing mode
    #[arg(long, value_enum, default_value_t = Mode::Regavg)]
    pub mode: Mode,

    /// Output NetCDF file
    #[arg(short, long, required_unless_present = "list_resolutions")]
    pub output: Option<PathBuf>,

    /// Number of threads to use for parallel processing. Defaults to Rayon's choice.
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// Log level: trace, debug, info, warn or error
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Print the supported spatial resolutions and exit
    #[arg(long)]
    pub list_resolutions: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Regional average time series
    Regavg,
    /// Gridded product at the spatial resolution
    Regrid,
}

fn parse_spatial_resolution(s: &str) -> Result<SpatialResolution, String> {
    s.parse::<SpatialResolution>().map_err(|e| e.to_string())
}

fn parse_temporal_resolution(s: &str) -> Result<TemporalResolution, String> {
    s.parse::<TemporalResolution>().map_err(|e| e.to_string())
}

fn parse_min_coverage(s: &str) -> Result<f64, String> {
    let value = s
        .parse::<f64>()
        .map_err(|_| format!("'{}' is not a number", s))?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("minimum coverage must be within [0, 1], got {}", value))
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| format!("Invalid date '{}': expected YYYY-MM-DD.", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_parsers_reject_unknown_values() {
        assert!(parse_spatial_resolution("5").is_ok());
        assert!(parse_spatial_resolution("7").is_err());
        assert!(parse_temporal_resolution("Seasonal").is_ok());
        assert!(parse_temporal_resolution("hourly").is_err());
        assert!(parse_min_coverage("1.01").is_err());
    }

    #[test]
    fn list_resolutions_needs_no_inputs() {
        let args = Args::try_parse_from(["sst-aggregator", "--list-resolutions"]).unwrap();
        assert!(args.list_resolutions);
        assert!(args.input.is_empty());
    }
}
