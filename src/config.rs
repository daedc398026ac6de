//! Aggregation settings loaded from JSON and overridden on the command line

use crate::errors::{Result, SstAggError};
use crate::resolution::{SpatialResolution, TemporalResolution};
use crate::uncertainty::{CorrelationLength, CorrelationLengths, ScalarCoverageUncertaintyProvider};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Names of the variables read from each source product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceVariables {
    pub sst: String,
    pub quality: Option<String>,
    pub random_uncertainty: Option<String>,
    pub large_scale_uncertainty: Option<String>,
    pub adjustment_uncertainty: Option<String>,
    pub synoptic_uncertainty: Option<String>,
    pub standard_deviation: Option<String>,
    pub sea_ice_fraction: Option<String>,
}

impl Default for SourceVariables {
    fn default() -> Self {
        Self {
            sst: "sea_surface_temperature".to_string(),
            quality: Some("quality_level".to_string()),
            random_uncertainty: Some("uncorrelated_uncertainty".to_string()),
            large_scale_uncertainty: Some("large_scale_correlated_uncertainty".to_string()),
            adjustment_uncertainty: Some("adjustment_uncertainty".to_string()),
            synoptic_uncertainty: Some("synoptically_correlated_uncertainty".to_string()),
            standard_deviation: None,
            sea_ice_fraction: Some("sea_ice_fraction".to_string()),
        }
    }
}

/// Names of the variables read from the climatology file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClimatologyVariables {
    pub analysed_sst: String,
    pub sea_area_fraction: String,
}

impl Default for ClimatologyVariables {
    fn default() -> Self {
        Self {
            analysed_sst: "analysed_sst".to_string(),
            sea_area_fraction: "sea_area_fraction".to_string(),
        }
    }
}

/// Settings of one aggregation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationConfig {
    pub variables: SourceVariables,
    pub climatology_variables: ClimatologyVariables,
    /// Fraction of a cell's pixels that must be valid for its results to be defined
    pub min_coverage: f64,
    pub coverage_magnitude90: f64,
    pub coverage_magnitude5: f64,
    pub coverage_exponent5: f64,
    /// Spatial correlation length in km of the regridding coverage model
    pub coverage_x0_space_km: Option<f64>,
    /// Temporal correlation length in days of the regridding coverage model
    pub coverage_x0_time_days: Option<f64>,
    pub spatial_resolution: SpatialResolution,
    pub temporal_resolution: TemporalResolution,
    /// Region list, `Name=W,N,E,S;...` or `Name=mask-file`
    pub regions: String,
    /// Source rows run south to north
    pub flip_y: bool,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            variables: SourceVariables::default(),
            climatology_variables: ClimatologyVariables::default(),
            min_coverage: 0.0,
            coverage_magnitude90: 1.1,
            coverage_magnitude5: 1.2,
            coverage_exponent5: 0.5,
            coverage_x0_space_km: None,
            coverage_x0_time_days: None,
            spatial_resolution: SpatialResolution::default(),
            temporal_resolution: TemporalResolution::default(),
            regions: "Global=-180,90,180,-90".to_string(),
            flip_y: false,
        }
    }
}

impl AggregationConfig {
    /// Read a configuration file; absent fields keep their defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is not valid JSON, or
    /// fails [`AggregationConfig::validate`].
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    /// # Errors
    ///
    /// Returns an error if `text` is not valid JSON or fails validation.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns [`SstAggError::InvalidArgument`] for a minimum coverage outside
    /// `[0, 1]` or a non-positive coverage uncertainty magnitude or correlation length.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_coverage) {
            return Err(SstAggError::InvalidArgument(format!(
                "min_coverage must be within [0, 1], got {}",
                self.min_coverage
            )));
        }
        for (name, value) in [
            ("coverage_magnitude90", Some(self.coverage_magnitude90)),
            ("coverage_magnitude5", Some(self.coverage_magnitude5)),
            ("coverage_x0_space_km", self.coverage_x0_space_km),
            ("coverage_x0_time_days", self.coverage_x0_time_days),
        ] {
            let Some(value) = value else { continue };
            if !(value > 0.0) {
                return Err(SstAggError::InvalidArgument(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if self.variables.sst.trim().is_empty() {
            return Err(SstAggError::InvalidArgument(
                "the SST variable name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    #[must_use]
    pub fn coverage_uncertainty_provider(&self) -> ScalarCoverageUncertaintyProvider {
        ScalarCoverageUncertaintyProvider::new(
            self.coverage_magnitude90,
            self.coverage_magnitude5,
            self.coverage_exponent5,
        )
    }

    /// Correlation lengths of the regridding coverage model
    ///
    /// Only defined when a standard deviation variable is read and both
    /// lengths are set.
    #[must_use]
    pub fn correlation_lengths(&self) -> Option<CorrelationLengths> {
        self.variables.standard_deviation.as_ref()?;
        Some(CorrelationLengths {
            space_km: CorrelationLength::Constant(self.coverage_x0_space_km?),
            time_days: CorrelationLength::Constant(self.coverage_x0_time_days?),
        })
    }
}
