//! Supported target resolutions in space and time

use crate::errors::{Result, SstAggError};
use crate::grid::GridDef;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SPATIAL_VALUES: [f64; 24] = [
    0.05, 0.1, 0.15, 0.2, 0.25, 0.3, 0.4, 0.5, 0.6, 0.75, 0.8, 1.0, 1.2, 1.25, 2.0, 2.25, 2.4, 2.5,
    3.0, 3.75, 4.0, 4.5, 5.0, 10.0,
];

/// Target cell size in degrees, restricted to sizes that tile the globe exactly
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct SpatialResolution(f64);

impl SpatialResolution {
    /// Look up a supported resolution
    ///
    /// # Errors
    ///
    /// Returns an error listing the supported values if `degrees` is not one of them.
    pub fn from_value(degrees: f64) -> Result<Self> {
        SPATIAL_VALUES
            .iter()
            .find(|&&v| (v - degrees).abs() < 1e-9)
            .map(|&v| Self(v))
            .ok_or_else(|| {
                SstAggError::InvalidArgument(format!(
                    "unsupported spatial resolution {}, expected one of {}",
                    degrees,
                    Self::values_as_string()
                ))
            })
    }

    #[must_use]
    pub const fn value(self) -> f64 {
        self.0
    }

    /// Global grid with cells of this size
    ///
    /// # Errors
    ///
    /// Never fails for supported resolutions.
    pub fn grid_def(self) -> Result<GridDef> {
        GridDef::create_global(self.0)
    }

    #[must_use]
    pub fn all() -> Vec<Self> {
        SPATIAL_VALUES.iter().map(|&v| Self(v)).collect()
    }

    /// Supported values formatted as `[0.05, 0.1, ...]`
    #[must_use]
    pub fn values_as_string() -> String {
        let values: Vec<String> = SPATIAL_VALUES.iter().map(f64::to_string).collect();
        format!("[{}]", values.join(", "))
    }
}

impl Default for SpatialResolution {
    fn default() -> Self {
        Self(5.0)
    }
}

impl TryFrom<f64> for SpatialResolution {
    type Error = SstAggError;

    fn try_from(value: f64) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<SpatialResolution> for f64 {
    fn from(value: SpatialResolution) -> Self {
        value.0
    }
}

impl FromStr for SpatialResolution {
    type Err = SstAggError;

    fn from_str(s: &str) -> Result<Self> {
        let degrees = s.trim().parse::<f64>().map_err(|_| {
            SstAggError::InvalidArgument(format!("'{}' is not a spatial resolution", s))
        })?;
        Self::from_value(degrees)
    }
}

impl fmt::Display for SpatialResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Length of one aggregation period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemporalResolution {
    Daily,
    Weekly5d,
    Weekly7d,
    Monthly,
    Seasonal,
    Annual,
}

impl TemporalResolution {
    pub const ALL: [TemporalResolution; 6] = [
        Self::Daily,
        Self::Weekly5d,
        Self::Weekly7d,
        Self::Monthly,
        Self::Seasonal,
        Self::Annual,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly5d => "weekly5d",
            Self::Weekly7d => "weekly7d",
            Self::Monthly => "monthly",
            Self::Seasonal => "seasonal",
            Self::Annual => "annual",
        }
    }

    /// Whether periods are assembled from monthly aggregates
    #[must_use]
    pub const fn is_multi_month(self) -> bool {
        matches!(self, Self::Seasonal | Self::Annual)
    }
}

impl Default for TemporalResolution {
    fn default() -> Self {
        Self::Monthly
    }
}

impl FromStr for TemporalResolution {
    type Err = SstAggError;

    fn from_str(s: &str) -> Result<Self> {
        let name = s.trim().to_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|r| r.as_str() == name)
            .ok_or_else(|| {
                let names: Vec<&str> = Self::ALL.iter().map(|r| r.as_str()).collect();
                SstAggError::InvalidArgument(format!(
                    "unknown temporal resolution '{}', expected one of {}",
                    s,
                    names.join(", ")
                ))
            })
    }
}

impl fmt::Display for TemporalResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_spatial_resolution_tiles_the_globe() {
        for resolution in SpatialResolution::all() {
            let grid_def = resolution.grid_def().unwrap();
            let width = grid_def.width() as f64 * resolution.value();
            assert!((width - 360.0).abs() < 1e-9, "{}", resolution);
        }
    }

    #[test]
    fn values_string_lists_bounds() {
        let values = SpatialResolution::values_as_string();
        assert!(values.starts_with("[0.05, 0.1, 0.15"));
        assert!(values.ends_with("5, 10]"));
    }
}
