//! Centralized error handling for the SST aggregator
//!
//! Every fallible operation in the crate returns [`Result`], so malformed masks,
//! out-of-range grid access and I/O failures all surface as one structured type.

use std::fmt;

/// Main error type for aggregation operations
#[derive(Debug)]
pub enum SstAggError {
    /// NetCDF file operation errors
    NetCDFError(netcdf::Error),

    /// I/O operation errors
    IoError(std::io::Error),

    /// Array shape or dimension error
    ArrayError(ndarray::ShapeError),

    /// Configuration file could not be parsed
    ConfigError(serde_json::Error),

    /// Grid access outside `[0,width) x [0,height)`
    IndexOutOfRange {
        x: i64,
        y: i64,
        width: usize,
        height: usize,
    },

    /// Argument outside its valid domain (coordinates, scale factors, bounds)
    InvalidArgument(String),

    /// Region bitmap did not match the mask geometry
    MaskFormat { region: String, message: String },

    /// Region list entry could not be parsed
    RegionList(String),

    /// Operation not defined for this kind of grid
    UnsupportedOperation(String),

    /// Variable not found in NetCDF file
    VariableNotFound { var: String },

    /// Thread pool configuration error
    ThreadPoolError(String),

    /// Generic error
    Generic(String),
}

impl fmt::Display for SstAggError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SstAggError::NetCDFError(e) => write!(f, "NetCDF error: {}", e),
            SstAggError::IoError(e) => write!(f, "I/O error: {}", e),
            SstAggError::ArrayError(e) => write!(f, "Array error: {}", e),
            SstAggError::ConfigError(e) => write!(f, "Configuration error: {}", e),
            SstAggError::IndexOutOfRange {
                x,
                y,
                width,
                height,
            } => write!(
                f,
                "Grid index ({}, {}) out of range for {} x {} grid",
                x, y, width, height
            ),
            SstAggError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            SstAggError::MaskFormat { region, message } => {
                write!(f, "Region {}: {}", region, message)
            }
            SstAggError::RegionList(msg) => write!(f, "Illegal region list: {}", msg),
            SstAggError::UnsupportedOperation(msg) => write!(f, "Unsupported operation: {}", msg),
            SstAggError::VariableNotFound { var } => {
                write!(f, "Variable '{}' not found in file", var)
            }
            SstAggError::ThreadPoolError(msg) => write!(f, "Thread pool error: {}", msg),
            SstAggError::Generic(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for SstAggError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SstAggError::NetCDFError(e) => Some(e),
            SstAggError::IoError(e) => Some(e),
            SstAggError::ArrayError(e) => Some(e),
            SstAggError::ConfigError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<netcdf::Error> for SstAggError {
    fn from(error: netcdf::Error) -> Self {
        SstAggError::NetCDFError(error)
    }
}

impl From<std::io::Error> for SstAggError {
    fn from(error: std::io::Error) -> Self {
        SstAggError::IoError(error)
    }
}

impl From<ndarray::ShapeError> for SstAggError {
    fn from(error: ndarray::ShapeError) -> Self {
        SstAggError::ArrayError(error)
    }
}

impl From<serde_json::Error> for SstAggError {
    fn from(error: serde_json::Error) -> Self {
        SstAggError::ConfigError(error)
    }
}

impl From<String> for SstAggError {
    fn from(error: String) -> Self {
        SstAggError::Generic(error)
    }
}

impl From<&str> for SstAggError {
    fn from(error: &str) -> Self {
        SstAggError::Generic(error.to_string())
    }
}

/// Result type alias for aggregation operations
pub type Result<T> = std::result::Result<T, SstAggError>;
