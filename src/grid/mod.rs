//! Grid geometry, sample grids and resampling
//!
//! # Organization
//!
//! - [`grid_def`]: regular lat/lon geometry and index/coordinate conversion
//! - [`array_grid`]: array-backed sample grid with fill value, scaling and offset
//! - [`downscaling`]: block-mean reduction to a coarser grid
//! - [`interpolation`]: bilinear resampling onto another geometry

pub mod array_grid;
pub mod downscaling;
pub mod grid_def;
pub mod interpolation;

pub use array_grid::ArrayGrid;
pub use downscaling::{downscale, downscale_to, downscale_uniform};
pub use grid_def::GridDef;
pub use interpolation::Interpolation;

use crate::errors::{Result, SstAggError};

/// What the samples of a grid represent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// Stored raw values; integer and boolean access read the raw encoding
    Raw,
    /// Membership flags
    Boolean,
    /// Values derived by resampling; boolean access is undefined
    Continuous,
}

/// A single sample read through [`Grid::sample`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sample {
    Double(f64),
    Int(i32),
    Boolean(bool),
}

/// Read access to a 2-D field of samples over a [`GridDef`]
///
/// All accessors are bounds-checked and fail with
/// [`SstAggError::IndexOutOfRange`] outside `[0,width) x [0,height)`.
pub trait Grid: Send + Sync {
    fn grid_def(&self) -> &GridDef;

    fn kind(&self) -> SampleKind;

    /// Geophysical value, `NaN` for missing samples
    ///
    /// # Errors
    ///
    /// Returns an error for indices outside the grid.
    fn sample_double(&self, x: usize, y: usize) -> Result<f64>;

    /// Raw integer value
    ///
    /// # Errors
    ///
    /// Returns an error for indices outside the grid.
    fn sample_int(&self, x: usize, y: usize) -> Result<i32>;

    /// Raw value interpreted as a flag
    ///
    /// # Errors
    ///
    /// Returns an error for indices outside the grid, or
    /// [`SstAggError::UnsupportedOperation`] for continuous grids.
    fn sample_boolean(&self, x: usize, y: usize) -> Result<bool> {
        if self.kind() == SampleKind::Continuous {
            return Err(SstAggError::UnsupportedOperation(
                "boolean samples are not defined for resampled grids".to_string(),
            ));
        }
        Ok(self.sample_int(x, y)? != 0)
    }

    /// Sample read through the accessor matching [`Grid::kind`]
    ///
    /// # Errors
    ///
    /// Returns an error for indices outside the grid.
    fn sample(&self, x: usize, y: usize) -> Result<Sample> {
        match self.kind() {
            SampleKind::Boolean => self.sample_boolean(x, y).map(Sample::Boolean),
            SampleKind::Raw | SampleKind::Continuous => self.sample_double(x, y).map(Sample::Double),
        }
    }

    fn width(&self) -> usize {
        self.grid_def().width()
    }

    fn height(&self) -> usize {
        self.grid_def().height()
    }
}

/// Integer cell rectangle, `x`/`y` being the upper-left cell
///
/// The width may be negative for boxes crossing the anti-meridian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridRect {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl GridRect {
    #[must_use]
    pub const fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Number of cells covered, zero for degenerate rectangles
    #[must_use]
    pub fn area(&self) -> usize {
        if self.width <= 0 || self.height <= 0 {
            return 0;
        }
        (self.width * self.height) as usize
    }

    #[must_use]
    pub const fn max_x(&self) -> i64 {
        self.x + self.width - 1
    }

    #[must_use]
    pub const fn max_y(&self) -> i64 {
        self.y + self.height - 1
    }
}

/// Geographic rectangle anchored at its south-west corner, in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LonLatRect {
    pub lon: f64,
    pub lat: f64,
    pub width: f64,
    pub height: f64,
}
