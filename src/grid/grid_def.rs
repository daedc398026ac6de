//! Regular equirectangular grid geometry
//!
//! A [`GridDef`] maps integer cell indices to geographic coordinates and back.
//! Column indices grow eastwards from `easting`, row indices grow southwards
//! from `northing`.

use super::{GridRect, LonLatRect};
use crate::errors::{Result, SstAggError};
use std::hash::{Hash, Hasher};

/// Mean Earth radius in kilometres
pub const EARTH_RADIUS_KM: f64 = 6371.0;

const RECTANGLE_EPS: f64 = 1.0e-10;

/// Geometry of a regular lat/lon raster
#[derive(Debug, Clone, Copy)]
pub struct GridDef {
    width: usize,
    height: usize,
    easting: f64,
    northing: f64,
    resolution_x: f64,
    resolution_y: f64,
}

impl GridDef {
    /// Create a grid with an explicit origin and cell size
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero.
    pub fn new(
        width: usize,
        height: usize,
        easting: f64,
        northing: f64,
        resolution_x: f64,
        resolution_y: f64,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SstAggError::InvalidArgument(format!(
                "grid dimensions must be positive, got {} x {}",
                width, height
            )));
        }
        Ok(Self {
            width,
            height,
            easting,
            northing,
            resolution_x,
            resolution_y,
        })
    }

    /// Create a global grid with square cells of `resolution` degrees
    ///
    /// # Errors
    ///
    /// Returns an error if the resolution is not positive or coarser than 180°.
    pub fn create_global(resolution: f64) -> Result<Self> {
        if !(resolution > 0.0) {
            return Err(SstAggError::InvalidArgument(format!(
                "resolution must be positive, got {}",
                resolution
            )));
        }
        let width = (360.0 / resolution).round() as usize;
        let height = (180.0 / resolution).round() as usize;
        Self::new(width, height, -180.0, 90.0, resolution, resolution)
    }

    /// Create a global grid with the given number of columns and rows
    ///
    /// # Errors
    ///
    /// Returns an error if either dimension is zero.
    pub fn create_global_with_size(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(SstAggError::InvalidArgument(format!(
                "grid dimensions must be positive, got {} x {}",
                width, height
            )));
        }
        Self::new(
            width,
            height,
            -180.0,
            90.0,
            360.0 / width as f64,
            180.0 / height as f64,
        )
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    #[must_use]
    pub const fn easting(&self) -> f64 {
        self.easting
    }

    #[must_use]
    pub const fn northing(&self) -> f64 {
        self.northing
    }

    #[must_use]
    pub const fn resolution_x(&self) -> f64 {
        self.resolution_x
    }

    #[must_use]
    pub const fn resolution_y(&self) -> f64 {
        self.resolution_y
    }

    /// Square cell size in degrees
    ///
    /// # Errors
    ///
    /// Returns an error if the cells are not square.
    pub fn resolution(&self) -> Result<f64> {
        if self.resolution_x != self.resolution_y {
            return Err(SstAggError::InvalidArgument(format!(
                "resolutionX ({}) != resolutionY ({})",
                self.resolution_x, self.resolution_y
            )));
        }
        Ok(self.resolution_y)
    }

    /// Number of cells in the grid
    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Fail unless `(x, y)` addresses a cell of this grid
    ///
    /// # Errors
    ///
    /// Returns [`SstAggError::IndexOutOfRange`] for indices outside the grid.
    pub fn check_index(&self, x: i64, y: i64) -> Result<()> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return Err(SstAggError::IndexOutOfRange {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Map any column index onto `[0, width)`
    #[must_use]
    pub fn wrap_x(&self, x: i64) -> usize {
        let width = self.width as i64;
        x.rem_euclid(width) as usize
    }

    /// Column containing longitude `lon`
    ///
    /// With `crop` the result is clamped to `[0, width-1]`.
    ///
    /// # Errors
    ///
    /// Returns an error if `lon` is outside `[-180, 180]`.
    pub fn grid_x(&self, lon: f64, crop: bool) -> Result<i64> {
        if !(-180.0..=180.0).contains(&lon) {
            return Err(SstAggError::InvalidArgument(format!(
                "longitude {} outside [-180, 180]",
                lon
            )));
        }
        let x = ((lon - self.easting) / self.resolution_x).floor() as i64;
        if crop {
            return Ok(x.clamp(0, self.width as i64 - 1));
        }
        Ok(x)
    }

    /// Row containing latitude `lat`
    ///
    /// With `crop` the result is clamped to `[0, height-1]`.
    ///
    /// # Errors
    ///
    /// Returns an error if `lat` is outside `[-90, 90]`.
    pub fn grid_y(&self, lat: f64, crop: bool) -> Result<i64> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(SstAggError::InvalidArgument(format!(
                "latitude {} outside [-90, 90]",
                lat
            )));
        }
        let y = ((self.northing - lat) / self.resolution_y).floor() as i64;
        if crop {
            return Ok(y.clamp(0, self.height as i64 - 1));
        }
        Ok(y)
    }

    /// Longitude of the western edge of continuous column position `x`
    ///
    /// # Errors
    ///
    /// Returns an error if the longitude falls outside `[-180, 180]`.
    pub fn lon(&self, x: f64) -> Result<f64> {
        let lon = self.easting + self.resolution_x * x;
        if !(-180.0..=180.0).contains(&lon) {
            return Err(SstAggError::InvalidArgument(format!(
                "longitude {} for column {} is out of range",
                lon, x
            )));
        }
        Ok(lon)
    }

    /// Latitude of the northern edge of continuous row position `y`
    ///
    /// # Errors
    ///
    /// Returns an error if the latitude falls outside `[-90, 90]`.
    pub fn lat(&self, y: f64) -> Result<f64> {
        let lat = self.northing - self.resolution_y * y;
        if !(-90.0..=90.0).contains(&lat) {
            return Err(SstAggError::InvalidArgument(format!(
                "latitude {} for row {} is out of range",
                lat, y
            )));
        }
        Ok(lat)
    }

    /// Longitude of the center of column `x`
    ///
    /// # Errors
    ///
    /// Returns an error for columns outside the globe; indices are never clamped.
    pub fn center_lon(&self, x: i64) -> Result<f64> {
        self.lon(x as f64 + 0.5)
    }

    /// Latitude of the center of row `y`
    ///
    /// # Errors
    ///
    /// Returns an error for rows outside the globe; indices are never clamped.
    pub fn center_lat(&self, y: i64) -> Result<f64> {
        self.lat(y as f64 + 0.5)
    }

    /// Great-circle length of the diagonal of cell `(x, y)` in kilometres
    ///
    /// # Errors
    ///
    /// Returns an error if the cell corner lies outside the globe.
    pub fn diagonal(&self, x: i64, y: i64) -> Result<f64> {
        let lon1 = self.lon(x as f64)?;
        let lat1 = self.lat(y as f64)?;
        let lon2 = lon1 + self.resolution_x;
        let lat2 = lat1 - self.resolution_y;
        Ok(sphere_distance_deg(EARTH_RADIUS_KM, lon1, lat1, lon2, lat2))
    }

    /// Geographic extent of cell `(x, y)`, anchored at its south-west corner
    ///
    /// # Errors
    ///
    /// Returns an error if the cell lies outside the globe.
    pub fn lon_lat_rectangle(&self, x: i64, y: i64) -> Result<LonLatRect> {
        let lon = self.lon(x as f64)?;
        let lat = self.lat(y as f64 + 1.0)?;
        Ok(LonLatRect {
            lon,
            lat,
            width: self.resolution_x,
            height: self.resolution_y,
        })
    }

    /// Cells covered by the box `[lon1, lon2] x [lat1, lat2]`
    ///
    /// Edges lying exactly on a cell boundary do not pull in the neighbouring
    /// cell. When `lon2 < lon1` the returned width is negative; callers that
    /// handle anti-meridian boxes split it themselves.
    ///
    /// # Errors
    ///
    /// Returns an error if a coordinate lies outside the globe.
    pub fn grid_rectangle(&self, lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> Result<GridRect> {
        let x1 = self.grid_x(lon1, true)?;
        let x2 = self.grid_x(lon2 - RECTANGLE_EPS, true)?;
        let y1 = self.grid_y(lat2, true)?;
        let y2 = self.grid_y(lat1 + RECTANGLE_EPS, true)?;
        Ok(GridRect::new(x1, y1, x2 - x1 + 1, y2 - y1 + 1))
    }

    /// Cells covered by a geographic rectangle
    ///
    /// # Errors
    ///
    /// Returns an error if a corner lies outside the globe.
    pub fn grid_rectangle_of(&self, rect: &LonLatRect) -> Result<GridRect> {
        self.grid_rectangle(rect.lon, rect.lat, rect.lon + rect.width, rect.lat + rect.height)
    }

    /// Cells of this grid covered by cell `(x, y)` of the coarser grid `coarser`
    ///
    /// # Errors
    ///
    /// Returns an error if `coarser` is finer than this grid, or if its
    /// resolution is not an integer multiple of this grid's resolution.
    pub fn grid_rectangle_for_cell(&self, x: i64, y: i64, coarser: &GridDef) -> Result<GridRect> {
        if coarser.resolution()? < self.resolution()? {
            return Err(SstAggError::InvalidArgument(
                "Expected a grid with a coarser resolution than this grid.".to_string(),
            ));
        }
        let ratio_x = integer_ratio(coarser.resolution_x, self.resolution_x)?;
        let ratio_y = integer_ratio(coarser.resolution_y, self.resolution_y)?;
        Ok(GridRect::new(x * ratio_x, y * ratio_y, ratio_x, ratio_y))
    }
}

fn integer_ratio(coarse: f64, fine: f64) -> Result<i64> {
    let ratio = coarse / fine;
    let rounded = ratio.round();
    if rounded < 1.0 || (ratio - rounded).abs() > 1.0e-6 {
        return Err(SstAggError::InvalidArgument(format!(
            "resolution {} is not an integer multiple of {}",
            coarse, fine
        )));
    }
    Ok(rounded as i64)
}

/// Haversine distance between two points given in degrees
#[must_use]
pub fn sphere_distance_deg(radius: f64, lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * radius * a.sqrt().min(1.0).asin()
}

impl PartialEq for GridDef {
    fn eq(&self, other: &Self) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.easting.to_bits() == other.easting.to_bits()
            && self.northing.to_bits() == other.northing.to_bits()
            && self.resolution_x.to_bits() == other.resolution_x.to_bits()
            && self.resolution_y.to_bits() == other.resolution_y.to_bits()
    }
}

impl Eq for GridDef {}

impl Hash for GridDef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.width.hash(state);
        self.height.hash(state);
        self.easting.to_bits().hash(state);
        self.northing.to_bits().hash(state);
        self.resolution_x.to_bits().hash(state);
        self.resolution_y.to_bits().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_ratio_rejects_fractional_multiples() {
        assert_eq!(integer_ratio(5.0, 0.05).ok(), Some(100));
        assert!(integer_ratio(5.0, 2.0).is_err());
    }

    #[test]
    fn haversine_quarter_circle() {
        let d = sphere_distance_deg(EARTH_RADIUS_KM, -180.0, 90.0, -90.0, 0.0);
        assert!((d - std::f64::consts::FRAC_PI_2 * EARTH_RADIUS_KM).abs() < 1e-9);
    }
}
