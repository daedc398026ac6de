//! Array-backed sample grid

use super::{Grid, GridDef, SampleKind};
use crate::errors::{Result, SstAggError};
use ndarray::{Array2, ArrayView2, Axis};

/// Sample grid holding raw values in a `height x width` array
///
/// Geophysical values are `scaling * raw + offset`. A raw value matching the
/// fill value reads as `NaN`; a `NaN` fill value matches `NaN` raw values and
/// no fill value disables the test.
#[derive(Debug, Clone)]
pub struct ArrayGrid {
    grid_def: GridDef,
    data: Array2<f64>,
    fill_value: Option<f64>,
    scaling: f64,
    offset: f64,
    kind: SampleKind,
}

impl ArrayGrid {
    /// Wrap a raw sample array
    ///
    /// # Errors
    ///
    /// Returns an error if the array shape is not `(height, width)` of `grid_def`.
    pub fn new(
        grid_def: GridDef,
        data: Array2<f64>,
        fill_value: Option<f64>,
        scaling: f64,
        offset: f64,
    ) -> Result<Self> {
        let expected = (grid_def.height(), grid_def.width());
        if data.dim() != expected {
            return Err(SstAggError::InvalidArgument(format!(
                "sample array has shape {:?}, grid requires {:?}",
                data.dim(),
                expected
            )));
        }
        Ok(Self {
            grid_def,
            data,
            fill_value,
            scaling,
            offset,
            kind: SampleKind::Raw,
        })
    }

    /// Wrap a row-major sample buffer
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer length does not match the grid.
    pub fn from_vec(
        grid_def: GridDef,
        data: Vec<f64>,
        fill_value: Option<f64>,
        scaling: f64,
        offset: f64,
    ) -> Result<Self> {
        let data = Array2::from_shape_vec((grid_def.height(), grid_def.width()), data)?;
        Self::new(grid_def, data, fill_value, scaling, offset)
    }

    /// Double-precision grid with `NaN` fill, unit scaling and zero offset
    ///
    /// A missing buffer yields a zero-filled grid.
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer length does not match the grid.
    pub fn create_f64(grid_def: GridDef, data: Option<Vec<f64>>) -> Result<Self> {
        let data = data.unwrap_or_else(|| vec![0.0; grid_def.cell_count()]);
        Self::from_vec(grid_def, data, Some(f64::NAN), 1.0, 0.0)
    }

    /// Single-precision grid with `NaN` fill, unit scaling and zero offset
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer length does not match the grid.
    pub fn create_f32(grid_def: GridDef, data: Option<Vec<f32>>) -> Result<Self> {
        let data = data
            .map(|values| values.into_iter().map(f64::from).collect())
            .unwrap_or_else(|| vec![0.0; grid_def.cell_count()]);
        Self::from_vec(grid_def, data, Some(f64::NAN), 1.0, 0.0)
    }

    /// Flag grid from row-major booleans
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer length does not match the grid.
    pub fn from_booleans(grid_def: GridDef, flags: &[bool]) -> Result<Self> {
        let data = flags.iter().map(|&f| if f { 1.0 } else { 0.0 }).collect();
        Ok(Self::from_vec(grid_def, data, None, 1.0, 0.0)?.with_kind(SampleKind::Boolean))
    }

    /// Grid filled with one value
    ///
    /// # Errors
    ///
    /// Returns an error if the grid definition is degenerate.
    pub fn constant(grid_def: GridDef, value: f64) -> Result<Self> {
        let data = Array2::from_elem((grid_def.height(), grid_def.width()), value);
        Self::new(grid_def, data, None, 1.0, 0.0)
    }

    #[must_use]
    pub fn with_kind(mut self, kind: SampleKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub const fn scaling(&self) -> f64 {
        self.scaling
    }

    #[must_use]
    pub const fn offset(&self) -> f64 {
        self.offset
    }

    #[must_use]
    pub const fn fill_value(&self) -> Option<f64> {
        self.fill_value
    }

    /// Raw sample array, indexed `[[y, x]]`
    #[must_use]
    pub fn data(&self) -> ArrayView2<'_, f64> {
        self.data.view()
    }

    /// Overwrite the raw value of one sample
    ///
    /// # Errors
    ///
    /// Returns an error for indices outside the grid.
    pub fn set_sample(&mut self, x: usize, y: usize, raw: f64) -> Result<()> {
        self.grid_def.check_index(x as i64, y as i64)?;
        self.data[[y, x]] = raw;
        Ok(())
    }

    /// Whether a raw value encodes a missing sample
    #[must_use]
    pub fn is_fill(&self, raw: f64) -> bool {
        match self.fill_value {
            None => false,
            Some(fill) if fill.is_nan() => raw.is_nan(),
            Some(fill) => raw == fill,
        }
    }

    /// Same samples with the row order reversed, for south-up products
    #[must_use]
    pub fn flip_y(mut self) -> Self {
        self.data.invert_axis(Axis(0));
        let flipped = self.data.as_standard_layout().into_owned();
        self.data = flipped;
        self
    }

    fn raw(&self, x: usize, y: usize) -> Result<f64> {
        self.grid_def.check_index(x as i64, y as i64)?;
        Ok(self.data[[y, x]])
    }
}

impl Grid for ArrayGrid {
    fn grid_def(&self) -> &GridDef {
        &self.grid_def
    }

    fn kind(&self) -> SampleKind {
        self.kind
    }

    fn sample_double(&self, x: usize, y: usize) -> Result<f64> {
        let raw = self.raw(x, y)?;
        if self.is_fill(raw) {
            return Ok(f64::NAN);
        }
        Ok(self.scaling * raw + self.offset)
    }

    fn sample_int(&self, x: usize, y: usize) -> Result<i32> {
        Ok(self.raw(x, y)? as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_reverses_rows() {
        let grid_def = GridDef::create_global_with_size(2, 2).unwrap();
        let grid = ArrayGrid::from_vec(grid_def, vec![1.0, 2.0, 3.0, 4.0], None, 1.0, 0.0)
            .unwrap()
            .flip_y();
        assert_eq!(grid.sample_double(0, 0).unwrap(), 3.0);
        assert_eq!(grid.sample_double(1, 1).unwrap(), 2.0);
    }

    #[test]
    fn scaling_and_offset_apply_to_valid_samples() {
        let grid_def = GridDef::create_global_with_size(2, 1).unwrap();
        let grid =
            ArrayGrid::from_vec(grid_def, vec![2000.0, -32768.0], Some(-32768.0), 0.01, 273.15)
                .unwrap();
        assert!((grid.sample_double(0, 0).unwrap() - 293.15).abs() < 1e-9);
        assert!(grid.sample_double(1, 0).unwrap().is_nan());
        assert_eq!(grid.sample_int(1, 0).unwrap(), -32768);
    }
}
