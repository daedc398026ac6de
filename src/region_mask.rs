//! Named boolean region masks over a global cell geometry
//!
//! Masks are built from a `west,north,east,south` box or from a 0/1 text
//! bitmap. The geometry is passed explicitly to every constructor; the
//! conventional choice is [`RegionMask::default_grid_def`], the 5° global grid.

use crate::errors::{Result, SstAggError};
use crate::grid::{Grid, GridDef, SampleKind};
use std::fs;
use std::io;
use std::path::Path;
use tracing::debug;

/// Extent classification of a mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    Empty,
    Globe,
    NHemisphere,
    SHemisphere,
    Other,
}

impl Coverage {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Globe => "globe",
            Self::NHemisphere => "northern hemisphere",
            Self::SHemisphere => "southern hemisphere",
            Self::Other => "other",
        }
    }
}

/// Boolean membership grid identifying one region
#[derive(Debug, Clone)]
pub struct RegionMask {
    name: String,
    grid_def: GridDef,
    samples: Vec<bool>,
    coverage: Coverage,
}

impl RegionMask {
    /// The 72 x 36 global grid masks are usually defined on
    ///
    /// # Errors
    ///
    /// Never fails for the fixed dimensions; the `Result` mirrors [`GridDef`].
    pub fn default_grid_def() -> Result<GridDef> {
        GridDef::create_global_with_size(72, 36)
    }

    /// Rasterize the box `[west, east] x [south, north]` onto `grid_def`
    ///
    /// A box with `west > east` wraps across the anti-meridian.
    ///
    /// # Errors
    ///
    /// Returns an error if `north < south` or a coordinate lies outside the globe.
    pub fn from_bounds(
        name: &str,
        west: f64,
        north: f64,
        east: f64,
        south: f64,
        grid_def: &GridDef,
    ) -> Result<Self> {
        if north < south {
            return Err(SstAggError::InvalidArgument(format!(
                "region {}: north ({}) < south ({})",
                name, north, south
            )));
        }
        let width = grid_def.width();
        let rect = grid_def.grid_rectangle(west, south, east, north)?;
        let (min_x, max_x) = (rect.x, rect.max_x());
        let (min_y, max_y) = (rect.y, rect.max_y());

        let mut samples = vec![false; grid_def.cell_count()];
        for y in min_y..=max_y {
            let row = y as usize * width;
            if min_x <= max_x {
                for x in min_x..=max_x {
                    samples[row + x as usize] = true;
                }
            } else {
                for x in min_x..width as i64 {
                    samples[row + x as usize] = true;
                }
                for x in 0..=max_x {
                    samples[row + x as usize] = true;
                }
            }
        }
        Ok(Self::with_samples(name, *grid_def, samples))
    }

    /// Parse a bitmap of `height` lines holding `width` characters `0`/`1`
    ///
    /// Blank lines and lines starting with `#` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SstAggError::MaskFormat`] naming the offending line.
    pub fn from_bitmap(name: &str, bitmap: &str, grid_def: &GridDef) -> Result<Self> {
        let (width, height) = (grid_def.width(), grid_def.height());
        let mut samples = vec![false; grid_def.cell_count()];
        let mut y = 0_usize;
        let mut line_no = 0_usize;

        for (index, raw_line) in bitmap.split('\n').enumerate() {
            line_no = index + 1;
            let line = raw_line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let length = line.chars().count();
            if length != width {
                return Err(mask_format(
                    name,
                    format!(
                        "Illegal mask format in line {}: Line must contain exactly {} characters, but found {}.",
                        line_no, width, length
                    ),
                ));
            }
            if y >= height {
                return Err(mask_format(
                    name,
                    format!(
                        "Illegal mask format in line {}: Exactly {} lines are required, but found more.",
                        line_no, height
                    ),
                ));
            }
            for (x, c) in line.chars().enumerate() {
                match c {
                    '1' => samples[y * width + x] = true,
                    '0' => {}
                    _ => {
                        return Err(mask_format(
                            name,
                            format!(
                                "Illegal mask format in line {}: Only use characters '0' and '1'.",
                                line_no
                            ),
                        ))
                    }
                }
            }
            y += 1;
        }

        if y != height {
            return Err(mask_format(
                name,
                format!(
                    "Illegal mask format in line {}: Exactly {} lines are required, but found {}.",
                    line_no, height, y
                ),
            ));
        }
        Ok(Self::with_samples(name, *grid_def, samples))
    }

    /// Union of all masks
    ///
    /// Returns `None` for an empty slice and the sole mask unchanged for a
    /// single element; otherwise a mask named `Combined`.
    ///
    /// # Errors
    ///
    /// Returns an error if the masks are defined on different geometries.
    pub fn combine(masks: &[RegionMask]) -> Result<Option<RegionMask>> {
        match masks {
            [] => Ok(None),
            [single] => Ok(Some(single.clone())),
            [first, rest @ ..] => {
                let mut samples = first.samples.clone();
                for mask in rest {
                    if mask.grid_def != first.grid_def {
                        return Err(SstAggError::InvalidArgument(format!(
                            "cannot combine region {} with region {}: different geometries",
                            first.name, mask.name
                        )));
                    }
                    for (combined, &sample) in samples.iter_mut().zip(&mask.samples) {
                        *combined |= sample;
                    }
                }
                Ok(Some(Self::with_samples("Combined", first.grid_def, samples)))
            }
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn coverage(&self) -> Coverage {
        self.coverage
    }

    /// Membership of cell `(x, y)`, `false` outside the grid
    #[must_use]
    pub fn contains(&self, x: usize, y: usize) -> bool {
        x < self.grid_def.width()
            && y < self.grid_def.height()
            && self.samples[y * self.grid_def.width() + x]
    }

    /// Number of cells set
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.samples.iter().filter(|&&s| s).count()
    }

    fn with_samples(name: &str, grid_def: GridDef, samples: Vec<bool>) -> Self {
        let coverage = classify(&grid_def, &samples);
        debug!(region = name, coverage = coverage.as_str(), "created region mask");
        Self {
            name: name.to_string(),
            grid_def,
            samples,
            coverage,
        }
    }
}

fn mask_format(name: &str, message: String) -> SstAggError {
    SstAggError::MaskFormat {
        region: name.to_string(),
        message,
    }
}

fn classify(grid_def: &GridDef, samples: &[bool]) -> Coverage {
    let (width, height) = (grid_def.width(), grid_def.height());
    let total = width * height;
    let (mut n_globe, mut n_north, mut n_south) = (0, 0, 0);
    for (index, &set) in samples.iter().enumerate() {
        if !set {
            continue;
        }
        n_globe += 1;
        if index / width < height / 2 {
            n_north += 1;
        } else {
            n_south += 1;
        }
    }
    if n_globe == 0 {
        Coverage::Empty
    } else if n_globe == total {
        Coverage::Globe
    } else if n_north == n_globe && n_north == total / 2 {
        Coverage::NHemisphere
    } else if n_south == n_globe && n_south == total / 2 {
        Coverage::SHemisphere
    } else {
        Coverage::Other
    }
}

impl Grid for RegionMask {
    fn grid_def(&self) -> &GridDef {
        &self.grid_def
    }

    fn kind(&self) -> SampleKind {
        SampleKind::Boolean
    }

    fn sample_double(&self, x: usize, y: usize) -> Result<f64> {
        Ok(if self.sample_boolean(x, y)? { 1.0 } else { 0.0 })
    }

    fn sample_int(&self, x: usize, y: usize) -> Result<i32> {
        Ok(i32::from(self.sample_boolean(x, y)?))
    }

    fn sample_boolean(&self, x: usize, y: usize) -> Result<bool> {
        self.grid_def.check_index(x as i64, y as i64)?;
        Ok(self.samples[y * self.grid_def.width() + x])
    }
}

/// Ordered list of named region masks
#[derive(Debug, Clone, Default)]
pub struct RegionMaskList {
    masks: Vec<RegionMask>,
}

impl RegionMaskList {
    #[must_use]
    pub fn new(masks: Vec<RegionMask>) -> Self {
        Self { masks }
    }

    /// Parse `Name=W,N,E,S;Name=path/to/mask.txt;...`
    ///
    /// Entries with a single value after `=` name a bitmap file.
    ///
    /// # Errors
    ///
    /// Returns [`SstAggError::RegionList`] for malformed entries and an I/O
    /// error when a mask file cannot be read.
    pub fn parse(value: &str, grid_def: &GridDef) -> Result<Self> {
        let mut masks: Vec<RegionMask> = Vec::new();
        for entry in value.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let entry_no = masks.len() + 1;
            let (name, mask) = entry.split_once('=').ok_or_else(|| {
                SstAggError::RegionList(format!(
                    "Illegal region entry {}: is missing the '=' character.",
                    entry_no
                ))
            })?;
            let (name, mask) = (name.trim(), mask.trim());
            if name.is_empty() {
                return Err(SstAggError::RegionList(format!(
                    "Illegal region entry {}: Name is empty.",
                    entry_no
                )));
            }
            if mask.is_empty() {
                return Err(SstAggError::RegionList(format!(
                    "Illegal region entry {}: Mask is empty.",
                    entry_no
                )));
            }
            let parts: Vec<&str> = mask.split(',').map(str::trim).collect();
            let region = match parts.as_slice() {
                [w, n, e, s] => from_wnes(name, [w, n, e, s], entry_no, grid_def)?,
                [path] => from_mask_file(name, Path::new(path), entry_no, grid_def)?,
                _ => {
                    return Err(SstAggError::RegionList(format!(
                        "Illegal region entry {}: expected W,N,E,S or a mask file, found '{}'.",
                        entry_no, mask
                    )))
                }
            };
            masks.push(region);
        }
        Ok(Self { masks })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RegionMask> {
        self.masks.iter()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&RegionMask> {
        self.masks.get(index)
    }

    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.masks.iter().map(|m| m.name.clone()).collect()
    }

    /// Union of all masks, see [`RegionMask::combine`]
    ///
    /// # Errors
    ///
    /// Returns an error if the masks use different geometries.
    pub fn combined(&self) -> Result<Option<RegionMask>> {
        RegionMask::combine(&self.masks)
    }
}

impl<'a> IntoIterator for &'a RegionMaskList {
    type Item = &'a RegionMask;
    type IntoIter = std::slice::Iter<'a, RegionMask>;

    fn into_iter(self) -> Self::IntoIter {
        self.masks.iter()
    }
}

fn from_wnes(name: &str, wnes: [&&str; 4], entry_no: usize, grid_def: &GridDef) -> Result<RegionMask> {
    let mut values = [0.0_f64; 4];
    for (value, text) in values.iter_mut().zip(wnes) {
        *value = text.parse::<f64>().map_err(|_| {
            SstAggError::RegionList(format!(
                "Illegal region entry {}: Failed to parse W,N,E,S coordinates.",
                entry_no
            ))
        })?;
    }
    let [west, north, east, south] = values;
    if north < south {
        return Err(SstAggError::RegionList(format!(
            "Illegal region entry {}: N must not be less than S.",
            entry_no
        )));
    }
    RegionMask::from_bounds(name, west, north, east, south, grid_def)
}

fn from_mask_file(name: &str, path: &Path, entry_no: usize, grid_def: &GridDef) -> Result<RegionMask> {
    let bitmap = fs::read_to_string(path).map_err(|e| {
        SstAggError::IoError(io::Error::new(
            e.kind(),
            format!(
                "Illegal region entry {}: Failed to read mask file {}: {}",
                entry_no,
                path.display(),
                e
            ),
        ))
    })?;
    RegionMask::from_bitmap(name, &bitmap, grid_def)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hemisphere_boundary_rows() {
        let grid_def = RegionMask::default_grid_def().unwrap();
        let north = RegionMask::from_bounds("N", -180.0, 90.0, 180.0, 0.0, &grid_def).unwrap();
        assert!(north.contains(0, 17));
        assert!(!north.contains(0, 18));
        assert_eq!(north.cell_count(), 72 * 18);
    }
}
