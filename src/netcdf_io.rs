//! NetCDF input of source grids and output of aggregation results
//!
//! Sources are read into [`ArrayGrid`]s honoring `_FillValue`, `scale_factor`
//! and `add_offset`. Results are written either as regional time series
//! (`time` x `region`) or as a gridded product (`lat` x `lon`).

use crate::aggregator::{Climatology, RegionalTimeStep, SourceGrids, SourceProvider, TimeStep};
use crate::cell::{Aggregate, ResultField};
use crate::cell_grid::CellGrid;
use crate::config::{ClimatologyVariables, SourceVariables};
use crate::errors::{Result, SstAggError};
use crate::grid::{ArrayGrid, Grid, GridDef};
use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};
use ndarray::{Array1, Array2};
use netcdf::{AttributeValue, File, Variable};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::{fs, iter};
use tracing::debug;

/// Reference date of the output time axis
pub const TIME_EPOCH: &str = "1981-01-01";

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1981, 1, 1).unwrap_or_default()
}

fn attribute_f64(var: &Variable, name: &str) -> Option<f64> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Double(v) => Some(v),
        AttributeValue::Float(v) => Some(f64::from(v)),
        AttributeValue::Int(v) => Some(f64::from(v)),
        AttributeValue::Uint(v) => Some(f64::from(v)),
        AttributeValue::Short(v) => Some(f64::from(v)),
        AttributeValue::Ushort(v) => Some(f64::from(v)),
        AttributeValue::Schar(v) => Some(f64::from(v)),
        AttributeValue::Uchar(v) => Some(f64::from(v)),
        _ => None,
    }
}

fn attribute_str(var: &Variable, name: &str) -> Option<String> {
    match var.attribute(name)?.value().ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

/// Read the first 2-D slice of `var_name` on `grid_def`
///
/// Variables may be `(lat, lon)` or `(time, lat, lon)`. With `flip_y` rows are
/// reversed so that row 0 is the northernmost.
///
/// # Errors
///
/// Returns an error if the variable is missing, has another rank, or its
/// shape does not match `grid_def`.
pub fn read_grid(file: &File, var_name: &str, grid_def: &GridDef, flip_y: bool) -> Result<ArrayGrid> {
    let var = file
        .variable(var_name)
        .ok_or_else(|| SstAggError::VariableNotFound {
            var: var_name.to_string(),
        })?;
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    let (h, w) = (grid_def.height(), grid_def.width());

    let data: Vec<f64> = match shape.as_slice() {
        [rows, cols] if (*rows, *cols) == (h, w) => var.get_values::<f64, _>((0..h, 0..w))?,
        [t, rows, cols] if *t > 0 && (*rows, *cols) == (h, w) => {
            var.get_values::<f64, _>((0..1, 0..h, 0..w))?
        }
        _ => {
            return Err(SstAggError::InvalidArgument(format!(
                "variable '{}' has shape {:?}, expected [{}, {}] or [time, {}, {}]",
                var_name, shape, h, w, h, w
            )))
        }
    };

    let fill_value = attribute_f64(&var, "_FillValue");
    let scaling = attribute_f64(&var, "scale_factor").unwrap_or(1.0);
    let offset = attribute_f64(&var, "add_offset").unwrap_or(0.0);
    debug!(
        var = var_name,
        ?fill_value,
        scaling,
        offset,
        "read source grid"
    );

    let grid = ArrayGrid::from_vec(*grid_def, data, fill_value, scaling, offset)?;
    Ok(if flip_y { grid.flip_y() } else { grid })
}

/// Global geometry of the last two dimensions of `var_name`
///
/// # Errors
///
/// Returns an error if the variable is missing or has fewer than two dimensions.
pub fn global_grid_def(file: &File, var_name: &str) -> Result<GridDef> {
    let var = file
        .variable(var_name)
        .ok_or_else(|| SstAggError::VariableNotFound {
            var: var_name.to_string(),
        })?;
    let shape: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
    match shape.as_slice() {
        [.., h, w] => GridDef::create_global_with_size(*w, *h),
        _ => Err(SstAggError::InvalidArgument(format!(
            "variable '{}' is not gridded",
            var_name
        ))),
    }
}

/// Whether the `lat` coordinate runs south to north
#[must_use]
pub fn is_south_up(file: &File) -> bool {
    let Some(lat) = file.variable("lat") else {
        return false;
    };
    let n = lat.dimensions().first().map_or(0, |d| d.len());
    if n < 2 {
        return false;
    }
    match lat.get_values::<f64, _>(0..n) {
        Ok(values) => values[0] < values[n - 1],
        Err(_) => false,
    }
}

/// Date of the first value of the `time` variable
///
/// The `units` attribute must read `"<unit> since <date>"` with the unit one
/// of seconds, minutes, hours or days.
///
/// # Errors
///
/// Returns an error if `time` is missing or its units cannot be interpreted.
pub fn read_time(file: &File) -> Result<NaiveDate> {
    let var = file
        .variable("time")
        .ok_or_else(|| SstAggError::VariableNotFound {
            var: "time".to_string(),
        })?;
    let units = attribute_str(&var, "units").ok_or_else(|| {
        SstAggError::Generic("time variable has no units attribute".to_string())
    })?;
    let value = var
        .get_values::<f64, _>(0..1)?
        .first()
        .copied()
        .ok_or_else(|| SstAggError::Generic("time variable is empty".to_string()))?;
    let (unit, reference) = parse_time_units(&units)?;
    let seconds = match unit.as_str() {
        "seconds" | "second" | "s" => value,
        "minutes" | "minute" => value * 60.0,
        "hours" | "hour" | "h" => value * 3600.0,
        "days" | "day" | "d" => value * 86400.0,
        other => {
            return Err(SstAggError::Generic(format!(
                "unsupported time unit '{}'",
                other
            )))
        }
    };
    Ok((reference + Duration::seconds(seconds.round() as i64)).date())
}

fn parse_time_units(units: &str) -> Result<(String, NaiveDateTime)> {
    let (unit, date) = units
        .split_once(" since ")
        .ok_or_else(|| SstAggError::Generic(format!("cannot interpret time units '{}'", units)))?;
    let date = date.trim().trim_end_matches('Z').trim_end_matches(" UTC");
    let reference = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(date, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(date, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| SstAggError::Generic(format!("cannot parse reference date '{}'", date)))?;
    Ok((unit.trim().to_lowercase(), reference))
}

/// Read analysed SST and sea area fraction, deriving the geometry from the SST variable
///
/// # Errors
///
/// Returns an error if either variable cannot be read.
pub fn read_climatology(path: &Path, names: &ClimatologyVariables, flip_y: bool) -> Result<Climatology> {
    let file = netcdf::open(path)?;
    let grid_def = global_grid_def(&file, &names.analysed_sst)?;
    let flip = flip_y || is_south_up(&file);
    let sst = read_grid(&file, &names.analysed_sst, &grid_def, flip)?;
    let sea_coverage = read_grid(&file, &names.sea_area_fraction, &grid_def, flip)?;
    Climatology::new(Arc::new(sst), Arc::new(sea_coverage))
}

/// Dated NetCDF source products
#[derive(Debug, Clone)]
pub struct NetCDFSources {
    files: Vec<(PathBuf, NaiveDate)>,
    variables: SourceVariables,
    flip_y: bool,
}

impl NetCDFSources {
    /// Open every file once to read its date
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be opened or carries no readable time.
    pub fn scan(paths: &[PathBuf], variables: SourceVariables, flip_y: bool) -> Result<Self> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            let file = netcdf::open(path)?;
            let date = read_time(&file)?;
            debug!(file = %path.display(), %date, "scanned source");
            files.push((path.clone(), date));
        }
        files.sort_by_key(|(_, date)| *date);
        Ok(Self {
            files,
            variables,
            flip_y,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// First and last product dates
    #[must_use]
    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.files.first()?.1, self.files.last()?.1))
    }
}

impl SourceProvider for NetCDFSources {
    type Source = (PathBuf, NaiveDate);

    fn sources(&self, step: &TimeStep) -> Result<Vec<Self::Source>> {
        Ok(self
            .files
            .iter()
            .filter(|(_, date)| step.contains(*date))
            .cloned()
            .collect())
    }

    fn load(&self, source: &Self::Source) -> Result<SourceGrids> {
        let (path, date) = source;
        let file = netcdf::open(path)?;
        let vars = &self.variables;
        let grid_def = global_grid_def(&file, &vars.sst)?;
        let flip = self.flip_y || is_south_up(&file);

        let optional = |name: &Option<String>| -> Result<Option<Arc<dyn Grid>>> {
            match name {
                Some(name) if file.variable(name).is_some() => {
                    Ok(Some(Arc::new(read_grid(&file, name, &grid_def, flip)?) as Arc<dyn Grid>))
                }
                Some(name) => {
                    debug!(file = %path.display(), var = %name, "optional variable absent");
                    Ok(None)
                }
                None => Ok(None),
            }
        };

        let mut grids = SourceGrids::new(*date, Arc::new(read_grid(&file, &vars.sst, &grid_def, flip)?));
        grids.quality = optional(&vars.quality)?;
        grids.random_uncertainty = optional(&vars.random_uncertainty)?;
        grids.large_scale_uncertainty = optional(&vars.large_scale_uncertainty)?;
        grids.adjustment_uncertainty = optional(&vars.adjustment_uncertainty)?;
        grids.synoptic_uncertainty = optional(&vars.synoptic_uncertainty)?;
        grids.standard_deviation = optional(&vars.standard_deviation)?;
        grids.sea_ice_fraction = optional(&vars.sea_ice_fraction)?;
        Ok(grids)
    }

    fn describe(&self, source: &Self::Source) -> String {
        source.0.display().to_string()
    }
}

/// Writer for aggregation results
pub struct NetCDFWriter<'a> {
    output_path: &'a Path,
}

impl<'a> NetCDFWriter<'a> {
    #[must_use]
    pub fn new(output_path: &'a Path) -> Self {
        Self { output_path }
    }

    fn create(&self) -> Result<netcdf::FileMut> {
        if self.output_path.exists() {
            fs::remove_file(self.output_path)?;
        }
        Ok(netcdf::create(self.output_path)?)
    }

    /// Write one value per time step and region for every result field
    ///
    /// # Errors
    ///
    /// Returns an error if a step does not hold one result per region or the
    /// file cannot be written.
    pub fn write_regional_averages(&self, steps: &[RegionalTimeStep], region_names: &[String]) -> Result<()> {
        let (n_time, n_region) = (steps.len(), region_names.len());
        if let Some(step) = steps.iter().find(|s| s.results.len() != n_region) {
            return Err(SstAggError::InvalidArgument(format!(
                "time step starting {} holds {} results for {} regions",
                step.step.start,
                step.results.len(),
                n_region
            )));
        }

        let mut file = self.create()?;
        file.add_dimension("time", n_time)?;
        file.add_dimension("region", n_region)?;
        file.add_dimension("bnds", 2)?;

        let time_steps: Vec<TimeStep> = steps.iter().map(|s| s.step).collect();
        write_time(&mut file, &time_steps)?;

        {
            let mut region = file.add_variable::<i32>("region", &["region"])?;
            region.put_attribute("long_name", "region index")?;
            region.put_attribute("region_names", region_names.to_vec())?;
            let indices: Array1<i32> = (0..n_region as i32).collect();
            region.put(indices.view(), ..)?;
        }

        for field in ResultField::ALL {
            let values = Array2::from_shape_fn((n_time, n_region), |(t, r)| {
                steps[t].results[r].get(field) as f32
            });
            let mut var = file.add_variable::<f32>(field.netcdf_name(), &["time", "region"])?;
            put_field_attributes(&mut var, field)?;
            var.put(values.view(), ..)?;
        }

        put_history(&mut file, "regional averages")?;
        Ok(())
    }

    /// Write the cells of one time step as a `lat` x `lon` product
    ///
    /// Absent and empty cells are written as `NaN`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_cell_grid<C: Aggregate>(&self, step: &TimeStep, cell_grid: &CellGrid<C>) -> Result<()> {
        let grid_def = cell_grid.grid_def();
        let (w, h) = (grid_def.width(), grid_def.height());

        let mut file = self.create()?;
        file.add_dimension("time", 1)?;
        file.add_dimension("lat", h)?;
        file.add_dimension("lon", w)?;
        file.add_dimension("bnds", 2)?;
        write_time(&mut file, std::slice::from_ref(step))?;

        let lats: Array1<f64> = (0..h)
            .map(|y| grid_def.center_lat(y as i64))
            .collect::<Result<_>>()?;
        let lons: Array1<f64> = (0..w)
            .map(|x| grid_def.center_lon(x as i64))
            .collect::<Result<_>>()?;
        {
            let mut lat = file.add_variable::<f64>("lat", &["lat"])?;
            lat.put_attribute("units", "degrees_north")?;
            lat.put_attribute("standard_name", "latitude")?;
            lat.put(lats.view(), ..)?;
        }
        {
            let mut lon = file.add_variable::<f64>("lon", &["lon"])?;
            lon.put_attribute("units", "degrees_east")?;
            lon.put_attribute("standard_name", "longitude")?;
            lon.put(lons.view(), ..)?;
        }

        let mut results = vec![None; w * h];
        let mut counts = Array2::<i32>::zeros((h, w));
        for (x, y, cell) in cell_grid.non_empty() {
            results[y * w + x] = Some(cell.results());
            counts[[y, x]] = i32::try_from(cell.sample_count()).unwrap_or(i32::MAX);
        }

        for field in ResultField::ALL {
            let values = Array2::from_shape_fn((h, w), |(y, x)| {
                results[y * w + x].map_or(f32::NAN, |r| r.get(field) as f32)
            });
            let mut var = file.add_variable::<f32>(field.netcdf_name(), &["lat", "lon"])?;
            put_field_attributes(&mut var, field)?;
            var.put(values.view(), ..)?;
        }
        {
            let mut count = file.add_variable::<i32>("sample_count", &["lat", "lon"])?;
            count.put_attribute("long_name", "number of valid samples")?;
            count.put(counts.view(), ..)?;
        }

        put_history(&mut file, "regridded cells")?;
        Ok(())
    }
}

fn write_time(file: &mut netcdf::FileMut, steps: &[TimeStep]) -> Result<()> {
    let days = |date: NaiveDate| (date - epoch()).num_days() as f64;
    let centers: Array1<f64> = steps.iter().map(|s| days(s.center())).collect();
    let bounds: Vec<f64> = steps
        .iter()
        .flat_map(|s| iter::once(days(s.start)).chain(iter::once(days(s.end))))
        .collect();
    let bounds = Array2::from_shape_vec((steps.len(), 2), bounds)?;

    let units = format!("days since {} 00:00:00", TIME_EPOCH);
    {
        let mut time = file.add_variable::<f64>("time", &["time"])?;
        time.put_attribute("units", units.as_str())?;
        time.put_attribute("standard_name", "time")?;
        time.put_attribute("bounds", "time_bnds")?;
        time.put(centers.view(), ..)?;
    }

    let mut time_bnds = file.add_variable::<f64>("time_bnds", &["time", "bnds"])?;
    time_bnds.put_attribute("units", units.as_str())?;
    time_bnds.put(bounds.view(), ..)?;
    Ok(())
}

fn put_field_attributes(var: &mut netcdf::VariableMut, field: ResultField) -> Result<()> {
    var.put_attribute("_FillValue", f32::NAN)?;
    var.put_attribute("long_name", field.long_name())?;
    var.put_attribute("units", field.units())?;
    Ok(())
}

fn put_history(file: &mut netcdf::FileMut, what: &str) -> Result<()> {
    file.add_attribute(
        "history",
        format!(
            "{} created by sst-aggregator {} on {}",
            what,
            env!("CARGO_PKG_VERSION"),
            Utc::now().to_rfc3339()
        ),
    )?;
    Ok(())
}
