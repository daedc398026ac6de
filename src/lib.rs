//! sst_aggregator: grid, region-mask and cell aggregation engine for satellite SST
//!
//! Turns per-pixel sea surface temperature products into regional averages and
//! coarser grids, propagating the random, correlated, coverage and adjustment
//! uncertainty components along the way.
//!
//! ## Key Features
//!
//! - **Grid geometry**: regular lat/lon grids with anti-meridian aware index arithmetic
//! - **Resampling**: NaN-aware block-mean downscaling and bilinear interpolation
//! - **Region masks**: boxes, ASCII bitmaps and region lists, classified by coverage
//! - **Aggregation**: pixels into 5° cells, 5° cells into 90° cells, cells into
//!   regional means, months into seasons and years
//! - **Parallel Processing**: disjoint cells accumulate concurrently with Rayon
//! - **NetCDF I/O**: source grids in, regional time series and gridded products out
//!
//! ## Module Organization
//!
//! - [`grid`]: geometry, sample grids, downscaling and interpolation
//! - [`region_mask`]: region masks and region lists
//! - [`resolution`]: supported spatial and temporal resolutions
//! - [`uncertainty`]: coverage and synoptic uncertainty models
//! - [`cell`]: accumulators and aggregation cells
//! - [`cell_grid`]: sparse grids of lazily created cells
//! - [`aggregator`]: the aggregation passes and time stepping
//! - [`config`]: run configuration
//! - [`netcdf_io`]: NetCDF reading and writing
//! - [`parallel`]: thread pool configuration
//! - [`errors`]: centralized error handling
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sst_aggregator::prelude::*;
//!
//! let mask_grid = RegionMask::default_grid_def().unwrap();
//! let regions = RegionMaskList::parse("Atlantic=-60,60,0,0;Global=-180,90,180,-90", &mask_grid).unwrap();
//! for region in &regions {
//!     println!("{} covers {} cells", region.name(), region.cell_count());
//! }
//! ```

pub mod aggregator;
pub mod cell;
pub mod cell_grid;
pub mod config;
pub mod errors;
pub mod grid;
pub mod netcdf_io;
pub mod parallel;
pub mod region_mask;
pub mod resolution;
pub mod uncertainty;

pub use aggregator::{Aggregator, Climatology, RegionalTimeStep, SourceGrids, SourceProvider, TimeStep};
pub use cell::{Aggregate, CellResults, ResultField};
pub use cell_grid::CellGrid;
pub use config::AggregationConfig;
pub use errors::{Result, SstAggError};
pub use grid::{ArrayGrid, Grid, GridDef};
pub use region_mask::{Coverage, RegionMask, RegionMaskList};
pub use resolution::{SpatialResolution, TemporalResolution};

/// Common imports for typical usage
pub mod prelude {
    pub use crate::aggregator::{
        aggregate_cell_grid, aggregate_regions, aggregate_sources, aggregate_to_coarser,
        cell_grid_for_region, must_aggregate_to_90, time_steps, Aggregator, Climatology,
        InMemorySources, RegionalTimeStep, SourceGrids, SourceProvider, TimeStep,
    };
    pub use crate::cell::{
        Aggregate, AggregationContext, Cell, CellOfCells, CellResults, MultiPeriodAggregation,
        ResultField, SamePeriodAggregation, SpatialCell,
    };
    pub use crate::cell_grid::CellGrid;
    pub use crate::config::AggregationConfig;
    pub use crate::errors::{Result, SstAggError};
    pub use crate::grid::{
        downscale, downscale_to, downscale_uniform, ArrayGrid, Grid, GridDef, Interpolation,
        SampleKind,
    };
    pub use crate::netcdf_io::{read_climatology, read_grid, read_time, NetCDFSources, NetCDFWriter};
    pub use crate::parallel::{ParallelConfig, ParallelInfo};
    pub use crate::region_mask::{Coverage, RegionMask, RegionMaskList};
    pub use crate::resolution::{SpatialResolution, TemporalResolution};
    pub use crate::uncertainty::{
        CorrelationLength, CorrelationLengths, CoverageUncertainty,
        RegriddingCoverageUncertaintyProvider, ScalarCoverageUncertaintyProvider,
        SynopticUncertaintyProvider,
    };
}
