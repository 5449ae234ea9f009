//! # gridtable core
//!
//! Turns a stack of geospatial rasters into a per-cell feature table.
//!
//! This crate provides:
//! - `RasterDataset`/`Band`: typed, georeferenced raster stacks
//! - `io::grd`: reader and writer for R raster `.grd`/`.gri` pairs
//! - `io::load`: format dispatch to the R raster reader or the generic
//!   backend (GDAL with the `gdal` feature, native GeoTIFF otherwise)
//! - `align`: putting rasters onto one reference grid
//! - `table`: flattening aligned rasters into rows with `x`/`y` cell centres
//! - `pipeline`: the whole chain from file paths to a [`Table`]

pub mod align;
pub mod crs;
pub mod error;
pub mod io;
pub mod pipeline;
pub mod raster;
pub mod table;

pub use crs::CRS;
pub use error::{Error, Result};
pub use pipeline::{rasters_to_table, rasters_to_table_with, OpenErrorPolicy, PipelineOptions};
pub use raster::{Band, BandData, DataType, GeoTransform, RasterDataset, RasterElement};
pub use table::{make_table, Row, Table, TableOptions, Value};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::align::{Align, GridResampler, ResampleMethod};
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::io::{load, load_as, LoadOptions, RasterFormat};
    pub use crate::pipeline::{rasters_to_table, rasters_to_table_with, PipelineOptions};
    pub use crate::raster::{Band, BandData, GeoTransform, RasterDataset};
    pub use crate::table::{make_table, Table, TableOptions, Value};
}
