//! Raster data structures

mod band;
mod dataset;
mod element;
mod geotransform;

pub use band::{Band, BandData};
pub use dataset::RasterDataset;
pub use element::{DataType, RasterElement};
pub use geotransform::GeoTransform;
