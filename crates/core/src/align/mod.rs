//! Putting rasters onto one common grid.
//!
//! An [`Align`] implementation takes N datasets and returns N datasets in
//! the same order, all sharing the reference dataset's geotransform, grid
//! size and projection.

mod resample;
#[cfg(feature = "gdal")]
mod warp;

pub use resample::{GridResampler, ResampleMethod};
#[cfg(feature = "gdal")]
pub use warp::GdalWarp;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::RasterDataset;

/// Strategy for bringing rasters onto a reference grid
pub trait Align {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Align every raster to `rasters[reference]`.
    ///
    /// The result has the same length and order as the input.
    fn align(&self, rasters: Vec<RasterDataset>, reference: usize) -> Result<Vec<RasterDataset>>;
}

/// Whether any raster differs from the first in grid size, geotransform
/// or projection
pub fn needs_alignment(rasters: &[RasterDataset]) -> bool {
    match rasters.split_first() {
        Some((first, rest)) => rest.iter().any(|r| !r.is_aligned_with(first)),
        None => false,
    }
}

pub(crate) fn reference_index(rasters: &[RasterDataset], reference: usize) -> Result<()> {
    if rasters.is_empty() {
        return Err(Error::EmptyInput);
    }
    if reference >= rasters.len() {
        return Err(Error::Other(format!(
            "reference index {} out of range for {} rasters",
            reference,
            rasters.len()
        )));
    }
    Ok(())
}

pub(crate) fn crs_mismatch(a: Option<&CRS>, b: Option<&CRS>) -> Error {
    let name = |crs: Option<&CRS>| crs.map(CRS::identifier).unwrap_or_else(|| "none".to_string());
    Error::CrsMismatch(name(a), name(b))
}
