//! Reading rasters from disk.
//!
//! [`load`] dispatches on the file extension: `.grd`/`.gri` pairs go to the
//! R raster reader in [`grd`], everything else to the generic backend
//! (GDAL with the `gdal` feature, the native GeoTIFF reader otherwise).

#[cfg(feature = "gdal")]
mod gdal_io;
pub mod grd;
mod native;

#[cfg(feature = "gdal")]
pub(crate) use gdal_io::read_dataset;
#[cfg(feature = "gdal")]
pub use gdal_io::{open_dataset, to_mem_dataset};

pub use native::{read_geotiff, write_geotiff};

use crate::error::{Error, Result};
use crate::raster::RasterDataset;
use grd::GrdOptions;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

/// Format hint for [`load_as`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RasterFormat {
    /// R raster `.grd`/`.gri` pair
    RRaster,
    /// ESRI band-interleaved file, opened through the generic backend
    Bil,
    /// Anything the generic backend can open
    Generic,
}

impl RasterFormat {
    /// Infer the format from a file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("grd") | Some("gri") => RasterFormat::RRaster,
            Some("bil") => RasterFormat::Bil,
            _ => RasterFormat::Generic,
        }
    }
}

impl FromStr for RasterFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r-raster" => Ok(RasterFormat::RRaster),
            "bil" => Ok(RasterFormat::Bil),
            "generic" => Ok(RasterFormat::Generic),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for RasterFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RasterFormat::RRaster => "r-raster",
            RasterFormat::Bil => "bil",
            RasterFormat::Generic => "generic",
        })
    }
}

/// Options for [`load_as`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadOptions {
    pub grd: GrdOptions,
}

/// Open a raster with default options, inferring the format from its extension
pub fn load<P: AsRef<Path>>(path: P) -> Result<RasterDataset> {
    load_as(path, None, &LoadOptions::default())
}

/// Open a raster, optionally forcing its format.
///
/// Generic-backend failures are logged and returned as [`Error::Open`] so
/// callers can decide whether to skip the file or abort.
pub fn load_as<P: AsRef<Path>>(
    path: P,
    format: Option<RasterFormat>,
    options: &LoadOptions,
) -> Result<RasterDataset> {
    let path = path.as_ref();
    let format = format.unwrap_or_else(|| RasterFormat::from_path(path));
    debug!(path = %path.display(), %format, "loading raster");

    match format {
        RasterFormat::RRaster => grd::read_grd(path, &options.grd),
        RasterFormat::Bil | RasterFormat::Generic => open_generic(path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "could not open raster file");
            match e {
                Error::Open { .. } => e,
                other => Error::Open {
                    path: path.to_path_buf(),
                    reason: other.to_string(),
                },
            }
        }),
    }
}

#[cfg(feature = "gdal")]
fn open_generic(path: &Path) -> Result<RasterDataset> {
    gdal_io::open_dataset(path)
}

#[cfg(not(feature = "gdal"))]
fn open_generic(path: &Path) -> Result<RasterDataset> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("tif") | Some("tiff") => native::read_geotiff(path),
        _ => Err(Error::UnsupportedFormat(format!(
            "{} (enable the `gdal` feature for formats other than GeoTIFF)",
            path.display()
        ))),
    }
}
