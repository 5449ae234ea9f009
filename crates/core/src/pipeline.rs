//! End-to-end: open rasters, align them if needed, flatten into a table.

use crate::align::{needs_alignment, Align, ResampleMethod};
use crate::error::{Error, Result};
use crate::io::{load_as, LoadOptions};
use crate::table::{make_table, Table, TableOptions};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// What to do when an input file cannot be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenErrorPolicy {
    /// Return the first error
    #[default]
    Abort,
    /// Log generic-open failures and continue with the remaining files.
    ///
    /// Malformed R raster metadata or payloads still abort.
    Skip,
}

/// Options for [`rasters_to_table_with`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub load: LoadOptions,
    pub table: TableOptions,
    pub on_open_error: OpenErrorPolicy,
    /// Sampling used by the native aligner
    pub resample: ResampleMethod,
}

impl PipelineOptions {
    /// Aligner used by [`rasters_to_table`]: GDAL's warper when the `gdal`
    /// feature is enabled, the native grid resampler otherwise.
    pub fn default_aligner(&self) -> Box<dyn Align> {
        #[cfg(feature = "gdal")]
        {
            Box::new(crate::align::GdalWarp)
        }
        #[cfg(not(feature = "gdal"))]
        {
            Box::new(crate::align::GridResampler::new(self.resample))
        }
    }
}

/// Build a feature table from raster files with default options.
///
/// # Example
/// ```ignore
/// let table = rasters_to_table(&["bio1.grd", "bio12.grd", "elev.tif"])?;
/// table.to_csv_path("features.csv")?;
/// ```
pub fn rasters_to_table<P: AsRef<Path>>(paths: &[P]) -> Result<Table> {
    let options = PipelineOptions::default();
    let aligner = options.default_aligner();
    rasters_to_table_with(paths, &options, aligner.as_ref())
}

/// Build a feature table from raster files.
///
/// Every path is opened with [`load_as`]. When the datasets do not all
/// share the first one's grid size, geotransform and projection, they
/// are passed to `aligner` with the first dataset as reference.
pub fn rasters_to_table_with<P: AsRef<Path>>(
    paths: &[P],
    options: &PipelineOptions,
    aligner: &dyn Align,
) -> Result<Table> {
    let mut rasters = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path.as_ref();
        match load_as(path, None, &options.load) {
            Ok(dataset) => rasters.push(dataset),
            // only failures of the generic backend are skippable
            Err(e @ Error::Open { .. }) if options.on_open_error == OpenErrorPolicy::Skip => {
                warn!(path = %path.display(), error = %e, "skipping raster");
            }
            Err(e) => return Err(e),
        }
    }

    if rasters.is_empty() {
        return Err(Error::EmptyInput);
    }

    if needs_alignment(&rasters) {
        debug!(
            aligner = aligner.name(),
            rasters = rasters.len(),
            "aligning rasters to the first grid"
        );
        let count = rasters.len();
        rasters = aligner.align(rasters, 0)?;
        if rasters.len() != count {
            return Err(Error::Other(format!(
                "aligner {} returned {} rasters for {} inputs",
                aligner.name(),
                rasters.len(),
                count
            )));
        }
    }

    make_table(&rasters, &options.table)
}
