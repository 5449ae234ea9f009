//! In-memory raster dataset: bands sharing one grid and georeference

use crate::crs::{same_crs, CRS};
use crate::error::{Error, Result};
use crate::raster::{Band, GeoTransform};
use std::path::Path;

/// A georeferenced stack of bands.
///
/// This is the handle every loader produces and the table builder
/// consumes. All bands share the dataset's `rows` x `cols` grid.
///
/// # Example
///
/// ```ignore
/// use gridtable_core::{Band, GeoTransform, RasterDataset};
///
/// let mut ds = RasterDataset::new("bio1.tif", 2, 2);
/// ds.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));
/// ds.add_band(Band::from_array(ndarray::array![[1.0f32, 2.0], [3.0, 4.0]]))?;
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RasterDataset {
    /// Source path, used to derive feature names
    description: String,
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    crs: Option<CRS>,
    bands: Vec<Band>,
}

impl RasterDataset {
    /// Create an empty dataset with the given grid size
    pub fn new(description: impl Into<String>, rows: usize, cols: usize) -> Self {
        Self {
            description: description.into(),
            rows,
            cols,
            transform: GeoTransform::default(),
            crs: None,
            bands: Vec::new(),
        }
    }

    /// Append a band; its shape must match the dataset grid
    pub fn add_band(&mut self, band: Band) -> Result<()> {
        let (rows, cols) = band.shape();
        if (rows, cols) != (self.rows, self.cols) {
            return Err(Error::SizeMismatch {
                er: self.rows,
                ec: self.cols,
                ar: rows,
                ac: cols,
            });
        }
        self.bands.push(band);
        Ok(())
    }

    pub fn with_band(mut self, band: Band) -> Result<Self> {
        self.add_band(band)?;
        Ok(self)
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Feature base name: the file name up to its first `.`
    pub fn base_name(&self) -> &str {
        let file_name = Path::new(&self.description)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.description);
        file_name.split('.').next().unwrap_or(file_name)
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of cells per band
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    /// Get a band by its 1-based index
    pub fn band(&self, index: usize) -> Option<&Band> {
        index.checked_sub(1).and_then(|i| self.bands.get(i))
    }

    pub fn into_bands(self) -> Vec<Band> {
        self.bands
    }

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Set the geotransform
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Set the CRS
    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols, self.rows)
    }

    /// Whether `other` sits on exactly the same grid: same size,
    /// same geotransform and an equivalent projection.
    pub fn is_aligned_with(&self, other: &RasterDataset) -> bool {
        self.shape() == other.shape()
            && self.transform == other.transform
            && same_crs(self.crs(), other.crs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_base_name() {
        let ds = RasterDataset::new("data/bioclim/current/bio1.tif", 1, 1);
        assert_eq!(ds.base_name(), "bio1");

        let ds = RasterDataset::new("elev.2020.grd", 1, 1);
        assert_eq!(ds.base_name(), "elev");
    }

    #[test]
    fn test_add_band_checks_shape() {
        let mut ds = RasterDataset::new("a.tif", 2, 2);
        assert!(ds.add_band(Band::from_array(array![[1u8, 2], [3, 4]])).is_ok());
        let err = ds.add_band(Band::from_array(array![[1u8, 2, 3]])).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { ar: 1, ac: 3, .. }));
        assert_eq!(ds.band_count(), 1);
        assert!(ds.band(0).is_none());
        assert!(ds.band(1).is_some());
    }

    #[test]
    fn test_alignment() {
        let a = RasterDataset::new("a.tif", 2, 2);
        let mut b = RasterDataset::new("b.tif", 2, 2);
        assert!(a.is_aligned_with(&b));

        b.set_transform(GeoTransform::new(0.5, 0.0, 1.0, -1.0));
        assert!(!a.is_aligned_with(&b));

        let mut c = RasterDataset::new("c.tif", 2, 2);
        c.set_crs(Some(CRS::from_epsg(4326)));
        assert!(!a.is_aligned_with(&c));
    }
}
