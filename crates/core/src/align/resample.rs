//! Native resampling onto a reference grid (no reprojection)

use super::{crs_mismatch, reference_index, Align};
use crate::crs::{same_crs, CRS};
use crate::error::Result;
use crate::raster::{Band, BandData, GeoTransform, RasterDataset};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Cell sampling method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResampleMethod {
    /// Value of the source cell containing the target centre; keeps the band type
    #[default]
    Nearest,
    /// Distance-weighted mean of the four surrounding source centres; yields Float64
    Bilinear,
}

/// Resamples rasters onto the reference grid.
///
/// Only works when every projection is equivalent to the reference one;
/// otherwise [`crate::Error::CrsMismatch`] is returned. Target cells that
/// fall outside a source raster get the band's nodata value. A band
/// without one gets NaN, or under nearest sampling of an integer band the
/// type's default sentinel, which then becomes the band's nodata.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct GridResampler {
    pub method: ResampleMethod,
}

struct Grid {
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    crs: Option<CRS>,
}

impl GridResampler {
    pub fn new(method: ResampleMethod) -> Self {
        Self { method }
    }

    fn resample(&self, raster: RasterDataset, grid: &Grid) -> Result<RasterDataset> {
        if !same_crs(raster.crs(), grid.crs.as_ref()) {
            return Err(crs_mismatch(raster.crs(), grid.crs.as_ref()));
        }

        debug!(
            raster = raster.description(),
            method = ?self.method,
            from = ?raster.shape(),
            to = ?(grid.rows, grid.cols),
            "resampling raster"
        );

        let src = *raster.transform();
        let (src_rows, src_cols) = raster.shape();
        // fractional source (col, row) under each target cell centre
        let locate = |r: usize, c: usize| {
            let (x, y) = grid.transform.pixel_to_geo(c, r);
            src.geo_to_pixel(x, y)
        };

        let mut out = RasterDataset::new(raster.description(), grid.rows, grid.cols);
        out.set_transform(grid.transform);
        out.set_crs(grid.crs.clone());

        for band in raster.into_bands() {
            // integer bands keep their type under nearest sampling, so an
            // outside cell needs a sentinel the type can hold
            let data_type = band.data_type();
            let nodata = match self.method {
                ResampleMethod::Nearest if !data_type.is_float() => {
                    band.nodata().or(Some(data_type.default_nodata()))
                }
                _ => band.nodata(),
            };
            let fill = nodata.unwrap_or(f64::NAN);
            let data = match self.method {
                ResampleMethod::Nearest => band.data().remap(grid.rows, grid.cols, fill, |r, c| {
                    let (col, row) = locate(r, c);
                    containing_cell(col, row, src_rows, src_cols)
                }),
                ResampleMethod::Bilinear => {
                    let values = band.data().to_f64_array();
                    BandData::Float64(Array2::from_shape_fn((grid.rows, grid.cols), |(r, c)| {
                        let (col, row) = locate(r, c);
                        bilinear(&values, col, row, nodata).unwrap_or(fill)
                    }))
                }
            };

            let mut resampled = Band::new(data).with_nodata(nodata);
            resampled.set_description(band.description().map(str::to_string));
            out.add_band(resampled)?;
        }

        Ok(out)
    }
}

impl Align for GridResampler {
    fn name(&self) -> &'static str {
        "grid_resampler"
    }

    fn align(&self, rasters: Vec<RasterDataset>, reference: usize) -> Result<Vec<RasterDataset>> {
        reference_index(&rasters, reference)?;
        let target = &rasters[reference];
        let grid = Grid {
            rows: target.rows(),
            cols: target.cols(),
            transform: *target.transform(),
            crs: target.crs().cloned(),
        };

        rasters
            .into_iter()
            .enumerate()
            .map(|(i, raster)| {
                let aligned = raster.shape() == (grid.rows, grid.cols)
                    && *raster.transform() == grid.transform
                    && same_crs(raster.crs(), grid.crs.as_ref());
                if i == reference || aligned {
                    Ok(raster)
                } else {
                    self.resample(raster, &grid)
                }
            })
            .collect()
    }
}

fn containing_cell(col: f64, row: f64, rows: usize, cols: usize) -> Option<(usize, usize)> {
    if !(col >= 0.0 && row >= 0.0) {
        return None;
    }
    let (r, c) = (row.floor() as usize, col.floor() as usize);
    (r < rows && c < cols).then_some((r, c))
}

/// Bilinear interpolation between cell centres.
///
/// Neighbours that are nodata or NaN are left out and the remaining
/// weights renormalized. `None` outside the source extent or when no
/// neighbour is valid.
fn bilinear(values: &Array2<f64>, col: f64, row: f64, nodata: Option<f64>) -> Option<f64> {
    let (rows, cols) = values.dim();
    if !(col >= 0.0 && row >= 0.0 && col <= cols as f64 && row <= rows as f64) {
        return None;
    }

    // shift to centre-based coordinates
    let (row, col) = (row - 0.5, col - 0.5);
    let r0 = row.floor() as isize;
    let c0 = col.floor() as isize;
    let fr = row - r0 as f64;
    let fc = col - c0 as f64;

    let mut sum = 0.0_f64;
    let mut weight = 0.0_f64;

    for (ir, wr) in [(r0, 1.0 - fr), (r0 + 1, fr)] {
        for (ic, wc) in [(c0, 1.0 - fc), (c0 + 1, fc)] {
            if ir >= 0 && ic >= 0 && (ir as usize) < rows && (ic as usize) < cols {
                let w = wr * wc;
                let v = values[(ir as usize, ic as usize)];
                let valid = !v.is_nan() && nodata.map_or(true, |nd| v != nd);
                if w > 1e-15 && valid {
                    sum += v * w;
                    weight += w;
                }
            }
        }
    }

    (weight > 0.0).then(|| sum / weight)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::RasterElement;
    use crate::Error;
    use approx::assert_relative_eq;
    use ndarray::array;

    fn dataset(name: &str, gt: GeoTransform, band: Band) -> RasterDataset {
        let (rows, cols) = band.shape();
        let mut ds = RasterDataset::new(name, rows, cols);
        ds.set_transform(gt);
        ds.add_band(band).unwrap();
        ds
    }

    #[test]
    fn test_nearest_fills_outside_with_nodata() {
        let reference = dataset(
            "ref.tif",
            GeoTransform::new(0.0, 2.0, 1.0, -1.0),
            Band::from_array(array![[0u8, 0, 0], [0, 0, 0]]),
        );
        let src = dataset(
            "src.tif",
            GeoTransform::new(0.0, 2.0, 1.0, -1.0),
            Band::from_array(array![[1u8, 2], [3, 4]])
                .with_nodata(Some(255.0))
                .with_description("landcover"),
        );

        let out = GridResampler::default().align(vec![reference, src], 0).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].description(), "ref.tif");

        let aligned = &out[1];
        assert_eq!(aligned.description(), "src.tif");
        assert_eq!(aligned.shape(), (2, 3));
        let band = aligned.band(1).unwrap();
        assert_eq!(band.description(), Some("landcover"));
        assert_eq!(band.nodata(), Some(255.0));
        assert_eq!(band.data(), &BandData::UInt8(array![[1, 2, 255], [3, 4, 255]]));
    }

    #[test]
    fn test_nearest_integer_band_without_nodata() {
        let reference = dataset(
            "ref.tif",
            GeoTransform::new(0.0, 1.0, 1.0, -1.0),
            Band::from_array(array![[0u8, 0]]),
        );
        let src = dataset(
            "src.tif",
            GeoTransform::new(0.0, 1.0, 1.0, -1.0),
            Band::from_array(array![[7i32]]),
        );

        let out = GridResampler::default().align(vec![reference, src], 0).unwrap();
        let band = out[1].band(1).unwrap();
        assert_eq!(band.nodata(), Some(i32::MIN as f64));
        assert_eq!(band.data(), &BandData::Int32(array![[7, i32::MIN]]));
        assert!(i32::MIN.is_nodata(band.nodata()));
        assert!(!7i32.is_nodata(band.nodata()));
    }

    #[test]
    fn test_nearest_coarse_to_fine() {
        let reference = dataset(
            "fine.tif",
            GeoTransform::new(0.0, 2.0, 0.5, -0.5),
            Band::from_array(Array2::<f32>::zeros((4, 4))),
        );
        let coarse = dataset(
            "coarse.tif",
            GeoTransform::new(0.0, 2.0, 1.0, -1.0),
            Band::from_array(array![[1.0f32, 2.0], [3.0, 4.0]]),
        );

        let out = GridResampler::new(ResampleMethod::Nearest)
            .align(vec![reference, coarse], 0)
            .unwrap();
        let values = out[1].band(1).unwrap().as_array::<f32>().unwrap().clone();
        assert_eq!(
            values,
            array![
                [1.0, 1.0, 2.0, 2.0],
                [1.0, 1.0, 2.0, 2.0],
                [3.0, 3.0, 4.0, 4.0],
                [3.0, 3.0, 4.0, 4.0]
            ]
        );
    }

    #[test]
    fn test_bilinear_midpoint() {
        let reference = dataset(
            "ref.tif",
            GeoTransform::new(0.5, 1.0, 1.0, -1.0),
            Band::from_array(array![[0u8]]),
        );
        let src = dataset(
            "src.tif",
            GeoTransform::new(0.0, 1.0, 1.0, -1.0),
            Band::from_array(array![[0i16, 10]]),
        );

        let out = GridResampler::new(ResampleMethod::Bilinear)
            .align(vec![reference, src], 0)
            .unwrap();
        let band = out[1].band(1).unwrap();
        assert_eq!(band.data_type(), crate::raster::DataType::Float64);
        assert_relative_eq!(band.as_array::<f64>().unwrap()[[0, 0]], 5.0, epsilon = 1e-12);
    }

    #[test]
    fn test_bilinear_skips_nodata() {
        let values = array![[0.0, -9999.0]];
        let v = bilinear(&values, 1.0, 0.5, Some(-9999.0)).unwrap();
        assert_relative_eq!(v, 0.0);
        assert!(bilinear(&values, 3.0, 0.5, None).is_none());
        assert!(bilinear(&array![[f64::NAN]], 0.5, 0.5, None).is_none());
    }

    #[test]
    fn test_crs_mismatch() {
        let mut reference = dataset(
            "ref.tif",
            GeoTransform::default(),
            Band::from_array(array![[0u8]]),
        );
        reference.set_crs(Some(CRS::wgs84()));
        let mut utm = reference.clone();
        utm.set_crs(Some(CRS::from_epsg(32633)));

        let err = GridResampler::default().align(vec![reference, utm], 0).unwrap_err();
        assert!(matches!(err, Error::CrsMismatch(a, b) if a == "EPSG:32633" && b == "EPSG:4326"));
    }

    #[test]
    fn test_nonzero_reference() {
        let a = dataset(
            "a.tif",
            GeoTransform::new(0.0, 1.0, 1.0, -1.0),
            Band::from_array(array![[1u8, 2]]),
        );
        let b = dataset(
            "b.tif",
            GeoTransform::new(1.0, 1.0, 1.0, -1.0),
            Band::from_array(array![[9u8]]),
        );
        let out = GridResampler::default().align(vec![a, b.clone()], 1).unwrap();
        assert_eq!(out[1], b);
        assert_eq!(out[0].band(1).unwrap().data(), &BandData::UInt8(array![[2]]));
    }
}
