//! Reprojection through GDAL's warper

use super::{crs_mismatch, reference_index, Align};
use crate::error::Result;
use crate::io::{read_dataset, to_mem_dataset};
use crate::raster::RasterDataset;
use gdal::DriverManager;
use tracing::debug;

/// Reprojects every raster onto the reference grid with
/// `GDALReprojectImage`.
///
/// Each input is copied into a MEM dataset, warped into a MEM dataset
/// shaped like the reference and read back as Float64 bands. Both sides
/// need a projection unless neither has one.
#[derive(Debug, Clone, Copy, Default)]
pub struct GdalWarp;

impl GdalWarp {
    fn warp(&self, raster: &RasterDataset, target: &RasterDataset) -> Result<RasterDataset> {
        if raster.crs().is_none() != target.crs().is_none() {
            return Err(crs_mismatch(raster.crs(), target.crs()));
        }

        debug!(
            raster = raster.description(),
            from = %raster.crs().map(|c| c.identifier()).unwrap_or_default(),
            to = %target.crs().map(|c| c.identifier()).unwrap_or_default(),
            "warping raster"
        );

        let src = to_mem_dataset(raster)?;

        let (rows, cols) = target.shape();
        let driver = DriverManager::get_driver_by_name("MEM")?;
        let mut dst =
            driver.create_with_band_type::<f64, _>("", cols, rows, raster.band_count())?;
        dst.set_geo_transform(&target.transform().to_gdal())?;
        if let Some(crs) = target.crs() {
            dst.set_spatial_ref(&crs.to_spatial_ref()?)?;
        }
        for (i, band) in raster.bands().iter().enumerate() {
            let fill = band.nodata().unwrap_or(f64::NAN);
            let mut rasterband = dst.rasterband(i + 1)?;
            rasterband.set_no_data_value(Some(fill))?;
            rasterband.fill(fill, None)?;
        }

        gdal::raster::reproject(&src, &dst)?;

        let warped = read_dataset(&dst, raster.description())?;

        // keep the reference CRS as given; GDAL's WKT spelling may differ
        let mut out = RasterDataset::new(raster.description(), rows, cols);
        out.set_transform(*target.transform());
        out.set_crs(target.crs().cloned());
        for (mut band, source) in warped.into_bands().into_iter().zip(raster.bands()) {
            band.set_nodata(source.nodata());
            band.set_description(source.description().map(str::to_string));
            out.add_band(band)?;
        }
        Ok(out)
    }
}

impl Align for GdalWarp {
    fn name(&self) -> &'static str {
        "gdal_warp"
    }

    fn align(&self, rasters: Vec<RasterDataset>, reference: usize) -> Result<Vec<RasterDataset>> {
        reference_index(&rasters, reference)?;
        let target = &rasters[reference];

        rasters
            .iter()
            .enumerate()
            .map(|(i, raster)| {
                if i == reference || raster.is_aligned_with(target) {
                    Ok(raster.clone())
                } else {
                    self.warp(raster, target)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CRS;
    use crate::raster::{Band, GeoTransform};
    use ndarray::array;

    #[test]
    fn test_warp_same_crs_shift() {
        let mut reference = RasterDataset::new("ref.tif", 1, 2);
        reference.set_transform(GeoTransform::new(0.0, 1.0, 1.0, -1.0));
        reference.set_crs(Some(CRS::wgs84()));
        reference
            .add_band(Band::from_array(array![[0u8, 0]]))
            .unwrap();

        let mut src = RasterDataset::new("src.tif", 1, 2);
        src.set_transform(GeoTransform::new(1.0, 1.0, 1.0, -1.0));
        src.set_crs(Some(CRS::wgs84()));
        src.add_band(Band::from_array(array![[7.0f64, 8.0]]).with_nodata(Some(-1.0)))
            .unwrap();

        let out = GdalWarp.align(vec![reference, src], 0).unwrap();
        assert_eq!(out.len(), 2);
        let band = out[1].band(1).unwrap();
        let values = band.as_array::<f64>().unwrap();
        assert_eq!(values[[0, 0]], -1.0);
        assert_eq!(values[[0, 1]], 7.0);
        assert_eq!(out[1].transform(), out[0].transform());
    }

    #[test]
    fn test_warp_missing_crs() {
        let mut reference = RasterDataset::new("ref.tif", 1, 1);
        reference.set_crs(Some(CRS::wgs84()));
        reference.add_band(Band::from_array(array![[0u8]])).unwrap();
        let mut src = RasterDataset::new("src.tif", 1, 1);
        src.set_transform(GeoTransform::new(5.0, 5.0, 1.0, -1.0));
        src.add_band(Band::from_array(array![[1u8]])).unwrap();

        assert!(matches!(
            GdalWarp.align(vec![reference, src], 0),
            Err(crate::Error::CrsMismatch(_, _))
        ));
    }
}
