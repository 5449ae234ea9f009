//! Raster reading through GDAL

use crate::crs::CRS;
use crate::error::Result;
use crate::raster::{Band, BandData, GeoTransform, RasterDataset, RasterElement};
use gdal::raster::{Buffer, GdalDataType, GdalType, RasterBand};
use gdal::{Dataset, DatasetOptions, DriverManager, GdalOpenFlags, Metadata};
use std::path::Path;
use tracing::debug;

/// Open any raster GDAL can read and load every band.
///
/// Byte, 16/32-bit integer and Float32 bands keep their type; anything
/// else is read as Float64.
pub fn open_dataset<P: AsRef<Path>>(path: P) -> Result<RasterDataset> {
    let path = path.as_ref();
    let options = DatasetOptions {
        open_flags: GdalOpenFlags::GDAL_OF_READONLY | GdalOpenFlags::GDAL_OF_RASTER,
        ..Default::default()
    };
    let dataset = Dataset::open_ex(path, options)?;
    debug!(
        path = %path.display(),
        driver = %dataset.driver().short_name(),
        bands = dataset.raster_count(),
        "opened with GDAL"
    );
    read_dataset(&dataset, path.to_string_lossy())
}

/// Copy an open GDAL dataset into memory
pub(crate) fn read_dataset(dataset: &Dataset, description: impl Into<String>) -> Result<RasterDataset> {
    let (cols, rows) = dataset.raster_size();
    let mut raster = RasterDataset::new(description, rows, cols);

    if let Ok(gt) = dataset.geo_transform() {
        raster.set_transform(GeoTransform::from_gdal(gt));
    }

    if let Ok(srs) = dataset.spatial_ref() {
        if let Ok(wkt) = srs.to_wkt() {
            raster.set_crs(Some(CRS::from_wkt(wkt)));
        }
    }

    for index in 1..=dataset.raster_count() {
        let rasterband = dataset.rasterband(index)?;
        let data = match rasterband.band_type() {
            GdalDataType::UInt8 => read_band::<u8>(&rasterband, rows, cols)?,
            GdalDataType::UInt16 => read_band::<u16>(&rasterband, rows, cols)?,
            GdalDataType::Int16 => read_band::<i16>(&rasterband, rows, cols)?,
            GdalDataType::Int32 => read_band::<i32>(&rasterband, rows, cols)?,
            GdalDataType::Float32 => read_band::<f32>(&rasterband, rows, cols)?,
            _ => read_band::<f64>(&rasterband, rows, cols)?,
        };

        let mut band = Band::new(data).with_nodata(rasterband.no_data_value());
        if let Some(desc) = rasterband.description().ok().filter(|d| !d.is_empty()) {
            band = band.with_description(desc);
        }
        raster.add_band(band)?;
    }

    Ok(raster)
}

fn read_band<T>(rasterband: &RasterBand, rows: usize, cols: usize) -> Result<BandData>
where
    T: RasterElement + GdalType,
{
    let buffer = rasterband.read_as::<T>((0, 0), (cols, rows), (cols, rows), None)?;
    BandData::from_vec(buffer.data().to_vec(), rows, cols)
}

/// Build an in-memory GDAL dataset from a raster.
///
/// Every band is stored as Float64; band nodata values are carried over.
pub fn to_mem_dataset(raster: &RasterDataset) -> Result<Dataset> {
    let (rows, cols) = raster.shape();
    let driver = DriverManager::get_driver_by_name("MEM")?;
    let mut dataset =
        driver.create_with_band_type::<f64, _>("", cols, rows, raster.band_count())?;

    dataset.set_geo_transform(&raster.transform().to_gdal())?;
    if let Some(crs) = raster.crs() {
        dataset.set_spatial_ref(&crs.to_spatial_ref()?)?;
    }

    for (i, band) in raster.bands().iter().enumerate() {
        let mut rasterband = dataset.rasterband(i + 1)?;
        let data: Vec<f64> = band.data().to_f64_array().iter().copied().collect();
        let mut buffer = Buffer::new((cols, rows), data);
        rasterband.write((0, 0), (cols, rows), &mut buffer)?;
        rasterband.set_no_data_value(band.nodata())?;
        if let Some(desc) = band.description() {
            rasterband.set_description(desc)?;
        }
    }

    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mem_roundtrip() {
        let mut ds = RasterDataset::new("elev.tif", 2, 2);
        ds.set_transform(GeoTransform::new(10.0, 20.0, 1.0, -1.0));
        ds.add_band(
            Band::from_array(array![[1i16, 2], [3, -1]])
                .with_nodata(Some(-1.0))
                .with_description("elev"),
        )
        .unwrap();

        let mem = to_mem_dataset(&ds).unwrap();
        let back = read_dataset(&mem, "elev.tif").unwrap();
        assert_eq!(back.shape(), (2, 2));
        assert_eq!(back.transform(), ds.transform());

        let band = back.band(1).unwrap();
        assert_eq!(band.nodata(), Some(-1.0));
        assert_eq!(band.description(), Some("elev"));
        assert_eq!(
            band.as_array::<f64>().unwrap(),
            &array![[1.0, 2.0], [3.0, -1.0]]
        );
    }

    #[test]
    fn test_open_missing_file() {
        assert!(open_dataset("/nonexistent/raster.tif").is_err());
    }
}
