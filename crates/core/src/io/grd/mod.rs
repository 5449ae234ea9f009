//! Reader and writer for the R `raster` package's native format.
//!
//! A raster is stored as a pair of files sharing a stem: a `.grd` text
//! sidecar describing type, byte order, grid and georeference, and a `.gri`
//! file holding the raw cells.

mod datatype;
mod header;

pub use datatype::{BandOrder, ByteOrder, GrdDataType};
pub use header::GrdHeader;

use datatype::GrdValue;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{Band, BandData, RasterDataset, RasterElement};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// How `minvalue`/`maxvalue` are applied to the loaded cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityFilter {
    /// Cells below `minvalue` or above `maxvalue` become nodata
    #[default]
    OutsideRange,
    /// Keep a cell only when `value <= minvalue && value >= maxvalue`,
    /// matching the legacy Python loader bit for bit
    Legacy,
    /// Load cells unchanged
    Off,
}

impl ValidityFilter {
    fn rejects(self, value: f64, min: Option<f64>, max: Option<f64>) -> bool {
        match self {
            ValidityFilter::OutsideRange => {
                min.is_some_and(|m| value < m) || max.is_some_and(|m| value > m)
            }
            ValidityFilter::Legacy => {
                !(min.map_or(true, |m| value <= m) && max.map_or(true, |m| value >= m))
            }
            ValidityFilter::Off => false,
        }
    }
}

/// Options for reading `.grd`/`.gri` files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrdOptions {
    pub validity: ValidityFilter,
}

/// Options for writing `.grd`/`.gri` files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GrdWriteOptions {
    pub byte_order: ByteOrder,
}

/// Sidecar and payload paths for either companion file
pub fn companion_paths(path: &Path) -> (PathBuf, PathBuf) {
    (path.with_extension("grd"), path.with_extension("gri"))
}

/// Read an R raster file pair into a dataset.
///
/// `path` may name either the `.grd` or the `.gri` file.
pub fn read_grd<P: AsRef<Path>>(path: P, options: &GrdOptions) -> Result<RasterDataset> {
    let (grd_path, gri_path) = companion_paths(path.as_ref());

    let text = std::fs::read_to_string(&grd_path).map_err(|source| Error::MetadataRead {
        path: grd_path.clone(),
        source,
    })?;
    let header = GrdHeader::parse(&text)?;

    let expected = header.payload_len().ok_or(Error::InvalidDimensions {
        width: header.cols,
        height: header.rows,
    })?;
    let payload = std::fs::read(&gri_path)?;
    if payload.len() != expected {
        return Err(Error::PayloadSize {
            path: gri_path,
            expected,
            actual: payload.len(),
        });
    }

    debug!(
        path = %grd_path.display(),
        datatype = %header.data_type,
        rows = header.rows,
        cols = header.cols,
        bands = header.nbands,
        "reading R raster"
    );

    let bands = match header.data_type {
        GrdDataType::Log1s => {
            let values = payload.iter().map(|&b| (b != 0) as u8).collect();
            split_bands::<u8>(values, &header, options)?
        }
        GrdDataType::Int1s => decode_bands::<i8>(&payload, &header, options)?,
        GrdDataType::Int2s => decode_bands::<i16>(&payload, &header, options)?,
        GrdDataType::Int4s => decode_bands::<i32>(&payload, &header, options)?,
        GrdDataType::Int8s => decode_bands::<i64>(&payload, &header, options)?,
        GrdDataType::Int1u => decode_bands::<u8>(&payload, &header, options)?,
        GrdDataType::Int2u => decode_bands::<u16>(&payload, &header, options)?,
        GrdDataType::Flt4s => decode_bands::<f32>(&payload, &header, options)?,
        GrdDataType::Flt8s => decode_bands::<f64>(&payload, &header, options)?,
    };

    let mut dataset = RasterDataset::new(grd_path.to_string_lossy(), header.rows, header.cols);
    dataset.set_transform(header.transform());
    dataset.set_crs(header.projection.as_deref().map(projection_crs).transpose()?);
    for band in bands {
        dataset.add_band(band)?;
    }

    Ok(dataset)
}

#[cfg(feature = "gdal")]
fn projection_crs(proj4: &str) -> Result<CRS> {
    CRS::from_proj4_canonical(proj4)
}

#[cfg(not(feature = "gdal"))]
fn projection_crs(proj4: &str) -> Result<CRS> {
    Ok(CRS::from_proj(proj4))
}

fn decode_bands<T: GrdValue>(
    payload: &[u8],
    header: &GrdHeader,
    options: &GrdOptions,
) -> Result<Vec<Band>> {
    let values = T::decode(header.byte_order, payload);
    split_bands(values, header, options)
}

/// De-interleave the payload, then apply the validity range and nodata
fn split_bands<T: RasterElement>(
    values: Vec<T>,
    header: &GrdHeader,
    options: &GrdOptions,
) -> Result<Vec<Band>> {
    let (rows, cols, nbands) = (header.rows, header.cols, header.nbands);

    let per_band: Vec<Vec<T>> = if nbands == 1 {
        vec![values]
    } else {
        (0..nbands)
            .map(|b| {
                (0..rows * cols)
                    .map(|i| {
                        let at = header
                            .band_order
                            .offset(b, i / cols, i % cols, (rows, cols, nbands));
                        values[at]
                    })
                    .collect()
            })
            .collect()
    };

    per_band
        .into_iter()
        .enumerate()
        .map(|(b, mut cells)| {
            let (min, max) = header.value_range(b);
            apply_validity(&mut cells, min, max, header.nodata, options.validity)?;

            let mut band = Band::new(BandData::from_vec(cells, rows, cols)?)
                .with_nodata(Some(header.nodata));
            if let Some(name) = header.layer_name(b) {
                band = band.with_description(name);
            }
            Ok(band)
        })
        .collect()
}

fn apply_validity<T: RasterElement>(
    cells: &mut [T],
    min: Option<f64>,
    max: Option<f64>,
    nodata: f64,
    filter: ValidityFilter,
) -> Result<()> {
    if filter == ValidityFilter::Off {
        return Ok(());
    }
    let sentinel = <T as num_traits::NumCast>::from(nodata);

    for cell in cells.iter_mut() {
        if filter.rejects(cell.as_f64(), min, max) {
            *cell = sentinel.ok_or_else(|| {
                Error::invalid_value(
                    "nodatavalue",
                    nodata.to_string(),
                    format!("not representable as {:?}", T::DATA_TYPE),
                )
            })?;
        }
    }
    Ok(())
}

/// Write a dataset as an R raster file pair.
///
/// All bands must share one element type. Bands are written
/// band-interleaved-by-line with the first band's nodata value, and the
/// per-band value ranges are computed from the valid cells.
pub fn write_grd<P: AsRef<Path>>(
    dataset: &RasterDataset,
    path: P,
    options: &GrdWriteOptions,
) -> Result<()> {
    let (grd_path, gri_path) = companion_paths(path.as_ref());
    let bands = dataset.bands();
    let first = bands.first().ok_or(Error::EmptyInput)?;
    let data_type = first.data_type();
    if let Some(other) = bands.iter().find(|b| b.data_type() != data_type) {
        return Err(Error::UnsupportedDataType(format!(
            "mixed band types {:?} and {:?}",
            data_type,
            other.data_type()
        )));
    }

    let nodata = first.nodata().unwrap_or_else(|| data_type.default_nodata());

    let (xmin, ymin, xmax, ymax) = dataset.bounds();
    let mut header = GrdHeader {
        data_type: GrdDataType::for_data_type(data_type),
        byte_order: options.byte_order,
        band_order: BandOrder::Bil,
        rows: dataset.rows(),
        cols: dataset.cols(),
        nbands: bands.len(),
        xmin,
        xmax,
        ymin,
        ymax,
        min_values: Vec::with_capacity(bands.len()),
        max_values: Vec::with_capacity(bands.len()),
        nodata,
        projection: dataset.crs().and_then(CRS::proj_definition),
        layer_names: Vec::new(),
    };

    for band in bands {
        let (min, max) = valid_range(band);
        header.min_values.push(min);
        header.max_values.push(max);
    }
    if bands.iter().any(|b| b.description().is_some()) {
        header.layer_names = bands
            .iter()
            .map(|b| b.description().unwrap_or_default().to_string())
            .collect();
    }

    let mut payload = Vec::with_capacity(header.payload_len().unwrap_or_default());
    for row in 0..dataset.rows() {
        for band in bands {
            encode_row(band.data(), row, options.byte_order, &mut payload);
        }
    }

    std::fs::write(&grd_path, header.to_sidecar_string())?;
    std::fs::write(&gri_path, payload)?;
    debug!(path = %grd_path.display(), "wrote R raster");
    Ok(())
}

fn valid_range(band: &Band) -> (Option<f64>, Option<f64>) {
    let nodata = band.nodata();
    let values = band.data().to_values(nodata, true);
    values
        .iter()
        .filter_map(|v| v.as_f64())
        .fold((None, None), |(min, max): (Option<f64>, Option<f64>), v| {
            (
                Some(min.map_or(v, |m| m.min(v))),
                Some(max.map_or(v, |m| m.max(v))),
            )
        })
}

fn encode_row(data: &BandData, row: usize, order: ByteOrder, out: &mut Vec<u8>) {
    fn put<T: GrdValue>(arr: &ndarray::Array2<T>, row: usize, order: ByteOrder, out: &mut Vec<u8>) {
        let cells: Vec<T> = arr.row(row).iter().copied().collect();
        T::encode(order, &cells, out);
    }

    match data {
        BandData::UInt8(arr) => put(arr, row, order, out),
        BandData::Int8(arr) => put(arr, row, order, out),
        BandData::UInt16(arr) => put(arr, row, order, out),
        BandData::Int16(arr) => put(arr, row, order, out),
        BandData::Int32(arr) => put(arr, row, order, out),
        BandData::Int64(arr) => put(arr, row, order, out),
        BandData::Float32(arr) => put(arr, row, order, out),
        BandData::Float64(arr) => put(arr, row, order, out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::GeoTransform;
    use ndarray::array;
    use tempfile::TempDir;

    fn write_pair(dir: &Path, stem: &str, header: &str, payload: &[u8]) -> PathBuf {
        let grd = dir.join(format!("{stem}.grd"));
        std::fs::write(&grd, header).unwrap();
        std::fs::write(dir.join(format!("{stem}.gri")), payload).unwrap();
        grd
    }

    fn sidecar(datatype: &str, byteorder: &str, rows: usize, cols: usize, range: (f64, f64)) -> String {
        format!(
            "[georeference]\nnrows={rows}\nncols={cols}\nxmin=0\nxmax={cols}\nymin=0\nymax={rows}\n\
             projection=+proj=longlat +datum=WGS84\n\
             [data]\ndatatype={datatype}\nbyteorder={byteorder}\n\
             minvalue={}\nmaxvalue={}\nnodatavalue=-9999\n",
            range.0, range.1
        )
    }

    #[test]
    fn test_read_known_values() {
        let dir = TempDir::new().unwrap();
        let values: [f32; 6] = [1.0, 2.5, 3.0, 4.0, 5.5, 6.0];
        let payload: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let header = "[georeference]\nnrows=2\nncols=3\nxmin=10\nxmax=16\nymin=-4\nymax=0\n\
                      projection=+proj=utm +zone=33 +datum=WGS84\n\
                      [data]\ndatatype=FLT4S\nbyteorder=little\nminvalue=1\nmaxvalue=6\n\
                      nodatavalue=-3.4e+38\n";
        let grd = write_pair(dir.path(), "temp", header, &payload);

        let ds = read_grd(&grd, &GrdOptions::default()).unwrap();
        assert_eq!(ds.shape(), (2, 3));
        assert_eq!(ds.band_count(), 1);
        assert_eq!(ds.base_name(), "temp");
        assert_eq!(
            ds.transform().to_gdal(),
            [10.0, 2.0, 0.0, 0.0, 0.0, -2.0]
        );
        let band = ds.band(1).unwrap();
        assert_eq!(band.nodata(), Some(-3.4e38));
        assert_eq!(
            band.as_array::<f32>().unwrap(),
            &array![[1.0f32, 2.5, 3.0], [4.0, 5.5, 6.0]]
        );
    }

    #[test]
    fn test_reads_through_payload_extension() {
        let dir = TempDir::new().unwrap();
        let grd = write_pair(
            dir.path(),
            "mask",
            &sidecar("INT1U", "little", 1, 2, (0.0, 255.0)),
            &[7, 9],
        );
        let ds = read_grd(grd.with_extension("gri"), &GrdOptions::default()).unwrap();
        assert_eq!(ds.band(1).unwrap().as_array::<u8>().unwrap(), &array![[7u8, 9]]);
    }

    #[test]
    fn test_out_of_range_becomes_nodata() {
        let dir = TempDir::new().unwrap();
        let payload: Vec<u8> = [-50i32, 0, 10, 200]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        let grd = write_pair(
            dir.path(),
            "range",
            &sidecar("INT4S", "big", 2, 2, (0.0, 100.0)),
            &payload,
        );

        let ds = read_grd(&grd, &GrdOptions::default()).unwrap();
        assert_eq!(
            ds.band(1).unwrap().as_array::<i32>().unwrap(),
            &array![[-9999, 0], [10, -9999]]
        );

        let off = GrdOptions {
            validity: ValidityFilter::Off,
        };
        let ds = read_grd(&grd, &off).unwrap();
        assert_eq!(
            ds.band(1).unwrap().as_array::<i32>().unwrap(),
            &array![[-50, 0], [10, 200]]
        );
    }

    #[test]
    fn test_legacy_filter_is_literal() {
        let dir = TempDir::new().unwrap();
        let payload: Vec<u8> = [1i16, 5, 9].iter().flat_map(|v| v.to_le_bytes()).collect();
        let legacy = GrdOptions {
            validity: ValidityFilter::Legacy,
        };

        // min < max: the literal condition never holds, every cell is replaced
        let grd = write_pair(dir.path(), "a", &sidecar("INT2S", "little", 1, 3, (1.0, 9.0)), &payload);
        let ds = read_grd(&grd, &legacy).unwrap();
        assert_eq!(
            ds.band(1).unwrap().as_array::<i16>().unwrap(),
            &array![[-9999i16, -9999, -9999]]
        );

        // min >= max keeps values inside [max, min]
        let grd = write_pair(dir.path(), "b", &sidecar("INT2S", "little", 1, 3, (5.0, 1.0)), &payload);
        let ds = read_grd(&grd, &legacy).unwrap();
        assert_eq!(
            ds.band(1).unwrap().as_array::<i16>().unwrap(),
            &array![[1i16, 5, -9999]]
        );
    }

    #[test]
    fn test_unrepresentable_nodata() {
        let dir = TempDir::new().unwrap();
        let grd = write_pair(
            dir.path(),
            "bytes",
            &sidecar("INT1U", "little", 1, 2, (0.0, 10.0)),
            &[5, 50],
        );
        let err = read_grd(&grd, &GrdOptions::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidValue { ref key, .. } if key == "nodatavalue"));
    }

    #[test]
    fn test_missing_sidecar() {
        let dir = TempDir::new().unwrap();
        let err = read_grd(dir.path().join("absent.grd"), &GrdOptions::default()).unwrap_err();
        assert!(matches!(err, Error::MetadataRead { .. }));
    }

    #[test]
    fn test_payload_size_mismatch() {
        let dir = TempDir::new().unwrap();
        let grd = write_pair(
            dir.path(),
            "short",
            &sidecar("INT2U", "little", 2, 2, (0.0, 10.0)),
            &[0; 6],
        );
        let err = read_grd(&grd, &GrdOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            Error::PayloadSize {
                expected: 8,
                actual: 6,
                ..
            }
        ));
    }

    #[test]
    fn test_logical_bytes() {
        let dir = TempDir::new().unwrap();
        let grd = write_pair(
            dir.path(),
            "flags",
            &sidecar("LOG1S", "little", 1, 4, (0.0, 1.0)),
            &[0, 1, 2, 255],
        );
        let ds = read_grd(&grd, &GrdOptions::default()).unwrap();
        assert_eq!(
            ds.band(1).unwrap().as_array::<u8>().unwrap(),
            &array![[0u8, 1, 1, 1]]
        );
    }

    #[test]
    fn test_multiband_bsq_with_layer_names() {
        let dir = TempDir::new().unwrap();
        let header = "[georeference]\nnrows=1\nncols=2\nxmin=0\nxmax=2\nymin=0\nymax=1\n\
                      [data]\ndatatype=INT1S\nbyteorder=little\nnbands=2\nbandorder=BSQ\n\
                      nodatavalue=-128\n[description]\nlayername=tmin:tmax\n";
        let grd = write_pair(dir.path(), "clim", header, &[1, 2, 3, 4]);

        let ds = read_grd(&grd, &GrdOptions::default()).unwrap();
        assert_eq!(ds.band_count(), 2);
        assert_eq!(ds.crs(), None);
        assert_eq!(ds.band(1).unwrap().description(), Some("tmin"));
        assert_eq!(ds.band(2).unwrap().as_array::<i8>().unwrap(), &array![[3i8, 4]]);
    }

    #[test]
    fn test_write_then_read_multiband() {
        let dir = TempDir::new().unwrap();
        let mut ds = RasterDataset::new("stack.grd", 2, 2);
        ds.set_transform(GeoTransform::new(0.0, 2.0, 1.0, -1.0));
        ds.set_crs(Some(CRS::from_proj("+proj=longlat +datum=WGS84")));
        ds.add_band(Band::from_array(array![[1i64, 2], [3, i64::MAX]]).with_nodata(Some(-1.0)))
            .unwrap();
        ds.add_band(Band::from_array(array![[5i64, 6], [7, i64::MIN]]).with_nodata(Some(-1.0)))
            .unwrap();

        let path = dir.path().join("stack.grd");
        let opts = GrdWriteOptions {
            byte_order: ByteOrder::Big,
        };
        write_grd(&ds, &path, &opts).unwrap();

        let back = read_grd(&path, &GrdOptions::default()).unwrap();
        assert_eq!(back.transform(), ds.transform());
        assert!(crate::crs::same_crs(back.crs(), ds.crs()));
        assert_eq!(back.band(1).unwrap().data(), ds.band(1).unwrap().data());
        assert_eq!(back.band(2).unwrap().data(), ds.band(2).unwrap().data());
    }

    #[test]
    fn test_write_without_nodata_uses_type_sentinel() {
        let dir = TempDir::new().unwrap();
        let mut ds = RasterDataset::new("mask.grd", 1, 2);
        ds.add_band(Band::from_array(array![[0u8, 1]])).unwrap();

        let path = dir.path().join("mask.grd");
        write_grd(&ds, &path, &GrdWriteOptions::default()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("nodatavalue=255\n"));
        let back = read_grd(&path, &GrdOptions::default()).unwrap();
        assert_eq!(back.band(1).unwrap().nodata(), Some(255.0));
        assert_eq!(back.band(1).unwrap().as_array::<u8>().unwrap(), &array![[0u8, 1]]);
    }
}
