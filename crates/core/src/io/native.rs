//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate for basic TIFF I/O. Georeferencing is read from
//! the ModelPixelScale/ModelTiepoint (or ModelTransformation) tags, the
//! EPSG code from the GeoKey directory and nodata from the GDAL_NODATA tag.
//! For other formats and full projection support, enable the `gdal` feature.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{Band, BandData, GeoTransform, RasterDataset, RasterElement};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::Gray64Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const GT_MODEL_TYPE_KEY: u16 = 1024;
const GT_RASTER_TYPE_KEY: u16 = 1025;
const GEOGRAPHIC_TYPE_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_KEY: u16 = 3072;
const USER_DEFINED: u16 = 32767;

/// Read every sample plane of a GeoTIFF into a dataset
pub fn read_geotiff<P: AsRef<Path>>(path: P) -> Result<RasterDataset> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut decoder = Decoder::new(BufReader::new(file))
        .map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let planes = match result {
        DecodingResult::U8(buf) => deinterleave(buf, rows, cols)?,
        DecodingResult::I8(buf) => deinterleave(buf, rows, cols)?,
        DecodingResult::U16(buf) => deinterleave(buf, rows, cols)?,
        DecodingResult::I16(buf) => deinterleave(buf, rows, cols)?,
        DecodingResult::I32(buf) => deinterleave(buf, rows, cols)?,
        DecodingResult::I64(buf) => deinterleave(buf, rows, cols)?,
        DecodingResult::U32(buf) => {
            deinterleave(buf.into_iter().map(i64::from).collect(), rows, cols)?
        }
        DecodingResult::F32(buf) => deinterleave(buf, rows, cols)?,
        DecodingResult::F64(buf) => deinterleave(buf, rows, cols)?,
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

    let nodata = read_nodata(&mut decoder);
    let mut dataset = RasterDataset::new(path.to_string_lossy(), rows, cols);
    if let Ok(transform) = read_geotransform(&mut decoder) {
        dataset.set_transform(transform);
    }
    dataset.set_crs(read_epsg(&mut decoder).map(CRS::from_epsg));

    for plane in planes {
        dataset.add_band(Band::new(plane).with_nodata(nodata))?;
    }

    Ok(dataset)
}

/// Split chunky (pixel-interleaved) samples into one grid per sample
fn deinterleave<T: RasterElement>(buf: Vec<T>, rows: usize, cols: usize) -> Result<Vec<BandData>> {
    let cells = rows * cols;
    if cells == 0 || buf.len() % cells != 0 {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let samples = buf.len() / cells;
    if samples == 1 {
        return Ok(vec![BandData::from_vec(buf, rows, cols)?]);
    }

    (0..samples)
        .map(|s| {
            let plane: Vec<T> = buf.iter().skip(s).step_by(samples).copied().collect();
            BandData::from_vec(plane, rows, cols)
        })
        .collect()
}

/// Attempt to read GeoTransform from TIFF tags
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    if let Ok(m) = decoder.get_tag_f64_vec(Tag::ModelTransformationTag) {
        if m.len() >= 8 {
            return Ok(GeoTransform::from_gdal([m[3], m[0], m[1], m[7], m[4], m[5]]));
        }
    }

    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|_| Error::Other("No pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|_| Error::Other("No tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z]
        // scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("Cannot determine geotransform".into()))
}

/// EPSG code from the GeoKey directory, if one is declared inline
fn read_epsg<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<u32> {
    let keys = decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).ok()?;
    let count = *keys.get(3)? as usize;

    let mut geographic = None;
    let mut projected = None;
    for entry in keys[4..].chunks_exact(4).take(count) {
        let (key, location, value) = (entry[0], entry[1], entry[3]);
        if location != 0 || value == USER_DEFINED {
            continue;
        }
        match key {
            PROJECTED_CS_TYPE_KEY => projected = Some(u32::from(value)),
            GEOGRAPHIC_TYPE_KEY => geographic = Some(u32::from(value)),
            _ => {}
        }
    }
    projected.or(geographic)
}

fn read_nodata<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let raw = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    raw.trim_matches(|c: char| c == '\0' || c.is_whitespace())
        .parse()
        .ok()
}

/// Write a single-band dataset as a 64-bit float GeoTIFF.
///
/// The geotransform is stored as pixel scale + tiepoint (north-up only),
/// an EPSG code as a GeoKey, and the band nodata as GDAL_NODATA.
pub fn write_geotiff<P: AsRef<Path>>(dataset: &RasterDataset, path: P) -> Result<()> {
    if dataset.band_count() != 1 {
        return Err(Error::UnsupportedFormat(format!(
            "native GeoTIFF writer needs exactly one band, got {}",
            dataset.band_count()
        )));
    }
    let band = &dataset.bands()[0];
    let gt = dataset.transform();
    if gt.row_rotation != 0.0 || gt.col_rotation != 0.0 {
        return Err(Error::UnsupportedFormat(
            "native GeoTIFF writer does not support rotated grids".into(),
        ));
    }

    let file = File::create(path.as_ref())?;
    let mut encoder = TiffEncoder::new(std::io::BufWriter::new(file))
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = dataset.shape();
    let data: Vec<f64> = band.data().to_f64_array().iter().copied().collect();

    let mut image = encoder
        .new_image::<Gray64Float>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, &scale[..])
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, &tiepoint[..])
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    let geokeys = geokey_directory(dataset.crs().and_then(CRS::epsg));
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    if let Some(nodata) = band.nodata() {
        image
            .encoder()
            .write_tag(Tag::GdalNodata, nodata.to_string().as_str())
            .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;
    }

    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

/// GeoKey directory with model/raster type and, when known, the EPSG code.
///
/// Codes in 4000..5000 are written as geographic systems, others as
/// projected ones.
fn geokey_directory(epsg: Option<u32>) -> Vec<u16> {
    let code = epsg.and_then(|c| u16::try_from(c).ok());
    let geographic = code.is_some_and(|c| (4000..5000).contains(&c));
    let model_type = if geographic { 2 } else { 1 };

    let mut keys = vec![
        1, 1, 0, 2, // Version 1.1.0, 2 keys
        GT_MODEL_TYPE_KEY, 0, 1, model_type,
        GT_RASTER_TYPE_KEY, 0, 1, 1, // RasterPixelIsArea
    ];
    if let Some(code) = code {
        let key = if geographic {
            GEOGRAPHIC_TYPE_KEY
        } else {
            PROJECTED_CS_TYPE_KEY
        };
        keys.extend_from_slice(&[key, 0, 1, code]);
        keys[3] = 3;
    }
    keys
}
