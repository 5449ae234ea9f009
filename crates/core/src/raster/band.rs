//! Typed raster bands

use crate::error::{Error, Result};
use crate::raster::{DataType, RasterElement};
use crate::table::Value;
use ndarray::Array2;
use num_traits::NumCast;

/// Cell storage of one band, keeping the on-disk element type.
#[derive(Debug, Clone, PartialEq)]
pub enum BandData {
    UInt8(Array2<u8>),
    Int8(Array2<i8>),
    UInt16(Array2<u16>),
    Int16(Array2<i16>),
    Int32(Array2<i32>),
    Int64(Array2<i64>),
    Float32(Array2<f32>),
    Float64(Array2<f64>),
}

macro_rules! dispatch {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            BandData::UInt8($arr) => $body,
            BandData::Int8($arr) => $body,
            BandData::UInt16($arr) => $body,
            BandData::Int16($arr) => $body,
            BandData::Int32($arr) => $body,
            BandData::Int64($arr) => $body,
            BandData::Float32($arr) => $body,
            BandData::Float64($arr) => $body,
        }
    };
}

macro_rules! map_variant {
    ($value:expr, $arr:ident => $body:expr) => {
        match $value {
            BandData::UInt8($arr) => BandData::UInt8($body),
            BandData::Int8($arr) => BandData::Int8($body),
            BandData::UInt16($arr) => BandData::UInt16($body),
            BandData::Int16($arr) => BandData::Int16($body),
            BandData::Int32($arr) => BandData::Int32($body),
            BandData::Int64($arr) => BandData::Int64($body),
            BandData::Float32($arr) => BandData::Float32($body),
            BandData::Float64($arr) => BandData::Float64($body),
        }
    };
}

impl BandData {
    /// Build band data from a row-major vector
    pub fn from_vec<T: RasterElement>(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(T::into_band_data(array))
    }

    /// Element type of the stored cells
    pub fn data_type(&self) -> DataType {
        match self {
            BandData::UInt8(_) => DataType::UInt8,
            BandData::Int8(_) => DataType::Int8,
            BandData::UInt16(_) => DataType::UInt16,
            BandData::Int16(_) => DataType::Int16,
            BandData::Int32(_) => DataType::Int32,
            BandData::Int64(_) => DataType::Int64,
            BandData::Float32(_) => DataType::Float32,
            BandData::Float64(_) => DataType::Float64,
        }
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        dispatch!(self, arr => arr.dim())
    }

    /// Cells converted to `f64`, row-major
    pub fn to_f64_array(&self) -> Array2<f64> {
        dispatch!(self, arr => arr.mapv(|v| v.as_f64()))
    }

    /// Flatten into table values in row-major order.
    ///
    /// With `mask` set, cells matching `nodata` (and NaN cells) become
    /// [`Value::Null`].
    pub fn to_values(&self, nodata: Option<f64>, mask: bool) -> Vec<Value> {
        dispatch!(self, arr => arr
            .iter()
            .map(|&v| {
                if mask && v.is_nodata(nodata) {
                    Value::Null
                } else {
                    v.to_value()
                }
            })
            .collect())
    }

    /// Build a new `rows` x `cols` grid of the same type by picking source
    /// cells.
    ///
    /// `pick` maps a target (row, col) to a source (row, col); `None`
    /// cells are filled with `fill` cast into the element type (zero if
    /// the type cannot hold it).
    pub fn remap<F>(&self, rows: usize, cols: usize, fill: f64, pick: F) -> BandData
    where
        F: Fn(usize, usize) -> Option<(usize, usize)>,
    {
        map_variant!(self, arr => {
            let fill = NumCast::from(fill).unwrap_or_else(num_traits::Zero::zero);
            Array2::from_shape_fn((rows, cols), |(r, c)| match pick(r, c) {
                Some(idx) => arr[idx],
                None => fill,
            })
        })
    }
}

/// One layer of a raster dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Band {
    data: BandData,
    nodata: Option<f64>,
    description: Option<String>,
}

impl Band {
    pub fn new(data: BandData) -> Self {
        Self {
            data,
            nodata: None,
            description: None,
        }
    }

    /// Create a band from a typed grid
    pub fn from_array<T: RasterElement>(data: Array2<T>) -> Self {
        Self::new(T::into_band_data(data))
    }

    pub fn with_nodata(mut self, nodata: Option<f64>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.set_description(Some(description.into()));
        self
    }

    pub fn data(&self) -> &BandData {
        &self.data
    }

    pub fn into_data(self) -> BandData {
        self.data
    }

    pub fn data_type(&self) -> DataType {
        self.data.data_type()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.shape()
    }

    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<f64>) {
        self.nodata = nodata;
    }

    /// Band description; empty strings are treated as absent
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    /// Typed access to the grid, `None` if `T` is not the band's element type
    pub fn as_array<T: RasterElement>(&self) -> Option<&Array2<T>> {
        let any = dispatch!(&self.data, arr => arr as &dyn std::any::Any);
        any.downcast_ref::<Array2<T>>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_from_vec_checks_length() {
        assert!(BandData::from_vec(vec![1i16, 2, 3], 2, 2).is_err());
        let data = BandData::from_vec(vec![1i16, 2, 3, 4], 2, 2).unwrap();
        assert_eq!(data.shape(), (2, 2));
        assert_eq!(data.data_type(), DataType::Int16);
    }

    #[test]
    fn test_to_values_masks_nodata() {
        let band = Band::from_array(array![[1i32, -9999], [3, 4]]).with_nodata(Some(-9999.0));
        let raw = band.data().to_values(band.nodata(), false);
        assert_eq!(raw[1], Value::Int(-9999));

        let masked = band.data().to_values(band.nodata(), true);
        assert_eq!(
            masked,
            vec![Value::Int(1), Value::Null, Value::Int(3), Value::Int(4)]
        );
    }

    #[test]
    fn test_remap_keeps_type() {
        let data = BandData::UInt8(array![[1u8, 2], [3, 4]]);
        let flipped = data.remap(2, 3, 255.0, |r, c| (c < 2).then(|| (r, 1 - c)));
        assert_eq!(flipped, BandData::UInt8(array![[2, 1, 255], [4, 3, 255]]));
    }

    #[test]
    fn test_typed_access() {
        let band = Band::from_array(array![[0.5f32]]);
        assert!(band.as_array::<f32>().is_some());
        assert!(band.as_array::<f64>().is_none());
    }

    #[test]
    fn test_empty_description_is_absent() {
        let band = Band::from_array(array![[0u8]]).with_description("");
        assert_eq!(band.description(), None);
    }
}
