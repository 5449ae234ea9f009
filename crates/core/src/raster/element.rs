//! Raster element trait for typed cell values

use crate::raster::BandData;
use crate::table::Value;
use ndarray::Array2;
use num_traits::{NumCast, Zero};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// In-memory element type of a raster band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
}

impl DataType {
    /// Size of one cell in bytes
    pub const fn size(self) -> usize {
        match self {
            DataType::UInt8 | DataType::Int8 => 1,
            DataType::UInt16 | DataType::Int16 => 2,
            DataType::Int32 | DataType::Float32 => 4,
            DataType::Int64 | DataType::Float64 => 8,
        }
    }

    /// Whether this type is a floating point type
    pub const fn is_float(self) -> bool {
        matches!(self, DataType::Float32 | DataType::Float64)
    }

    /// Sentinel used when a band needs nodata but declares none: NaN for
    /// floats, the largest value for unsigned and the smallest for signed
    /// integers
    pub fn default_nodata(self) -> f64 {
        match self {
            DataType::UInt8 => u8::MAX as f64,
            DataType::UInt16 => u16::MAX as f64,
            DataType::Int8 => i8::MIN as f64,
            DataType::Int16 => i16::MIN as f64,
            DataType::Int32 => i32::MIN as f64,
            DataType::Int64 => i64::MIN as f64,
            DataType::Float32 | DataType::Float64 => f64::NAN,
        }
    }
}

/// Trait for types that can be stored in a raster cell.
///
/// Nodata values are carried as `f64` (as GDAL does) and compared after
/// casting into the cell type.
pub trait RasterElement:
    Copy + Clone + Debug + PartialOrd + PartialEq + NumCast + Zero + Send + Sync + 'static
{
    /// Band element type tag for this type
    const DATA_TYPE: DataType;

    /// Wrap a typed grid into a [`BandData`]
    fn into_band_data(data: Array2<Self>) -> BandData;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<f64>) -> bool;

    /// Convert self into a table value
    fn to_value(self) -> Value;

    /// Convert self to f64 (NaN if not representable)
    fn as_f64(self) -> f64 {
        NumCast::from(self).unwrap_or(f64::NAN)
    }
}

macro_rules! impl_raster_element_int {
    ($t:ty, $dt:ident) => {
        impl RasterElement for $t {
            const DATA_TYPE: DataType = DataType::$dt;

            fn into_band_data(data: Array2<Self>) -> BandData {
                BandData::$dt(data)
            }

            fn is_nodata(&self, nodata: Option<f64>) -> bool {
                match nodata.and_then(|nd| <$t as NumCast>::from(nd)) {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }

            fn to_value(self) -> Value {
                Value::Int(self as i64)
            }
        }
    };
}

macro_rules! impl_raster_element_float {
    ($t:ty, $dt:ident) => {
        impl RasterElement for $t {
            const DATA_TYPE: DataType = DataType::$dt;

            fn into_band_data(data: Array2<Self>) -> BandData {
                BandData::$dt(data)
            }

            fn is_nodata(&self, nodata: Option<f64>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata.and_then(|nd| <$t as NumCast>::from(nd)) {
                    Some(nd) => *self == nd,
                    None => false,
                }
            }

            fn to_value(self) -> Value {
                Value::Float(self as f64)
            }
        }
    };
}

impl_raster_element_int!(u8, UInt8);
impl_raster_element_int!(i8, Int8);
impl_raster_element_int!(u16, UInt16);
impl_raster_element_int!(i16, Int16);
impl_raster_element_int!(i32, Int32);
impl_raster_element_int!(i64, Int64);
impl_raster_element_float!(f32, Float32);
impl_raster_element_float!(f64, Float64);
