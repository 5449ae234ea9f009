//! Cell encodings of the `.gri` payload

use crate::error::{Error, Result};
use crate::raster::{DataType, RasterElement};
use byteorder::{BigEndian, ByteOrder as _, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Data type tag of an R raster file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GrdDataType {
    /// Logical, one byte; any non-zero byte reads as 1
    Log1s,
    Int1s,
    Int2s,
    Int4s,
    Int8s,
    Int1u,
    Int2u,
    Flt4s,
    Flt8s,
}

/// Tag → (type, in-memory element type).
const DATA_TYPES: [(&str, GrdDataType, DataType); 9] = [
    ("LOG1S", GrdDataType::Log1s, DataType::UInt8),
    ("INT1S", GrdDataType::Int1s, DataType::Int8),
    ("INT2S", GrdDataType::Int2s, DataType::Int16),
    ("INT4S", GrdDataType::Int4s, DataType::Int32),
    ("INT8S", GrdDataType::Int8s, DataType::Int64),
    ("INT1U", GrdDataType::Int1u, DataType::UInt8),
    ("INT2U", GrdDataType::Int2u, DataType::UInt16),
    ("FLT4S", GrdDataType::Flt4s, DataType::Float32),
    ("FLT8S", GrdDataType::Flt8s, DataType::Float64),
];

impl GrdDataType {
    /// Every supported tag, in declaration order
    pub const ALL: [GrdDataType; 9] = [
        GrdDataType::Log1s,
        GrdDataType::Int1s,
        GrdDataType::Int2s,
        GrdDataType::Int4s,
        GrdDataType::Int8s,
        GrdDataType::Int1u,
        GrdDataType::Int2u,
        GrdDataType::Flt4s,
        GrdDataType::Flt8s,
    ];

    /// Parse a `datatype=` tag (case-insensitive)
    pub fn from_tag(tag: &str) -> Result<Self> {
        let tag = tag.trim();
        DATA_TYPES
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(tag))
            .map(|&(_, dt, _)| dt)
            .ok_or_else(|| Error::UnsupportedDataType(tag.to_string()))
    }

    /// Tag written to the sidecar
    pub fn tag(self) -> &'static str {
        self.entry().0
    }

    /// Element type the cells are decoded into
    pub fn data_type(self) -> DataType {
        self.entry().2
    }

    /// Size of one cell in bytes
    pub fn size(self) -> usize {
        self.data_type().size()
    }

    /// Tag used when writing a band of the given element type
    pub fn for_data_type(data_type: DataType) -> Self {
        match data_type {
            DataType::UInt8 => GrdDataType::Int1u,
            DataType::Int8 => GrdDataType::Int1s,
            DataType::UInt16 => GrdDataType::Int2u,
            DataType::Int16 => GrdDataType::Int2s,
            DataType::Int32 => GrdDataType::Int4s,
            DataType::Int64 => GrdDataType::Int8s,
            DataType::Float32 => GrdDataType::Flt4s,
            DataType::Float64 => GrdDataType::Flt8s,
        }
    }

    fn entry(self) -> &'static (&'static str, GrdDataType, DataType) {
        // every variant has exactly one row in DATA_TYPES
        &DATA_TYPES[self as usize]
    }
}

impl fmt::Display for GrdDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Byte order of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

impl ByteOrder {
    /// Parse a `byteorder=` tag: `little` or `big`
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "little" => Ok(ByteOrder::Little),
            "big" => Ok(ByteOrder::Big),
            other => Err(Error::UnsupportedByteOrder(other.to_string())),
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            ByteOrder::Little => "little",
            ByteOrder::Big => "big",
        }
    }
}

/// Interleaving of multi-band payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BandOrder {
    /// Band interleaved by line
    #[default]
    Bil,
    /// Band sequential
    Bsq,
    /// Band interleaved by pixel
    Bip,
}

impl BandOrder {
    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag.trim().to_ascii_uppercase().as_str() {
            "BIL" => Ok(BandOrder::Bil),
            "BSQ" => Ok(BandOrder::Bsq),
            "BIP" => Ok(BandOrder::Bip),
            other => Err(Error::invalid_value("bandorder", other, "expected BIL, BSQ or BIP")),
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            BandOrder::Bil => "BIL",
            BandOrder::Bsq => "BSQ",
            BandOrder::Bip => "BIP",
        }
    }

    /// Position of cell (row, col) of band `band` in the flat payload
    pub fn offset(self, band: usize, row: usize, col: usize, shape: (usize, usize, usize)) -> usize {
        let (rows, cols, nbands) = shape;
        match self {
            BandOrder::Bsq => band * rows * cols + row * cols + col,
            BandOrder::Bil => row * nbands * cols + band * cols + col,
            BandOrder::Bip => (row * cols + col) * nbands + band,
        }
    }
}

/// Fixed-width cell encodings with a byte order.
pub(crate) trait GrdValue: RasterElement {
    /// Decode `bytes` (a whole number of cells) into values
    fn decode(order: ByteOrder, bytes: &[u8]) -> Vec<Self>;

    /// Append the encoded cells to `out`
    fn encode(order: ByteOrder, values: &[Self], out: &mut Vec<u8>);
}

impl GrdValue for u8 {
    fn decode(_order: ByteOrder, bytes: &[u8]) -> Vec<Self> {
        bytes.to_vec()
    }

    fn encode(_order: ByteOrder, values: &[Self], out: &mut Vec<u8>) {
        out.extend_from_slice(values);
    }
}

impl GrdValue for i8 {
    fn decode(_order: ByteOrder, bytes: &[u8]) -> Vec<Self> {
        bytes.iter().map(|&b| b as i8).collect()
    }

    fn encode(_order: ByteOrder, values: &[Self], out: &mut Vec<u8>) {
        out.extend(values.iter().map(|&v| v as u8));
    }
}

macro_rules! impl_grd_value {
    ($t:ty, $read:ident, $write:ident) => {
        impl GrdValue for $t {
            fn decode(order: ByteOrder, bytes: &[u8]) -> Vec<Self> {
                let mut values = vec![<$t>::default(); bytes.len() / std::mem::size_of::<$t>()];
                match order {
                    ByteOrder::Little => LittleEndian::$read(bytes, &mut values),
                    ByteOrder::Big => BigEndian::$read(bytes, &mut values),
                }
                values
            }

            fn encode(order: ByteOrder, values: &[Self], out: &mut Vec<u8>) {
                let start = out.len();
                out.resize(start + values.len() * std::mem::size_of::<$t>(), 0);
                match order {
                    ByteOrder::Little => LittleEndian::$write(values, &mut out[start..]),
                    ByteOrder::Big => BigEndian::$write(values, &mut out[start..]),
                }
            }
        }
    };
}

impl_grd_value!(u16, read_u16_into, write_u16_into);
impl_grd_value!(i16, read_i16_into, write_i16_into);
impl_grd_value!(i32, read_i32_into, write_i32_into);
impl_grd_value!(i64, read_i64_into, write_i64_into);
impl_grd_value!(f32, read_f32_into, write_f32_into);
impl_grd_value!(f64, read_f64_into, write_f64_into);
