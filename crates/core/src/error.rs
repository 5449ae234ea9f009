//! Error types for gridtable

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for gridtable operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not read raster metadata {}: {source}", path.display())]
    MetadataRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Missing key [{section}] {key}")]
    MissingKey { section: String, key: String },

    #[error("Invalid value for {key}: {value} ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Unsupported byte order: {0}")]
    UnsupportedByteOrder(String),

    #[error("Unsupported raster format: {0}")]
    UnsupportedFormat(String),

    #[error("Payload {} has {actual} bytes, expected {expected}", path.display())]
    PayloadSize {
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    #[error("Could not open raster file {}: {reason}", path.display())]
    Open { path: PathBuf, reason: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Duplicate table column: {0}")]
    DuplicateColumn(String),

    #[error("No rasters to process")]
    EmptyInput,

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("GDAL error: {0}")]
    #[cfg(feature = "gdal")]
    Gdal(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

impl Error {
    pub(crate) fn invalid_value(
        key: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidValue {
            key: key.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for gridtable operations
pub type Result<T> = std::result::Result<T, Error>;
