//! Error types for the soil-carbon engine

use thiserror::Error;

/// Main error type shared by every crate in the workspace
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Raster grids are not co-registered: {0}")]
    GridMismatch(String),

    #[error("GeoTIFF has no usable {0} tag")]
    MissingGeoTag(&'static str),

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Unknown sensor or dataset: {0}")]
    UnknownSensor(String),

    #[error("Year {year} is outside every valid range of {sensor}")]
    YearOutOfRange { sensor: String, year: i32 },

    #[error("Land-cover code {0} has no class group mapping")]
    UnknownClassCode(i32),

    #[error("Class group '{0}' has no color")]
    UnknownClassGroup(String),

    #[error("Band '{band}' not found in image (available: {available})")]
    MissingBand { band: String, available: String },

    #[error("Invalid region: {0}")]
    InvalidRegion(String),

    #[error("Selected region is too large: {area:.2} square degrees (limit {limit:.2})")]
    RegionTooLarge { area: f64, limit: f64 },

    #[error("Selected region lies outside the world boundary: {0}")]
    RegionOutOfBounds(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for soil-carbon operations
pub type Result<T> = std::result::Result<T, Error>;
