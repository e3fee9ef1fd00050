//! # Soil-carbon Core
//!
//! Core types and I/O shared by the soil-carbon change engine.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced raster grid for stock and land-cover layers
//! - `MultiBandImage`: named band stacks for satellite scenes and composites
//! - `GridSpec`, `GeoTransform`, `CRS`: grid georeferencing and co-registration checks
//! - `Region`, `BBox`: the user's area of interest
//! - GeoTIFF reading and writing
//! - The workspace-wide `Error` type

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod region;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, GridSpec, MultiBandImage, Raster, RasterElement};
pub use region::{BBox, Region};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, GridSpec, MultiBandImage, Raster, RasterElement};
    pub use crate::region::{BBox, Region};
}
