//! Raster data structures and operations

mod element;
mod geotransform;
mod grid;
mod image;
mod spec;

pub use element::RasterElement;
pub use geotransform::GeoTransform;
pub use grid::{Raster, RasterStatistics};
pub use image::MultiBandImage;
pub use spec::GridSpec;
