//! Satellite imagery compositing
//!
//! - Sensor catalog: datasets, band layouts, date windows
//! - Cloud masking from quality bitfields
//! - Scene sources and per-year median composites
//! - Normalized-difference index bands (NDVI, NDWI)

pub mod catalog;
pub mod cloud_mask;
pub mod composite;
pub mod indices;
pub mod source;

pub use catalog::{
    descriptor_for, Catalog, DateWindow, Instrument, SensorDataset, SensorDescriptor, VisPreset,
    YearEnd, YearSpan,
};
pub use cloud_mask::{mask, CloudMaskFamily};
pub use composite::{median_composite, CompositeImage, CompositeWarning, Compositor};
pub use indices::{append_indices, normalized_difference, IndexPair};
pub use source::{MemorySource, Scene, SceneSource};
