//! # Soil-carbon Algorithms
//!
//! The two engines of the soil-carbon change workspace.
//!
//! - **imagery**: sensor catalog, cloud masking and yearly median
//!   composites with NDVI/NDWI bands
//! - **landcover**: class taxonomy, stock-change aggregation by land-cover
//!   transition and the diverging chart layout
//!
//! Both are synchronous. Row and year loops run on rayon when the
//! `parallel` feature is enabled (the default).

pub mod imagery;
pub mod landcover;
pub(crate) mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::imagery::{
        descriptor_for, mask, Catalog, CloudMaskFamily, CompositeImage, CompositeWarning,
        Compositor, Instrument, MemorySource, Scene, SceneSource, SensorDataset,
        SensorDescriptor,
    };
    pub use crate::landcover::{
        aggregate, ClassTaxonomy, DivergingChart, EpochLayers, Epochs, RasterPair,
        TransitionSummary,
    };
    pub use soilcarbon_core::prelude::*;
}
