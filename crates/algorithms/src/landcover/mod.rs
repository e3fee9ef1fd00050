//! Land-cover change analysis
//!
//! - Class taxonomy: code → name, group and color
//! - Transition aggregation: net stock change per (origin, destination) group
//! - Diverging chart layout of the aggregated summary

pub mod chart;
pub mod taxonomy;
pub mod transitions;

pub use chart::{ChartSeries, DivergingChart};
pub use taxonomy::{ClassGroup, ClassTaxonomy, LandCoverClass, TaxonomyDefinition};
pub use transitions::{
    aggregate, DestinationEntry, EpochLayers, Epochs, RasterPair, TransitionSummary,
};
