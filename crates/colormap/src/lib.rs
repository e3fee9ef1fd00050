//! # Soil-carbon Colormap
//!
//! Color handling and rendering for the soil-carbon change engine.
//!
//! - [`Rgb`] with hex parsing, used for land-cover class and group colors
//! - continuous [`ColorScheme`]s, among them the stock-change ramp
//!   (-10 to +10 t C/ha, red through pale yellow to teal)
//! - [`raster_to_rgba`] and [`categorical_to_rgba`] for single layers
//! - [`VisParams`] / [`visualize_rgb`] for true-color composites and
//!   [`frame_stack`] for yearly animation frames
//!
//! ## Usage
//!
//! ```ignore
//! use soilcarbon_colormap::{auto_params, raster_to_rgba, ColorScheme};
//!
//! let params = auto_params(&stock_change, ColorScheme::StockChange);
//! let rgba = raster_to_rgba(&stock_change, &params);
//! ```

mod render;
mod scheme;
mod vis;

pub use render::{
    auto_params, categorical_to_rgba, raster_to_rgba, CategoricalPalette, ColormapParams,
};
pub use scheme::{evaluate, ColorScheme, ColorStop, Rgb, STOCK_CHANGE_MAX, STOCK_CHANGE_MIN};
pub use vis::{frame_stack, visualize_rgb, VisParams};
