//! Raster-to-RGBA rendering using color schemes and class palettes.

use crate::scheme::{evaluate, ColorScheme, Rgb};
use soilcarbon_core::raster::{Raster, RasterElement};
use std::collections::{BTreeMap, BTreeSet};

/// Parameters for colormap rendering.
#[derive(Debug, Clone)]
pub struct ColormapParams {
    pub scheme: ColorScheme,
    /// Values below this are clamped.
    pub min: f64,
    /// Values above this are clamped.
    pub max: f64,
    /// Color for nodata pixels (RGBA). Default: fully transparent.
    pub nodata_color: [u8; 4],
}

impl ColormapParams {
    /// Params spanning the scheme's natural range
    pub fn new(scheme: ColorScheme) -> Self {
        let (min, max) = scheme.default_range();
        Self::with_range(scheme, min, max)
    }

    pub fn with_range(scheme: ColorScheme, min: f64, max: f64) -> Self {
        Self {
            scheme,
            min,
            max,
            nodata_color: [0, 0, 0, 0],
        }
    }
}

/// Auto-detect min/max from a raster, returning `ColormapParams` ready to use.
///
/// Stock change is symmetric around zero, so for `StockChange` the range is
/// widened to `[-m, m]` with `m` the largest absolute value.
pub fn auto_params<T: RasterElement>(raster: &Raster<T>, scheme: ColorScheme) -> ColormapParams {
    let nodata = raster.nodata();
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    for v in raster
        .data()
        .iter()
        .filter(|v| !v.is_nodata(nodata))
        .filter_map(|v| v.to_f64())
        .filter(|v| v.is_finite())
    {
        min = min.min(v);
        max = max.max(v);
    }

    if !min.is_finite() || !max.is_finite() {
        let (lo, hi) = scheme.default_range();
        return ColormapParams::with_range(scheme, lo, hi);
    }
    if scheme == ColorScheme::StockChange {
        let m = min.abs().max(max.abs());
        if m > f64::EPSILON {
            return ColormapParams::with_range(scheme, -m, m);
        }
    }
    if (max - min).abs() < f64::EPSILON {
        max = min + 1.0;
    }
    ColormapParams::with_range(scheme, min, max)
}

/// Convert a raster to an RGBA pixel buffer of length `rows * cols * 4`,
/// row-major. Nodata pixels get `params.nodata_color`.
pub fn raster_to_rgba<T: RasterElement>(raster: &Raster<T>, params: &ColormapParams) -> Vec<u8> {
    let nodata = raster.nodata();
    let range = params.max - params.min;
    let inv_range = if range.abs() > f64::EPSILON { 1.0 / range } else { 1.0 };

    let mut rgba = Vec::with_capacity(raster.len() * 4);
    for val in raster.data().iter() {
        let pixel = match val.to_f64() {
            Some(v) if v.is_finite() && !val.is_nodata(nodata) => {
                evaluate(params.scheme, (v - params.min) * inv_range).to_rgba(255)
            }
            _ => params.nodata_color,
        };
        rgba.extend_from_slice(&pixel);
    }
    rgba
}

/// Colors for a categorical (class code) raster.
#[derive(Debug, Clone, Default)]
pub struct CategoricalPalette {
    pub colors: BTreeMap<i32, Rgb>,
    /// Codes drawn fully transparent (open water over a basemap)
    pub transparent: BTreeSet<i32>,
}

impl CategoricalPalette {
    pub fn new(colors: BTreeMap<i32, Rgb>) -> Self {
        Self {
            colors,
            transparent: BTreeSet::new(),
        }
    }

    pub fn with_transparent(mut self, code: i32) -> Self {
        self.transparent.insert(code);
        self
    }
}

/// Render class codes through a palette. Nodata, unlisted and transparent
/// codes come out as `[0, 0, 0, 0]`.
pub fn categorical_to_rgba(raster: &Raster<i32>, palette: &CategoricalPalette) -> Vec<u8> {
    let nodata = raster.nodata();
    let mut rgba = Vec::with_capacity(raster.len() * 4);
    for &code in raster.data().iter() {
        let pixel = if code.is_nodata(nodata) || palette.transparent.contains(&code) {
            [0, 0, 0, 0]
        } else {
            palette
                .colors
                .get(&code)
                .map_or([0, 0, 0, 0], |c| c.to_rgba(255))
        };
        rgba.extend_from_slice(&pixel);
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raster_to_rgba_basic() {
        let mut r = Raster::<f64>::from_vec(vec![0.0, 0.5, 1.0, f64::NAN], 2, 2).unwrap();
        r.set_nodata(Some(f64::NAN));

        let params = ColormapParams::with_range(ColorScheme::Grayscale, 0.0, 1.0);
        let rgba = raster_to_rgba(&r, &params);

        assert_eq!(rgba.len(), 16);
        assert_eq!(&rgba[0..4], &[0, 0, 0, 255]);
        assert_eq!(&rgba[4..8], &[128, 128, 128, 255]);
        assert_eq!(&rgba[8..12], &[255, 255, 255, 255]);
        assert_eq!(&rgba[12..16], &[0, 0, 0, 0]);
    }

    #[test]
    fn stock_change_auto_range_is_symmetric() {
        let r = Raster::<f64>::from_vec(vec![-2.0, 0.5, 6.0], 1, 3).unwrap();
        let params = auto_params(&r, ColorScheme::StockChange);
        assert_eq!(params.min, -6.0);
        assert_eq!(params.max, 6.0);

        let ndvi = auto_params(&r, ColorScheme::Ndvi);
        assert_eq!((ndvi.min, ndvi.max), (-2.0, 6.0));
    }

    #[test]
    fn auto_params_all_nodata_falls_back_to_scheme_range() {
        let r = Raster::<f64>::filled(1, 2, f64::NAN);
        let params = auto_params(&r, ColorScheme::StockChange);
        assert_eq!((params.min, params.max), (-10.0, 10.0));
    }

    #[test]
    fn auto_params_constant_raster() {
        let r = Raster::<f64>::filled(2, 2, 42.0);
        let params = auto_params(&r, ColorScheme::Grayscale);
        assert_eq!((params.min, params.max), (42.0, 43.0));
    }

    #[test]
    fn categorical_palette_with_transparent_water() {
        let mut classes = Raster::<i32>::from_vec(vec![190, 210, 0, 999], 2, 2).unwrap();
        classes.set_nodata(Some(0));

        let mut colors = BTreeMap::new();
        colors.insert(190, Rgb::new(195, 20, 0));
        colors.insert(210, Rgb::new(0, 70, 200));
        let palette = CategoricalPalette::new(colors).with_transparent(210);

        let rgba = categorical_to_rgba(&classes, &palette);
        assert_eq!(&rgba[0..4], &[195, 20, 0, 255]);
        assert_eq!(&rgba[4..8], &[0, 0, 0, 0]);
        assert_eq!(&rgba[8..12], &[0, 0, 0, 0]);
        assert_eq!(&rgba[12..16], &[0, 0, 0, 0]);
    }
}
