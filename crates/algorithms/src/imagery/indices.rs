//! Normalized-difference index bands
//!
//! Every composite carries two derived bands, `NDVI` and `NDWI`, computed
//! from a fixed band pair per sensor. Both use the same ratio.

use crate::maybe_rayon::*;
use ndarray::Array2;
use serde::Serialize;
use soilcarbon_core::raster::{MultiBandImage, Raster};
use soilcarbon_core::{Error, Result};

/// A derived band `name = (positive - negative) / (positive + negative)`.
///
/// `positive` is always the near-infrared band of the sensor; `negative` is
/// red for NDVI and green for NDWI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexPair {
    pub name: &'static str,
    pub positive: &'static str,
    pub negative: &'static str,
}

impl IndexPair {
    pub const fn new(name: &'static str, positive: &'static str, negative: &'static str) -> Self {
        Self {
            name,
            positive,
            negative,
        }
    }

    /// Index band computed from the named bands of `image`
    pub fn compute(&self, image: &MultiBandImage) -> Result<Raster<f64>> {
        normalized_difference(image.band(self.positive)?, image.band(self.negative)?)
    }
}

/// Per-pixel `(positive - negative) / (positive + negative)` of two
/// co-registered reflectance bands.
///
/// Masked (NaN) pixels stay masked, and so does a pixel where both
/// reflectances are zero.
pub fn normalized_difference(positive: &Raster<f64>, negative: &Raster<f64>) -> Result<Raster<f64>> {
    let grid = positive.grid();
    grid.ensure_aligned(&negative.grid())?;

    let (rows, cols) = grid.shape();
    let (pos, neg) = (positive.data(), negative.data());
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            pos.row(row)
                .iter()
                .zip(neg.row(row).iter())
                .map(|(&p, &n)| reflectance_ratio(p, n))
                .collect::<Vec<f64>>()
        })
        .collect();

    let mut index = Raster::on_grid(&grid, f64::NAN);
    index.set_nodata(Some(f64::NAN));
    *index.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    Ok(index)
}

/// Append one band per pair to `image`, in pair order
pub fn append_indices(image: &mut MultiBandImage, pairs: &[IndexPair]) -> Result<()> {
    for pair in pairs {
        let band = pair.compute(image)?;
        image.push_band(pair.name, band)?;
    }
    Ok(())
}

fn reflectance_ratio(positive: f64, negative: f64) -> f64 {
    let sum = positive + negative;
    if positive.is_nan() || negative.is_nan() || sum == 0.0 {
        f64::NAN
    } else {
        (positive - negative) / sum
    }
}
