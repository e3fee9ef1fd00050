//! Cloud masking from quality-assurance bitfields
//!
//! Each dataset family flags clouds differently. Masking sets the flagged
//! pixels to NaN in every band of the scene; clear pixels pass through
//! untouched, so masking twice gives the same image as masking once.

use crate::maybe_rayon::*;
use ndarray::Array2;
use serde::Serialize;
use soilcarbon_core::raster::MultiBandImage;
use soilcarbon_core::{Error, Result};

/// Landsat `pixel_qa`: cloud shadow
const LANDSAT_SHADOW: u32 = 1 << 3;
/// Landsat `pixel_qa`: cloud
const LANDSAT_CLOUD: u32 = 1 << 5;
/// Landsat 4/5/7 `pixel_qa`: cloud confidence high bit
const LANDSAT_CLOUD_CONFIDENCE: u32 = 1 << 7;
/// Sentinel-2 `QA60`: opaque clouds
const S2_CLOUD: u32 = 1 << 10;
/// Sentinel-2 `QA60`: cirrus
const S2_CIRRUS: u32 = 1 << 11;

/// Landsat 8 optical bands whose reflectance must lie in (0, 10000)
const L8_OPTICAL_BANDS: &[&str] = &["B1", "B2", "B3", "B4", "B5", "B6", "B7"];
const L8_REFLECTANCE_MAX: f64 = 10000.0;

/// Which quality rules apply to a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CloudMaskFamily {
    /// Landsat 4, 5 and 7 surface reflectance
    Landsat457,
    Landsat8,
    Sentinel2,
}

impl CloudMaskFamily {
    /// Band holding the quality bitfield
    pub fn quality_band(self) -> &'static str {
        match self {
            Self::Landsat457 | Self::Landsat8 => "pixel_qa",
            Self::Sentinel2 => "QA60",
        }
    }

    /// Whether a quality word marks the pixel as clear
    pub fn is_clear(self, qa: u32) -> bool {
        match self {
            Self::Landsat457 => {
                let cloudy = qa & LANDSAT_CLOUD != 0 && qa & LANDSAT_CLOUD_CONFIDENCE != 0;
                !(cloudy || qa & LANDSAT_SHADOW != 0)
            }
            Self::Landsat8 => qa & (LANDSAT_SHADOW | LANDSAT_CLOUD) == 0,
            Self::Sentinel2 => qa & (S2_CLOUD | S2_CIRRUS) == 0,
        }
    }

    /// Landsat rules drop edge pixels missing in any band
    fn requires_all_bands(self) -> bool {
        !matches!(self, Self::Sentinel2)
    }
}

/// Mask `image` in place according to `family`.
///
/// A quality word that is NaN counts as missing and masks the pixel. An
/// image left with no clear pixel is a valid result.
pub fn mask(image: &mut MultiBandImage, family: CloudMaskFamily) -> Result<()> {
    let keep = clear_pixels(image, family)?;
    image.update_mask(&keep)
}

/// Per-pixel validity for `image` under `family`, without modifying it
pub fn clear_pixels(image: &MultiBandImage, family: CloudMaskFamily) -> Result<Array2<bool>> {
    let qa = image.band(family.quality_band())?.data();
    let (rows, cols) = image.shape();

    let all_bands: Vec<&Array2<f64>> = if family.requires_all_bands() {
        image.iter().map(|(_, band)| band.data()).collect()
    } else {
        Vec::new()
    };
    let optical: Vec<&Array2<f64>> = if family == CloudMaskFamily::Landsat8 {
        L8_OPTICAL_BANDS
            .iter()
            .map(|&name| image.band(name).map(|b| b.data()))
            .collect::<Result<_>>()?
    } else {
        Vec::new()
    };

    let keep: Vec<bool> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_keep = vec![false; cols];
            for col in 0..cols {
                let word = qa[(row, col)];
                if !word.is_finite() || word < 0.0 {
                    continue;
                }
                if !family.is_clear(word as u32) {
                    continue;
                }
                if all_bands.iter().any(|b| b[(row, col)].is_nan()) {
                    continue;
                }
                if optical
                    .iter()
                    .any(|b| !(b[(row, col)] > 0.0 && b[(row, col)] < L8_REFLECTANCE_MAX))
                {
                    continue;
                }
                row_keep[col] = true;
            }
            row_keep
        })
        .collect();

    Array2::from_shape_vec((rows, cols), keep).map_err(|e| Error::Other(e.to_string()))
}
