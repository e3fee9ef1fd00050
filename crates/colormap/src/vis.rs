//! True-color visualization of multi-band images and animation frame stacks.

use ndarray::{s, Array3, Array4};
use serde::{Deserialize, Serialize};
use soilcarbon_core::{Error, MultiBandImage, Result};

/// Min/max stretch with optional gamma, applied to one or three bands.
///
/// A stretched value `t` in [0, 1] is written as `255 * t^(1/gamma)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisParams {
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gamma: Option<f64>,
    pub bands: Vec<String>,
}

impl VisParams {
    pub fn new(min: f64, max: f64, bands: &[&str]) -> Self {
        Self {
            min,
            max,
            gamma: None,
            bands: bands.iter().map(|b| b.to_string()).collect(),
        }
    }

    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = Some(gamma);
        self
    }

    /// Stretch one value to a byte; `None` for NaN
    pub fn stretch(&self, v: f64) -> Option<u8> {
        if v.is_nan() {
            return None;
        }
        let range = self.max - self.min;
        let t = if range.abs() > f64::EPSILON {
            ((v - self.min) / range).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let t = match self.gamma {
            Some(g) if g > 0.0 => t.powf(1.0 / g),
            _ => t,
        };
        Some((t * 255.0).round() as u8)
    }
}

/// Render the `vis.bands` of an image as an RGBA array `(row, col, 4)`.
///
/// Three bands map to red, green and blue; a single band is drawn as gray.
/// A pixel with NaN in any selected band is fully transparent.
pub fn visualize_rgb(image: &MultiBandImage, vis: &VisParams) -> Result<Array3<u8>> {
    if vis.bands.len() != 1 && vis.bands.len() != 3 {
        return Err(Error::InvalidParameter {
            name: "bands",
            value: vis.bands.join(","),
            reason: "visualization needs 1 or 3 bands".into(),
        });
    }
    let bands = vis
        .bands
        .iter()
        .map(|name| image.band(name))
        .collect::<Result<Vec<_>>>()?;

    let (rows, cols) = image.shape();
    let mut out = Array3::<u8>::zeros((rows, cols, 4));

    for row in 0..rows {
        for col in 0..cols {
            let channels: Option<Vec<u8>> = bands
                .iter()
                .map(|b| vis.stretch(b.data()[(row, col)]))
                .collect();
            let Some(channels) = channels else {
                continue;
            };
            let (r, g, b) = match channels.as_slice() {
                [v] => (*v, *v, *v),
                [r, g, b] => (*r, *g, *b),
                _ => continue,
            };
            out[(row, col, 0)] = r;
            out[(row, col, 1)] = g;
            out[(row, col, 2)] = b;
            out[(row, col, 3)] = 255;
        }
    }
    Ok(out)
}

/// Stack per-year frames `(row, col, channels)` into `(frame, row, col, 3|4)`.
///
/// With `alpha`, three-channel frames get an opaque alpha channel and
/// four-channel frames keep theirs; without it only RGB is kept.
pub fn frame_stack(frames: &[Array3<u8>], alpha: bool) -> Result<Array4<u8>> {
    let Some(first) = frames.first() else {
        return Err(Error::InvalidParameter {
            name: "frames",
            value: "0".into(),
            reason: "no frames to stack".into(),
        });
    };
    let (rows, cols, _) = first.dim();
    let depth = if alpha { 4 } else { 3 };

    let mut stack = Array4::<u8>::zeros((frames.len(), rows, cols, depth));
    for (i, frame) in frames.iter().enumerate() {
        let (fr, fc, channels) = frame.dim();
        if (fr, fc) != (rows, cols) {
            return Err(Error::SizeMismatch {
                er: rows,
                ec: cols,
                ar: fr,
                ac: fc,
            });
        }
        if channels < 3 {
            return Err(Error::InvalidParameter {
                name: "frames",
                value: channels.to_string(),
                reason: "frames need at least 3 channels".into(),
            });
        }
        let mut slot = stack.slice_mut(s![i, .., .., ..]);
        slot.slice_mut(s![.., .., 0..3]).assign(&frame.slice(s![.., .., 0..3]));
        if alpha {
            if channels >= 4 {
                slot.slice_mut(s![.., .., 3]).assign(&frame.slice(s![.., .., 3]));
            } else {
                slot.slice_mut(s![.., .., 3]).fill(255);
            }
        }
    }
    Ok(stack)
}
