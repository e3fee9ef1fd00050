//! Grid description shared by co-registered layers

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::GeoTransform;
use serde::{Deserialize, Serialize};

/// Tolerance, in map units, when comparing the transforms of two grids
const GRID_TOLERANCE: f64 = 1e-9;

/// Shape and georeferencing of a raster grid, without the cell data.
///
/// Composites are produced on a caller-supplied `GridSpec`; rasters that
/// must line up cell-for-cell are checked with [`GridSpec::ensure_aligned`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    #[serde(default)]
    pub crs: Option<CRS>,
}

impl GridSpec {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform) -> Self {
        Self {
            rows,
            cols,
            transform,
            crs: None,
        }
    }

    pub fn with_crs(mut self, crs: CRS) -> Self {
        self.crs = Some(crs);
        self
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Verify that `other` describes exactly the same grid.
    ///
    /// CRSs are only compared when both sides declare one.
    pub fn ensure_aligned(&self, other: &GridSpec) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(Error::SizeMismatch {
                er: self.rows,
                ec: self.cols,
                ar: other.rows,
                ac: other.cols,
            });
        }
        if !self.transform.approx_eq(&other.transform, GRID_TOLERANCE) {
            return Err(Error::GridMismatch(format!(
                "transform {:?} differs from {:?}",
                other.transform, self.transform
            )));
        }
        if let (Some(a), Some(b)) = (&self.crs, &other.crs) {
            if !a.is_equivalent(b) {
                return Err(Error::CrsMismatch(a.identifier(), b.identifier()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aligned_grids() {
        let a = GridSpec::new(3, 4, GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        let b = a.clone().with_crs(CRS::wgs84());
        assert!(a.ensure_aligned(&b).is_ok());
    }

    #[test]
    fn test_shifted_grid_is_rejected() {
        let a = GridSpec::new(3, 4, GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        let b = GridSpec::new(3, 4, GeoTransform::new(0.5, 3.0, 1.0, -1.0));
        assert!(matches!(a.ensure_aligned(&b), Err(Error::GridMismatch(_))));
    }

    #[test]
    fn test_crs_conflict_is_rejected() {
        let t = GeoTransform::new(0.0, 3.0, 1.0, -1.0);
        let a = GridSpec::new(3, 4, t).with_crs(CRS::wgs84());
        let b = GridSpec::new(3, 4, t).with_crs(CRS::web_mercator());
        assert!(matches!(a.ensure_aligned(&b), Err(Error::CrsMismatch(_, _))));
    }
}
