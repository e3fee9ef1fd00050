//! Multi-band images: satellite scenes and yearly composites

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, GridSpec, Raster};
use ndarray::{Array2, Zip};

/// An ordered set of named `f64` bands on one grid.
///
/// NaN marks a masked (no data) pixel. Band order is preserved, so the
/// layout of a composite is the sensor's band list followed by any derived
/// index bands.
#[derive(Debug, Clone)]
pub struct MultiBandImage {
    grid: GridSpec,
    names: Vec<String>,
    bands: Vec<Raster<f64>>,
}

impl MultiBandImage {
    /// Create an image with no bands on `grid`
    pub fn new(grid: GridSpec) -> Self {
        Self {
            grid,
            names: Vec::new(),
            bands: Vec::new(),
        }
    }

    /// Build an image from `(name, band)` pairs, all on `grid`
    pub fn from_bands<I, S>(grid: GridSpec, bands: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Raster<f64>)>,
        S: Into<String>,
    {
        let mut image = Self::new(grid);
        for (name, band) in bands {
            image.push_band(name, band)?;
        }
        Ok(image)
    }

    /// Append a band; a band name may appear only once.
    ///
    /// A band without a transform of its own takes on the image's
    /// georeferencing. A placed band must sit on the image grid exactly.
    pub fn push_band(&mut self, name: impl Into<String>, mut band: Raster<f64>) -> Result<()> {
        let name = name.into();
        let mut placed = band.grid();
        if placed.transform == GeoTransform::default() {
            placed.transform = self.grid.transform;
        }
        self.grid.ensure_aligned(&placed)?;
        if self.names.iter().any(|n| *n == name) {
            return Err(Error::InvalidParameter {
                name: "band",
                value: name,
                reason: "duplicate band name".into(),
            });
        }
        band.set_transform(self.grid.transform);
        band.set_crs(self.grid.crs.clone());
        band.set_nodata(Some(f64::NAN));
        self.names.push(name);
        self.bands.push(band);
        Ok(())
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn shape(&self) -> (usize, usize) {
        self.grid.shape()
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    pub fn band_names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn has_band(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// Look up a band by name
    pub fn band(&self, name: &str) -> Result<&Raster<f64>> {
        self.position(name).map(|i| &self.bands[i])
    }

    pub fn band_mut(&mut self, name: &str) -> Result<&mut Raster<f64>> {
        let i = self.position(name)?;
        Ok(&mut self.bands[i])
    }

    /// Iterate over `(name, band)` pairs in band order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Raster<f64>)> {
        self.names.iter().map(String::as_str).zip(self.bands.iter())
    }

    /// Copy the named bands, in the given order, into a new image
    pub fn select(&self, names: &[&str]) -> Result<Self> {
        let mut out = Self::new(self.grid.clone());
        for &name in names {
            out.push_band(name, self.band(name)?.clone())?;
        }
        Ok(out)
    }

    /// Pixels where every band holds a value
    pub fn valid_mask(&self) -> Array2<bool> {
        let mut mask = Array2::from_elem(self.shape(), true);
        for band in &self.bands {
            Zip::from(&mut mask)
                .and(band.data())
                .for_each(|m, &v| *m = *m && !v.is_nan());
        }
        mask
    }

    /// Mask out (set to NaN in every band) the pixels where `keep` is false.
    ///
    /// Already-masked pixels stay masked, so applying the same mask twice is a no-op.
    pub fn update_mask(&mut self, keep: &Array2<bool>) -> Result<()> {
        if keep.dim() != self.shape() {
            let (ar, ac) = keep.dim();
            return Err(Error::SizeMismatch {
                er: self.grid.rows,
                ec: self.grid.cols,
                ar,
                ac,
            });
        }
        for band in &mut self.bands {
            Zip::from(band.data_mut()).and(keep).for_each(|v, &k| {
                if !k {
                    *v = f64::NAN;
                }
            });
        }
        Ok(())
    }

    /// True when no pixel has a value in any band
    pub fn is_fully_masked(&self) -> bool {
        self.bands
            .iter()
            .all(|b| b.data().iter().all(|v| v.is_nan()))
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::MissingBand {
                band: name.to_string(),
                available: self.names.join(","),
            })
    }
}
