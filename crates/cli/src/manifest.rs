//! JSON scene manifests: which GeoTIFF holds each band of each scene.
//!
//! ```json
//! {
//!   "scenes": [
//!     {
//!       "id": "S2A_20180312",
//!       "collection": "COPERNICUS/S2",
//!       "date": "2018-03-12",
//!       "cloudiness": 4.1,
//!       "bands": { "B2": "2018-03-12/B2.tif", "QA60": "2018-03-12/QA60.tif" }
//!     }
//!   ]
//! }
//! ```
//!
//! Relative band paths are resolved against the manifest's directory.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use soilcarbon_algorithms::imagery::{DateWindow, Scene, SceneSource};
use soilcarbon_core::io::read_geotiff;
use soilcarbon_core::{BBox, Error, GridSpec, MultiBandImage, Raster};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneEntry {
    pub id: String,
    pub collection: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub cloudiness: Option<f64>,
    pub bands: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneManifest {
    pub scenes: Vec<SceneEntry>,
}

/// Scenes listed in a manifest, read from disk on request and optionally
/// cut to a bounding box.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    base: PathBuf,
    manifest: SceneManifest,
    clip: Option<BBox>,
}

impl ManifestSource {
    pub fn open(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene manifest {}", path.display()))?;
        let manifest: SceneManifest = serde_json::from_str(&text)
            .with_context(|| format!("Invalid scene manifest {}", path.display()))?;
        let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(Self::new(base, manifest))
    }

    pub fn new(base: PathBuf, manifest: SceneManifest) -> Self {
        Self {
            base,
            manifest,
            clip: None,
        }
    }

    pub fn with_clip(mut self, bbox: BBox) -> Self {
        self.clip = Some(bbox);
        self
    }

    pub fn len(&self) -> usize {
        self.manifest.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.manifest.scenes.is_empty()
    }

    /// Grid of the first listed band, after clipping: the grid composites are built on
    pub fn grid(&self) -> Result<GridSpec> {
        let entry = self
            .manifest
            .scenes
            .first()
            .context("Scene manifest lists no scenes")?;
        let path = entry
            .bands
            .values()
            .next()
            .with_context(|| format!("Scene {} lists no bands", entry.id))?;
        Ok(self.read_band(path)?.grid())
    }

    fn read_band(&self, path: &Path) -> soilcarbon_core::Result<Raster<f64>> {
        let raster: Raster<f64> = read_geotiff(self.base.join(path))?;
        Ok(match &self.clip {
            Some(bbox) => raster.clip(bbox),
            None => raster,
        })
    }

    fn load(&self, entry: &SceneEntry) -> soilcarbon_core::Result<Scene> {
        let mut bands = Vec::with_capacity(entry.bands.len());
        for (name, path) in &entry.bands {
            bands.push((name.clone(), self.read_band(path)?));
        }
        let grid = bands
            .first()
            .map(|(_, band)| band.grid())
            .ok_or_else(|| Error::InvalidParameter {
                name: "bands",
                value: entry.id.clone(),
                reason: "scene lists no bands".into(),
            })?;
        Ok(Scene {
            id: entry.id.clone(),
            collection: entry.collection.clone(),
            date: entry.date,
            cloudiness: entry.cloudiness,
            image: MultiBandImage::from_bands(grid, bands)?,
        })
    }
}

impl SceneSource for ManifestSource {
    fn scenes(&self, collection: &str, window: &DateWindow) -> soilcarbon_core::Result<Vec<Scene>> {
        let scenes = self
            .manifest
            .scenes
            .iter()
            .filter(|e| e.collection == collection && window.contains(e.date))
            .map(|e| self.load(e))
            .collect::<soilcarbon_core::Result<Vec<_>>>()?;
        debug!(collection, %window, scenes = scenes.len(), "manifest scenes loaded");
        Ok(scenes)
    }
}
