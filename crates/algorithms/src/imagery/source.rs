//! Scenes and where they come from

use crate::imagery::catalog::DateWindow;
use chrono::NaiveDate;
use soilcarbon_core::raster::MultiBandImage;
use soilcarbon_core::Result;

/// One acquisition from a source collection.
#[derive(Debug, Clone)]
pub struct Scene {
    pub id: String,
    pub collection: String,
    pub date: NaiveDate,
    /// Scene-level `CLOUDY_PIXEL_PERCENTAGE`, when the archive records one
    pub cloudiness: Option<f64>,
    /// Spectral bands plus the quality band; NaN marks missing pixels
    pub image: MultiBandImage,
}

/// Supplies the scenes of a collection acquired inside a date window.
///
/// Implementations must be shareable across threads, since years are
/// composited in parallel.
pub trait SceneSource: Sync {
    fn scenes(&self, collection: &str, window: &DateWindow) -> Result<Vec<Scene>>;
}

impl<T: SceneSource + ?Sized> SceneSource for &T {
    fn scenes(&self, collection: &str, window: &DateWindow) -> Result<Vec<Scene>> {
        (**self).scenes(collection, window)
    }
}

/// Scenes held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    scenes: Vec<Scene>,
}

impl MemorySource {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    pub fn push(&mut self, scene: Scene) {
        self.scenes.push(scene);
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

impl SceneSource for MemorySource {
    fn scenes(&self, collection: &str, window: &DateWindow) -> Result<Vec<Scene>> {
        Ok(self
            .scenes
            .iter()
            .filter(|s| s.collection == collection && window.contains(s.date))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soilcarbon_core::{GeoTransform, GridSpec};

    fn scene(collection: &str, date: (i32, u32, u32)) -> Scene {
        Scene {
            id: format!("{}-{:?}", collection, date),
            collection: collection.to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            cloudiness: None,
            image: MultiBandImage::new(GridSpec::new(1, 1, GeoTransform::default())),
        }
    }

    #[test]
    fn test_memory_source_filters_collection_and_window() {
        let source = MemorySource::new(vec![
            scene("COPERNICUS/S2", (2017, 12, 31)),
            scene("COPERNICUS/S2", (2018, 6, 1)),
            scene("COPERNICUS/S2", (2018, 12, 31)),
            scene("LANDSAT/LC08/C01/T1_SR", (2018, 6, 1)),
        ]);
        let window = DateWindow {
            start: NaiveDate::from_ymd_opt(2017, 12, 31).unwrap(),
            end: NaiveDate::from_ymd_opt(2018, 12, 31).unwrap(),
        };

        let found = source.scenes("COPERNICUS/S2", &window).unwrap();
        assert_eq!(found.len(), 2);
        let dates: Vec<NaiveDate> = found.iter().map(|s| s.date).collect();
        assert_eq!(
            dates,
            vec![
                NaiveDate::from_ymd_opt(2017, 12, 31).unwrap(),
                NaiveDate::from_ymd_opt(2018, 6, 1).unwrap(),
            ]
        );
    }
}
