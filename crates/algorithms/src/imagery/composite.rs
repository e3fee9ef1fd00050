//! Yearly cloud-free composites
//!
//! For each requested year the compositor resolves the dataset covering it,
//! gathers the scenes of every source collection inside the year's date
//! window, masks clouds, and reduces the stack to a per-band per-pixel
//! median. `NDVI` and `NDWI` bands are appended last.

use crate::imagery::catalog::{Catalog, DateWindow, Instrument, SensorDataset, SensorDescriptor};
use crate::imagery::cloud_mask;
use crate::imagery::indices::append_indices;
use crate::imagery::source::{Scene, SceneSource};
use crate::maybe_rayon::*;
use ndarray::Array2;
use serde::Serialize;
use soilcarbon_core::raster::{GridSpec, MultiBandImage, Raster};
use soilcarbon_core::Result;
use std::fmt;
use tracing::{debug, info, warn};

/// Non-fatal conditions met while compositing a year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CompositeWarning {
    /// No scene contributed a clear pixel; every band is NaN
    EmptyComposite { year: i32, dataset: SensorDataset },
}

impl fmt::Display for CompositeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyComposite { year, dataset } => {
                write!(f, "no clear observation of {} for {}", dataset, year)
            }
        }
    }
}

/// One composite per nominal year.
#[derive(Debug, Clone)]
pub struct CompositeImage {
    pub year: i32,
    pub dataset: SensorDataset,
    pub window: DateWindow,
    /// Scenes inside the window that passed the cloudiness filter
    pub scenes_considered: usize,
    /// Scenes with at least one clear spectral pixel after masking
    pub scenes_used: usize,
    pub image: MultiBandImage,
    pub warnings: Vec<CompositeWarning>,
}

impl CompositeImage {
    pub fn descriptor(&self) -> &'static SensorDescriptor {
        self.dataset.descriptor()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, CompositeWarning::EmptyComposite { .. }))
    }
}

/// Builds composites from a scene source.
pub struct Compositor<S> {
    catalog: Catalog,
    source: S,
}

impl<S: SceneSource> Compositor<S> {
    pub fn new(catalog: Catalog, source: S) -> Self {
        Self { catalog, source }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Composite every year of `start..=stop`, ordered by year.
    ///
    /// All years are resolved before any work starts, so an uncovered year
    /// fails the whole request without partial output. Use
    /// [`Compositor::build_each_year`] to isolate failures per year.
    pub fn build_year_composites(
        &self,
        instrument: Instrument,
        start: i32,
        stop: i32,
        grid: &GridSpec,
    ) -> Result<Vec<CompositeImage>> {
        self.catalog.validate_years(instrument, start, stop)?;
        info!(%instrument, start, stop, "compositing years");

        (start..=stop)
            .into_par_iter()
            .map(|year| self.build_year_composite(instrument, year, grid))
            .collect()
    }

    /// Composite every year of `start..=stop`, keeping each year's outcome.
    pub fn build_each_year(
        &self,
        instrument: Instrument,
        start: i32,
        stop: i32,
        grid: &GridSpec,
    ) -> Vec<(i32, Result<CompositeImage>)> {
        (start..=stop)
            .into_par_iter()
            .map(|year| (year, self.build_year_composite(instrument, year, grid)))
            .collect()
    }

    /// Composite a single year of an instrument family
    pub fn build_year_composite(
        &self,
        instrument: Instrument,
        year: i32,
        grid: &GridSpec,
    ) -> Result<CompositeImage> {
        let descriptor = self.catalog.resolve(instrument, year)?;
        debug!(%instrument, year, dataset = descriptor.slug, "resolved dataset");
        self.composite_dataset(descriptor, year, grid)
    }

    /// Composite `year` of a specific dataset, bypassing instrument resolution
    pub fn composite_dataset(
        &self,
        descriptor: &'static SensorDescriptor,
        year: i32,
        grid: &GridSpec,
    ) -> Result<CompositeImage> {
        let window = descriptor.date_window(year)?;
        let scenes = self.gather(descriptor, &window)?;
        let scenes_considered = scenes.len();

        let mut masked = Vec::with_capacity(scenes.len());
        for scene in scenes {
            grid.ensure_aligned(scene.image.grid())?;
            let mut image = scene.image.select(&descriptor.scene_bands())?;
            cloud_mask::mask(&mut image, descriptor.cloud_mask)?;
            // A clear QA word over missing reflectance contributes nothing
            let spectral = image.select(descriptor.bands)?;
            if !spectral.is_fully_masked() {
                masked.push(spectral);
            }
        }
        let scenes_used = masked.len();
        debug!(
            dataset = descriptor.slug,
            year,
            %window,
            scenes_considered,
            scenes_used,
            "masked scenes"
        );

        let mut image = median_composite(&masked, descriptor.bands, grid)?;
        append_indices(&mut image, descriptor.indices)?;

        let mut warnings = Vec::new();
        if scenes_used == 0 {
            let warning = CompositeWarning::EmptyComposite {
                year,
                dataset: descriptor.dataset,
            };
            warn!(%warning, "empty composite");
            warnings.push(warning);
        }

        Ok(CompositeImage {
            year,
            dataset: descriptor.dataset,
            window,
            scenes_considered,
            scenes_used,
            image,
            warnings,
        })
    }

    /// Union of every source collection's scenes in `window`, under the cloudiness ceiling
    fn gather(&self, descriptor: &SensorDescriptor, window: &DateWindow) -> Result<Vec<Scene>> {
        let mut scenes = Vec::new();
        for collection in descriptor.collections {
            let found = self.source.scenes(collection, window)?;
            let before = found.len();
            scenes.extend(found.into_iter().filter(|s| {
                descriptor
                    .max_scene_cloudiness
                    .map_or(true, |ceiling| s.cloudiness.is_some_and(|c| c < ceiling))
            }));
            debug!(collection, found = before, "collection scenes");
        }
        Ok(scenes)
    }
}

/// Per-band per-pixel median over the images; NaN where no image has a value.
pub fn median_composite(
    images: &[MultiBandImage],
    bands: &[&str],
    grid: &GridSpec,
) -> Result<MultiBandImage> {
    let mut out = MultiBandImage::new(grid.clone());
    let (rows, cols) = grid.shape();

    for &name in bands {
        let layers: Vec<&Array2<f64>> = images
            .iter()
            .map(|img| img.band(name).map(|b| b.data()))
            .collect::<Result<_>>()?;

        let data: Vec<f64> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut values = Vec::with_capacity(layers.len());
                let mut row_data = vec![f64::NAN; cols];
                for (col, cell) in row_data.iter_mut().enumerate() {
                    values.clear();
                    values.extend(
                        layers
                            .iter()
                            .map(|l| l[(row, col)])
                            .filter(|v| !v.is_nan()),
                    );
                    *cell = median(&mut values);
                }
                row_data
            })
            .collect();

        let band = Raster::from_vec(data, rows, cols)?;
        out.push_band(name, band)?;
    }
    Ok(out)
}

/// Median of the values; even counts average the two middle values
fn median(values: &mut [f64]) -> f64 {
    let n = values.len();
    if n == 0 {
        return f64::NAN;
    }
    values.sort_unstable_by(f64::total_cmp);
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imagery::source::MemorySource;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use soilcarbon_core::{Error, GeoTransform, CRS};

    fn grid() -> GridSpec {
        GridSpec::new(2, 2, GeoTransform::new(113.0, -2.0, 0.0001, -0.0001))
    }

    fn s2_scene(date: (i32, u32, u32), value: f64, qa: [f64; 4], cloudiness: f64) -> Scene {
        let d = SensorDataset::Sentinel2.descriptor();
        let mut bands: Vec<(&str, Raster<f64>)> = d
            .bands
            .iter()
            .map(|&b| (b, Raster::filled(2, 2, value)))
            .collect();
        bands.push(("QA60", Raster::from_vec(qa.to_vec(), 2, 2).unwrap()));
        Scene {
            id: format!("S2_{:?}", date),
            collection: "COPERNICUS/S2".into(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            cloudiness: Some(cloudiness),
            image: MultiBandImage::from_bands(grid(), bands).unwrap(),
        }
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&mut [4.0, 1.0, 3.0, 2.0]), 2.5);
        assert!(median(&mut []).is_nan());
    }

    #[test]
    fn test_sentinel_median_skips_cloudy_pixels() {
        let source = MemorySource::new(vec![
            s2_scene((2018, 2, 1), 1000.0, [0.0; 4], 5.0),
            s2_scene((2018, 5, 1), 2000.0, [0.0, 1024.0, 0.0, 0.0], 5.0),
            s2_scene((2018, 8, 1), 4000.0, [0.0, 1024.0, 2048.0, 0.0], 5.0),
        ]);
        let compositor = Compositor::new(Catalog::with_current_year(2024), &source);
        let c = compositor
            .build_year_composite(Instrument::Sentinel, 2018, &grid())
            .unwrap();

        let b4 = c.image.band("B4").unwrap();
        assert_eq!(b4.get(0, 0).unwrap(), 2000.0);
        assert_eq!(b4.get(0, 1).unwrap(), 1000.0);
        assert_eq!(b4.get(1, 0).unwrap(), 1500.0);
        assert_eq!(c.scenes_used, 3);
        assert!(c.warnings.is_empty());
    }

    #[test]
    fn test_scene_cloudiness_ceiling() {
        let source = MemorySource::new(vec![
            s2_scene((2018, 2, 1), 1000.0, [0.0; 4], 19.9),
            s2_scene((2018, 3, 1), 3000.0, [0.0; 4], 20.0),
        ]);
        let compositor = Compositor::new(Catalog::with_current_year(2024), &source);
        let c = compositor
            .build_year_composite(Instrument::Sentinel, 2018, &grid())
            .unwrap();
        assert_eq!(c.scenes_considered, 1);
        assert_eq!(c.image.band("B2").unwrap().get(1, 1).unwrap(), 1000.0);
    }

    #[test]
    fn test_index_bands_from_sensor_pairs() {
        let mut scene = s2_scene((2018, 2, 1), 1000.0, [0.0; 4], 1.0);
        *scene.image.band_mut("B8").unwrap() = Raster::filled(2, 2, 3000.0);
        let source = MemorySource::new(vec![scene]);
        let compositor = Compositor::new(Catalog::with_current_year(2024), &source);
        let c = compositor
            .build_year_composite(Instrument::Sentinel, 2018, &grid())
            .unwrap();

        let names: Vec<&str> = c.image.band_names().collect();
        assert_eq!(names, SensorDataset::Sentinel2.descriptor().composite_bands());
        assert_relative_eq!(c.image.band("NDVI").unwrap().get(0, 0).unwrap(), 0.5);
        assert_relative_eq!(c.image.band("NDWI").unwrap().get(1, 1).unwrap(), 0.5);
    }

    #[test]
    fn test_empty_year_gives_masked_composite_and_warning() {
        let source = MemorySource::default();
        let compositor = Compositor::new(Catalog::with_current_year(2024), &source);
        let c = compositor
            .build_year_composite(Instrument::Landsat, 2015, &grid())
            .unwrap();

        assert_eq!(c.dataset, SensorDataset::Landsat8);
        assert!(c.is_empty());
        assert!(c.image.is_fully_masked());
        assert_eq!(c.image.shape(), (2, 2));
        assert_eq!(c.image.band_count(), 11);
    }

    fn l8_scene(day: u32, value: f64, qa: f64) -> Scene {
        let d = SensorDataset::Landsat8.descriptor();
        let mut bands: Vec<(&str, Raster<f64>)> = d
            .bands
            .iter()
            .map(|&b| (b, Raster::filled(2, 2, value)))
            .collect();
        bands.push(("pixel_qa", Raster::filled(2, 2, qa)));
        Scene {
            id: format!("LC08_2015_{}", day),
            collection: "LANDSAT/LC08/C01/T1_SR".into(),
            date: NaiveDate::from_ymd_opt(2015, 4, day).unwrap(),
            cloudiness: None,
            image: MultiBandImage::from_bands(grid(), bands).unwrap(),
        }
    }

    #[test]
    fn test_every_landsat8_scene_clouded_gives_empty_composite() {
        // cloud, shadow, and cloud plus shadow
        let source = MemorySource::new(vec![
            l8_scene(2, 800.0, 352.0),
            l8_scene(18, 900.0, 328.0),
            l8_scene(26, 700.0, 360.0),
        ]);
        let compositor = Compositor::new(Catalog::with_current_year(2024), &source);
        let c = compositor
            .build_year_composite(Instrument::Landsat, 2015, &grid())
            .unwrap();

        assert_eq!(c.dataset, SensorDataset::Landsat8);
        assert_eq!(c.scenes_considered, 3);
        assert_eq!(c.scenes_used, 0);
        assert_eq!(
            c.warnings,
            vec![CompositeWarning::EmptyComposite {
                year: 2015,
                dataset: SensorDataset::Landsat8,
            }]
        );
        assert!(c.image.is_fully_masked());
        assert!(c.image.band("NDVI").unwrap().data().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_clear_quality_without_reflectance_is_not_used() {
        let mut blank = s2_scene((2018, 2, 1), f64::NAN, [0.0; 4], 1.0);
        blank.id = "S2_blank".into();
        let source = MemorySource::new(vec![blank]);
        let compositor = Compositor::new(Catalog::with_current_year(2024), &source);
        let c = compositor
            .build_year_composite(Instrument::Sentinel, 2018, &grid())
            .unwrap();
        assert_eq!(c.scenes_considered, 1);
        assert_eq!(c.scenes_used, 0);
        assert!(c.is_empty());
    }

    #[test]
    fn test_scene_on_another_footprint_is_rejected() {
        let mut far = s2_scene((2018, 2, 1), 2000.0, [0.0; 4], 1.0);
        let antipode = GridSpec::new(2, 2, GeoTransform::new(-67.0, 2.0, 0.0001, -0.0001));
        let bands: Vec<(String, Raster<f64>)> = far
            .image
            .iter()
            .map(|(name, band)| (name.to_string(), Raster::from_array(band.data().clone())))
            .collect();
        far.image = MultiBandImage::from_bands(antipode, bands).unwrap();

        let source = MemorySource::new(vec![s2_scene((2018, 3, 1), 1000.0, [0.0; 4], 1.0), far]);
        let compositor = Compositor::new(Catalog::with_current_year(2024), &source);
        assert!(matches!(
            compositor.build_year_composite(Instrument::Sentinel, 2018, &grid()),
            Err(Error::GridMismatch(_))
        ));
    }

    #[test]
    fn test_scene_in_another_crs_is_rejected() {
        let mut scene = s2_scene((2018, 2, 1), 1000.0, [0.0; 4], 1.0);
        let bands: Vec<(String, Raster<f64>)> = scene
            .image
            .iter()
            .map(|(name, band)| (name.to_string(), Raster::from_array(band.data().clone())))
            .collect();
        scene.image =
            MultiBandImage::from_bands(grid().with_crs(CRS::web_mercator()), bands).unwrap();

        let source = MemorySource::new(vec![scene]);
        let compositor = Compositor::new(Catalog::with_current_year(2024), &source);
        let wgs84 = grid().with_crs(CRS::wgs84());
        assert!(matches!(
            compositor.build_year_composite(Instrument::Sentinel, 2018, &wgs84),
            Err(Error::CrsMismatch(_, _))
        ));
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let source = MemorySource::new(vec![s2_scene((2018, 2, 1), 1000.0, [0.0; 4], 1.0)]);
        let compositor = Compositor::new(Catalog::with_current_year(2024), &source);
        let other = GridSpec::new(3, 3, GeoTransform::default());
        assert!(matches!(
            compositor.build_year_composite(Instrument::Sentinel, 2018, &other),
            Err(Error::SizeMismatch { .. })
        ));
    }
}
