//! Sensor catalog
//!
//! A static registry of the satellite datasets that can be composited, and
//! of the two user-facing instrument families that stitch them together
//! over time.

use crate::imagery::cloud_mask::CloudMaskFamily;
use crate::imagery::indices::IndexPair;
use chrono::{Datelike, NaiveDate, Utc};
use serde::Serialize;
use soilcarbon_colormap::VisParams;
use soilcarbon_core::{Error, Result};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// One compositable satellite dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SensorDataset {
    Sentinel2,
    Landsat4,
    Landsat5,
    Landsat7,
    Landsat457,
    Landsat8,
}

impl SensorDataset {
    pub const ALL: &'static [SensorDataset] = &[
        Self::Sentinel2,
        Self::Landsat4,
        Self::Landsat5,
        Self::Landsat7,
        Self::Landsat457,
        Self::Landsat8,
    ];

    pub fn descriptor(self) -> &'static SensorDescriptor {
        match self {
            Self::Sentinel2 => &SENTINEL_2,
            Self::Landsat4 => &LANDSAT_4,
            Self::Landsat5 => &LANDSAT_5,
            Self::Landsat7 => &LANDSAT_7,
            Self::Landsat457 => &LANDSAT_457,
            Self::Landsat8 => &LANDSAT_8,
        }
    }

    pub fn slug(self) -> &'static str {
        self.descriptor().slug
    }
}

impl fmt::Display for SensorDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for SensorDataset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        descriptor_for(s).map(|d| d.dataset)
    }
}

/// Last year of a dataset's archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum YearEnd {
    /// Archive closed; the year is included
    Closed(i32),
    /// Still acquiring; runs up to, but excluding, the current year
    Ongoing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearSpan {
    pub first: i32,
    pub end: YearEnd,
}

impl YearSpan {
    const fn closed(first: i32, last: i32) -> Self {
        Self {
            first,
            end: YearEnd::Closed(last),
        }
    }

    const fn ongoing(first: i32) -> Self {
        Self {
            first,
            end: YearEnd::Ongoing,
        }
    }

    /// Inclusive years given the current calendar year. May be empty.
    pub fn years(&self, current_year: i32) -> RangeInclusive<i32> {
        match self.end {
            YearEnd::Closed(last) => self.first..=last,
            YearEnd::Ongoing => self.first..=current_year - 1,
        }
    }
}

/// Visualization defaults as stored in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisPreset {
    pub min: f64,
    pub max: f64,
    pub gamma: Option<f64>,
    pub bands: &'static [&'static str],
}

impl VisPreset {
    pub fn to_params(&self) -> VisParams {
        let params = VisParams::new(self.min, self.max, self.bands);
        match self.gamma {
            Some(g) => params.with_gamma(g),
            None => params,
        }
    }
}

/// Fixed attributes of one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct SensorDescriptor {
    pub dataset: SensorDataset,
    pub slug: &'static str,
    /// Source collections; more than one means their scenes are merged
    pub collections: &'static [&'static str],
    /// Spectral bands in composite order
    pub bands: &'static [&'static str],
    pub quality_band: &'static str,
    pub rgb_bands: [&'static str; 3],
    /// True-color thumbnail parameters
    pub vis_rgb: VisPreset,
    /// Parameters for the RGB, NDVI and NDWI layers, in that order
    pub vis_layers: &'static [VisPreset],
    /// Pixel size in metres
    pub scale: f64,
    pub years: YearSpan,
    /// Year-end offsets `(start, stop)` that bound the date window of year Y
    pub step_range: (i32, i32),
    pub cloud_mask: CloudMaskFamily,
    /// NDVI then NDWI
    pub indices: &'static [IndexPair],
    /// Scenes at or above this `CLOUDY_PIXEL_PERCENTAGE` are skipped
    pub max_scene_cloudiness: Option<f64>,
}

/// Calendar window `[start, end)` a composite draws its scenes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl SensorDescriptor {
    /// Date window for nominal year `year`: from 31 Dec of `year + step.0`
    /// (inclusive) to 31 Dec of `year + step.1` (exclusive).
    pub fn date_window(&self, year: i32) -> Result<DateWindow> {
        let year_end = |y: i32| {
            NaiveDate::from_ymd_opt(y, 12, 31).ok_or_else(|| Error::InvalidParameter {
                name: "year",
                value: y.to_string(),
                reason: "not a representable calendar year".into(),
            })
        };
        Ok(DateWindow {
            start: year_end(year + self.step_range.0)?,
            end: year_end(year + self.step_range.1)?,
        })
    }

    /// Spectral bands plus the derived index bands, as a composite carries them
    pub fn composite_bands(&self) -> Vec<&'static str> {
        self.bands
            .iter()
            .copied()
            .chain(self.indices.iter().map(|p| p.name))
            .collect()
    }

    /// Bands a source scene must provide
    pub fn scene_bands(&self) -> Vec<&'static str> {
        let mut bands = self.bands.to_vec();
        bands.push(self.quality_band);
        bands
    }
}

/// Look up a dataset by slug, case-insensitively.
pub fn descriptor_for(name: &str) -> Result<&'static SensorDescriptor> {
    let wanted = name.trim();
    SensorDataset::ALL
        .iter()
        .map(|d| d.descriptor())
        .find(|d| d.slug.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| Error::UnknownSensor(name.to_string()))
}

/// User-facing sensor family spanning one or more datasets over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Instrument {
    Landsat,
    Sentinel,
}

impl Instrument {
    pub const ALL: &'static [Instrument] = &[Self::Landsat, Self::Sentinel];

    /// Datasets in chronological order, each with the span it covers for this family
    pub fn segments(self) -> &'static [(SensorDataset, YearSpan)] {
        match self {
            Self::Landsat => LANDSAT_SEGMENTS,
            Self::Sentinel => SENTINEL_SEGMENTS,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Landsat => "Landsat",
            Self::Sentinel => "Sentinel",
        }
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Instrument {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "landsat" => Ok(Self::Landsat),
            "sentinel" => Ok(Self::Sentinel),
            _ => Err(Error::UnknownSensor(s.to_string())),
        }
    }
}

/// Resolves instrument years to datasets.
///
/// Open-ended archives are closed at the year before `current_year`.
#[derive(Debug, Clone, Copy)]
pub struct Catalog {
    current_year: i32,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalog {
    /// Catalog closed at today's year (UTC)
    pub fn new() -> Self {
        Self::with_current_year(Utc::now().year())
    }

    pub fn with_current_year(current_year: i32) -> Self {
        Self { current_year }
    }

    pub fn current_year(&self) -> i32 {
        self.current_year
    }

    /// Descriptor of the dataset covering `year` for `instrument`
    pub fn resolve(&self, instrument: Instrument, year: i32) -> Result<&'static SensorDescriptor> {
        instrument
            .segments()
            .iter()
            .find(|(_, span)| span.years(self.current_year).contains(&year))
            .map(|(dataset, _)| dataset.descriptor())
            .ok_or_else(|| Error::YearOutOfRange {
                sensor: instrument.to_string(),
                year,
            })
    }

    /// First and last year `instrument` can composite
    pub fn year_range(&self, instrument: Instrument) -> Option<(i32, i32)> {
        let years: Vec<RangeInclusive<i32>> = instrument
            .segments()
            .iter()
            .map(|(_, span)| span.years(self.current_year))
            .filter(|r| !r.is_empty())
            .collect();
        let first = years.iter().map(|r| *r.start()).min()?;
        let last = years.iter().map(|r| *r.end()).max()?;
        Some((first, last))
    }

    /// Check an inclusive year window, failing on the first uncovered year
    pub fn validate_years(&self, instrument: Instrument, start: i32, stop: i32) -> Result<()> {
        if start > stop {
            return Err(Error::InvalidParameter {
                name: "years",
                value: format!("{}..={}", start, stop),
                reason: "start year after stop year".into(),
            });
        }
        for year in start..=stop {
            self.resolve(instrument, year)?;
        }
        Ok(())
    }
}

const LANDSAT_SEGMENTS: &[(SensorDataset, YearSpan)] = &[
    (SensorDataset::Landsat457, YearSpan::closed(1985, 2012)),
    (SensorDataset::Landsat8, YearSpan::ongoing(2013)),
];

const SENTINEL_SEGMENTS: &[(SensorDataset, YearSpan)] =
    &[(SensorDataset::Sentinel2, YearSpan::ongoing(2016))];

// ---------------------------------------------------------------------------
// Dataset records
// ---------------------------------------------------------------------------

const LANDSAT_TM_BANDS: &[&str] = &["B1", "B2", "B3", "B4", "B5", "B6", "B7"];
const LANDSAT_TM_INDICES: &[IndexPair] = &[
    IndexPair::new("NDVI", "B4", "B3"),
    IndexPair::new("NDWI", "B4", "B2"),
];

const LANDSAT_TM_VIS: VisPreset = VisPreset {
    min: 100.0,
    max: 2500.0,
    gamma: Some(1.4),
    bands: &["B3", "B2", "B1"],
};

const LANDSAT_TM_LAYERS: &[VisPreset] = &[
    VisPreset {
        min: 0.0,
        max: 3000.0,
        gamma: Some(1.4),
        bands: &["B3", "B2", "B1"],
    },
    VisPreset {
        min: -1.0,
        max: 1.0,
        gamma: Some(1.4),
        bands: &["NDVI"],
    },
    VisPreset {
        min: -1.0,
        max: 1.0,
        gamma: Some(1.4),
        bands: &["NDWI"],
    },
];

static SENTINEL_2: SensorDescriptor = SensorDescriptor {
    dataset: SensorDataset::Sentinel2,
    slug: "Sentinel-2-Top-of-Atmosphere-Reflectance",
    collections: &["COPERNICUS/S2"],
    bands: &["B1", "B2", "B3", "B4", "B5", "B6", "B7", "B8A", "B8", "B11", "B12"],
    quality_band: "QA60",
    rgb_bands: ["B4", "B3", "B2"],
    vis_rgb: VisPreset {
        min: 100.0,
        max: 2500.0,
        gamma: None,
        bands: &["B4", "B3", "B2"],
    },
    vis_layers: &[
        VisPreset {
            min: 0.0,
            max: 3000.0,
            gamma: None,
            bands: &["B4", "B3", "B2"],
        },
        VisPreset {
            min: -1.0,
            max: 1.0,
            gamma: None,
            bands: &["NDVI"],
        },
        VisPreset {
            min: -1.0,
            max: 1.0,
            gamma: None,
            bands: &["NDWI"],
        },
    ],
    scale: 10.0,
    years: YearSpan::ongoing(2016),
    step_range: (-1, 0),
    cloud_mask: CloudMaskFamily::Sentinel2,
    indices: &[
        IndexPair::new("NDVI", "B8", "B4"),
        IndexPair::new("NDWI", "B8", "B3"),
    ],
    max_scene_cloudiness: Some(20.0),
};

static LANDSAT_4: SensorDescriptor = LANDSAT_TM;

static LANDSAT_5: SensorDescriptor = SensorDescriptor {
    dataset: SensorDataset::Landsat5,
    slug: "Landsat-5-Surface-Reflectance",
    collections: &["LANDSAT/LT05/C01/T1_SR"],
    years: YearSpan::closed(1984, 2012),
    ..LANDSAT_TM
};

static LANDSAT_7: SensorDescriptor = SensorDescriptor {
    dataset: SensorDataset::Landsat7,
    slug: "Landsat-7-Surface-Reflectance",
    collections: &["LANDSAT/LE07/C01/T1_SR"],
    years: YearSpan::closed(1999, 2021),
    ..LANDSAT_TM
};

static LANDSAT_457: SensorDescriptor = SensorDescriptor {
    dataset: SensorDataset::Landsat457,
    slug: "Landsat-457-Surface-Reflectance",
    collections: &[
        "LANDSAT/LT04/C01/T1_SR",
        "LANDSAT/LT05/C01/T1_SR",
        "LANDSAT/LE07/C01/T1_SR",
    ],
    years: YearSpan::closed(1985, 2012),
    step_range: (-2, 2),
    ..LANDSAT_TM
};

// Landsat 4 record, shared by the other Thematic Mapper datasets
const LANDSAT_TM: SensorDescriptor = SensorDescriptor {
    dataset: SensorDataset::Landsat4,
    slug: "Landsat-4-Surface-Reflectance",
    collections: &["LANDSAT/LT04/C01/T1_SR"],
    bands: LANDSAT_TM_BANDS,
    quality_band: "pixel_qa",
    rgb_bands: ["B3", "B2", "B1"],
    vis_rgb: LANDSAT_TM_VIS,
    vis_layers: LANDSAT_TM_LAYERS,
    scale: 30.0,
    years: YearSpan::closed(1982, 1993),
    step_range: (-1, 0),
    cloud_mask: CloudMaskFamily::Landsat457,
    indices: LANDSAT_TM_INDICES,
    max_scene_cloudiness: None,
};

static LANDSAT_8: SensorDescriptor = SensorDescriptor {
    dataset: SensorDataset::Landsat8,
    slug: "Landsat-8-Surface-Reflectance",
    collections: &["LANDSAT/LC08/C01/T1_SR"],
    bands: &["B1", "B2", "B3", "B4", "B5", "B6", "B7", "B10", "B11"],
    quality_band: "pixel_qa",
    rgb_bands: ["B4", "B3", "B2"],
    vis_rgb: VisPreset {
        min: 100.0,
        max: 2500.0,
        gamma: Some(1.4),
        bands: &["B4", "B3", "B2"],
    },
    vis_layers: &[
        VisPreset {
            min: 0.0,
            max: 3000.0,
            gamma: Some(1.4),
            bands: &["B4", "B3", "B2"],
        },
        VisPreset {
            min: -1.0,
            max: 1.0,
            gamma: Some(1.4),
            bands: &["NDVI"],
        },
        VisPreset {
            min: -1.0,
            max: 1.0,
            gamma: Some(1.4),
            bands: &["NDWI"],
        },
    ],
    scale: 30.0,
    years: YearSpan::ongoing(2013),
    step_range: (-1, 0),
    cloud_mask: CloudMaskFamily::Landsat8,
    indices: &[
        IndexPair::new("NDVI", "B5", "B4"),
        IndexPair::new("NDWI", "B5", "B3"),
    ],
    max_scene_cloudiness: None,
};
