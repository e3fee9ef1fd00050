//! `soilcarbon.toml`: settings loaded once at start-up.
//!
//! Every section is optional; anything missing takes its default. Command
//! line flags override what the file says.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use soilcarbon_algorithms::landcover::Epochs;
use soilcarbon_core::region::DEFAULT_MAX_AREA;
use soilcarbon_export::ExportSettings;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "soilcarbon.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub region: RegionSettings,
    pub epochs: EpochSettings,
    pub data: DataSettings,
    pub export: ExportSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionSettings {
    /// Largest accepted bounding box, in square degrees
    pub max_area: f64,
}

impl Default for RegionSettings {
    fn default() -> Self {
        Self {
            max_area: DEFAULT_MAX_AREA,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpochSettings {
    pub before: i32,
    pub after: i32,
}

impl Default for EpochSettings {
    fn default() -> Self {
        let epochs = Epochs::default();
        Self {
            before: epochs.before,
            after: epochs.after,
        }
    }
}

impl From<&EpochSettings> for Epochs {
    fn from(settings: &EpochSettings) -> Self {
        Epochs {
            before: settings.before,
            after: settings.after,
        }
    }
}

/// Where the stock and land-cover layers live. `{year}` in a pattern is
/// replaced by the epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    pub dir: PathBuf,
    pub stock_pattern: String,
    pub land_cover_pattern: String,
    /// Class table (TOML or JSON); the built-in ESA-CCI table when absent
    pub taxonomy: Option<PathBuf>,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            stock_pattern: "soc_stock_{year}.tif".into(),
            land_cover_pattern: "land_cover_{year}.tif".into(),
            taxonomy: None,
        }
    }
}

impl DataSettings {
    pub fn stock_path(&self, year: i32) -> PathBuf {
        self.dir.join(self.stock_pattern.replace("{year}", &year.to_string()))
    }

    pub fn land_cover_path(&self, year: i32) -> PathBuf {
        self.dir
            .join(self.land_cover_pattern.replace("{year}", &year.to_string()))
    }
}

impl AppConfig {
    /// Load `path`, or `soilcarbon.toml` in the working directory when no
    /// path is given. A missing default file yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        if !explicit && !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Effective settings as TOML
    pub fn to_display_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.region.max_area, 20.0);
        assert_eq!(Epochs::from(&config.epochs), Epochs::default());
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [region]
            max_area = 5.0

            [data]
            dir = "/srv/soc"

            [export]
            fail_fast = true
            "#,
        )
        .unwrap();
        assert_eq!(config.region.max_area, 5.0);
        assert_eq!(config.epochs.after, 2018);
        assert_eq!(config.data.stock_path(2000), PathBuf::from("/srv/soc/soc_stock_2000.tif"));
        assert_eq!(
            config.data.land_cover_path(2018),
            PathBuf::from("/srv/soc/land_cover_2018.tif")
        );
        assert!(config.export.fail_fast);

        let shown = config.to_display_toml().unwrap();
        assert_eq!(AppConfig::from_toml(&shown).unwrap(), config);
    }

    #[test]
    fn test_unknown_types_are_rejected() {
        assert!(AppConfig::from_toml("[region]\nmax_area = \"big\"").is_err());
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        assert!(AppConfig::from_toml("[remote]\nbucket = \"soils\"").is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
