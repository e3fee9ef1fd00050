//! Export requests, job states and per-year outcomes.

use serde::Serialize;
use soilcarbon_algorithms::imagery::{CompositeImage, SensorDataset};
use soilcarbon_core::MultiBandImage;
use std::fmt;
use std::sync::Arc;

/// One composite to hand to a backend.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub year: i32,
    pub dataset: SensorDataset,
    /// File or task name, e.g. `sentinel-2_2018`
    pub description: String,
    pub image: Arc<MultiBandImage>,
}

impl ExportRequest {
    pub fn new(year: i32, dataset: SensorDataset, image: MultiBandImage) -> Self {
        Self {
            year,
            dataset,
            description: format!("{}_{}", dataset.slug(), year),
            image: Arc::new(image),
        }
    }

    /// Prefix the description, e.g. with a region name
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        if !prefix.is_empty() {
            self.description = format!("{}_{}", prefix, self.description);
        }
        self
    }
}

impl From<CompositeImage> for ExportRequest {
    fn from(composite: CompositeImage) -> Self {
        Self::new(composite.year, composite.dataset, composite.image)
    }
}

/// State of a submitted job as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

/// Final result of one year's export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum ExportOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

impl fmt::Display for ExportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed(reason) => write!(f, "failed: {}", reason),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of a year's export together with how it got there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearOutcome {
    pub year: i32,
    pub description: String,
    /// Backend job id, absent when submission never happened or failed
    pub job_id: Option<String>,
    pub polls: u32,
    #[serde(flatten)]
    pub outcome: ExportOutcome,
}

impl YearOutcome {
    pub fn is_completed(&self) -> bool {
        self.outcome == ExportOutcome::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soilcarbon_core::{GeoTransform, GridSpec};

    #[test]
    fn test_request_description() {
        let image = MultiBandImage::new(GridSpec::new(1, 1, GeoTransform::default()));
        let request =
            ExportRequest::new(2018, SensorDataset::Sentinel2, image).with_prefix("kalimantan");
        assert_eq!(
            request.description,
            format!("kalimantan_{}_2018", SensorDataset::Sentinel2.slug())
        );
    }

    #[test]
    fn test_outcome_json() {
        let outcome = YearOutcome {
            year: 2017,
            description: "x".into(),
            job_id: None,
            polls: 0,
            outcome: ExportOutcome::Failed("disk full".into()),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "failed");
        assert_eq!(json["reason"], "disk full");
        assert!(JobStatus::Failed("x".into()).is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }
}
