//! Export to GeoTIFF files in a local directory.

use crate::backend::ExportBackend;
use crate::error::{ExportError, Result};
use crate::job::{ExportRequest, JobStatus};
use async_trait::async_trait;
use soilcarbon_core::io::{write_geotiff, GeoTiffOptions};
use soilcarbon_core::MultiBandImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Writes each band of a composite as `<dir>/<description>_<band>.tif`.
///
/// Writing happens on the blocking pool when the job is submitted; the
/// status then reports how it went.
#[derive(Debug)]
pub struct LocalDirBackend {
    dir: PathBuf,
    next_id: AtomicU64,
    jobs: Arc<Mutex<HashMap<String, JobStatus>>>,
}

impl LocalDirBackend {
    /// Create the backend, creating `dir` if needed
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            next_id: AtomicU64::new(1),
            jobs: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn set_status(jobs: &Mutex<HashMap<String, JobStatus>>, job_id: &str, status: JobStatus) {
        if let Ok(mut jobs) = jobs.lock() {
            jobs.insert(job_id.to_string(), status);
        }
    }
}

/// Path of one exported band
pub fn band_path(dir: &Path, description: &str, band: &str) -> PathBuf {
    dir.join(format!("{}_{}.tif", description, band))
}

fn write_bands(dir: &Path, description: &str, image: &MultiBandImage) -> Result<usize> {
    let options = GeoTiffOptions {
        fallback_epsg: Some(4326),
    };
    let mut written = 0;
    for (name, band) in image.iter() {
        write_geotiff(band, band_path(dir, description, name), Some(options.clone()))?;
        written += 1;
    }
    Ok(written)
}

#[async_trait]
impl ExportBackend for LocalDirBackend {
    async fn submit(&self, request: &ExportRequest) -> Result<String> {
        if request.image.band_count() == 0 {
            return Err(ExportError::Rejected {
                year: request.year,
                reason: "composite has no bands".into(),
            });
        }

        let job_id = format!("local-{}", self.next_id.fetch_add(1, Ordering::Relaxed));
        Self::set_status(&self.jobs, &job_id, JobStatus::Running);

        let jobs = Arc::clone(&self.jobs);
        let dir = self.dir.clone();
        let description = request.description.clone();
        let image = Arc::clone(&request.image);
        let id = job_id.clone();
        tokio::task::spawn_blocking(move || {
            let status = match write_bands(&dir, &description, &image) {
                Ok(bands) => {
                    debug!(job_id = %id, bands, dir = %dir.display(), "bands written");
                    JobStatus::Completed
                }
                Err(e) => JobStatus::Failed(e.to_string()),
            };
            Self::set_status(&jobs, &id, status);
        });

        Ok(job_id)
    }

    async fn status(&self, job_id: &str) -> Result<JobStatus> {
        let jobs = self
            .jobs
            .lock()
            .map_err(|e| ExportError::Runtime(e.to_string()))?;
        jobs.get(job_id)
            .cloned()
            .ok_or_else(|| ExportError::UnknownJob(job_id.to_string()))
    }
}
