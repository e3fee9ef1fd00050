//! Scheduler behaviour against a scripted backend

use async_trait::async_trait;
use soilcarbon_algorithms::imagery::SensorDataset;
use soilcarbon_core::{GeoTransform, GridSpec, MultiBandImage, Raster};
use soilcarbon_export::{
    ExportBackend, ExportError, ExportOutcome, ExportRequest, ExportScheduler, JobStatus,
    SchedulerOptions,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Backend whose behaviour per year is fixed up front
#[derive(Default)]
struct ScriptedBackend {
    reject: HashSet<i32>,
    fail: HashSet<i32>,
    never_finish: HashSet<i32>,
    /// Status checks before a job reports completion
    polls_to_finish: u32,
    jobs: Mutex<HashMap<String, (i32, u32)>>,
    cancelled: Mutex<Vec<String>>,
}

#[async_trait]
impl ExportBackend for ScriptedBackend {
    async fn submit(&self, request: &ExportRequest) -> soilcarbon_export::Result<String> {
        if self.reject.contains(&request.year) {
            return Err(ExportError::Rejected {
                year: request.year,
                reason: "quota exceeded".into(),
            });
        }
        let id = format!("job-{}", request.year);
        self.jobs.lock().unwrap().insert(id.clone(), (request.year, 0));
        Ok(id)
    }

    async fn status(&self, job_id: &str) -> soilcarbon_export::Result<JobStatus> {
        let mut jobs = self.jobs.lock().unwrap();
        let entry = jobs
            .get_mut(job_id)
            .ok_or_else(|| ExportError::UnknownJob(job_id.into()))?;
        entry.1 += 1;
        let (year, polls) = *entry;
        if self.fail.contains(&year) {
            return Ok(JobStatus::Failed("band B12 missing".into()));
        }
        if self.never_finish.contains(&year) || polls < self.polls_to_finish {
            return Ok(JobStatus::Running);
        }
        Ok(JobStatus::Completed)
    }

    async fn cancel(&self, job_id: &str) -> soilcarbon_export::Result<()> {
        self.cancelled.lock().unwrap().push(job_id.to_string());
        Ok(())
    }
}

fn requests(years: &[i32]) -> Vec<ExportRequest> {
    years
        .iter()
        .map(|&year| {
            let grid = GridSpec::new(2, 2, GeoTransform::default());
            let image =
                MultiBandImage::from_bands(grid, vec![("B4", Raster::filled(2, 2, 1.0))]).unwrap();
            ExportRequest::new(year, SensorDataset::Sentinel2, image)
        })
        .collect()
}

fn fast(fail_fast: bool) -> SchedulerOptions {
    SchedulerOptions {
        poll_interval: Duration::from_millis(1),
        max_backoff: Duration::from_millis(4),
        max_polls: 1000,
        fail_fast,
    }
}

#[tokio::test]
async fn test_failures_are_isolated_per_year() {
    let backend = ScriptedBackend {
        reject: [2017].into(),
        polls_to_finish: 3,
        ..Default::default()
    };
    let scheduler = ExportScheduler::new(backend, fast(false));
    // Submitted out of order, reported in year order
    let outcomes = scheduler.run(requests(&[2018, 2016, 2017])).await;

    let years: Vec<i32> = outcomes.iter().map(|o| o.year).collect();
    assert_eq!(years, vec![2016, 2017, 2018]);
    assert_eq!(outcomes[0].outcome, ExportOutcome::Completed);
    assert_eq!(outcomes[0].polls, 3);
    assert!(matches!(
        &outcomes[1].outcome,
        ExportOutcome::Failed(r) if r.contains("quota exceeded")
    ));
    assert!(outcomes[1].job_id.is_none());
    assert_eq!(outcomes[2].outcome, ExportOutcome::Completed);
}

#[tokio::test]
async fn test_fail_fast_cancels_siblings() {
    let backend = ScriptedBackend {
        reject: [2017].into(),
        never_finish: [2016, 2018].into(),
        ..Default::default()
    };
    let backend = Arc::new(backend);
    let scheduler = ExportScheduler::with_shared(Arc::clone(&backend), fast(true));
    let outcomes = scheduler.run(requests(&[2016, 2017, 2018])).await;

    // Only accepted jobs are cancelled at the backend
    let cancelled = backend.cancelled.lock().unwrap();
    assert!(cancelled.iter().all(|id| id == "job-2016" || id == "job-2018"));

    assert_eq!(outcomes.len(), 3);
    assert_eq!(outcomes[0].outcome, ExportOutcome::Cancelled);
    assert!(matches!(outcomes[1].outcome, ExportOutcome::Failed(_)));
    assert_eq!(outcomes[2].outcome, ExportOutcome::Cancelled);
}

#[tokio::test]
async fn test_backend_reported_failure() {
    let backend = ScriptedBackend {
        fail: [2016].into(),
        ..Default::default()
    };
    let scheduler = ExportScheduler::new(backend, fast(false));
    let outcomes = scheduler.run(requests(&[2016])).await;
    assert_eq!(outcomes[0].outcome, ExportOutcome::Failed("band B12 missing".into()));
    assert_eq!(outcomes[0].job_id.as_deref(), Some("job-2016"));
}

#[tokio::test]
async fn test_gives_up_after_max_polls() {
    let backend = ScriptedBackend {
        never_finish: [2020].into(),
        ..Default::default()
    };
    let options = SchedulerOptions {
        max_polls: 3,
        ..fast(false)
    };
    let scheduler = ExportScheduler::new(backend, options);
    let outcomes = scheduler.run(requests(&[2020])).await;
    assert_eq!(outcomes[0].polls, 3);
    match &outcomes[0].outcome {
        ExportOutcome::Failed(reason) => assert!(reason.contains("3 status checks")),
        other => panic!("expected timeout failure, got {}", other),
    }
}

#[tokio::test]
async fn test_no_requests() {
    let scheduler = ExportScheduler::new(ScriptedBackend::default(), fast(true));
    assert!(scheduler.run(Vec::new()).await.is_empty());
}
