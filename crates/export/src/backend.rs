//! Where export jobs run.

use crate::error::Result;
use crate::job::{ExportRequest, JobStatus};
use async_trait::async_trait;

/// A service that accepts export jobs and reports on them.
///
/// `submit` returns as soon as the job is accepted; completion is observed
/// through `status`.
#[async_trait]
pub trait ExportBackend: Send + Sync + 'static {
    async fn submit(&self, request: &ExportRequest) -> Result<String>;

    async fn status(&self, job_id: &str) -> Result<JobStatus>;

    /// Best-effort cancellation of a running job
    async fn cancel(&self, _job_id: &str) -> Result<()> {
        Ok(())
    }
}
