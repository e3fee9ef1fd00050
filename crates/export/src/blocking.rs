//! Blocking (synchronous) entry point.
//!
//! Wraps [`ExportScheduler`] in a Tokio runtime so synchronous callers such
//! as the CLI don't manage one.

use crate::backend::ExportBackend;
use crate::error::{ExportError, Result};
use crate::job::{ExportRequest, YearOutcome};
use crate::scheduler::{ExportScheduler, SchedulerOptions};

/// Run all exports to completion on a current-thread runtime.
pub fn export_all<B: ExportBackend>(
    backend: B,
    options: SchedulerOptions,
    requests: Vec<ExportRequest>,
) -> Result<Vec<YearOutcome>> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| ExportError::Runtime(e.to_string()))?;

    let scheduler = ExportScheduler::new(backend, options);
    Ok(rt.block_on(scheduler.run(requests)))
}
