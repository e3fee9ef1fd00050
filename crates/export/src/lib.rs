//! # soilcarbon-export
//!
//! Hands yearly composites to an export backend and tracks the jobs.
//!
//! Each composite becomes one job. The [`ExportScheduler`] submits them
//! concurrently, polls their status with exponential backoff and reports one
//! [`ExportOutcome`] per year. [`LocalDirBackend`] writes GeoTIFFs to disk;
//! other targets implement [`ExportBackend`].

pub mod backend;
pub mod blocking;
pub mod error;
pub mod job;
pub mod local;
pub mod scheduler;

pub use backend::ExportBackend;
pub use error::{ExportError, Result};
pub use job::{ExportOutcome, ExportRequest, JobStatus, YearOutcome};
pub use local::LocalDirBackend;
pub use scheduler::{ExportScheduler, ExportSettings, SchedulerOptions};
