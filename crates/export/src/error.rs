//! Error types for composite export.

use thiserror::Error;

/// Errors produced while submitting or tracking export jobs.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("core error: {0}")]
    Core(#[from] soilcarbon_core::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("export of {year} rejected: {reason}")]
    Rejected { year: i32, reason: String },

    #[error("unknown export job: {0}")]
    UnknownJob(String),

    #[error("job {job_id} still running after {polls} status checks")]
    Timeout { job_id: String, polls: u32 },

    #[error("runtime error: {0}")]
    Runtime(String),
}

/// Result alias for export operations.
pub type Result<T> = std::result::Result<T, ExportError>;
