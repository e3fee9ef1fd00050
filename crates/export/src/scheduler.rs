//! Runs export jobs concurrently and polls them to completion.

use crate::backend::ExportBackend;
use crate::error::ExportError;
use crate::job::{ExportOutcome, ExportRequest, JobStatus, YearOutcome};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The `[export]` section of the configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// First delay between status checks, in milliseconds
    pub poll_interval_ms: u64,
    /// Ceiling for the doubling delay, in milliseconds
    pub max_backoff_ms: u64,
    pub max_polls: u32,
    /// Cancel every other job as soon as one fails
    pub fail_fast: bool,
    /// Target of the local directory backend
    pub output_dir: PathBuf,
    /// Prefix for file and task names
    pub prefix: String,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            max_backoff_ms: 30_000,
            max_polls: 120,
            fail_fast: false,
            output_dir: PathBuf::from("exports"),
            prefix: String::new(),
        }
    }
}

/// Polling and failure policy of an [`ExportScheduler`].
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerOptions {
    pub poll_interval: Duration,
    pub max_backoff: Duration,
    pub max_polls: u32,
    pub fail_fast: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from(&ExportSettings::default())
    }
}

impl From<&ExportSettings> for SchedulerOptions {
    fn from(settings: &ExportSettings) -> Self {
        Self {
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
            max_backoff: Duration::from_millis(settings.max_backoff_ms),
            max_polls: settings.max_polls,
            fail_fast: settings.fail_fast,
        }
    }
}

impl SchedulerOptions {
    /// Delay before status check number `attempt` (0-based): the poll
    /// interval doubled `attempt` times, capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.poll_interval
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Submits one job per composite and waits for all of them.
pub struct ExportScheduler<B> {
    backend: Arc<B>,
    options: SchedulerOptions,
}

impl<B: ExportBackend> ExportScheduler<B> {
    pub fn new(backend: B, options: SchedulerOptions) -> Self {
        Self::with_shared(Arc::new(backend), options)
    }

    pub fn with_shared(backend: Arc<B>, options: SchedulerOptions) -> Self {
        Self { backend, options }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Run every request to a final outcome, one entry per request ordered by year.
    ///
    /// With `fail_fast`, the first failure cancels all jobs still in flight;
    /// otherwise each year succeeds or fails on its own.
    pub async fn run(&self, requests: Vec<ExportRequest>) -> Vec<YearOutcome> {
        let token = CancellationToken::new();
        let mut pending: BTreeMap<i32, String> = BTreeMap::new();
        let mut tasks = JoinSet::new();

        info!(jobs = requests.len(), fail_fast = self.options.fail_fast, "starting exports");
        for request in requests {
            pending.insert(request.year, request.description.clone());
            let backend = Arc::clone(&self.backend);
            let options = self.options.clone();
            let token = token.clone();
            tasks.spawn(async move { run_job(backend.as_ref(), request, &options, &token).await });
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => {
                    if let ExportOutcome::Failed(reason) = &outcome.outcome {
                        warn!(year = outcome.year, %reason, "export failed");
                        if self.options.fail_fast && !token.is_cancelled() {
                            info!(year = outcome.year, "cancelling remaining exports");
                            token.cancel();
                        }
                    }
                    pending.remove(&outcome.year);
                    outcomes.push(outcome);
                }
                Err(e) => {
                    warn!(error = %e, "export task aborted");
                    if self.options.fail_fast {
                        token.cancel();
                    }
                }
            }
        }

        // Tasks that panicked never reported back
        for (year, description) in pending {
            outcomes.push(YearOutcome {
                year,
                description,
                job_id: None,
                polls: 0,
                outcome: ExportOutcome::Failed("export task aborted".into()),
            });
        }

        outcomes.sort_by_key(|o| o.year);
        outcomes
    }
}

async fn run_job<B: ExportBackend + ?Sized>(
    backend: &B,
    request: ExportRequest,
    options: &SchedulerOptions,
    token: &CancellationToken,
) -> YearOutcome {
    let mut outcome = YearOutcome {
        year: request.year,
        description: request.description.clone(),
        job_id: None,
        polls: 0,
        outcome: ExportOutcome::Cancelled,
    };

    let submitted = tokio::select! {
        _ = token.cancelled() => return outcome,
        r = backend.submit(&request) => r,
    };
    let job_id = match submitted {
        Ok(id) => id,
        Err(e) => {
            outcome.outcome = ExportOutcome::Failed(e.to_string());
            return outcome;
        }
    };
    info!(year = request.year, %job_id, "export submitted");
    outcome.job_id = Some(job_id.clone());

    loop {
        if outcome.polls >= options.max_polls {
            let e = ExportError::Timeout {
                job_id,
                polls: outcome.polls,
            };
            outcome.outcome = ExportOutcome::Failed(e.to_string());
            return outcome;
        }

        tokio::select! {
            _ = token.cancelled() => {
                if let Err(e) = backend.cancel(&job_id).await {
                    debug!(%job_id, error = %e, "cancel request failed");
                }
                return outcome;
            }
            _ = tokio::time::sleep(options.backoff(outcome.polls)) => {}
        }
        outcome.polls += 1;

        match backend.status(&job_id).await {
            Ok(JobStatus::Completed) => {
                info!(year = request.year, %job_id, polls = outcome.polls, "export completed");
                outcome.outcome = ExportOutcome::Completed;
                return outcome;
            }
            Ok(JobStatus::Failed(reason)) => {
                outcome.outcome = ExportOutcome::Failed(reason);
                return outcome;
            }
            Ok(status) => debug!(%job_id, ?status, polls = outcome.polls, "export in progress"),
            Err(e) => {
                outcome.outcome = ExportOutcome::Failed(e.to_string());
                return outcome;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_then_caps() {
        let options = SchedulerOptions {
            poll_interval: Duration::from_millis(100),
            max_backoff: Duration::from_millis(700),
            max_polls: 10,
            fail_fast: false,
        };
        assert_eq!(options.backoff(0), Duration::from_millis(100));
        assert_eq!(options.backoff(1), Duration::from_millis(200));
        assert_eq!(options.backoff(2), Duration::from_millis(400));
        assert_eq!(options.backoff(3), Duration::from_millis(700));
        assert_eq!(options.backoff(40), Duration::from_millis(700));
    }

    #[test]
    fn test_options_from_settings() {
        let settings: ExportSettings =
            toml::from_str("poll_interval_ms = 10\nfail_fast = true").unwrap();
        let options = SchedulerOptions::from(&settings);
        assert_eq!(options.poll_interval, Duration::from_millis(10));
        assert_eq!(options.max_backoff, Duration::from_millis(30_000));
        assert!(options.fail_fast);
        assert_eq!(settings.output_dir, PathBuf::from("exports"));
    }
}
