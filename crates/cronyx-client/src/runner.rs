//! Lifecycle orchestration: acquire a lock, run the caller's work, release.
//!
//! [`JobRunner::request_job_exec`] guarantees exactly one terminal transition
//! per granted lock: `finish` when the work succeeds, `interrupt` when it
//! fails. When the work fails, the work's own error is what the caller gets
//! back; a failing interrupt is logged and discarded.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use cronyx_core::{DurationSpec, JobInterval, LockRequest};

use crate::error::JobError;
use crate::job::Job;
use crate::transport::LockTransport;

/// Per-request knobs for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestJobOptions {
    pub job_name: String,
    pub job_interval: JobInterval,
    /// IANA time zone used to resolve interval expressions.
    pub timezone: Option<String>,
    /// Jobs that must have completed the same interval first.
    pub required_job_names: Option<Vec<String>>,
    pub start_buffer: Option<DurationSpec>,
    pub retry_interval: Option<DurationSpec>,
    /// Advisory pass-through: interval accounting without exclusivity.
    pub no_lock: Option<bool>,
    pub job_interval_started_at: Option<DateTime<Utc>>,
}

impl RequestJobOptions {
    pub fn new(job_name: impl Into<String>, job_interval: impl Into<JobInterval>) -> Self {
        RequestJobOptions {
            job_name: job_name.into(),
            job_interval: job_interval.into(),
            timezone: None,
            required_job_names: None,
            start_buffer: None,
            retry_interval: None,
            no_lock: None,
            job_interval_started_at: None,
        }
    }

    pub fn timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    pub fn required_job_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_job_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    pub fn start_buffer(mut self, buffer: impl Into<DurationSpec>) -> Self {
        self.start_buffer = Some(buffer.into());
        self
    }

    pub fn retry_interval(mut self, interval: impl Into<DurationSpec>) -> Self {
        self.retry_interval = Some(interval.into());
        self
    }

    pub fn no_lock(mut self, no_lock: bool) -> Self {
        self.no_lock = Some(no_lock);
        self
    }

    pub fn job_interval_started_at(mut self, started_at: DateTime<Utc>) -> Self {
        self.job_interval_started_at = Some(started_at);
        self
    }

    /// Builds the acquire-request body. The job name travels in the path.
    pub fn to_lock_request(&self) -> LockRequest {
        LockRequest {
            job_interval: self.job_interval.clone(),
            timezone: self.timezone.clone(),
            required_job_names: self.required_job_names.clone(),
            start_buffer: self.start_buffer,
            retry_interval: self.retry_interval,
            no_lock: self.no_lock,
            job_interval_started_at: self.job_interval_started_at,
        }
    }
}

/// Runs one job against a lock transport.
pub struct JobRunner {
    transport: Arc<dyn LockTransport>,
    options: RequestJobOptions,
}

impl JobRunner {
    pub fn new(transport: Arc<dyn LockTransport>, options: RequestJobOptions) -> Self {
        JobRunner { transport, options }
    }

    pub fn options(&self) -> &RequestJobOptions {
        &self.options
    }

    /// Requests a lock for the current interval.
    ///
    /// Returns `Ok(None)` when the server declines: the job is not eligible to
    /// run now, which is not an error.
    pub async fn request_job_start(&self) -> Result<Option<Job>, JobError> {
        let job_name = &self.options.job_name;
        let request = self.options.to_lock_request();

        let grant = self
            .transport
            .acquire(job_name, &request)
            .await
            .map_err(|source| JobError::Acquisition {
                job_name: job_name.clone(),
                source,
            })?;

        match grant {
            Some(grant) => {
                tracing::debug!(
                    job = %job_name,
                    lock_id = grant.id.as_deref().unwrap_or("<advisory>"),
                    interval_ended_at = %grant.interval_ended_at,
                    "job lock acquired"
                );
                Ok(Some(Job::new(Arc::clone(&self.transport), grant)))
            }
            None => {
                tracing::debug!(job = %job_name, "job is not eligible to run now");
                Ok(None)
            }
        }
    }

    /// Acquires a lock and runs `task` under it.
    ///
    /// - not eligible: returns `Ok(())` without calling `task`
    /// - `task` succeeds: finishes the lock; a finish failure is returned
    /// - `task` fails: interrupts the lock and returns the task's error
    ///   unchanged, even if the interrupt itself fails
    ///
    /// Lock errors reach the caller through `E: From<JobError>`.
    pub async fn request_job_exec<F, Fut, E>(&self, task: F) -> Result<(), E>
    where
        F: FnOnce(Arc<Job>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: From<JobError>,
    {
        let Some(job) = self.request_job_start().await? else {
            return Ok(());
        };
        let job = Arc::new(job);

        match task(Arc::clone(&job)).await {
            Ok(()) => job.finish().await.map_err(E::from),
            Err(err) => {
                if let Err(interrupt_err) = job.interrupt().await {
                    tracing::warn!(
                        job = %job.job_name(),
                        error = %interrupt_err,
                        cause = ?std::error::Error::source(&interrupt_err).map(|e| e.to_string()),
                        "interrupt failed after task error; returning the task error"
                    );
                }
                Err(err)
            }
        }
    }
}
