//! Public entry point for embedding applications.

use std::future::Future;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::{ConfigError, JobError, ReleaseKind, TransportError};
use crate::job::Job;
use crate::runner::{JobRunner, RequestJobOptions};
use crate::transport::{HttpTransport, LockTransport};

/// Client for a cronyx lock server.
///
/// Cheap to clone; clones share one HTTP connection pool.
#[derive(Clone)]
pub struct CronyxClient {
    transport: Arc<dyn LockTransport>,
}

impl CronyxClient {
    /// Creates a client talking HTTP to the configured server.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        Ok(Self::with_transport(HttpTransport::new(&config)?))
    }

    /// Creates a client from `CRONYX_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Creates a client over any transport.
    pub fn with_transport(transport: impl LockTransport + 'static) -> Self {
        CronyxClient {
            transport: Arc::new(transport),
        }
    }

    /// Requests a lock for the job's current interval.
    ///
    /// `Ok(None)` means the job is not eligible to run now.
    pub async fn request_job_start(
        &self,
        options: RequestJobOptions,
    ) -> Result<Option<Job>, JobError> {
        self.runner(options).request_job_start().await
    }

    /// Runs `task` under the job's lock, finishing or interrupting it.
    ///
    /// See [`JobRunner::request_job_exec`].
    pub async fn request_job_exec<F, Fut, E>(
        &self,
        options: RequestJobOptions,
        task: F,
    ) -> Result<(), E>
    where
        F: FnOnce(Arc<Job>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: From<JobError>,
    {
        self.runner(options).request_job_exec(task).await
    }

    /// Releases a lock by id, bypassing the job handle.
    ///
    /// Meant for operators cleaning up after a crashed process that never
    /// finished its lock.
    pub async fn release_lock(
        &self,
        job_name: &str,
        lock_id: &str,
        kind: ReleaseKind,
    ) -> Result<(), TransportError> {
        self.transport.release(job_name, lock_id, kind).await
    }

    fn runner(&self, options: RequestJobOptions) -> JobRunner {
        JobRunner::new(Arc::clone(&self.transport), options)
    }
}
