//! Client-side handle for one granted job lock.
//!
//! A [`Job`] moves through three states:
//!
//! - `Active`: holds a live grant; accessors and both terminal operations work
//! - `Releasing`: a finish or interrupt is in flight; a second terminal call
//!   fails with [`JobError::Pending`] instead of queuing
//! - `Released`: terminal; every operation fails with [`JobError::NotActive`]
//!
//! A grant the server marks `isActive: false` is never usable: the handle
//! reports `Released` and every operation fails with `NotActive`.
//!
//! A failed release puts the handle back into `Active` so the caller can retry
//! `finish` or fall back to `interrupt`. Advisory grants (no lock id) release
//! locally without contacting the server.
//!
//! Terminal operations take `&self` so concurrent callers can race on one
//! handle. The state cell is only locked between awaits; it is never held
//! across a network call.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use cronyx_core::LockGrant;

use crate::error::{JobError, ReleaseKind};
use crate::transport::LockTransport;

enum LockState {
    Active(LockGrant),
    Releasing(LockGrant),
    Released,
}

/// Observable lifecycle state of a [`Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Active,
    Releasing,
    Released,
}

/// A granted lock for one job interval.
pub struct Job {
    job_name: String,
    transport: Arc<dyn LockTransport>,
    state: Mutex<LockState>,
}

impl Job {
    /// Wraps a grant returned by the lock server.
    pub fn new(transport: Arc<dyn LockTransport>, grant: LockGrant) -> Self {
        if let Some(delta) = grant.interval_start_divergence() {
            tracing::warn!(
                job = %grant.name,
                interval_started_at = %grant.interval_started_at,
                interval_ended_at = %grant.interval_ended_at,
                interval_ms = grant.interval,
                divergence_ms = delta.num_milliseconds(),
                "server interval start differs from interval end minus interval length"
            );
        }

        Job {
            job_name: grant.name.clone(),
            transport,
            state: Mutex::new(LockState::Active(grant)),
        }
    }

    /// Name of the job, available in every state.
    pub fn job_name(&self) -> &str {
        &self.job_name
    }

    pub fn status(&self) -> JobStatus {
        match &*self.state() {
            LockState::Active(grant) if grant.is_active => JobStatus::Active,
            LockState::Active(_) | LockState::Released => JobStatus::Released,
            LockState::Releasing(_) => JobStatus::Releasing,
        }
    }

    /// Lock identifier; `None` for advisory grants.
    pub fn id(&self) -> Result<Option<String>, JobError> {
        self.with_grant(|grant| grant.id.clone())
    }

    pub fn name(&self) -> Result<String, JobError> {
        self.with_grant(|grant| grant.name.clone())
    }

    /// Resolved interval length in milliseconds.
    pub fn interval(&self) -> Result<u64, JobError> {
        self.with_grant(|grant| grant.interval)
    }

    /// Start of the interval, as reported by the server.
    pub fn interval_started_at(&self) -> Result<DateTime<Utc>, JobError> {
        self.with_grant(|grant| grant.interval_started_at)
    }

    pub fn interval_ended_at(&self) -> Result<DateTime<Utc>, JobError> {
        self.with_grant(|grant| grant.interval_ended_at)
    }

    pub fn is_active(&self) -> Result<bool, JobError> {
        self.with_grant(|grant| grant.is_active)
    }

    pub fn created_at(&self) -> Result<DateTime<Utc>, JobError> {
        self.with_grant(|grant| grant.created_at)
    }

    pub fn updated_at(&self) -> Result<DateTime<Utc>, JobError> {
        self.with_grant(|grant| grant.updated_at)
    }

    /// Snapshot of the whole grant.
    pub fn grant(&self) -> Result<LockGrant, JobError> {
        self.with_grant(LockGrant::clone)
    }

    /// Marks the job finished and releases the lock.
    pub async fn finish(&self) -> Result<(), JobError> {
        self.release(ReleaseKind::Finish).await
    }

    /// Marks the job interrupted and releases the lock.
    pub async fn interrupt(&self) -> Result<(), JobError> {
        self.release(ReleaseKind::Interrupt).await
    }

    async fn release(&self, kind: ReleaseKind) -> Result<(), JobError> {
        let Some(lock_id) = self.begin_release()? else {
            tracing::debug!(job = %self.job_name, %kind, "released advisory job locally");
            return Ok(());
        };

        let mut in_flight = InFlight { job: self, settled: false };
        match self.transport.release(&self.job_name, &lock_id, kind).await {
            Ok(()) => {
                *self.state() = LockState::Released;
                in_flight.settled = true;
                match kind {
                    ReleaseKind::Finish => tracing::info!(job = %self.job_name, "Job is finished"),
                    ReleaseKind::Interrupt => {
                        tracing::info!(job = %self.job_name, "Job is interrupted")
                    }
                }
                Ok(())
            }
            Err(source) => {
                // Dropping `in_flight` restores the grant.
                drop(in_flight);
                Err(JobError::Release {
                    job_name: self.job_name.clone(),
                    kind,
                    source,
                })
            }
        }
    }

    /// Moves `Active` to `Releasing` and returns the lock id to release, or
    /// moves an advisory grant straight to `Released` and returns `None`.
    fn begin_release(&self) -> Result<Option<String>, JobError> {
        let mut state = self.state();
        match std::mem::replace(&mut *state, LockState::Released) {
            LockState::Active(grant) if grant.is_active => match grant.id.clone() {
                Some(lock_id) => {
                    *state = LockState::Releasing(grant);
                    Ok(Some(lock_id))
                }
                None => Ok(None),
            },
            LockState::Active(grant) => {
                *state = LockState::Active(grant);
                Err(self.not_active())
            }
            LockState::Releasing(grant) => {
                *state = LockState::Releasing(grant);
                Err(self.pending())
            }
            LockState::Released => Err(self.not_active()),
        }
    }

    fn restore_active(&self) {
        let mut state = self.state();
        if let LockState::Releasing(grant) = std::mem::replace(&mut *state, LockState::Released) {
            *state = LockState::Active(grant);
        }
    }

    fn with_grant<T>(&self, f: impl FnOnce(&LockGrant) -> T) -> Result<T, JobError> {
        match &*self.state() {
            LockState::Active(grant) if grant.is_active => Ok(f(grant)),
            _ => Err(self.not_active()),
        }
    }

    fn state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn not_active(&self) -> JobError {
        JobError::NotActive {
            job_name: self.job_name.clone(),
        }
    }

    fn pending(&self) -> JobError {
        JobError::Pending {
            job_name: self.job_name.clone(),
        }
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("job_name", &self.job_name)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

/// Puts a `Releasing` handle back to `Active` unless the release settled.
///
/// Also covers a release future that is dropped before the server answers.
struct InFlight<'a> {
    job: &'a Job,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.job.restore_active();
        }
    }
}
