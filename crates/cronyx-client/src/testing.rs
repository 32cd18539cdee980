//! In-memory [`LockTransport`] for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, TimeZone, Utc};
use reqwest::StatusCode;
use tokio::sync::Notify;

use cronyx_core::{LockGrant, LockRequest};

use crate::error::{ReleaseKind, TransportError};
use crate::transport::LockTransport;

/// A one-hour grant for `jobName` ending 2023-02-03T15:00:00Z.
pub(crate) fn grant(id: Option<&str>) -> LockGrant {
    let ended = Utc.with_ymd_and_hms(2023, 2, 3, 15, 0, 0).unwrap();
    LockGrant {
        id: id.map(str::to_string),
        name: "jobName".to_string(),
        interval: 3_600_000,
        interval_started_at: ended - Duration::hours(1),
        interval_ended_at: ended,
        is_active: true,
        created_at: ended,
        updated_at: ended,
    }
}

#[derive(Clone)]
enum AcquireOutcome {
    Grant(LockGrant),
    Declined,
    Fail,
}

pub(crate) struct FakeTransport {
    acquire: AcquireOutcome,
    acquires: Mutex<Vec<(String, LockRequest)>>,
    releases: Mutex<Vec<(String, String, ReleaseKind)>>,
    release_fails: AtomicBool,
    gate: Option<Notify>,
    entered: Notify,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        FakeTransport {
            acquire: AcquireOutcome::Grant(grant(Some("6541d97684f72238cf3dc0ab"))),
            acquires: Mutex::new(Vec::new()),
            releases: Mutex::new(Vec::new()),
            release_fails: AtomicBool::new(false),
            gate: None,
            entered: Notify::new(),
        }
    }

    pub(crate) fn granting(mut self, grant: LockGrant) -> Self {
        self.acquire = AcquireOutcome::Grant(grant);
        self
    }

    pub(crate) fn declining(mut self) -> Self {
        self.acquire = AcquireOutcome::Declined;
        self
    }

    pub(crate) fn failing_acquire(mut self) -> Self {
        self.acquire = AcquireOutcome::Fail;
        self
    }

    pub(crate) fn failing_releases(self) -> Self {
        self.set_release_failure(true);
        self
    }

    /// Releases block until [`FakeTransport::open_release_gate`] is called.
    pub(crate) fn gated_releases(mut self) -> Self {
        self.gate = Some(Notify::new());
        self
    }

    pub(crate) fn set_release_failure(&self, fail: bool) {
        self.release_fails.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn open_release_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.notify_one();
        }
    }

    pub(crate) async fn wait_for_release_entered(&self) {
        self.entered.notified().await;
    }

    pub(crate) fn acquires(&self) -> Vec<(String, LockRequest)> {
        self.acquires.lock().unwrap().clone()
    }

    pub(crate) fn releases(&self) -> Vec<(String, String, ReleaseKind)> {
        self.releases.lock().unwrap().clone()
    }
}

#[async_trait]
impl LockTransport for FakeTransport {
    async fn acquire(
        &self,
        job_name: &str,
        request: &LockRequest,
    ) -> Result<Option<LockGrant>, TransportError> {
        self.acquires
            .lock()
            .unwrap()
            .push((job_name.to_string(), request.clone()));
        match &self.acquire {
            AcquireOutcome::Grant(grant) => Ok(Some(grant.clone())),
            AcquireOutcome::Declined => Ok(None),
            AcquireOutcome::Fail => Err(TransportError::Status {
                method: "post",
                url: format!("http://localhost:3000/{}", job_name),
                status: StatusCode::INTERNAL_SERVER_ERROR,
            }),
        }
    }

    async fn release(
        &self,
        job_name: &str,
        lock_id: &str,
        kind: ReleaseKind,
    ) -> Result<(), TransportError> {
        self.releases
            .lock()
            .unwrap()
            .push((job_name.to_string(), lock_id.to_string(), kind));
        self.entered.notify_one();

        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        if self.release_fails.load(Ordering::SeqCst) {
            return Err(TransportError::Status {
                method: "put",
                url: format!("http://localhost:3000/{}/{}/{}", job_name, lock_id, kind),
                status: StatusCode::INTERNAL_SERVER_ERROR,
            });
        }
        Ok(())
    }
}
