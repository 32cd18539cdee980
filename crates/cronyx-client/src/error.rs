//! Error types for the cronyx client.
//!
//! [`TransportError`] covers a single HTTP exchange with the lock server,
//! [`JobError`] covers the job-lock lifecycle and wraps transport failures
//! with the job they belong to, and [`ConfigError`] covers client setup.

use std::fmt;

use cronyx_core::ValidationError;
use reqwest::StatusCode;
use thiserror::Error;

/// Which terminal release a job lock went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReleaseKind {
    /// The job completed successfully.
    Finish,
    /// The job failed and its interval should be retried later.
    Interrupt,
}

impl ReleaseKind {
    /// Path segment used by the release endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReleaseKind::Finish => "finish",
            ReleaseKind::Interrupt => "interrupt",
        }
    }
}

impl fmt::Display for ReleaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of one request against the lock server. Never retried.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request could not be sent or the response could not be read.
    #[error("Failed to {method} {url}")]
    Request {
        method: &'static str,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a non-200 status.
    #[error("Failed to {method} {url}")]
    Status {
        method: &'static str,
        url: String,
        status: StatusCode,
    },

    /// The response body violated the lock grant contract.
    #[error("invalid response from {url}")]
    InvalidResponse {
        url: String,
        #[source]
        source: ValidationError,
    },

    /// The lock request failed validation before it was sent.
    #[error("invalid lock request")]
    InvalidRequest(#[source] ValidationError),

    /// A job name or lock id could not be turned into a request path.
    #[error("invalid request path: {reason}")]
    InvalidPath { reason: String },
}

impl TransportError {
    /// Address of the failed request, when one was built.
    pub fn url(&self) -> Option<&str> {
        match self {
            TransportError::Request { url, .. }
            | TransportError::Status { url, .. }
            | TransportError::InvalidResponse { url, .. } => Some(url),
            TransportError::InvalidRequest(_) | TransportError::InvalidPath { .. } => None,
        }
    }

    /// HTTP status of the failed request, if the server answered.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Request { source, .. } => source.status(),
            _ => None,
        }
    }
}

/// Job-lock lifecycle errors. Every message names the job.
#[derive(Debug, Error)]
pub enum JobError {
    /// Requesting the lock failed.
    #[error("Cannot activate job lock for {job_name}")]
    Acquisition {
        job_name: String,
        #[source]
        source: TransportError,
    },

    /// Finishing or interrupting the lock failed. The handle stays active.
    #[error("Cannot {kind} job for {job_name}")]
    Release {
        job_name: String,
        kind: ReleaseKind,
        #[source]
        source: TransportError,
    },

    /// The handle has no active lock: it was already released, or a release
    /// is in flight.
    #[error("Job is not active for {job_name}")]
    NotActive { job_name: String },

    /// A finish or interrupt is already in flight on this handle.
    #[error("Job is pending for {job_name}")]
    Pending { job_name: String },
}

impl JobError {
    /// Name of the job the error belongs to.
    pub fn job_name(&self) -> &str {
        match self {
            JobError::Acquisition { job_name, .. }
            | JobError::Release { job_name, .. }
            | JobError::NotActive { job_name }
            | JobError::Pending { job_name } => job_name,
        }
    }
}

/// Client construction errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required setting was absent.
    #[error("missing configuration: {0} is not set")]
    Missing(&'static str),

    /// The base address is not a usable http(s) URL.
    #[error("invalid base url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Only one of username and password was given.
    #[error("incomplete credentials: {0}")]
    PartialCredentials(&'static str),

    /// A credential could not be encoded as a header value.
    #[error("invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn release_error_names_operation_and_job() {
        let err = JobError::Release {
            job_name: "nightly".into(),
            kind: ReleaseKind::Finish,
            source: TransportError::Status {
                method: "put",
                url: "http://localhost:3000/nightly/abc/finish".into(),
                status: StatusCode::INTERNAL_SERVER_ERROR,
            },
        };
        assert_eq!(err.to_string(), "Cannot finish job for nightly");
        assert_eq!(err.job_name(), "nightly");

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(
            source.to_string(),
            "Failed to put http://localhost:3000/nightly/abc/finish"
        );
    }

    #[test]
    fn transport_error_exposes_url_and_status() {
        let err = TransportError::Status {
            method: "post",
            url: "http://localhost:3000/jobName".into(),
            status: StatusCode::BAD_GATEWAY,
        };
        assert_eq!(err.url(), Some("http://localhost:3000/jobName"));
        assert_eq!(err.status(), Some(StatusCode::BAD_GATEWAY));
        assert_eq!(err.to_string(), "Failed to post http://localhost:3000/jobName");
    }

    #[test]
    fn lifecycle_messages() {
        let not_active = JobError::NotActive {
            job_name: "jobName".into(),
        };
        let pending = JobError::Pending {
            job_name: "jobName".into(),
        };
        assert_eq!(not_active.to_string(), "Job is not active for jobName");
        assert_eq!(pending.to_string(), "Job is pending for jobName");
    }
}
