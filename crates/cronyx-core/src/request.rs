//! Acquire-request payload.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use crate::error::ValidationError;
use crate::interval::{DurationSpec, JobInterval};

/// Body of `POST /{jobName}`: the intent to lock one job interval.
///
/// Only `job_interval` is mandatory. Absent options are omitted from the JSON
/// body so the server applies its own defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRequest {
    pub job_interval: JobInterval,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_job_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_buffer: Option<DurationSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_interval: Option<DurationSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_lock: Option<bool>,
    /// Pins the interval window instead of letting the server use "now".
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_iso_millis"
    )]
    pub job_interval_started_at: Option<DateTime<Utc>>,
}

impl LockRequest {
    /// Creates a request with every optional field absent.
    pub fn new(job_interval: impl Into<JobInterval>) -> Self {
        LockRequest {
            job_interval: job_interval.into(),
            timezone: None,
            required_job_names: None,
            start_buffer: None,
            retry_interval: None,
            no_lock: None,
            job_interval_started_at: None,
        }
    }

    /// Validates the request before it goes on the wire.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.job_interval.validate()?;
        for duration in [&self.start_buffer, &self.retry_interval].into_iter().flatten() {
            duration.validate()?;
        }
        if let Some(names) = &self.required_job_names {
            if names.iter().any(|name| name.trim().is_empty()) {
                return Err(ValidationError::InvalidField {
                    field: "requiredJobNames",
                    reason: "job names must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Serializes the request as a JSON value.
    pub fn to_json(&self) -> Result<serde_json::Value, ValidationError> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Writes timestamps the way the lock server emits them: `2023-02-03T15:00:00.000Z`.
fn serialize_iso_millis<S: Serializer>(
    value: &Option<DateTime<Utc>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(at) => serializer.serialize_str(&at.to_rfc3339_opts(SecondsFormat::Millis, true)),
        None => serializer.serialize_none(),
    }
}
