//! Acquire-response payload.
//!
//! The lock server answers `POST /{jobName}` with either a lock grant object or
//! a literal `null`. [`parse_lock_grant_bytes`] decodes the body straight into
//! `Option<LockGrant>`; a grant with any missing or mistyped field is rejected
//! as a whole, so a partially populated grant never reaches a job handle.

use std::fmt;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::ValidationError;

/// A server-issued lock for one job interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockGrant {
    /// Lock identifier. `None` means advisory mode: no exclusivity enforced.
    ///
    /// The key itself is required; only its value may be `null`.
    #[serde(deserialize_with = "nullable")]
    pub id: Option<String>,
    pub name: String,
    /// Resolved interval length in milliseconds.
    #[serde(deserialize_with = "millis")]
    pub interval: u64,
    #[serde(deserialize_with = "timestamp")]
    pub interval_started_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp")]
    pub interval_ended_at: DateTime<Utc>,
    pub is_active: bool,
    #[serde(deserialize_with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

impl LockGrant {
    /// Returns `true` if the grant carries no lock identifier.
    pub fn is_advisory(&self) -> bool {
        self.id.is_none()
    }

    /// Difference between the server's interval start and the start implied by
    /// `interval_ended_at - interval`, if they disagree.
    pub fn interval_start_divergence(&self) -> Option<Duration> {
        let millis = i64::try_from(self.interval).ok()?;
        let implied = self
            .interval_ended_at
            .checked_sub_signed(Duration::milliseconds(millis))?;
        let delta = self.interval_started_at - implied;
        if delta == Duration::zero() {
            None
        } else {
            Some(delta)
        }
    }
}

/// Decodes an acquire response that was already parsed as JSON.
///
/// `null` yields `Ok(None)`.
pub fn parse_lock_grant(value: Value) -> Result<Option<LockGrant>, ValidationError> {
    Ok(serde_json::from_value(value)?)
}

/// Decodes a raw acquire response body.
pub fn parse_lock_grant_bytes(body: &[u8]) -> Result<Option<LockGrant>, ValidationError> {
    Ok(serde_json::from_slice(body)?)
}

fn nullable<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::deserialize(deserializer)
}

/// Non-negative millisecond count. Integral floats such as `8.64e7` pass.
fn millis<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(MillisVisitor)
}

/// RFC 3339 string or epoch milliseconds, integral or not.
fn timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(TimestampVisitor)
}

struct MillisVisitor;

impl<'de> Visitor<'de> for MillisVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer number of milliseconds")
    }

    fn visit_u64<E: de::Error>(self, ms: u64) -> Result<u64, E> {
        Ok(ms)
    }

    fn visit_i64<E: de::Error>(self, ms: i64) -> Result<u64, E> {
        u64::try_from(ms).map_err(|_| E::invalid_value(de::Unexpected::Signed(ms), &self))
    }

    fn visit_f64<E: de::Error>(self, ms: f64) -> Result<u64, E> {
        if ms.is_finite() && ms >= 0.0 && ms.fract() == 0.0 && ms <= u64::MAX as f64 {
            Ok(ms as u64)
        } else {
            Err(E::invalid_value(de::Unexpected::Float(ms), &self))
        }
    }
}

struct TimestampVisitor;

impl<'de> Visitor<'de> for TimestampVisitor {
    type Value = DateTime<Utc>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an RFC 3339 timestamp or epoch milliseconds")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<DateTime<Utc>, E> {
        DateTime::parse_from_rfc3339(value)
            .map(|at| at.with_timezone(&Utc))
            .map_err(|_| E::invalid_value(de::Unexpected::Str(value), &self))
    }

    fn visit_i64<E: de::Error>(self, ms: i64) -> Result<DateTime<Utc>, E> {
        Utc.timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(ms), &self))
    }

    fn visit_u64<E: de::Error>(self, ms: u64) -> Result<DateTime<Utc>, E> {
        let signed =
            i64::try_from(ms).map_err(|_| E::invalid_value(de::Unexpected::Unsigned(ms), &self))?;
        self.visit_i64(signed)
    }

    fn visit_f64<E: de::Error>(self, ms: f64) -> Result<DateTime<Utc>, E> {
        let whole = ms.trunc();
        if !whole.is_finite() || whole < i64::MIN as f64 || whole > i64::MAX as f64 {
            return Err(E::invalid_value(de::Unexpected::Float(ms), &self));
        }
        self.visit_i64(whole as i64)
    }
}
