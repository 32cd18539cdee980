//! Job interval and duration specifications.
//!
//! The lock server accepts three shapes for a job interval: a cron-like
//! expression, a fixed number of milliseconds, or a calendar duration broken
//! down into components. Start buffers and retry intervals accept the latter
//! two. All of them serialize untagged so the wire form is a bare string,
//! number or object.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A duration broken down into calendar components.
///
/// Every component is optional; absent components are omitted on the wire.
/// Components are plain JSON numbers, so `{"hours": 1.5}` is valid; the lock
/// server decides how fractions resolve.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalendarDuration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub years: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub months: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weeks: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seconds: Option<f64>,
}

impl CalendarDuration {
    /// Returns `true` if no component is set.
    pub fn is_empty(&self) -> bool {
        self.components().iter().all(|(_, value)| value.is_none())
    }

    /// Requires at least one component, and every component to be finite.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_empty() {
            return Err(ValidationError::EmptyDuration);
        }
        for (name, value) in self.components() {
            if let Some(value) = value.filter(|v| !v.is_finite()) {
                return Err(ValidationError::InvalidField {
                    field: name,
                    reason: format!("{} is not a finite number", value),
                });
            }
        }
        Ok(())
    }

    fn components(&self) -> [(&'static str, Option<f64>); 7] {
        [
            ("years", self.years),
            ("months", self.months),
            ("weeks", self.weeks),
            ("days", self.days),
            ("hours", self.hours),
            ("minutes", self.minutes),
            ("seconds", self.seconds),
        ]
    }

    fn parse_json(s: &str) -> Result<Self, ValidationError> {
        let duration: CalendarDuration = serde_json::from_str(s)?;
        duration.validate()?;
        Ok(duration)
    }
}

/// How often a job runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JobInterval {
    /// Fixed interval length in milliseconds.
    Millis(u64),
    /// Cron-like expression, resolved by the lock server.
    Expression(String),
    /// Calendar duration such as `{"days": 1}`.
    Calendar(CalendarDuration),
}

impl JobInterval {
    /// Checks that the interval carries something the server can resolve.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            JobInterval::Expression(expr) if expr.trim().is_empty() => {
                Err(ValidationError::EmptyJobInterval)
            }
            JobInterval::Calendar(duration) => duration.validate(),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for JobInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobInterval::Millis(ms) => write!(f, "{}ms", ms),
            JobInterval::Expression(expr) => write!(f, "'{}'", expr),
            JobInterval::Calendar(duration) => {
                let json = serde_json::to_string(duration).map_err(|_| fmt::Error)?;
                write!(f, "{}", json)
            }
        }
    }
}

/// Parses command-line style interval text.
///
/// All-digit text is milliseconds, text starting with `{` is a JSON calendar
/// duration, anything else is passed through as an expression.
impl FromStr for JobInterval {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyJobInterval);
        }
        if trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return parse_millis("jobInterval", trimmed).map(JobInterval::Millis);
        }
        if trimmed.starts_with('{') {
            return CalendarDuration::parse_json(trimmed).map(JobInterval::Calendar);
        }
        Ok(JobInterval::Expression(trimmed.to_string()))
    }
}

impl From<u64> for JobInterval {
    fn from(ms: u64) -> Self {
        JobInterval::Millis(ms)
    }
}

impl From<&str> for JobInterval {
    fn from(expr: &str) -> Self {
        JobInterval::Expression(expr.to_string())
    }
}

impl From<String> for JobInterval {
    fn from(expr: String) -> Self {
        JobInterval::Expression(expr)
    }
}

impl From<CalendarDuration> for JobInterval {
    fn from(duration: CalendarDuration) -> Self {
        JobInterval::Calendar(duration)
    }
}

/// A start buffer or retry interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationSpec {
    Millis(u64),
    Calendar(CalendarDuration),
}

impl DurationSpec {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            DurationSpec::Millis(_) => Ok(()),
            DurationSpec::Calendar(duration) => duration.validate(),
        }
    }
}

impl FromStr for DurationSpec {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.starts_with('{') {
            return CalendarDuration::parse_json(trimmed).map(DurationSpec::Calendar);
        }
        parse_millis("duration", trimmed).map(DurationSpec::Millis)
    }
}

impl From<u64> for DurationSpec {
    fn from(ms: u64) -> Self {
        DurationSpec::Millis(ms)
    }
}

impl From<std::time::Duration> for DurationSpec {
    fn from(duration: std::time::Duration) -> Self {
        DurationSpec::Millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }
}

impl From<CalendarDuration> for DurationSpec {
    fn from(duration: CalendarDuration) -> Self {
        DurationSpec::Calendar(duration)
    }
}

fn parse_millis(field: &'static str, s: &str) -> Result<u64, ValidationError> {
    s.parse::<u64>()
        .map_err(|err| ValidationError::InvalidField {
            field,
            reason: format!("'{}' is not a millisecond count: {}", s, err),
        })
}
