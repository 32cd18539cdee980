//! Validation error types for cronyx-core.
//!
//! Uses `thiserror` for structured, matchable variants covering every way a
//! lock request or a lock grant payload can fail the payload contract.

use thiserror::Error;

/// Errors produced while validating or coercing lock payloads.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The payload was not well-formed JSON or did not match the expected
    /// shape. The message names the offending field.
    #[error("malformed payload: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A field was present but had the wrong type or an out-of-range value.
    #[error("invalid field '{field}': {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// The job interval expression was empty.
    #[error("job interval must not be empty")]
    EmptyJobInterval,

    /// A structured duration had none of its components set.
    #[error("duration must set at least one component")]
    EmptyDuration,
}
