//! Payload contract shared by cronyx lock clients.
//!
//! - [`request`]: the acquire-request body ([`LockRequest`])
//! - [`grant`]: the acquire-response body ([`LockGrant`]) and its validation
//! - [`interval`]: job interval and duration specifications
//! - [`error`]: [`ValidationError`]

pub mod error;
pub mod grant;
pub mod interval;
pub mod request;

// Re-export commonly used types
pub use error::ValidationError;
pub use grant::{parse_lock_grant, parse_lock_grant_bytes, LockGrant};
pub use interval::{CalendarDuration, DurationSpec, JobInterval};
pub use request::LockRequest;
