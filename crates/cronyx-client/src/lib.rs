//! Client for a cronyx job-lock server.
//!
//! Lets many instances of a scheduled process agree, through a remote lock
//! server, on which one runs a named job for a given interval. The server owns
//! scheduling and arbitration; this crate owns the client-side lock lifecycle:
//!
//! - [`transport`]: the [`LockTransport`] seam and its HTTP implementation
//! - [`job`]: [`Job`], the handle over one granted lock
//! - [`runner`]: [`JobRunner`], acquire → run → finish/interrupt
//! - [`client`]: [`CronyxClient`], the public entry point
//! - [`config`]: [`ClientConfig`] and credentials
//! - [`error`]: [`JobError`], [`TransportError`], [`ConfigError`]

pub mod client;
pub mod config;
pub mod error;
pub mod job;
pub mod runner;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::CronyxClient;
pub use config::{ClientConfig, Credentials};
pub use error::{ConfigError, JobError, ReleaseKind, TransportError};
pub use job::{Job, JobStatus};
pub use runner::{JobRunner, RequestJobOptions};
pub use transport::{HttpTransport, LockTransport};

pub use cronyx_core::{CalendarDuration, DurationSpec, JobInterval, LockGrant, LockRequest};
