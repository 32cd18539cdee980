//! CLI error type and its mapping to process exit codes.

use std::process::ExitStatus;

use cronyx_client::{ConfigError, JobError, TransportError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Client configuration was missing or invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Acquiring or releasing the job lock failed.
    #[error(transparent)]
    Job(#[from] JobError),

    /// A direct release by lock id failed.
    #[error("Cannot {kind} job for {job_name}")]
    Release {
        job_name: String,
        kind: cronyx_client::ReleaseKind,
        #[source]
        source: TransportError,
    },

    /// The command could not be started.
    #[error("failed to run `{command}`")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully.
    #[error("`{command}` exited with {status}")]
    Command { command: String, status: ExitStatus },

    /// The grant could not be encoded.
    #[error("failed to encode grant")]
    Encode(#[from] serde_json::Error),

    /// The grant could not be written out.
    #[error("failed to write output")]
    Output(#[source] std::io::Error),
}

impl CliError {
    /// 2 for configuration problems, the child's own code when it has one,
    /// 1 for everything else.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_) => 2,
            CliError::Command { status, .. } => match status.code() {
                Some(code) if code != 0 => code,
                _ => 1,
            },
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_exit_with_two() {
        let err = CliError::from(ConfigError::Missing("CRONYX_URL"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn job_errors_exit_with_one() {
        let err = CliError::from(JobError::NotActive {
            job_name: "nightly".into(),
        });
        assert_eq!(err.exit_code(), 1);
        assert_eq!(err.to_string(), "Job is not active for nightly");
    }

    #[test]
    fn spawn_error_leaves_cause_to_source_chain() {
        let err = CliError::Spawn {
            command: "missing-binary --flag".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(err.to_string(), "failed to run `missing-binary --flag`");
        let cause = std::error::Error::source(&err).map(|e| e.to_string());
        assert_eq!(cause.as_deref(), Some("no such file"));
        assert_eq!(err.exit_code(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn command_failure_keeps_child_code() {
        use std::os::unix::process::ExitStatusExt;

        let err = CliError::Command {
            command: "backup".into(),
            status: ExitStatus::from_raw(7 << 8),
        };
        assert_eq!(err.exit_code(), 7);

        let killed = CliError::Command {
            command: "backup".into(),
            status: ExitStatus::from_raw(9),
        };
        assert_eq!(killed.exit_code(), 1);
    }
}
