//! # Design
//!
//! - Constant messages with operation, binary, and exit context as fields.
//! - Spawn and pipe failures are transient; a missing binary or remote is a
//!   configuration problem and fatal.

use std::io;
use std::path::PathBuf;

use offload_core::AdapterError;
use thiserror::Error;

/// Result alias for rclone operations.
pub type RcloneResult<T> = Result<T, RcloneError>;

/// Errors produced while driving rclone.
#[derive(Debug, Error)]
pub enum RcloneError {
    /// No rclone binary was configured or found.
    #[error("rclone binary not found")]
    BinaryNotFound {
        /// Locations that were checked.
        searched: Vec<PathBuf>,
    },
    /// The process could not be started.
    #[error("failed to start rclone")]
    Spawn {
        /// Operation identifier.
        operation: &'static str,
        /// Binary that was executed.
        binary: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Reading output from or waiting on the process failed.
    #[error("rclone process io failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The process exited unsuccessfully.
    #[error("rclone command failed")]
    CommandFailed {
        /// Operation identifier.
        operation: &'static str,
        /// Exit code, absent when killed by a signal.
        code: Option<i32>,
        /// Trailing stderr output.
        stderr: String,
    },
    /// The process did not finish in time.
    #[error("rclone command timed out")]
    TimedOut {
        /// Operation identifier.
        operation: &'static str,
        /// Budget that elapsed.
        after_secs: u64,
    },
    /// The configured remote is not in `rclone listremotes`.
    #[error("rclone remote not configured")]
    RemoteMissing {
        /// Remote that was expected.
        remote: String,
        /// Remotes rclone reported.
        available: Vec<String>,
    },
}

impl RcloneError {
    const fn operation(&self) -> &'static str {
        match self {
            Self::BinaryNotFound { .. } => "rclone.locate",
            Self::RemoteMissing { .. } => "rclone.listremotes",
            Self::Spawn { operation, .. }
            | Self::Io { operation, .. }
            | Self::CommandFailed { operation, .. }
            | Self::TimedOut { operation, .. } => operation,
        }
    }
}

impl From<RcloneError> for AdapterError {
    fn from(error: RcloneError) -> Self {
        let operation = error.operation();
        match error {
            RcloneError::BinaryNotFound { searched } => Self::fatal(
                operation,
                "binary not found",
                Some(format!("searched {} locations", searched.len())),
            ),
            RcloneError::RemoteMissing { remote, available } => Self::fatal(
                operation,
                "remote not configured",
                Some(format!("{remote}: not in [{}]", available.join(", "))),
            ),
            other => Self::transient(operation, other),
        }
    }
}
