//! # Design
//!
//! - Constant error messages with the failing operation and path as context.
//! - Keep the underlying IO/JSON error as the source.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result alias for ledger operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors produced while loading or persisting the ledger.
#[derive(Debug, Error)]
pub enum StateError {
    /// Filesystem failure while reading or writing a ledger file.
    #[error("state io failure")]
    Io {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// File involved in the failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Serialisation failure for a ledger map.
    #[error("state json failure")]
    Json {
        /// Operation that triggered the failure.
        operation: &'static str,
        /// File involved in the failure.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },
}

impl StateError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: serde_json::Error,
    ) -> Self {
        Self::Json {
            operation,
            path: path.into(),
            source,
        }
    }
}
