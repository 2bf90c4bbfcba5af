//! # Design
//!
//! - Split adapter failures into transient (retryable) and fatal classes.
//! - Keep error messages constant while carrying operation context.
//! - Render full source chains on demand for ledger entries and logs.

use std::error::Error;
use std::fmt::Write as _;

use thiserror::Error;

/// Result alias for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Errors surfaced by source and transfer adapters.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// Network, subprocess, or IO failure that may succeed on a later attempt.
    #[error("adapter transient failure")]
    Transient {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Misconfiguration or rejection that retrying cannot fix.
    #[error("adapter fatal failure")]
    Fatal {
        /// Operation identifier.
        operation: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Additional detail when available.
        detail: Option<String>,
    },
}

impl AdapterError {
    /// Wrap an underlying error as a transient failure.
    pub fn transient(
        operation: &'static str,
        source: impl Into<Box<dyn Error + Send + Sync>>,
    ) -> Self {
        Self::Transient {
            operation,
            source: source.into(),
        }
    }

    /// Build a fatal failure with an optional detail string.
    #[must_use]
    pub const fn fatal(operation: &'static str, reason: &'static str, detail: Option<String>) -> Self {
        Self::Fatal {
            operation,
            reason,
            detail,
        }
    }

    /// Retry predicate used with [`crate::retry`].
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Operation identifier recorded on the error.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        match self {
            Self::Transient { operation, .. } | Self::Fatal { operation, .. } => operation,
        }
    }

    /// Human-readable rendering including operation, reason, and source chain.
    #[must_use]
    pub fn detail(&self) -> String {
        match self {
            Self::Transient { operation, .. } => {
                format!("{operation}: {}", describe_error(self))
            }
            Self::Fatal {
                operation,
                reason,
                detail,
            } => detail.as_ref().map_or_else(
                || format!("{operation}: {reason}"),
                |detail| format!("{operation}: {reason}: {detail}"),
            ),
        }
    }
}

/// Render an error and its sources as a single `a: b: c` line.
#[must_use]
pub fn describe_error(error: &(dyn Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut current = error.source();
    while let Some(source) = current {
        let _ = write!(rendered, ": {source}");
        current = source.source();
    }
    rendered
}
