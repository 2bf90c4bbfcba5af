//! # Design
//!
//! - Constant messages; identifiers and sources travel as fields.
//! - Health failures are collected rather than short-circuited so operators
//!   see every broken collaborator at once.

use std::fmt::{self, Display, Formatter};

use offload_core::AdapterError;
use offload_state::StateError;
use thiserror::Error;

use crate::task::TaskState;

/// Result alias for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors produced by the transfer engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// One or more startup health checks failed.
    #[error("health checks failed")]
    HealthCheck {
        /// Every failing check.
        failures: Vec<HealthFailure>,
    },
    /// `start` was called while the engine was running.
    #[error("engine already running")]
    AlreadyRunning,
    /// A task attempted a transition its state machine forbids.
    #[error("invalid task transition")]
    InvalidTransition {
        /// State the task was in.
        from: TaskState,
        /// Requested state.
        to: TaskState,
    },
    /// The ledger rejected an operation.
    #[error("state store operation failed")]
    State {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying ledger error.
        #[source]
        source: StateError,
    },
    /// An adapter call failed after retries.
    #[error("adapter operation failed")]
    Adapter {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying adapter error.
        #[source]
        source: AdapterError,
    },
    /// The concurrency limiter was closed.
    #[error("concurrency limiter closed")]
    LimiterClosed,
    /// The task queue stopped accepting work.
    #[error("task queue closed")]
    QueueClosed,
    /// A background task could not be joined.
    #[error("background task failed")]
    Join {
        /// Background task name.
        task: &'static str,
        /// Underlying join error.
        #[source]
        source: tokio::task::JoinError,
    },
}

impl EngineError {
    pub(crate) const fn state(operation: &'static str, source: StateError) -> Self {
        Self::State { operation, source }
    }

    pub(crate) const fn adapter(operation: &'static str, source: AdapterError) -> Self {
        Self::Adapter { operation, source }
    }
}

/// A collaborator that failed its startup health check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthFailure {
    /// Collaborator name (`source` or `transfer`).
    pub component: &'static str,
    /// Rendered failure detail.
    pub detail: String,
}

impl Display for HealthFailure {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.component, self.detail)
    }
}
