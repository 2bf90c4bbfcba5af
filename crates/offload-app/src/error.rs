//! # Design
//!
//! - One application error wrapping each crate's error with the operation
//!   that failed.
//! - Constant messages; sources are preserved, not re-logged.

use std::io;

use thiserror::Error;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Loading, writing, or validating configuration failed.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: offload_config::ConfigError,
    },
    /// Logging or metrics setup failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: offload_telemetry::TelemetryError,
    },
    /// Opening the ledger failed.
    #[error("state operation failed")]
    State {
        /// Operation identifier.
        operation: &'static str,
        /// Source ledger error.
        source: offload_state::StateError,
    },
    /// Building the qBittorrent client failed.
    #[error("source client operation failed")]
    Source {
        /// Operation identifier.
        operation: &'static str,
        /// Source client error.
        source: offload_qbit::QbitError,
    },
    /// Starting or stopping the engine failed.
    #[error("engine operation failed")]
    Engine {
        /// Operation identifier.
        operation: &'static str,
        /// Source engine error.
        source: offload_engine::EngineError,
    },
    /// Waiting for the shutdown signal failed.
    #[error("signal handling failed")]
    Signal {
        /// Source IO error.
        source: io::Error,
    },
}

impl AppError {
    pub(crate) const fn config(
        operation: &'static str,
        source: offload_config::ConfigError,
    ) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: offload_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }

    pub(crate) const fn state(operation: &'static str, source: offload_state::StateError) -> Self {
        Self::State { operation, source }
    }

    pub(crate) const fn source(operation: &'static str, source: offload_qbit::QbitError) -> Self {
        Self::Source { operation, source }
    }

    pub(crate) const fn engine(
        operation: &'static str,
        source: offload_engine::EngineError,
    ) -> Self {
        Self::Engine { operation, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn engine_errors_keep_their_source() {
        let err = AppError::engine("engine.start", offload_engine::EngineError::AlreadyRunning);
        assert_eq!(err.to_string(), "engine operation failed");
        assert_eq!(
            err.source().map(ToString::to_string).as_deref(),
            Some("engine already running")
        );
    }
}
