//! Error types for logging and metrics setup.
//!
//! Messages stay constant; the metric name or log path travels as a field.

use std::path::PathBuf;
use std::string::FromUtf8Error;

use prometheus::Error as PrometheusError;
use thiserror::Error;
use tracing_appender::rolling::InitError;
use tracing_subscriber::util::TryInitError;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised while wiring up logging or metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already installed.
    #[error("tracing subscriber already installed")]
    SubscriberInstall {
        /// Underlying subscriber error.
        #[source]
        source: TryInitError,
    },
    /// The configured log file path ends in a root or `..`.
    #[error("log file path has no file name")]
    LogFileName {
        /// Configured path.
        path: PathBuf,
    },
    /// The log file or its directory could not be opened.
    #[error("log file could not be opened")]
    LogFileOpen {
        /// Configured path.
        path: PathBuf,
        /// Underlying appender error.
        #[source]
        source: InitError,
    },
    /// A collector was rejected when built.
    #[error("metric definition rejected")]
    MetricsCollector {
        /// Metric name.
        name: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// A collector clashed with one already in the registry.
    #[error("metric registration rejected")]
    MetricsRegister {
        /// Metric name.
        name: &'static str,
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The text exposition could not be encoded.
    #[error("metric exposition failed")]
    MetricsEncode {
        /// Underlying Prometheus error.
        #[source]
        source: PrometheusError,
    },
    /// The text exposition was not UTF-8.
    #[error("metric exposition is not utf-8")]
    MetricsUtf8 {
        /// Underlying conversion error.
        #[source]
        source: FromUtf8Error,
    },
}
