#![forbid(unsafe_code)]
#![deny(
    unused_must_use,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Telemetry primitives shared across the Offload workspace.
//!
//! This crate centralises logging and metrics so the engine and the binary
//! share one observability setup.

pub mod error;
pub mod init;
pub mod metrics;

pub use error::{Result, TelemetryError};
pub use init::{
    DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, LoggingGuard, build_sha, init_logging,
};
pub use metrics::{Metrics, MetricsSnapshot, OUTCOME_ABANDONED, OUTCOME_COMPLETED, OUTCOME_FAILED};
