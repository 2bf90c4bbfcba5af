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

//! Offload application wiring.
//!
//! Layout: `cli.rs` (command-line flags), `bootstrap.rs` (startup, run, and
//! shutdown), `engine_config.rs` (configuration to engine and adapter
//! settings), `error.rs` (application errors).

/// Startup sequence and signal handling.
pub mod bootstrap;
/// Command-line interface.
pub mod cli;
/// Mapping from the configuration document to runtime settings.
pub mod engine_config;
/// Application error type.
pub mod error;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
