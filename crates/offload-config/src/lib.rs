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

//! File-backed configuration for Offload.
//!
//! Layout: `model.rs` (typed document with defaults), `loader.rs` (load,
//! repair, atomic write), `validate.rs` (constraint checks).

pub mod error;
pub mod loader;
pub mod model;
pub mod validate;

pub use error::{ConfigError, ConfigResult, FieldViolation};
pub use loader::{DEFAULT_CONFIG_FILE, load, read_existing, write, write_default};
pub use model::{
    AutoDeleteSettings, LoggingSettings, OffloadConfig, QbitSettings, RcloneSettings,
    VerificationSettings,
};
pub use validate::validate;
