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

//! rclone-backed transfer executor.
//!
//! Layout: `executor.rs` (copy, check, and remote health check), `locate.rs`
//! (binary discovery), `config.rs` (flags and verification settings),
//! `error.rs` (process errors and their adapter classification).

pub mod config;
pub mod error;
pub mod executor;
pub mod locate;

pub use config::RcloneConfig;
pub use error::{RcloneError, RcloneResult};
pub use executor::RcloneExecutor;
pub use locate::locate_binary;
