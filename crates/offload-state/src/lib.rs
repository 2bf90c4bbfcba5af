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

//! Crash-safe ledger of processed and failed items.
//!
//! # Design
//! - One mutex guards both maps and the in-flight id set, so eligibility checks
//!   and the claims that follow them observe the latest write.
//! - Each map is backed by its own JSON file, rewritten in full through a
//!   temporary file and an atomic rename on every mutation.
//! - In-memory state only changes after the durable write succeeded.
//! - Corrupt files are quarantined and replaced with an empty map at load.
//!
//! Layout: `store.rs` (ledger and claims), `persist.rs` (atomic file
//! replacement shared with the configuration loader), `error.rs`.

pub mod error;
pub mod persist;
mod store;

pub use error::{StateError, StateResult};
pub use persist::write_atomic;
pub use store::{ClaimOutcome, FAILED_FILE, PROCESSED_FILE, StateSnapshot, StateStore};
