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

//! Engine-agnostic interfaces and records shared across the Offload workspace.
//!
//! Layout: `model.rs` (items, ledger records, adapter outcomes), `adapter.rs`
//! (source and transfer traits), `retry.rs` (exponential backoff controller),
//! `error.rs` (adapter error taxonomy).

pub mod adapter;
pub mod error;
pub mod model;
pub mod retry;

pub use adapter::{SourceAdapter, TransferExecutor};
pub use error::{AdapterError, AdapterResult, describe_error};
pub use model::{
    FailureRecord, Item, ItemFilter, LedgerEntry, ProcessedRecord, TransferOutcome, VerifyOutcome,
};
pub use retry::{RetryPolicy, retry};
