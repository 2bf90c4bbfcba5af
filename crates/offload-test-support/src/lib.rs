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

//! Shared test helpers used across crate test suites.
//! Layout: fixtures.rs (on-disk content helpers), mocks.rs (scripted adapters).

pub mod fixtures;
pub mod mocks;
