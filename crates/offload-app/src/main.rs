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

//! Binary entrypoint for the Offload daemon.

use offload_app::{AppResult, run_app};

/// Runs the daemon until Ctrl-C.
#[tokio::main]
async fn main() -> AppResult<()> {
    run_app().await
}
