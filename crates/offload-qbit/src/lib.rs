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

//! qBittorrent Web API v2 source adapter.
//!
//! Layout: `client.rs` (session handling and API calls), `model.rs` (torrent
//! wire types and content path resolution), `error.rs` (client errors and
//! their adapter classification).

pub mod client;
pub mod error;
pub mod model;

pub use client::{QbitClient, QbitConfig};
pub use error::{QbitError, QbitResult};
pub use model::{TorrentFile, TorrentInfo};
