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

//! Concurrent discover, transfer, verify, and cleanup engine.
//!
//! Layout: `orchestrator.rs` (lifecycle and health checks), `discovery.rs`
//! (periodic listing and retry selection), `queue.rs` (FIFO of pending
//! tasks), `pool.rs` (workers with panic containment), `limiter.rs`
//! (transfer concurrency), `task.rs` (per-item state machine), `config.rs`
//! (engine tunables), `error.rs` (engine error taxonomy).

pub mod config;
mod context;
pub mod discovery;
pub mod error;
pub mod limiter;
pub mod orchestrator;
mod pool;
pub mod queue;
pub mod task;

pub use config::{EngineConfig, RetryPolicies};
pub use discovery::CycleReport;
pub use error::{EngineError, EngineResult, HealthFailure};
pub use limiter::{ConcurrencyLimiter, TransferPermit};
pub use orchestrator::Orchestrator;
pub use queue::TaskQueue;
pub use task::{Task, TaskState};
