//! Boundary traits implemented by source and transfer collaborators.
//!
//! Implementations must be safe to call from several workers at once; the
//! engine never serialises calls on their behalf.

use std::path::Path;

use async_trait::async_trait;

use crate::error::AdapterResult;
use crate::model::{Item, ItemFilter, TransferOutcome, VerifyOutcome};

/// System that produces items and owns their source-side records.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// List items that have finished being produced locally.
    async fn list_eligible(&self, filter: &ItemFilter) -> AdapterResult<Vec<Item>>;

    /// Remove the source-side record for `id`, optionally with its files.
    ///
    /// Returns `false` when the source refused the deletion.
    async fn delete_record(&self, id: &str, delete_files: bool) -> AdapterResult<bool>;

    /// Confirm the source is reachable and the session is authenticated.
    async fn health_check(&self) -> AdapterResult<()>;
}

/// External copy/verify tool used to move content to the remote store.
#[async_trait]
pub trait TransferExecutor: Send + Sync {
    /// Copy `local_path` to `remote_subpath` beneath the configured remote root.
    async fn transfer(&self, local_path: &Path, remote_subpath: &str)
    -> AdapterResult<TransferOutcome>;

    /// Compare `local_path` with its remote copy.
    async fn verify(&self, local_path: &Path, remote_subpath: &str)
    -> AdapterResult<VerifyOutcome>;

    /// Confirm the tool is installed and the remote is configured.
    async fn health_check(&self) -> AdapterResult<()>;
}
