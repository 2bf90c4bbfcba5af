//! One item's transfer attempt and its state machine.
//!
//! # Design
//! - `Pending → Transferring → Verifying → Completed`, with
//!   `RetryableFailed` reachable from both active states and
//!   `PermanentFailed` reachable only before a slot is taken.
//! - Completion side effects run strictly after a verified match: ledger
//!   write, source record removal, then local content removal.
//! - A retryable failure is recorded and the task ends; the discovery loop
//!   decides whether the item runs again.

use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::Path;
use std::time::Instant;

use offload_core::{
    AdapterError, Item, ProcessedRecord, TransferOutcome, VerifyOutcome, retry,
};
use offload_telemetry::{OUTCOME_ABANDONED, OUTCOME_COMPLETED, OUTCOME_FAILED};
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};

/// Lifecycle states of a [`Task`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    /// Queued, waiting for a worker and a concurrency slot.
    Pending,
    /// The executor is copying content.
    Transferring,
    /// The executor is comparing local and remote content.
    Verifying,
    /// Transfer verified and bookkeeping written.
    Completed,
    /// Attempt failed; a failure was recorded for a later retry.
    RetryableFailed,
    /// Content is unusable; no slot was taken.
    PermanentFailed,
}

impl TaskState {
    /// Short label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Transferring => "transferring",
            Self::Verifying => "verifying",
            Self::Completed => "completed",
            Self::RetryableFailed => "retryable_failed",
            Self::PermanentFailed => "permanent_failed",
        }
    }

    /// Whether the state ends the task.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::RetryableFailed | Self::PermanentFailed
        )
    }

    /// Whether the state machine allows moving to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Transferring | Self::PermanentFailed)
                | (Self::Transferring, Self::Verifying | Self::RetryableFailed)
                | (Self::Verifying, Self::Completed | Self::RetryableFailed)
        )
    }
}

impl Display for TaskState {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Unit of work for one item.
#[derive(Debug)]
pub struct Task {
    item: Item,
    retry_count: u32,
    state: TaskState,
    attempt_id: Uuid,
}

impl Task {
    /// Create a pending task; `retry_count` is the number of earlier failures.
    #[must_use]
    pub fn new(item: Item, retry_count: u32) -> Self {
        Self {
            item,
            retry_count,
            state: TaskState::Pending,
            attempt_id: Uuid::new_v4(),
        }
    }

    /// Item being processed.
    #[must_use]
    pub const fn item(&self) -> &Item {
        &self.item
    }

    /// Earlier failed attempts for the item.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> TaskState {
        self.state
    }

    /// Identifier of this attempt, used to correlate log lines.
    #[must_use]
    pub const fn attempt_id(&self) -> Uuid {
        self.attempt_id
    }

    /// Move to `next`, rejecting transitions the state machine forbids.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidTransition`] for a forbidden move.
    pub fn transition(&mut self, next: TaskState) -> EngineResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(from = %self.state, to = %next, "task transition");
        self.state = next;
        Ok(())
    }

    /// Run the attempt to a terminal state.
    pub(crate) async fn execute(mut self, ctx: &EngineContext) -> EngineResult<TaskState> {
        let span = info_span!(
            "task",
            item_id = %self.item.id,
            attempt_id = %self.attempt_id,
            retry = self.retry_count
        );
        async move {
            info!(name = %self.item.display_name, "processing item");
            self.run(ctx).await?;
            Ok(self.state)
        }
        .instrument(span)
        .await
    }

    async fn run(&mut self, ctx: &EngineContext) -> EngineResult<()> {
        if let Err(err) = inspect_local(&self.item.local_path).await {
            return self.abandon(ctx, &err);
        }

        let permit = ctx.limiter.acquire().await?;
        self.transition(TaskState::Transferring)?;
        let started = Instant::now();
        let subpath = self.item.remote_subpath(ctx.config.use_categories);
        let local_path = self.item.local_path.clone();

        let transfer = retry(
            &ctx.config.retry.transfer,
            "transfer",
            || {
                ctx.metrics.inc_adapter_attempt("transfer");
                ctx.executor.transfer(&local_path, &subpath)
            },
            AdapterError::is_transient,
        )
        .await;
        let failure = match transfer {
            Ok(TransferOutcome::Completed) => None,
            Ok(TransferOutcome::Failed { message }) => Some(format!("transfer failed: {message}")),
            Ok(TransferOutcome::TimedOut { after }) => Some(format!(
                "transfer timed out after {}s",
                after.as_secs()
            )),
            Err(err) => Some(err.detail()),
        };
        if let Some(reason) = failure {
            drop(permit);
            return self.fail(ctx, &reason);
        }

        self.transition(TaskState::Verifying)?;
        let verify = retry(
            &ctx.config.retry.verify,
            "verify",
            || {
                ctx.metrics.inc_adapter_attempt("verify");
                ctx.executor.verify(&local_path, &subpath)
            },
            AdapterError::is_transient,
        )
        .await;
        drop(permit);
        ctx.metrics.observe_transfer(started.elapsed());

        match verify {
            Ok(VerifyOutcome::Match) => self.complete(ctx).await,
            Ok(VerifyOutcome::Mismatch { details }) => {
                self.fail(ctx, &format!("verification mismatch: {details}"))
            }
            Err(err) => self.fail(ctx, &err.detail()),
        }
    }

    fn abandon(&mut self, ctx: &EngineContext, err: &io::Error) -> EngineResult<()> {
        self.transition(TaskState::PermanentFailed)?;
        ctx.metrics.inc_task(OUTCOME_ABANDONED);
        if err.kind() == io::ErrorKind::NotFound {
            warn!(path = %self.item.local_path.display(), "content no longer exists");
            ctx.store
                .remove_failure(&self.item.id)
                .map_err(|source| EngineError::state("state.remove_failure", source))?;
        } else {
            warn!(path = %self.item.local_path.display(), error = %err, "content is not readable");
            self.record(ctx, &format!("local content unreadable: {err}"))?;
        }
        Ok(())
    }

    fn fail(&mut self, ctx: &EngineContext, reason: &str) -> EngineResult<()> {
        self.transition(TaskState::RetryableFailed)?;
        ctx.metrics.inc_task(OUTCOME_FAILED);
        error!(reason, "attempt failed");
        self.record(ctx, reason)
    }

    fn record(&self, ctx: &EngineContext, reason: &str) -> EngineResult<()> {
        let record = ctx
            .store
            .record_failure(
                &self.item.id,
                &self.item.display_name,
                &self.item.local_path.to_string_lossy(),
                reason,
            )
            .map_err(|source| EngineError::state("state.record_failure", source))?;
        if let Some(record) = record {
            if record.exhausted(ctx.config.max_failures) {
                warn!(
                    failures = record.failure_count,
                    "failure ceiling reached; item will not be retried"
                );
            } else {
                info!(failures = record.failure_count, "failure recorded");
            }
        }
        Ok(())
    }

    async fn complete(&mut self, ctx: &EngineContext) -> EngineResult<()> {
        self.transition(TaskState::Completed)?;
        let record = ProcessedRecord::now(
            self.item.display_name.clone(),
            self.item.local_path.to_string_lossy(),
            self.retry_count,
        );
        let written = ctx
            .store
            .mark_processed(&self.item.id, record)
            .map_err(|source| EngineError::state("state.mark_processed", source))?;
        if !written {
            warn!("item was already processed; skipping cleanup");
            return Ok(());
        }
        ctx.metrics.inc_task(OUTCOME_COMPLETED);
        info!("transfer verified");

        if ctx.config.delete_from_source {
            self.delete_source_record(ctx).await;
        }
        if ctx.config.delete_local_content {
            remove_local(&self.item.local_path).await;
        }
        Ok(())
    }

    async fn delete_source_record(&self, ctx: &EngineContext) {
        let id = self.item.id.as_str();
        let deleted = retry(
            &ctx.config.retry.source,
            "source.delete_record",
            || {
                ctx.metrics.inc_adapter_attempt("delete_record");
                ctx.source.delete_record(id, false)
            },
            AdapterError::is_transient,
        )
        .await;
        match deleted {
            Ok(true) => info!("removed source record"),
            Ok(false) => warn!("source refused to remove the record"),
            Err(err) => warn!(error = %err.detail(), "failed to remove source record"),
        }
    }
}

/// Check that `path` exists and can be opened for reading.
async fn inspect_local(path: &Path) -> io::Result<()> {
    let metadata = tokio::fs::metadata(path).await?;
    if metadata.is_dir() {
        tokio::fs::read_dir(path).await.map(drop)
    } else {
        tokio::fs::File::open(path).await.map(drop)
    }
}

async fn remove_local(path: &Path) {
    let removed = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) if metadata.is_dir() => tokio::fs::remove_dir_all(path).await,
        Ok(_) => tokio::fs::remove_file(path).await,
        Err(err) => Err(err),
    };
    match removed {
        Ok(()) => info!(path = %path.display(), "removed local content"),
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove local content"),
    }
}
