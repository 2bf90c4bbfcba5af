//! Fixed-size pool of workers draining the task queue.
//!
//! # Design
//! - Each task runs in its own spawned future so a panic is contained and
//!   recorded as a failure instead of killing the worker.
//! - The in-flight reservation is released after every task, whatever its
//!   outcome.
//! - Workers poll the queue with a timeout so they notice shutdown.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use offload_core::{Item, describe_error};
use offload_telemetry::OUTCOME_FAILED;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info_span};

use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::queue::TaskQueue;
use crate::task::Task;

pub(crate) struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub(crate) fn spawn(ctx: &Arc<EngineContext>, queue: &Arc<TaskQueue>) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let count = ctx.config.worker_count.max(1);
        let handles = (0..count)
            .map(|worker| {
                let ctx = Arc::clone(ctx);
                let queue = Arc::clone(queue);
                let shutdown = Arc::clone(&shutdown);
                tokio::spawn(
                    worker_loop(ctx, queue, shutdown).instrument(info_span!("worker", worker)),
                )
            })
            .collect();
        debug!(count, "worker pool started");
        Self { handles, shutdown }
    }

    /// Signal every worker and wait for them to exit.
    pub(crate) async fn shutdown(self) -> EngineResult<()> {
        self.shutdown.store(true, Ordering::SeqCst);
        for handle in self.handles {
            handle
                .await
                .map_err(|source| EngineError::Join {
                    task: "worker",
                    source,
                })?;
        }
        Ok(())
    }
}

async fn worker_loop(ctx: Arc<EngineContext>, queue: Arc<TaskQueue>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::SeqCst) {
        let Some(task) = queue.pop(ctx.config.poll_interval).await else {
            continue;
        };
        run_task(&ctx, task).await;
        queue.task_done();
    }
    debug!("worker stopped");
}

async fn run_task(ctx: &Arc<EngineContext>, task: Task) {
    let item = task.item().clone();
    let task_ctx = Arc::clone(ctx);
    let joined = tokio::spawn(async move { task.execute(&task_ctx).await }).await;

    match joined {
        Ok(Ok(state)) => debug!(item_id = %item.id, %state, "task finished"),
        Ok(Err(err)) => {
            let reason = describe_error(&err);
            error!(item_id = %item.id, error = %reason, "task failed unexpectedly");
            record_contained_failure(ctx, &item, &reason);
        }
        Err(join) => {
            let reason = if join.is_panic() {
                "task panicked".to_string()
            } else {
                describe_error(&join)
            };
            error!(item_id = %item.id, error = %reason, "task aborted");
            record_contained_failure(ctx, &item, &reason);
        }
    }
    ctx.store.release(&item.id);
}

fn record_contained_failure(ctx: &EngineContext, item: &Item, reason: &str) {
    ctx.metrics.inc_task(OUTCOME_FAILED);
    if let Err(err) = ctx.store.record_failure(
        &item.id,
        &item.display_name,
        &item.local_path.to_string_lossy(),
        reason,
    ) {
        error!(item_id = %item.id, error = %describe_error(&err), "failed to record task failure");
    }
}
