//! Periodic discovery of new items and retry candidates.
//!
//! # Design
//! - Eligibility checks and in-flight reservation happen in a single ledger
//!   call, so an id is never queued while an earlier task for it is pending.
//! - The retry pass only considers ids the source no longer lists; listed ids
//!   were already handled by the new-item pass of the same cycle.
//! - Failure records whose content vanished are purged whether or not they
//!   reached the ceiling, so a reappearing item is discovered afresh.
//! - A failing cycle is logged and counted; the loop keeps running.
//! - Sleeps in short slices so a stop request is noticed promptly.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use offload_core::{AdapterError, Item, describe_error, retry};
use offload_state::ClaimOutcome;
use tracing::{debug, error, info, warn};

use crate::context::EngineContext;
use crate::error::{EngineError, EngineResult};
use crate::queue::TaskQueue;
use crate::task::Task;

const SLEEP_SLICE: Duration = Duration::from_secs(1);

/// Counts from one discovery cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Items returned by the source.
    pub listed: usize,
    /// Tasks queued for newly listed items.
    pub enqueued_new: usize,
    /// Tasks queued from the failure ledger.
    pub enqueued_retry: usize,
    /// Failure records dropped because their content vanished.
    pub purged: usize,
}

/// Run one discovery cycle.
pub(crate) async fn run_cycle(ctx: &EngineContext, queue: &TaskQueue) -> EngineResult<CycleReport> {
    let items = retry(
        &ctx.config.retry.source,
        "source.list_eligible",
        || {
            ctx.metrics.inc_adapter_attempt("list_eligible");
            ctx.source.list_eligible(&ctx.config.filter)
        },
        AdapterError::is_transient,
    )
    .await
    .map_err(|source| EngineError::adapter("source.list_eligible", source))?;

    let mut report = CycleReport {
        listed: items.len(),
        ..CycleReport::default()
    };
    info!(listed = report.listed, "discovered eligible items");

    let mut listed = HashSet::with_capacity(items.len());
    for item in items {
        if item.id.is_empty() || item.display_name.is_empty() {
            warn!(?item, "skipping item without id or name");
            continue;
        }
        listed.insert(item.id.clone());
        match ctx.store.claim_new(&item.id, ctx.config.max_failures) {
            ClaimOutcome::Claimed { prior_failures } => {
                enqueue(ctx, queue, item, prior_failures)?;
                ctx.metrics.inc_enqueued("new");
                report.enqueued_new += 1;
            }
            ClaimOutcome::AlreadyProcessed => {
                debug!(item_id = %item.id, "skipping processed item");
            }
            ClaimOutcome::Exhausted { failure_count } => {
                debug!(item_id = %item.id, failure_count, "skipping item at failure ceiling");
            }
            ClaimOutcome::InFlight | ClaimOutcome::Missing => {
                debug!(item_id = %item.id, "item already queued");
            }
        }
    }

    let failed = ctx.store.snapshot().failed;
    for (id, record) in failed {
        if listed.contains(&id) {
            continue;
        }
        match tokio::fs::try_exists(&record.path).await {
            Ok(true) => {}
            Ok(false) => {
                let purged = ctx
                    .store
                    .purge_vanished(&id)
                    .map_err(|source| EngineError::state("state.purge_vanished", source))?;
                if purged {
                    warn!(item_id = %id, path = %record.path, "content vanished; dropping failure record");
                    report.purged += 1;
                }
                continue;
            }
            Err(err) => {
                warn!(item_id = %id, error = %err, "cannot check content for retry");
                continue;
            }
        }
        if record.exhausted(ctx.config.max_failures) {
            continue;
        }
        if let ClaimOutcome::Claimed { prior_failures } =
            ctx.store.claim_retry(&id, ctx.config.max_failures)
        {
            let item = Item::new(id, record.name, record.path);
            info!(item_id = %item.id, attempt = prior_failures + 1, "queueing retry");
            enqueue(ctx, queue, item, prior_failures)?;
            ctx.metrics.inc_enqueued("retry");
            report.enqueued_retry += 1;
        }
    }

    Ok(report)
}

fn enqueue(
    ctx: &EngineContext,
    queue: &TaskQueue,
    item: Item,
    retry_count: u32,
) -> EngineResult<()> {
    let id = item.id.clone();
    queue.push(Task::new(item, retry_count)).inspect_err(|_| {
        ctx.store.release(&id);
    })
}

/// Run cycles until `running` is cleared. The first cycle runs immediately.
pub(crate) async fn run_loop(ctx: Arc<EngineContext>, queue: Arc<TaskQueue>, running: Arc<AtomicBool>) {
    loop {
        match run_cycle(&ctx, &queue).await {
            Ok(report) => {
                ctx.metrics.inc_discovery_cycle("ok");
                info!(
                    enqueued_new = report.enqueued_new,
                    enqueued_retry = report.enqueued_retry,
                    purged = report.purged,
                    "discovery cycle finished"
                );
            }
            Err(err) => {
                ctx.metrics.inc_discovery_cycle("error");
                error!(error = %describe_error(&err), "discovery cycle failed");
            }
        }
        if !sleep_while_running(ctx.config.check_interval, &running).await {
            break;
        }
    }
    debug!("discovery loop stopped");
}

/// Sleep for `total` in short slices; returns `false` once `running` clears.
async fn sleep_while_running(total: Duration, running: &AtomicBool) -> bool {
    let mut remaining = total;
    while running.load(Ordering::SeqCst) {
        if remaining.is_zero() {
            return true;
        }
        let step = remaining.min(SLEEP_SLICE);
        tokio::time::sleep(step).await;
        remaining = remaining.saturating_sub(step);
    }
    false
}
