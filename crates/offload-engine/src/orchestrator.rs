//! Lifecycle owner tying discovery, the queue, and the worker pool together.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use offload_core::{AdapterError, SourceAdapter, TransferExecutor, retry};
use offload_state::StateStore;
use offload_telemetry::Metrics;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span, warn};

use crate::config::EngineConfig;
use crate::context::EngineContext;
use crate::discovery::{self, CycleReport};
use crate::error::{EngineError, EngineResult, HealthFailure};
use crate::limiter::ConcurrencyLimiter;
use crate::pool::WorkerPool;
use crate::queue::TaskQueue;

struct Running {
    pool: WorkerPool,
    discovery: JoinHandle<()>,
}

/// Coordinates periodic discovery with concurrent transfer workers.
pub struct Orchestrator {
    ctx: Arc<EngineContext>,
    queue: Arc<TaskQueue>,
    running: Arc<AtomicBool>,
    handles: Mutex<Option<Running>>,
}

impl Orchestrator {
    /// Construct an idle orchestrator.
    #[must_use]
    pub fn new(
        config: EngineConfig,
        source: Arc<dyn SourceAdapter>,
        executor: Arc<dyn TransferExecutor>,
        store: Arc<StateStore>,
        metrics: Metrics,
    ) -> Self {
        let limiter = ConcurrencyLimiter::new(config.max_concurrent_transfers, metrics.clone());
        let queue = Arc::new(TaskQueue::new(metrics.clone()));
        let ctx = Arc::new(EngineContext {
            config,
            source,
            executor,
            store,
            limiter,
            metrics,
        });
        Self {
            ctx,
            queue,
            running: Arc::new(AtomicBool::new(false)),
            handles: Mutex::new(None),
        }
    }

    /// Check both collaborators, returning every failure.
    pub async fn health_check(&self) -> Vec<HealthFailure> {
        let policy = &self.ctx.config.retry.health;
        let mut failures = Vec::new();

        let source = retry(
            policy,
            "source.health_check",
            || self.ctx.source.health_check(),
            AdapterError::is_transient,
        )
        .await;
        if let Err(err) = source {
            failures.push(HealthFailure {
                component: "source",
                detail: err.detail(),
            });
        }

        let transfer = retry(
            policy,
            "transfer.health_check",
            || self.ctx.executor.health_check(),
            AdapterError::is_transient,
        )
        .await;
        if let Err(err) = transfer {
            failures.push(HealthFailure {
                component: "transfer",
                detail: err.detail(),
            });
        }

        failures
    }

    /// Run health checks, then start the workers and the discovery loop.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyRunning`] on a second start and
    /// [`EngineError::HealthCheck`] when a collaborator is unhealthy and
    /// `continue_on_errors` is off.
    pub async fn start(&self) -> EngineResult<()> {
        let mut handles = self.handles.lock().await;
        if handles.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        let failures = self.health_check().await;
        if !failures.is_empty() {
            for failure in &failures {
                error!(component = failure.component, detail = %failure.detail, "health check failed");
            }
            if !self.ctx.config.continue_on_errors {
                return Err(EngineError::HealthCheck { failures });
            }
            warn!("continuing despite failed health checks");
        }

        self.running.store(true, Ordering::SeqCst);
        let pool = WorkerPool::spawn(&self.ctx, &self.queue);
        let discovery = tokio::spawn(
            discovery::run_loop(
                Arc::clone(&self.ctx),
                Arc::clone(&self.queue),
                Arc::clone(&self.running),
            )
            .instrument(info_span!("discovery")),
        );
        *handles = Some(Running { pool, discovery });
        info!(
            workers = self.ctx.config.worker_count,
            max_concurrent = self.ctx.config.max_concurrent_transfers,
            check_interval_secs = self.ctx.config.check_interval.as_secs(),
            "engine started"
        );
        Ok(())
    }

    /// Stop discovery, drain queued tasks, then stop the workers.
    ///
    /// Calling `stop` on an idle orchestrator is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Join`] when a background task cannot be joined.
    pub async fn stop(&self) -> EngineResult<()> {
        let Some(Running { pool, discovery }) = self.handles.lock().await.take() else {
            return Ok(());
        };
        info!("stopping engine");
        self.running.store(false, Ordering::SeqCst);
        discovery.await.map_err(|source| EngineError::Join {
            task: "discovery",
            source,
        })?;
        self.queue.wait_idle().await;
        pool.shutdown().await?;
        info!("engine stopped");
        Ok(())
    }

    /// Run a single discovery cycle outside the periodic loop.
    ///
    /// # Errors
    ///
    /// Returns the listing or ledger error that aborted the cycle.
    pub async fn run_discovery_cycle(&self) -> EngineResult<CycleReport> {
        discovery::run_cycle(&self.ctx, &self.queue).await
    }

    /// Wait until every queued task has finished.
    pub async fn wait_idle(&self) {
        self.queue.wait_idle().await;
    }

    /// Whether the engine has been started and not yet stopped.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Tasks queued or executing.
    #[must_use]
    pub fn queue_depth(&self) -> usize {
        self.queue.outstanding()
    }

    /// Ledger backing the engine.
    #[must_use]
    pub fn store(&self) -> &Arc<StateStore> {
        &self.ctx.store
    }

    /// Metrics handle shared with the workers.
    #[must_use]
    pub fn metrics(&self) -> &Metrics {
        &self.ctx.metrics
    }
}
