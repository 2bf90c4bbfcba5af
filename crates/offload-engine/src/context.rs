use std::sync::Arc;

use offload_core::{SourceAdapter, TransferExecutor};
use offload_state::StateStore;
use offload_telemetry::Metrics;

use crate::config::EngineConfig;
use crate::limiter::ConcurrencyLimiter;

/// Collaborators shared by the discovery loop and every worker.
pub(crate) struct EngineContext {
    pub(crate) config: EngineConfig,
    pub(crate) source: Arc<dyn SourceAdapter>,
    pub(crate) executor: Arc<dyn TransferExecutor>,
    pub(crate) store: Arc<StateStore>,
    pub(crate) limiter: ConcurrencyLimiter,
    pub(crate) metrics: Metrics,
}
