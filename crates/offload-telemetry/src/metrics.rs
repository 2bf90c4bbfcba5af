//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Exposes the counters and gauges the transfer engine updates.

use std::convert::TryFrom;
use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared by the engine components.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    tasks_total: IntCounterVec,
    tasks_enqueued_total: IntCounterVec,
    discovery_cycles_total: IntCounterVec,
    adapter_attempts_total: IntCounterVec,
    active_transfers: IntGauge,
    queue_depth: IntGauge,
    last_transfer_ms: IntGauge,
}

/// Snapshot of selected gauges and counters for status reporting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Transfers currently holding a concurrency slot.
    pub active_transfers: i64,
    /// Tasks enqueued but not yet finished.
    pub queue_depth: i64,
    /// Tasks that reached the completed state.
    pub tasks_completed: u64,
    /// Tasks that ended in a retryable failure.
    pub tasks_failed: u64,
    /// Tasks abandoned because their content is unusable.
    pub tasks_abandoned: u64,
    /// Wall-clock duration of the latest transfer+verify pair (ms).
    pub last_transfer_ms: i64,
}

/// Terminal outcome label for [`Metrics::inc_task`].
pub const OUTCOME_COMPLETED: &str = "completed";
/// Terminal outcome label for [`Metrics::inc_task`].
pub const OUTCOME_FAILED: &str = "failed";
/// Terminal outcome label for [`Metrics::inc_task`].
pub const OUTCOME_ABANDONED: &str = "abandoned";

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be built or
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let tasks_total = counter_vec(
            "offload_tasks_total",
            "Tasks finished by terminal outcome",
            &["outcome"],
        )?;
        let tasks_enqueued_total = counter_vec(
            "offload_tasks_enqueued_total",
            "Tasks enqueued by discovery pass",
            &["kind"],
        )?;
        let discovery_cycles_total = counter_vec(
            "offload_discovery_cycles_total",
            "Discovery cycles by result",
            &["result"],
        )?;
        let adapter_attempts_total = counter_vec(
            "offload_adapter_attempts_total",
            "Adapter call attempts including retries",
            &["operation"],
        )?;
        let active_transfers = gauge(
            "offload_active_transfers",
            "Transfers currently holding a concurrency slot",
        )?;
        let queue_depth = gauge("offload_queue_depth", "Tasks enqueued but not finished")?;
        let last_transfer_ms = gauge(
            "offload_last_transfer_ms",
            "Duration of the latest transfer and verification (ms)",
        )?;

        register(&registry, "offload_tasks_total", &tasks_total)?;
        register(&registry, "offload_tasks_enqueued_total", &tasks_enqueued_total)?;
        register(&registry, "offload_discovery_cycles_total", &discovery_cycles_total)?;
        register(&registry, "offload_adapter_attempts_total", &adapter_attempts_total)?;
        register(&registry, "offload_active_transfers", &active_transfers)?;
        register(&registry, "offload_queue_depth", &queue_depth)?;
        register(&registry, "offload_last_transfer_ms", &last_transfer_ms)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                tasks_total,
                tasks_enqueued_total,
                discovery_cycles_total,
                adapter_attempts_total,
                active_transfers,
                queue_depth,
                last_transfer_ms,
            }),
        })
    }

    /// Count a task reaching a terminal outcome.
    pub fn inc_task(&self, outcome: &str) {
        self.inner.tasks_total.with_label_values(&[outcome]).inc();
    }

    /// Count a task enqueued by the `new` or `retry` discovery pass.
    pub fn inc_enqueued(&self, kind: &str) {
        self.inner
            .tasks_enqueued_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Count a discovery cycle by result (`ok` or `error`).
    pub fn inc_discovery_cycle(&self, result: &str) {
        self.inner
            .discovery_cycles_total
            .with_label_values(&[result])
            .inc();
    }

    /// Count one attempt of an adapter operation.
    pub fn inc_adapter_attempt(&self, operation: &str) {
        self.inner
            .adapter_attempts_total
            .with_label_values(&[operation])
            .inc();
    }

    /// Adjust the active transfer gauge by `delta`.
    pub fn add_active_transfers(&self, delta: i64) {
        self.inner.active_transfers.add(delta);
    }

    /// Set the queue depth gauge.
    pub fn set_queue_depth(&self, depth: usize) {
        self.inner
            .queue_depth
            .set(i64::try_from(depth).unwrap_or(i64::MAX));
    }

    /// Record the duration of a finished transfer+verify pair.
    pub fn observe_transfer(&self, duration: Duration) {
        self.inner
            .last_transfer_ms
            .set(Self::duration_to_ms(duration));
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let tasks = |outcome: &str| self.inner.tasks_total.with_label_values(&[outcome]).get();
        MetricsSnapshot {
            active_transfers: self.inner.active_transfers.get(),
            queue_depth: self.inner.queue_depth.get(),
            tasks_completed: tasks(OUTCOME_COMPLETED),
            tasks_failed: tasks(OUTCOME_FAILED),
            tasks_abandoned: tasks(OUTCOME_ABANDONED),
            last_transfer_ms: self.inner.last_transfer_ms.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

fn counter_vec(name: &'static str, help: &str, labels: &[&str]) -> Result<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn gauge(name: &'static str, help: &str) -> Result<IntGauge> {
    IntGauge::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricsCollector { name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_task(OUTCOME_COMPLETED);
        metrics.inc_task(OUTCOME_COMPLETED);
        metrics.inc_task(OUTCOME_FAILED);
        metrics.inc_enqueued("new");
        metrics.inc_discovery_cycle("ok");
        metrics.inc_adapter_attempt("transfer");
        metrics.add_active_transfers(2);
        metrics.add_active_transfers(-1);
        metrics.set_queue_depth(4);
        metrics.observe_transfer(Duration::from_millis(1_500));

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.tasks_completed, 2);
        assert_eq!(snapshot.tasks_failed, 1);
        assert_eq!(snapshot.tasks_abandoned, 0);
        assert_eq!(snapshot.active_transfers, 1);
        assert_eq!(snapshot.queue_depth, 4);
        assert_eq!(snapshot.last_transfer_ms, 1_500);

        let rendered = metrics.render()?;
        assert!(rendered.contains("offload_tasks_total"));
        assert!(rendered.contains("offload_discovery_cycles_total"));
        assert!(rendered.contains("offload_adapter_attempts_total"));
        Ok(())
    }

    #[test]
    fn clones_share_collectors() -> Result<()> {
        let metrics = Metrics::new()?;
        let clone = metrics.clone();
        clone.inc_task(OUTCOME_ABANDONED);
        assert_eq!(metrics.snapshot().tasks_abandoned, 1);
        Ok(())
    }
}
