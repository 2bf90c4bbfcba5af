//! Counting semaphore bounding simultaneous transfers.
//!
//! # Design
//! - Sized independently of the worker count; workers wait here for a slot.
//! - A permit covers one transfer+verify pair and keeps the active gauge
//!   in step with the number of outstanding permits.

use std::sync::Arc;

use offload_telemetry::Metrics;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{EngineError, EngineResult};

/// Shared limiter handed to every worker.
#[derive(Clone)]
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    metrics: Metrics,
}

/// Slot held for the duration of one transfer+verify pair.
pub struct TransferPermit {
    _permit: OwnedSemaphorePermit,
    metrics: Metrics,
}

impl Drop for TransferPermit {
    fn drop(&mut self) {
        self.metrics.add_active_transfers(-1);
    }
}

impl ConcurrencyLimiter {
    /// Create a limiter with `capacity` slots; zero is treated as one.
    #[must_use]
    pub fn new(capacity: usize, metrics: Metrics) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            metrics,
        }
    }

    /// Wait for a free slot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::LimiterClosed`] if the semaphore was closed.
    pub async fn acquire(&self) -> EngineResult<TransferPermit> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| EngineError::LimiterClosed)?;
        self.metrics.add_active_transfers(1);
        Ok(TransferPermit {
            _permit: permit,
            metrics: self.metrics.clone(),
        })
    }

    /// Slots not currently held.
    #[must_use]
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Total slots.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}
