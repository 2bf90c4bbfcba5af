//! Runtime knobs for the engine.

use std::time::Duration;

use offload_core::{ItemFilter, RetryPolicy};

/// Engine behaviour derived from the application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Pause between discovery cycles.
    pub check_interval: Duration,
    /// Worker tasks pulling from the queue.
    pub worker_count: usize,
    /// Transfer+verify pairs allowed at once.
    pub max_concurrent_transfers: usize,
    /// Failure count at which an item stops being retried.
    pub max_failures: u32,
    /// Place items under a folder named after their category.
    pub use_categories: bool,
    /// Listing filter handed to the source.
    pub filter: ItemFilter,
    /// Remove the source-side record after completion.
    pub delete_from_source: bool,
    /// Remove local content after completion.
    pub delete_local_content: bool,
    /// Start even when health checks fail.
    pub continue_on_errors: bool,
    /// How long an idle worker waits on the queue before rechecking shutdown.
    pub poll_interval: Duration,
    /// Retry policies per adapter call.
    pub retry: RetryPolicies,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(300),
            worker_count: 4,
            max_concurrent_transfers: 3,
            max_failures: 3,
            use_categories: true,
            filter: ItemFilter::default(),
            delete_from_source: true,
            delete_local_content: true,
            continue_on_errors: false,
            poll_interval: Duration::from_secs(1),
            retry: RetryPolicies::default(),
        }
    }
}

/// Retry policy applied at each adapter call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicies {
    /// Listing and record deletion on the source.
    pub source: RetryPolicy,
    /// Transfers.
    pub transfer: RetryPolicy,
    /// Verifications.
    pub verify: RetryPolicy,
    /// Startup health checks.
    pub health: RetryPolicy,
}

impl RetryPolicies {
    /// Use `policy` for every call site.
    #[must_use]
    pub const fn uniform(policy: RetryPolicy) -> Self {
        Self {
            source: policy,
            transfer: policy,
            verify: policy,
            health: policy,
        }
    }
}

impl Default for RetryPolicies {
    fn default() -> Self {
        Self {
            source: RetryPolicy::new(3, Duration::from_secs(2), 2),
            transfer: RetryPolicy::new(2, Duration::from_secs(10), 2),
            verify: RetryPolicy::new(2, Duration::from_secs(5), 2),
            health: RetryPolicy::new(2, Duration::from_secs(2), 2),
        }
    }
}
