//! Exponential backoff retry controller.
//!
//! # Design
//! - Applied explicitly at each call site with a policy and a retry predicate.
//! - Failures rejected by the predicate propagate immediately.
//! - The last observed error is returned once attempts are exhausted.

use std::error::Error;
use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use crate::error::describe_error;

/// Attempt budget and delay schedule for [`retry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first; `0` behaves like `1`.
    pub max_tries: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: u32,
}

impl RetryPolicy {
    /// Construct a policy.
    #[must_use]
    pub const fn new(max_tries: u32, initial_delay: Duration, backoff_factor: u32) -> Self {
        Self {
            max_tries,
            initial_delay,
            backoff_factor,
        }
    }

    /// Policy that performs exactly one attempt.
    #[must_use]
    pub const fn once() -> Self {
        Self::new(1, Duration::ZERO, 1)
    }

    /// Delay slept after the failed attempt number `retry` (zero based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_delay
            .saturating_mul(self.backoff_factor.saturating_pow(retry))
    }

    const fn attempts(&self) -> u32 {
        if self.max_tries == 0 {
            1
        } else {
            self.max_tries
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5), 2)
    }
}

/// Run `operation` until it succeeds, fails fatally, or exhausts `policy`.
///
/// # Errors
///
/// Returns the first error rejected by `is_retryable`, or the last error once
/// every attempt has failed.
pub async fn retry<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    label: &str,
    mut operation: F,
    is_retryable: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Error + 'static,
{
    let attempts = policy.attempts();
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retryable(&err) => return Err(err),
            Err(err) => {
                attempt += 1;
                if attempt >= attempts {
                    error!(
                        operation = label,
                        attempts,
                        error = %describe_error(&err),
                        "all retries failed"
                    );
                    return Err(err);
                }
                let delay = policy.delay_for(attempt - 1);
                warn!(
                    operation = label,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %describe_error(&err),
                    "retrying after failure"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn transient(kind: io::ErrorKind) -> io::Error {
        io::Error::new(kind, "boom")
    }

    #[test]
    fn delay_schedule_grows_geometrically() {
        let policy = RetryPolicy::new(4, Duration::from_secs(2), 3);
        assert_eq!(policy.delay_for(0), Duration::from_secs(2));
        assert_eq!(policy.delay_for(1), Duration::from_secs(6));
        assert_eq!(policy.delay_for(2), Duration::from_secs(18));
    }

    #[test]
    fn delay_schedule_saturates() {
        let policy = RetryPolicy::new(u32::MAX, Duration::from_secs(u64::MAX / 2), 10);
        assert_eq!(policy.delay_for(40), Duration::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_transient_failures() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(5), 2);
        let result = retry(
            &policy,
            "test.op",
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(transient(io::ErrorKind::TimedOut))
                } else {
                    Ok(n)
                }
            },
            |_| true,
        )
        .await;
        assert_eq!(result.ok(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_last_error_when_exhausted() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_millis(10), 2);
        let started = tokio::time::Instant::now();
        let result: Result<(), io::Error> = retry(
            &policy,
            "test.op",
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient(io::ErrorKind::ConnectionReset))
            },
            |_| true,
        )
        .await;
        let err = result.expect_err("retries should be exhausted");
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() >= Duration::from_millis(10));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_errors_are_not_retried() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_secs(1), 2);
        let result: Result<(), io::Error> = retry(
            &policy,
            "test.op",
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient(io::ErrorKind::PermissionDenied))
            },
            |err| err.kind() != io::ErrorKind::PermissionDenied,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_tries_still_attempts_once() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(0, Duration::ZERO, 2);
        let result: Result<(), io::Error> = retry(
            &policy,
            "test.op",
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(transient(io::ErrorKind::Other))
            },
            |_| true,
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
