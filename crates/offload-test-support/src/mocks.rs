//! Scripted adapter doubles that record every call.
//!
//! Both doubles are safe to share between workers and expose counters the
//! engine tests assert on.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use offload_core::{
    AdapterError, AdapterResult, Item, ItemFilter, SourceAdapter, TransferExecutor,
    TransferOutcome, VerifyOutcome,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Source double returning a configurable item list.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    items: Mutex<Vec<Item>>,
    list_errors: Mutex<VecDeque<AdapterError>>,
    deletes: Mutex<Vec<(String, bool)>>,
    refuse_delete: AtomicBool,
    list_calls: AtomicUsize,
    unhealthy: AtomicBool,
}

impl ScriptedSource {
    /// Source that lists `items` on every call.
    #[must_use]
    pub fn new(items: Vec<Item>) -> Self {
        Self {
            items: Mutex::new(items),
            ..Self::default()
        }
    }

    /// Replace the listed items.
    pub fn set_items(&self, items: Vec<Item>) {
        *lock(&self.items) = items;
    }

    /// Fail the next listing with `error`; errors queue in order.
    pub fn fail_next_list(&self, error: AdapterError) {
        lock(&self.list_errors).push_back(error);
    }

    /// Make `delete_record` report a refusal.
    pub fn refuse_deletes(&self) {
        self.refuse_delete.store(true, Ordering::SeqCst);
    }

    /// Make `health_check` fail.
    pub fn set_unhealthy(&self) {
        self.unhealthy.store(true, Ordering::SeqCst);
    }

    /// Every `delete_record` call as `(id, delete_files)`.
    #[must_use]
    pub fn deletes(&self) -> Vec<(String, bool)> {
        lock(&self.deletes).clone()
    }

    /// Number of `list_eligible` calls.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceAdapter for ScriptedSource {
    async fn list_eligible(&self, filter: &ItemFilter) -> AdapterResult<Vec<Item>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = lock(&self.list_errors).pop_front() {
            return Err(error);
        }
        let items = lock(&self.items);
        Ok(items
            .iter()
            .filter(|item| {
                filter
                    .category
                    .as_ref()
                    .is_none_or(|wanted| item.category.as_ref() == Some(wanted))
            })
            .cloned()
            .collect())
    }

    async fn delete_record(&self, id: &str, delete_files: bool) -> AdapterResult<bool> {
        lock(&self.deletes).push((id.to_string(), delete_files));
        Ok(!self.refuse_delete.load(Ordering::SeqCst))
    }

    async fn health_check(&self) -> AdapterResult<()> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(AdapterError::fatal(
                "source.health_check",
                "authentication rejected",
                None,
            ));
        }
        Ok(())
    }
}

/// Transfer double with per-subpath scripted results and concurrency tracking.
///
/// Unscripted calls succeed: transfers complete and verifications match.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    transfers: Mutex<HashMap<String, VecDeque<AdapterResult<TransferOutcome>>>>,
    verifies: Mutex<HashMap<String, VecDeque<AdapterResult<VerifyOutcome>>>>,
    panics: Mutex<HashSet<String>>,
    transfer_log: Mutex<Vec<(PathBuf, String)>>,
    verify_log: Mutex<Vec<(PathBuf, String)>>,
    transfer_delay: Mutex<Duration>,
    active: AtomicUsize,
    peak: AtomicUsize,
    unhealthy: AtomicBool,
}

impl ScriptedExecutor {
    /// Executor where every call succeeds immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each transfer for `delay` so overlapping calls can be observed.
    #[must_use]
    pub fn with_transfer_delay(self, delay: Duration) -> Self {
        *lock(&self.transfer_delay) = delay;
        self
    }

    /// Queue a transfer result for `subpath`.
    pub fn push_transfer(&self, subpath: &str, result: AdapterResult<TransferOutcome>) {
        lock(&self.transfers)
            .entry(subpath.to_string())
            .or_default()
            .push_back(result);
    }

    /// Queue a verification result for `subpath`.
    pub fn push_verify(&self, subpath: &str, result: AdapterResult<VerifyOutcome>) {
        lock(&self.verifies)
            .entry(subpath.to_string())
            .or_default()
            .push_back(result);
    }

    /// Panic inside `transfer` for `subpath`.
    pub fn panic_on(&self, subpath: &str) {
        lock(&self.panics).insert(subpath.to_string());
    }

    /// Make `health_check` fail.
    pub fn set_unhealthy(&self) {
        self.unhealthy.store(true, Ordering::SeqCst);
    }

    /// Every `transfer` call as `(local_path, remote_subpath)`.
    #[must_use]
    pub fn transfer_calls(&self) -> Vec<(PathBuf, String)> {
        lock(&self.transfer_log).clone()
    }

    /// Every `verify` call as `(local_path, remote_subpath)`.
    #[must_use]
    pub fn verify_calls(&self) -> Vec<(PathBuf, String)> {
        lock(&self.verify_log).clone()
    }

    /// Highest number of transfers observed running at once.
    #[must_use]
    pub fn peak_active(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl TransferExecutor for ScriptedExecutor {
    async fn transfer(
        &self,
        local_path: &Path,
        remote_subpath: &str,
    ) -> AdapterResult<TransferOutcome> {
        lock(&self.transfer_log).push((local_path.to_path_buf(), remote_subpath.to_string()));
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _active = ActiveGuard(&self.active);
        self.peak.fetch_max(now, Ordering::SeqCst);

        assert!(
            !lock(&self.panics).contains(remote_subpath),
            "scripted transfer panic for {remote_subpath}"
        );

        let delay = *lock(&self.transfer_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = lock(&self.transfers)
            .get_mut(remote_subpath)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or(Ok(TransferOutcome::Completed))
    }

    async fn verify(&self, local_path: &Path, remote_subpath: &str) -> AdapterResult<VerifyOutcome> {
        lock(&self.verify_log).push((local_path.to_path_buf(), remote_subpath.to_string()));
        let scripted = lock(&self.verifies)
            .get_mut(remote_subpath)
            .and_then(VecDeque::pop_front);
        scripted.unwrap_or(Ok(VerifyOutcome::Match))
    }

    async fn health_check(&self) -> AdapterResult<()> {
        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(AdapterError::fatal(
                "transfer.health_check",
                "remote not configured",
                None,
            ));
        }
        Ok(())
    }
}
