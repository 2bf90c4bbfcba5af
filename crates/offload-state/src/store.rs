use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use offload_core::{FailureRecord, LedgerEntry, ProcessedRecord};
use tracing::{debug, info, warn};

use crate::error::{StateError, StateResult};
use crate::persist::{load_map, write_map};

/// File name of the processed ledger inside the state directory.
pub const PROCESSED_FILE: &str = "processed.json";
/// File name of the failure ledger inside the state directory.
pub const FAILED_FILE: &str = "failed.json";

/// Point-in-time copy of both ledger maps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    /// Completed items keyed by id.
    pub processed: BTreeMap<String, ProcessedRecord>,
    /// Failed items keyed by id.
    pub failed: BTreeMap<String, FailureRecord>,
}

/// Result of trying to reserve an id for a new task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The id is now in flight and the caller owns the task.
    Claimed {
        /// Failures recorded for the id before this attempt.
        prior_failures: u32,
    },
    /// The id already completed.
    AlreadyProcessed,
    /// The id reached the failure ceiling.
    Exhausted {
        /// Recorded failure count.
        failure_count: u32,
    },
    /// Another task for the id is queued or running.
    InFlight,
    /// A retry was requested but the id has no failure record.
    Missing,
}

#[derive(Debug, Default)]
struct Ledger {
    processed: BTreeMap<String, ProcessedRecord>,
    failed: BTreeMap<String, FailureRecord>,
    in_flight: HashSet<String>,
}

/// Thread-safe ledger shared by the discovery loop and the workers.
///
/// File writes happen while the lock is held. The ledger files are small and
/// the engine touches the store once or twice per task, so the blocking IO
/// is accepted on runtime threads.
#[derive(Debug)]
pub struct StateStore {
    processed_path: PathBuf,
    failed_path: PathBuf,
    inner: Mutex<Ledger>,
}

impl StateStore {
    /// Open (or create) the ledger inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error when the directory cannot be created or a ledger file
    /// cannot be read.
    pub fn open(dir: impl AsRef<Path>) -> StateResult<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|err| StateError::io("state.create_dir", dir, err))?;
        Self::open_with_files(dir.join(PROCESSED_FILE), dir.join(FAILED_FILE))
    }

    /// Open the ledger from explicit file locations.
    ///
    /// An id present in both files keeps its processed record; the stale
    /// failure entry is dropped and the failure file rewritten.
    ///
    /// # Errors
    ///
    /// Returns an error when a file exists but cannot be read, or when the
    /// reconciled failure map cannot be persisted.
    pub fn open_with_files(
        processed_path: impl Into<PathBuf>,
        failed_path: impl Into<PathBuf>,
    ) -> StateResult<Self> {
        let processed_path = processed_path.into();
        let failed_path = failed_path.into();

        let processed = load_map::<ProcessedRecord>(&processed_path)?;
        let mut failed = load_map::<FailureRecord>(&failed_path)?;

        let before = failed.len();
        failed.retain(|id, _| !processed.contains_key(id));
        if failed.len() != before {
            warn!(
                dropped = before - failed.len(),
                "dropping failure records for already processed items"
            );
            write_map(&failed_path, &failed)?;
        }

        info!(
            processed = processed.len(),
            failed = failed.len(),
            "ledger loaded"
        );

        Ok(Self {
            processed_path,
            failed_path,
            inner: Mutex::new(Ledger {
                processed,
                failed,
                in_flight: HashSet::new(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Ledger> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up the ledger entry for `id`.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<LedgerEntry> {
        let ledger = self.lock();
        ledger
            .processed
            .get(id)
            .cloned()
            .map(LedgerEntry::Processed)
            .or_else(|| ledger.failed.get(id).cloned().map(LedgerEntry::Failed))
    }

    /// Record a successful completion and drop any failure record for `id`.
    ///
    /// Returns `false` when `id` was already processed; the existing record is
    /// kept untouched.
    ///
    /// # Errors
    ///
    /// Returns an error when the processed ledger cannot be written. A failure
    /// to rewrite the failure ledger afterwards is logged only, since the load
    /// path reconciles ids present in both files.
    pub fn mark_processed(&self, id: &str, record: ProcessedRecord) -> StateResult<bool> {
        let mut ledger = self.lock();
        if ledger.processed.contains_key(id) {
            debug!(item_id = id, "item already marked processed");
            return Ok(false);
        }

        let mut processed = ledger.processed.clone();
        processed.insert(id.to_string(), record);
        write_map(&self.processed_path, &processed)?;
        ledger.processed = processed;

        if ledger.failed.contains_key(id) {
            let mut failed = ledger.failed.clone();
            failed.remove(id);
            if let Err(err) = write_map(&self.failed_path, &failed) {
                warn!(item_id = id, error = %err, "failed to persist failure ledger after completion");
            }
            ledger.failed = failed;
        }
        Ok(true)
    }

    /// Record a failed attempt, creating or updating the failure record.
    ///
    /// Returns `None` when `id` is already processed; completed items never
    /// gain failure records.
    ///
    /// # Errors
    ///
    /// Returns an error when the failure ledger cannot be written; the
    /// in-memory count is unchanged in that case.
    pub fn record_failure(
        &self,
        id: &str,
        name: &str,
        path: &str,
        error: &str,
    ) -> StateResult<Option<FailureRecord>> {
        let mut ledger = self.lock();
        if ledger.processed.contains_key(id) {
            warn!(item_id = id, "ignoring failure for an already processed item");
            return Ok(None);
        }

        let now = Utc::now();
        let record = ledger.failed.get(id).map_or_else(
            || FailureRecord {
                name: name.to_string(),
                path: path.to_string(),
                first_failure_at: now,
                last_failure_at: now,
                failure_count: 1,
                last_error: error.to_string(),
            },
            |existing| FailureRecord {
                last_failure_at: now,
                failure_count: existing.failure_count.saturating_add(1),
                last_error: error.to_string(),
                ..existing.clone()
            },
        );

        let mut failed = ledger.failed.clone();
        failed.insert(id.to_string(), record.clone());
        write_map(&self.failed_path, &failed)?;
        ledger.failed = failed;
        Ok(Some(record))
    }

    /// Remove the failure record for `id`, returning whether one existed.
    ///
    /// # Errors
    ///
    /// Returns an error when the failure ledger cannot be written.
    pub fn remove_failure(&self, id: &str) -> StateResult<bool> {
        let mut ledger = self.lock();
        Self::remove_failure_locked(&self.failed_path, &mut ledger, id)
    }

    fn remove_failure_locked(path: &Path, ledger: &mut Ledger, id: &str) -> StateResult<bool> {
        if !ledger.failed.contains_key(id) {
            return Ok(false);
        }
        let mut failed = ledger.failed.clone();
        failed.remove(id);
        write_map(path, &failed)?;
        ledger.failed = failed;
        Ok(true)
    }

    /// Purge the failure record of an item whose content vanished.
    ///
    /// Ids that are in flight are left alone; their task decides the outcome.
    ///
    /// # Errors
    ///
    /// Returns an error when the failure ledger cannot be written.
    pub fn purge_vanished(&self, id: &str) -> StateResult<bool> {
        let mut ledger = self.lock();
        if ledger.in_flight.contains(id) {
            return Ok(false);
        }
        Self::remove_failure_locked(&self.failed_path, &mut ledger, id)
    }

    /// Copy both maps.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        let ledger = self.lock();
        StateSnapshot {
            processed: ledger.processed.clone(),
            failed: ledger.failed.clone(),
        }
    }

    /// Reserve `id` for a freshly discovered task.
    ///
    /// The processed check, the failure ceiling and the in-flight check happen
    /// under one lock acquisition together with the reservation.
    #[must_use]
    pub fn claim_new(&self, id: &str, max_failures: u32) -> ClaimOutcome {
        let mut ledger = self.lock();
        if ledger.processed.contains_key(id) {
            return ClaimOutcome::AlreadyProcessed;
        }
        let prior_failures = match ledger.failed.get(id) {
            Some(record) if record.exhausted(max_failures) => {
                return ClaimOutcome::Exhausted {
                    failure_count: record.failure_count,
                };
            }
            Some(record) => record.failure_count,
            None => 0,
        };
        Self::reserve(&mut ledger, id, prior_failures)
    }

    /// Reserve `id` for a retry of a recorded failure.
    #[must_use]
    pub fn claim_retry(&self, id: &str, max_failures: u32) -> ClaimOutcome {
        let mut ledger = self.lock();
        if ledger.processed.contains_key(id) {
            return ClaimOutcome::AlreadyProcessed;
        }
        let prior_failures = match ledger.failed.get(id) {
            None => return ClaimOutcome::Missing,
            Some(record) if record.exhausted(max_failures) => {
                return ClaimOutcome::Exhausted {
                    failure_count: record.failure_count,
                };
            }
            Some(record) => record.failure_count,
        };
        Self::reserve(&mut ledger, id, prior_failures)
    }

    fn reserve(ledger: &mut Ledger, id: &str, prior_failures: u32) -> ClaimOutcome {
        if ledger.in_flight.insert(id.to_string()) {
            ClaimOutcome::Claimed { prior_failures }
        } else {
            ClaimOutcome::InFlight
        }
    }

    /// Release a reservation taken by [`Self::claim_new`] or [`Self::claim_retry`].
    pub fn release(&self, id: &str) -> bool {
        self.lock().in_flight.remove(id)
    }

    /// Whether a task for `id` is queued or running.
    #[must_use]
    pub fn is_in_flight(&self, id: &str) -> bool {
        self.lock().in_flight.contains(id)
    }

    /// Number of ids currently reserved.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.lock().in_flight.len()
    }
}
