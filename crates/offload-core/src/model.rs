//! Items, ledger records, and adapter outcomes.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status filter requested from the source when none is configured.
pub const DEFAULT_STATUS_FILTER: &str = "completed";

/// A finished item reported by the source, ready to be transferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Stable unique key (the torrent info-hash for qBittorrent).
    pub id: String,
    /// Human-readable name, also used as the remote folder name.
    pub display_name: String,
    /// Optional source-side category.
    pub category: Option<String>,
    /// Local content to transfer (file or directory).
    pub local_path: PathBuf,
}

impl Item {
    /// Construct an item without a category.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            category: None,
            local_path: local_path.into(),
        }
    }

    /// Attach a category to the item.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Remote location relative to the configured remote root.
    ///
    /// With `use_categories` the category becomes a parent folder so the remote
    /// mirrors the source's organisation.
    #[must_use]
    pub fn remote_subpath(&self, use_categories: bool) -> String {
        match self.category.as_deref().map(str::trim) {
            Some(category) if use_categories && !category.is_empty() => {
                format!("{category}/{}", self.display_name)
            }
            _ => self.display_name.clone(),
        }
    }
}

/// Listing filter passed to the source adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFilter {
    /// Source-specific status selector.
    pub status: String,
    /// Restrict discovery to a single category.
    pub category: Option<String>,
}

impl Default for ItemFilter {
    fn default() -> Self {
        Self {
            status: DEFAULT_STATUS_FILTER.to_string(),
            category: None,
        }
    }
}

/// Ledger entry written once an item has been transferred and verified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedRecord {
    /// Display name at completion time.
    pub name: String,
    /// Local path that was transferred.
    pub path: String,
    /// Completion timestamp.
    pub completed_at: DateTime<Utc>,
    /// Number of earlier failed attempts, omitted for first-try successes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retries: Option<u32>,
}

impl ProcessedRecord {
    /// Build a record stamped with the current time.
    #[must_use]
    pub fn now(name: impl Into<String>, path: impl Into<String>, retry_count: u32) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            completed_at: Utc::now(),
            retries: (retry_count > 0).then_some(retry_count),
        }
    }
}

/// Ledger entry tracking failed attempts for an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureRecord {
    /// Display name at the time of the first failure.
    pub name: String,
    /// Local path of the content.
    pub path: String,
    /// Timestamp of the first recorded failure.
    pub first_failure_at: DateTime<Utc>,
    /// Timestamp of the most recent failure.
    pub last_failure_at: DateTime<Utc>,
    /// Monotonic count of failed attempts.
    pub failure_count: u32,
    /// Error message from the most recent failure.
    pub last_error: String,
}

impl FailureRecord {
    /// Whether the record has reached the configured failure ceiling.
    #[must_use]
    pub const fn exhausted(&self, max_failures: u32) -> bool {
        self.failure_count >= max_failures
    }
}

/// Result of looking an id up in the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEntry {
    /// The id completed successfully.
    Processed(ProcessedRecord),
    /// The id has one or more recorded failures.
    Failed(FailureRecord),
}

/// Outcome of a transfer request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// Content was copied to the remote.
    Completed,
    /// The executor reported a failure.
    Failed {
        /// Executor-supplied failure description.
        message: String,
    },
    /// The executor did not finish within its time budget.
    TimedOut {
        /// Elapsed budget.
        after: Duration,
    },
}

impl TransferOutcome {
    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed { .. } => "failed",
            Self::TimedOut { .. } => "timed_out",
        }
    }
}

/// Outcome of a verification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// Local and remote content match.
    Match,
    /// Differences were detected (or verification could not finish).
    Mismatch {
        /// Executor-supplied difference report.
        details: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn remote_subpath_honours_category_toggle() {
        let item = Item::new("h1", "Movie", "/d/Movie").with_category("films");
        assert_eq!(item.remote_subpath(true), "films/Movie");
        assert_eq!(item.remote_subpath(false), "Movie");

        let blank = Item::new("h2", "Show", "/d/Show").with_category("  ");
        assert_eq!(blank.remote_subpath(true), "Show");
    }

    #[test]
    fn processed_record_omits_retries_on_first_success() -> Result<()> {
        let first = ProcessedRecord::now("A", "/d/A", 0);
        let value = serde_json::to_value(&first)?;
        assert!(value.get("retries").is_none());
        assert!(value.get("completedAt").is_some());

        let retried = ProcessedRecord::now("A", "/d/A", 2);
        assert_eq!(retried.retries, Some(2));
        Ok(())
    }

    #[test]
    fn failure_record_uses_camel_case_keys() -> Result<()> {
        let raw = json!({
            "name": "A",
            "path": "/d/A",
            "firstFailureAt": "2024-01-01T00:00:00Z",
            "lastFailureAt": "2024-01-02T00:00:00Z",
            "failureCount": 3,
            "lastError": "boom"
        });
        let record: FailureRecord = serde_json::from_value(raw)?;
        assert_eq!(record.failure_count, 3);
        assert!(record.exhausted(3));
        assert!(!record.exhausted(4));
        Ok(())
    }
}
