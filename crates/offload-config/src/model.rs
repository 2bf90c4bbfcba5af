//! Typed configuration document.
//!
//! Every field has a default so partial documents load cleanly.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OffloadConfig {
    /// qBittorrent Web API connection.
    pub qbittorrent: QbitSettings,
    /// rclone remote and invocation settings.
    pub rclone: RcloneSettings,
    /// Post-transfer verification behaviour.
    pub verification: VerificationSettings,
    /// Cleanup performed after a verified transfer.
    pub auto_delete: AutoDeleteSettings,
    /// Seconds between discovery cycles.
    pub check_interval: u64,
    /// Mirror source categories as remote folders.
    pub use_categories: bool,
    /// Restrict discovery to one category.
    pub category_filter: Option<String>,
    /// Failed attempts after which an item is no longer retried.
    pub max_upload_failures: u32,
    /// Start even when health checks fail.
    pub continue_on_errors: bool,
    /// Worker tasks pulling from the queue.
    pub worker_threads: usize,
    /// Transfers allowed to run at the same time.
    pub max_concurrent_uploads: usize,
    /// Directory holding `processed.json` and `failed.json`.
    pub state_dir: PathBuf,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl Default for OffloadConfig {
    fn default() -> Self {
        Self {
            qbittorrent: QbitSettings::default(),
            rclone: RcloneSettings::default(),
            verification: VerificationSettings::default(),
            auto_delete: AutoDeleteSettings::default(),
            check_interval: 300,
            use_categories: true,
            category_filter: None,
            max_upload_failures: 3,
            continue_on_errors: false,
            worker_threads: 4,
            max_concurrent_uploads: 3,
            state_dir: PathBuf::from("."),
            logging: LoggingSettings::default(),
        }
    }
}

/// qBittorrent connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QbitSettings {
    /// Host name or address of the Web UI.
    pub host: String,
    /// Web UI port.
    pub port: u16,
    /// Web UI user.
    pub username: String,
    /// Web UI password.
    pub password: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for QbitSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            username: "admin".to_string(),
            password: "adminadmin".to_string(),
            request_timeout_secs: 15,
        }
    }
}

/// rclone settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RcloneSettings {
    /// Configured rclone remote, without the trailing colon.
    pub remote_name: String,
    /// Folder beneath the remote root receiving uploads.
    pub remote_path: String,
    /// Explicit rclone binary; discovered when unset.
    pub binary: Option<PathBuf>,
    /// Parallel file transfers within one rclone copy.
    pub transfers: u32,
    /// rclone's own high-level retries.
    pub retries: u32,
    /// rclone's low-level retries.
    pub low_level_retries: u32,
    /// Upper bound for one copy in seconds; `0` disables the limit.
    pub transfer_timeout_secs: u64,
}

impl Default for RcloneSettings {
    fn default() -> Self {
        Self {
            remote_name: "onedrive".to_string(),
            remote_path: "Torrents".to_string(),
            binary: None,
            transfers: 4,
            retries: 3,
            low_level_retries: 10,
            transfer_timeout_secs: 0,
        }
    }
}

/// Verification settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationSettings {
    /// Compare local and remote content after every copy.
    pub verify_uploads: bool,
    /// Compare hashes instead of sizes only.
    pub use_full_hash: bool,
    /// Upper bound for one verification in seconds.
    pub verification_timeout: u64,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            verify_uploads: true,
            use_full_hash: false,
            verification_timeout: 300,
        }
    }
}

/// Cleanup toggles applied after a verified transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoDeleteSettings {
    /// Remove the torrent from qBittorrent.
    pub delete_from_client: bool,
    /// Remove the local content.
    pub delete_content: bool,
}

impl Default for AutoDeleteSettings {
    fn default() -> Self {
        Self {
            delete_from_client: true,
            delete_content: true,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default level directive, overridden by `RUST_LOG`.
    pub level: String,
    /// `pretty` or `json`; inferred from the build when unset.
    pub format: Option<String>,
    /// Optional file receiving a copy of the log.
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn partial_documents_fill_defaults() -> Result<()> {
        let config: OffloadConfig = serde_json::from_value(json!({
            "qbittorrent": {"host": "seedbox", "port": 9091},
            "rclone": {"remote_name": "gdrive"},
            "check_interval": 60
        }))?;

        assert_eq!(config.qbittorrent.host, "seedbox");
        assert_eq!(config.qbittorrent.port, 9091);
        assert_eq!(config.qbittorrent.username, "admin");
        assert_eq!(config.rclone.remote_name, "gdrive");
        assert_eq!(config.rclone.remote_path, "Torrents");
        assert_eq!(config.check_interval, 60);
        assert_eq!(config.max_concurrent_uploads, 3);
        assert!(config.verification.verify_uploads);
        assert!(config.auto_delete.delete_content);
        Ok(())
    }

    #[test]
    fn unknown_fields_are_tolerated() -> Result<()> {
        let config: OffloadConfig = serde_json::from_value(json!({
            "validate_on_start": true,
            "worker_threads": 8
        }))?;
        assert_eq!(config.worker_threads, 8);
        Ok(())
    }
}
