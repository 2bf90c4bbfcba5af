//! Settings for the rclone executor.

use std::path::PathBuf;
use std::time::Duration;

/// How rclone is invoked and how uploads are verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcloneConfig {
    /// Remote name as listed by `rclone listremotes`, without the colon.
    pub remote_name: String,
    /// Folder on the remote that receives every upload.
    pub remote_path: String,
    /// Explicit rclone binary; searched for when unset.
    pub binary: Option<PathBuf>,
    /// Value for `--transfers`.
    pub transfers: u32,
    /// Value for `--retries`.
    pub retries: u32,
    /// Value for `--low-level-retries`.
    pub low_level_retries: u32,
    /// Kill a copy that runs longer than this.
    pub transfer_timeout: Option<Duration>,
    /// Run `rclone check` after each copy.
    pub verify_uploads: bool,
    /// Compare hashes instead of sizes only.
    pub use_full_hash: bool,
    /// Budget for a single `rclone check`.
    pub verification_timeout: Duration,
    /// Minimum gap between logged progress lines for one transfer.
    pub progress_interval: Duration,
}

impl RcloneConfig {
    /// `remote:path` root every upload lands under.
    #[must_use]
    pub fn remote_root(&self) -> String {
        let path = self.remote_path.trim_matches('/');
        format!("{}:{path}", self.remote_name)
    }

    /// Full rclone target for `subpath` beneath the remote root.
    #[must_use]
    pub fn remote_target(&self, subpath: &str) -> String {
        let root = self.remote_root();
        let subpath = subpath.trim_matches('/');
        if subpath.is_empty() {
            root
        } else if root.ends_with(':') {
            format!("{root}{subpath}")
        } else {
            format!("{root}/{subpath}")
        }
    }
}

impl Default for RcloneConfig {
    fn default() -> Self {
        Self {
            remote_name: "onedrive".to_string(),
            remote_path: "Torrents".to_string(),
            binary: None,
            transfers: 4,
            retries: 3,
            low_level_retries: 10,
            transfer_timeout: None,
            verify_uploads: true,
            use_full_hash: false,
            verification_timeout: Duration::from_secs(300),
            progress_interval: Duration::from_secs(60),
        }
    }
}
