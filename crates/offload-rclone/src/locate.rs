//! Finding the rclone binary.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{RcloneError, RcloneResult};

#[cfg(windows)]
const BINARY_NAME: &str = "rclone.exe";
#[cfg(not(windows))]
const BINARY_NAME: &str = "rclone";

#[cfg(windows)]
const COMMON_LOCATIONS: &[&str] = &[r"C:\Program Files\rclone\rclone.exe", r"C:\rclone\rclone.exe"];
#[cfg(not(windows))]
const COMMON_LOCATIONS: &[&str] = &["/usr/local/bin/rclone", "/usr/bin/rclone"];

/// Resolve the rclone binary: the configured path, then `PATH`, then common
/// install locations.
///
/// # Errors
///
/// Returns [`RcloneError::BinaryNotFound`] listing every checked location.
pub fn locate_binary(configured: Option<&Path>) -> RcloneResult<PathBuf> {
    locate_in(
        configured,
        env::var_os("PATH"),
        env::var_os("HOME").map(PathBuf::from),
    )
}

fn locate_in(
    configured: Option<&Path>,
    path_var: Option<OsString>,
    home: Option<PathBuf>,
) -> RcloneResult<PathBuf> {
    if let Some(configured) = configured {
        if configured.is_file() {
            return Ok(configured.to_path_buf());
        }
        return Err(RcloneError::BinaryNotFound {
            searched: vec![configured.to_path_buf()],
        });
    }

    let mut candidates: Vec<PathBuf> = path_var
        .as_deref()
        .map(|paths| env::split_paths(paths).map(|dir| dir.join(BINARY_NAME)).collect())
        .unwrap_or_default();
    if let Some(home) = home {
        candidates.push(home.join(".local").join("bin").join(BINARY_NAME));
    }
    candidates.extend(COMMON_LOCATIONS.iter().map(PathBuf::from));

    if let Some(found) = candidates.iter().find(|candidate| candidate.is_file()) {
        info!(path = %found.display(), "found rclone");
        return Ok(found.clone());
    }
    Err(RcloneError::BinaryNotFound {
        searched: candidates,
    })
}
