//! Atomic JSON file persistence with corrupt-file quarantine.
//!
//! The file helpers are shared with the configuration loader so both
//! documents are replaced the same way.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{error, warn};

use crate::error::{StateError, StateResult};

/// Write `payload` to `<path>.tmp`, flush it to disk, then rename it over `path`.
///
/// # Errors
///
/// Returns the first IO error from creating, writing, syncing, or renaming
/// the temporary file.
pub fn write_atomic(path: &Path, payload: &[u8]) -> io::Result<()> {
    let tmp = temp_path(path);
    {
        let mut file = File::create(&tmp)?;
        file.write_all(payload)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

/// `path` with `suffix` appended to its file name.
#[must_use]
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path
        .file_name()
        .map_or_else(|| OsString::from("offload"), ToOwned::to_owned);
    name.push(suffix);
    path.with_file_name(name)
}

/// Temporary sibling used by [`write_atomic`].
#[must_use]
pub fn temp_path(path: &Path) -> PathBuf {
    with_suffix(path, ".tmp")
}

/// Timestamped `<file>.<unix-secs>.bak` sibling of `path`.
#[must_use]
pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, &format!(".{}.bak", Utc::now().timestamp()))
}

/// Read a ledger map. Missing files yield an empty map; unparsable files are
/// renamed to a timestamped backup and also yield an empty map.
pub(crate) fn load_map<T: DeserializeOwned>(path: &Path) -> StateResult<BTreeMap<String, T>> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(err) => return Err(StateError::io("state.load", path, err)),
    };

    serde_json::from_slice(&raw).or_else(|err| {
        error!(path = %path.display(), error = %err, "ledger file is corrupt; starting empty");
        let backup = backup_path(path);
        match fs::rename(path, &backup) {
            Ok(()) => warn!(backup = %backup.display(), "quarantined corrupt ledger file"),
            Err(rename_err) => error!(
                path = %path.display(),
                error = %rename_err,
                "failed to back up corrupt ledger file"
            ),
        }
        Ok(BTreeMap::new())
    })
}

/// Serialise `map` and replace `path` with it atomically.
pub(crate) fn write_map<T: Serialize>(path: &Path, map: &BTreeMap<String, T>) -> StateResult<()> {
    let payload =
        serde_json::to_vec_pretty(map).map_err(|err| StateError::json("state.serialize", path, err))?;
    write_atomic(path, &payload).map_err(|err| StateError::io("state.write", path, err))
}
