//! Loading and writing the JSON configuration file.
//!
//! # Design
//! - A missing file is replaced by the defaults, written atomically.
//! - A file that is not JSON at all is copied to `<file>.<unix-secs>.bak`
//!   before the defaults overwrite it.
//! - Well-formed JSON with a wrong type or out-of-range value is an error:
//!   the file is left alone and the caller refuses to start.
//! - Other IO failures are returned to the caller.

use std::fs;
use std::io;
use std::path::Path;

use offload_state::persist::{backup_path, write_atomic};
use serde_json::error::Category;
use tracing::{error, info, warn};

use crate::error::{ConfigError, ConfigResult};
use crate::model::OffloadConfig;

/// Default configuration file name, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Load the configuration at `path`, creating or repairing it as needed.
///
/// # Errors
///
/// Returns an error when the file exists but cannot be read, when it holds
/// values of the wrong type or range, or when the default document cannot be
/// written.
pub fn load(path: &Path) -> ConfigResult<OffloadConfig> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "configuration file not found; writing defaults");
            return write_default(path);
        }
        Err(err) => return Err(ConfigError::io("config.read", path, err)),
    };

    match serde_json::from_slice::<OffloadConfig>(&raw) {
        Ok(config) => {
            info!(path = %path.display(), "configuration loaded");
            Ok(config)
        }
        Err(err) if matches!(err.classify(), Category::Data) => {
            error!(path = %path.display(), error = %err, "configuration has an invalid value");
            Err(ConfigError::Parse {
                path: path.to_path_buf(),
                source: err,
            })
        }
        Err(err) => {
            error!(path = %path.display(), error = %err, "configuration file is not valid JSON");
            let backup = backup_path(path);
            match fs::copy(path, &backup) {
                Ok(_) => warn!(backup = %backup.display(), "backed up invalid configuration"),
                Err(copy_err) => {
                    error!(error = %copy_err, "failed to back up invalid configuration");
                }
            }
            write_default(path)
        }
    }
}

/// Parse the configuration at `path` without creating or repairing it.
///
/// # Errors
///
/// Returns an error when the file cannot be read or parsed.
pub fn read_existing(path: &Path) -> ConfigResult<OffloadConfig> {
    let raw = fs::read(path).map_err(|err| ConfigError::io("config.read", path, err))?;
    serde_json::from_slice(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the default configuration to `path` atomically and return it.
///
/// # Errors
///
/// Returns an error when the document cannot be serialised or written.
pub fn write_default(path: &Path) -> ConfigResult<OffloadConfig> {
    let config = OffloadConfig::default();
    write(path, &config)?;
    info!(path = %path.display(), "wrote default configuration");
    Ok(config)
}

/// Write `config` to `path` through a temporary file and a rename.
///
/// # Errors
///
/// Returns an error when the document cannot be serialised or written.
pub fn write(path: &Path, config: &OffloadConfig) -> ConfigResult<()> {
    let payload = serde_json::to_vec_pretty(config).map_err(|source| ConfigError::Serialize {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &payload).map_err(|err| ConfigError::io("config.write", path, err))
}
