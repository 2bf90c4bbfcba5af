//! Validation of a loaded configuration document.

use crate::error::{ConfigError, ConfigResult, FieldViolation};
use crate::model::OffloadConfig;

/// Check every constraint and report all violations at once.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] listing each failing field.
pub fn validate(config: &OffloadConfig) -> ConfigResult<()> {
    let mut violations = Vec::new();
    let mut check = |ok: bool, section, field, value: String, reason| {
        if !ok {
            violations.push(FieldViolation {
                section,
                field,
                value: Some(value),
                reason,
            });
        }
    };

    check(
        !config.qbittorrent.host.trim().is_empty(),
        "qbittorrent",
        "host",
        config.qbittorrent.host.clone(),
        "must not be empty",
    );
    check(
        config.qbittorrent.port != 0,
        "qbittorrent",
        "port",
        config.qbittorrent.port.to_string(),
        "must be between 1 and 65535",
    );
    check(
        config.qbittorrent.request_timeout_secs > 0,
        "qbittorrent",
        "request_timeout_secs",
        config.qbittorrent.request_timeout_secs.to_string(),
        "must be positive",
    );
    check(
        !config.rclone.remote_name.trim().is_empty() && !config.rclone.remote_name.contains(':'),
        "rclone",
        "remote_name",
        config.rclone.remote_name.clone(),
        "must be a remote name without ':'",
    );
    check(
        config.verification.verification_timeout > 0,
        "verification",
        "verification_timeout",
        config.verification.verification_timeout.to_string(),
        "must be positive",
    );
    check(
        config.check_interval > 0,
        "root",
        "check_interval",
        config.check_interval.to_string(),
        "must be positive",
    );
    check(
        config.max_upload_failures > 0,
        "root",
        "max_upload_failures",
        config.max_upload_failures.to_string(),
        "must be positive",
    );
    check(
        config.worker_threads > 0,
        "root",
        "worker_threads",
        config.worker_threads.to_string(),
        "must be positive",
    );
    check(
        config.max_concurrent_uploads > 0,
        "root",
        "max_concurrent_uploads",
        config.max_concurrent_uploads.to_string(),
        "must be positive",
    );
    if let Some(format) = config.logging.format.as_deref() {
        check(
            matches!(format, "pretty" | "json"),
            "logging",
            "format",
            format.to_string(),
            "must be 'pretty' or 'json'",
        );
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Invalid { violations })
    }
}
