//! Translate the configuration document into engine and adapter settings.

use std::path::Path;
use std::time::Duration;

use offload_config::OffloadConfig;
use offload_core::ItemFilter;
use offload_engine::EngineConfig;
use offload_qbit::QbitConfig;
use offload_rclone::RcloneConfig;
use offload_telemetry::{LogFormat, LoggingConfig};

/// Engine behaviour for `config`.
#[must_use]
pub fn engine_config(config: &OffloadConfig) -> EngineConfig {
    let category = config
        .category_filter
        .as_deref()
        .map(str::trim)
        .filter(|category| !category.is_empty())
        .map(str::to_string);
    EngineConfig {
        check_interval: Duration::from_secs(config.check_interval),
        worker_count: config.worker_threads,
        max_concurrent_transfers: config.max_concurrent_uploads,
        max_failures: config.max_upload_failures,
        use_categories: config.use_categories,
        filter: ItemFilter {
            category,
            ..ItemFilter::default()
        },
        delete_from_source: config.auto_delete.delete_from_client,
        delete_local_content: config.auto_delete.delete_content,
        continue_on_errors: config.continue_on_errors,
        ..EngineConfig::default()
    }
}

/// qBittorrent client settings for `config`.
#[must_use]
pub fn qbit_config(config: &OffloadConfig) -> QbitConfig {
    let qbit = &config.qbittorrent;
    QbitConfig {
        host: qbit.host.clone(),
        port: qbit.port,
        username: qbit.username.clone(),
        password: qbit.password.clone(),
        request_timeout: Duration::from_secs(qbit.request_timeout_secs),
    }
}

/// rclone executor settings for `config`. A zero transfer timeout disables it.
#[must_use]
pub fn rclone_config(config: &OffloadConfig) -> RcloneConfig {
    let rclone = &config.rclone;
    RcloneConfig {
        remote_name: rclone.remote_name.clone(),
        remote_path: rclone.remote_path.clone(),
        binary: rclone.binary.clone(),
        transfers: rclone.transfers,
        retries: rclone.retries,
        low_level_retries: rclone.low_level_retries,
        transfer_timeout: (rclone.transfer_timeout_secs > 0)
            .then(|| Duration::from_secs(rclone.transfer_timeout_secs)),
        verify_uploads: config.verification.verify_uploads,
        use_full_hash: config.verification.use_full_hash,
        verification_timeout: Duration::from_secs(config.verification.verification_timeout),
        ..RcloneConfig::default()
    }
}

/// Logging settings for `config`, with optional command-line overrides.
#[must_use]
pub fn logging_config<'a>(
    config: &'a OffloadConfig,
    level: Option<&'a str>,
    format: Option<LogFormat>,
    build_sha: &'a str,
) -> LoggingConfig<'a> {
    LoggingConfig {
        level: level.unwrap_or(&config.logging.level),
        format: format
            .unwrap_or_else(|| LogFormat::parse_or_infer(config.logging.format.as_deref())),
        build_sha,
        file: config.logging.file.as_deref().map(Path::new),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn maps_engine_settings() {
        let mut config = OffloadConfig::default();
        config.check_interval = 60;
        config.worker_threads = 6;
        config.max_concurrent_uploads = 2;
        config.max_upload_failures = 5;
        config.category_filter = Some("  tv ".to_string());
        config.auto_delete.delete_content = false;

        let engine = engine_config(&config);
        assert_eq!(engine.check_interval, Duration::from_secs(60));
        assert_eq!(engine.worker_count, 6);
        assert_eq!(engine.max_concurrent_transfers, 2);
        assert_eq!(engine.max_failures, 5);
        assert_eq!(engine.filter.category.as_deref(), Some("tv"));
        assert_eq!(engine.filter.status, "completed");
        assert!(engine.delete_from_source);
        assert!(!engine.delete_local_content);
    }

    #[test]
    fn blank_category_filter_lists_everything() {
        let mut config = OffloadConfig::default();
        config.category_filter = Some("   ".to_string());
        assert!(engine_config(&config).filter.category.is_none());
    }

    #[test]
    fn zero_transfer_timeout_disables_it() {
        let mut config = OffloadConfig::default();
        config.rclone.transfer_timeout_secs = 0;
        config.rclone.binary = Some(PathBuf::from("/opt/rclone"));
        config.verification.use_full_hash = true;
        config.verification.verification_timeout = 30;

        let rclone = rclone_config(&config);
        assert!(rclone.transfer_timeout.is_none());
        assert_eq!(rclone.binary.as_deref(), Some(Path::new("/opt/rclone")));
        assert!(rclone.use_full_hash);
        assert_eq!(rclone.verification_timeout, Duration::from_secs(30));

        config.rclone.transfer_timeout_secs = 3600;
        assert_eq!(
            rclone_config(&config).transfer_timeout,
            Some(Duration::from_secs(3600))
        );
    }

    #[test]
    fn qbit_settings_carry_credentials() {
        let mut config = OffloadConfig::default();
        config.qbittorrent.host = "seedbox".to_string();
        config.qbittorrent.request_timeout_secs = 5;

        let qbit = qbit_config(&config);
        assert_eq!(qbit.host, "seedbox");
        assert_eq!(qbit.username, config.qbittorrent.username);
        assert_eq!(qbit.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn command_line_overrides_logging() {
        let mut config = OffloadConfig::default();
        config.logging.format = Some("pretty".to_string());

        let logging = logging_config(&config, None, None, "dev");
        assert_eq!(logging.level, "info");
        assert_eq!(logging.format, LogFormat::Pretty);

        let logging = logging_config(&config, Some("trace"), Some(LogFormat::Json), "dev");
        assert_eq!(logging.level, "trace");
        assert_eq!(logging.format, LogFormat::Json);
    }
}
