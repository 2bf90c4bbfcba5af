//! Logging initialisation and configuration.
//!
//! # Design
//! - One entry point installs the global subscriber (pretty or JSON).
//! - `RUST_LOG` overrides the configured level when present.
//! - An optional log file is written through a non-blocking appender whose
//!   guard must outlive the process's logging.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Result, TelemetryError};

/// Default logging target when `RUST_LOG` is not provided.
pub const DEFAULT_LOG_LEVEL: &str = "info";

static BUILD_SHA: OnceCell<String> = OnceCell::new();

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Log level string (e.g., `info`, `debug`).
    pub level: &'a str,
    /// Output format selection for the tracing subscriber.
    pub format: LogFormat,
    /// Build identifier recorded at startup.
    pub build_sha: &'a str,
    /// Optional file receiving a copy of every log line.
    pub file: Option<&'a Path>,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
            build_sha: build_sha(),
            file: None,
        }
    }
}

/// Available output formats for the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Emit logs as structured JSON objects.
    Json,
    /// Emit human-readable, pretty-printed logs.
    Pretty,
}

impl LogFormat {
    /// Choose a sensible default for the current build.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }

    /// Parse a configured format name; unknown names fall back to [`Self::infer`].
    #[must_use]
    pub fn parse_or_infer(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(name) if name.eq_ignore_ascii_case("json") => Self::Json,
            Some(name) if name.eq_ignore_ascii_case("pretty") => Self::Pretty,
            _ => Self::infer(),
        }
    }
}

/// Keeps the non-blocking file writer alive; drop it last to flush.
#[must_use = "dropping the guard stops file logging"]
#[derive(Debug)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Access the build SHA recorded during logging initialisation.
#[must_use]
pub fn build_sha() -> &'static str {
    BUILD_SHA.get().map_or("dev", String::as_str)
}

/// Configure and install the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or the subscriber cannot
/// be installed (for example, because another subscriber is already set).
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<LoggingGuard> {
    BUILD_SHA
        .set(config.build_sha.to_string())
        .ok()
        .or(Some(()));

    let (writer, guard) = match config.file {
        Some(path) => {
            let (writer, guard) = tracing_appender::non_blocking(open_log_file(path)?);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let installed = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(build_env_filter(config.level))
            .with(
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_thread_ids(false),
            )
            .with(writer.map(|writer| {
                fmt::layer()
                    .json()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(writer)
            }))
            .try_init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(build_env_filter(config.level))
            .with(fmt::layer().with_target(false).with_thread_ids(false))
            .with(writer.map(|writer| {
                fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(writer)
            }))
            .try_init(),
    };
    installed.map_err(|source| TelemetryError::SubscriberInstall { source })?;

    Ok(LoggingGuard { _file: guard })
}

fn open_log_file(path: &Path) -> Result<RollingFileAppender> {
    let name = path
        .file_name()
        .ok_or_else(|| TelemetryError::LogFileName {
            path: path.to_path_buf(),
        })?;
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

    RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy())
        .build(dir)
        .map_err(|source| TelemetryError::LogFileOpen {
            path: path.to_path_buf(),
            source,
        })
}

fn build_env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}
