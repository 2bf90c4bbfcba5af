//! Command-line flags for the `offload` binary.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use offload_config::DEFAULT_CONFIG_FILE;
use offload_telemetry::LogFormat;

/// Move completed qBittorrent downloads to an rclone remote.
#[derive(Debug, Parser)]
#[command(name = "offload", version, about)]
pub struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, short = 'c', env = "OFFLOAD_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,
    /// Write a default configuration file and exit.
    #[arg(long, conflicts_with = "validate")]
    pub setup: bool,
    /// Check the configuration file and exit.
    #[arg(long)]
    pub validate: bool,
    /// Override the configured log level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,
    /// Override the configured log format.
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormatArg>,
}

/// Log level accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    /// Errors only.
    Error,
    /// Warnings and errors.
    Warn,
    /// Lifecycle events.
    Info,
    /// Per-item detail.
    Debug,
    /// Everything.
    Trace,
}

impl LogLevel {
    /// Directive string understood by the log filter.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Log format accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    /// Human-readable output.
    Pretty,
    /// One JSON object per line.
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Pretty => Self::Pretty,
            LogFormatArg::Json => Self::Json,
        }
    }
}
