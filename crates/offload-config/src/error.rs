//! Error types for configuration operations.

use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more fields failed validation.
    #[error("invalid configuration")]
    Invalid {
        /// Every violation found, in document order.
        violations: Vec<FieldViolation>,
    },
    /// The configuration document could not be parsed.
    #[error("configuration parse failed")]
    Parse {
        /// Document that failed to parse.
        path: PathBuf,
        /// Source JSON error.
        source: serde_json::Error,
    },
    /// Serialising the configuration document failed.
    #[error("configuration serialize failed")]
    Serialize {
        /// Document being written.
        path: PathBuf,
        /// Source JSON error.
        source: serde_json::Error,
    },
    /// File system operation failed.
    #[error("filesystem operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// File involved in the failure.
        path: PathBuf,
        /// Source IO error.
        source: io::Error,
    },
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// A single field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    /// Section containing the field (`root` for top-level fields).
    pub section: &'static str,
    /// Field that failed validation.
    pub field: &'static str,
    /// Offending value when available.
    pub value: Option<String>,
    /// Machine-readable reason for the failure.
    pub reason: &'static str,
}

impl Display for FieldViolation {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}.{}: {}", self.section, self.field, self.reason)?;
        if let Some(value) = &self.value {
            write!(formatter, " (got {value})")?;
        }
        Ok(())
    }
}

impl ConfigError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    /// Validation violations carried by this error, empty for other variants.
    #[must_use]
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            Self::Invalid { violations } => violations,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn violation_display_includes_value() {
        let violation = FieldViolation {
            section: "qbittorrent",
            field: "port",
            value: Some("0".into()),
            reason: "must be between 1 and 65535",
        };
        assert_eq!(
            violation.to_string(),
            "qbittorrent.port: must be between 1 and 65535 (got 0)"
        );
    }

    #[test]
    fn io_helper_keeps_source() {
        let err = ConfigError::io("config.read", "config.json", io::Error::other("denied"));
        assert_eq!(err.to_string(), "filesystem operation failed");
        assert!(err.source().is_some());
        assert!(err.violations().is_empty());
    }
}
