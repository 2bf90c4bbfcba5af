//! # Design
//!
//! - Constant messages; operation names, status codes, and bodies travel as
//!   fields.
//! - Transport failures and server-side 5xx responses are transient; rejected
//!   credentials and other HTTP statuses are fatal.

use offload_core::AdapterError;
use thiserror::Error;

/// Result alias for qBittorrent client operations.
pub type QbitResult<T> = Result<T, QbitError>;

/// Errors produced by the qBittorrent client.
#[derive(Debug, Error)]
pub enum QbitError {
    /// The HTTP client could not be constructed.
    #[error("failed to build qBittorrent HTTP client")]
    ClientBuild {
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// The request did not complete.
    #[error("qBittorrent request failed")]
    Request {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
    /// The Web UI refused the configured credentials.
    #[error("qBittorrent rejected the credentials")]
    LoginRejected {
        /// HTTP status of the login response.
        status: u16,
        /// Response body (qBittorrent answers `Fails.` on bad credentials).
        body: String,
    },
    /// The server answered with an unexpected HTTP status.
    #[error("qBittorrent returned an unexpected status")]
    Status {
        /// Operation identifier.
        operation: &'static str,
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },
    /// The response body could not be decoded.
    #[error("failed to decode qBittorrent response")]
    Decode {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying reqwest error.
        #[source]
        source: reqwest::Error,
    },
}

impl QbitError {
    pub(crate) const fn request(operation: &'static str, source: reqwest::Error) -> Self {
        Self::Request { operation, source }
    }

    /// Whether a later attempt may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Request { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            Self::ClientBuild { .. } | Self::LoginRejected { .. } | Self::Decode { .. } => false,
        }
    }

    const fn operation(&self) -> &'static str {
        match self {
            Self::ClientBuild { .. } => "qbit.client",
            Self::LoginRejected { .. } => "qbit.login",
            Self::Request { operation, .. }
            | Self::Status { operation, .. }
            | Self::Decode { operation, .. } => operation,
        }
    }
}

impl From<QbitError> for AdapterError {
    fn from(error: QbitError) -> Self {
        let operation = error.operation();
        if error.is_transient() {
            return Self::transient(operation, error);
        }
        match error {
            QbitError::ClientBuild { source } => {
                Self::fatal(operation, "client build failed", Some(source.to_string()))
            }
            QbitError::LoginRejected { status, body } => Self::fatal(
                operation,
                "credentials rejected",
                Some(format!("status {status}: {}", body.trim())),
            ),
            QbitError::Status { status, body, .. } => Self::fatal(
                operation,
                "unexpected status",
                Some(format!("status {status}: {}", body.trim())),
            ),
            QbitError::Decode { source, .. } => {
                Self::fatal(operation, "invalid response", Some(source.to_string()))
            }
            QbitError::Request { source, .. } => Self::transient(operation, source),
        }
    }
}
