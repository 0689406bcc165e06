//! Error types for tabsync-core.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::PropertyType;

/// Failures converting between property values and cell strings.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    /// The store reported a type tag outside the supported set.
    #[error("unsupported property type '{tag}'")]
    UnsupportedType { tag: String },

    /// A read-only property type was asked to decode a cell for writing.
    #[error("property type '{ty}' is read-only and cannot be written")]
    UnsupportedWrite { ty: PropertyType },

    /// The cell text is not a valid value of the target type.
    #[error("invalid {ty} value '{value}': {reason}")]
    InvalidValue {
        ty: PropertyType,
        value: String,
        reason: String,
    },

    /// The stored value shape does not match the schema type.
    #[error("expected a {expected} value, found {found}")]
    Mismatch {
        expected: PropertyType,
        found: &'static str,
    },
}

/// Configuration loading and validation failures. Always fatal, always
/// raised before any remote call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML/JSON parse error, with the offending path.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    #[error("missing required configuration key: {0}")]
    MissingKey(&'static str),

    #[error("invalid configuration value for '{key}': {message}")]
    InvalidValue { key: &'static str, message: String },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// Failure reported by a remote collaborator, tagged by retryability.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Rate limiting, timeouts, 5xx. Worth retrying.
    #[error("transient remote failure{}: {message}", status_suffix(.status))]
    Transient {
        status: Option<u16>,
        message: String,
        retry_after: Option<Duration>,
    },

    /// Authentication, not-found, malformed payload. Never retried.
    #[error("remote request failed{}: {message}", status_suffix(.status))]
    Permanent { status: Option<u16>, message: String },
}

impl RemoteError {
    pub fn transient(message: impl Into<String>) -> Self {
        RemoteError::Transient {
            status: None,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        RemoteError::Permanent {
            status: None,
            message: message.into(),
        }
    }

    /// Classify an HTTP status code: 408, 429 and 5xx are transient.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        if status == 408 || status == 429 || (500..600).contains(&status) {
            RemoteError::Transient {
                status: Some(status),
                message: message.into(),
                retry_after: None,
            }
        } else {
            RemoteError::Permanent {
                status: Some(status),
                message: message.into(),
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transient { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RemoteError::Transient { retry_after, .. } => *retry_after,
            RemoteError::Permanent { .. } => None,
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}
