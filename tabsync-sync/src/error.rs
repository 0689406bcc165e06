//! Error types for tabsync-sync.
//!
//! Only failures that abort a whole run live here. Anything that goes wrong
//! with a single record or row is recorded in the
//! [`SyncReport`](crate::report::SyncReport) instead.

use std::path::PathBuf;

use thiserror::Error;

use tabsync_core::{ConfigError, RemoteError};

/// Fatal, pre-run errors of a sync invocation.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The config failed validation.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Fetching the property schema or the header row failed after retry.
    #[error("failed to fetch {what}: {source}")]
    SchemaFetch {
        what: &'static str,
        #[source]
        source: RemoteError,
    },

    /// Row 1 of the sheet is missing or blank.
    #[error("the sheet has no header row")]
    EmptyHeader,

    /// The header row does not contain the configured identifier column.
    #[error("identifier column '{column}' is missing from the sheet header")]
    IdentifierColumnMissing { column: String },

    /// Listing records or rows at the start of a run failed after retry.
    #[error("failed to list {what}: {source}")]
    Fetch {
        what: &'static str,
        #[source]
        source: RemoteError,
    },

    /// Another run already holds the target.
    #[error("another sync is already running: {holder}")]
    Busy { holder: String },

    #[error("failed to manage sync lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SyncError {
    /// Whether the error belongs to the configuration class (raised before
    /// any data is read).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SyncError::Config(_) | SyncError::IdentifierColumnMissing { .. }
        )
    }
}

/// Convenience constructor for [`SyncError::SchemaFetch`].
pub(crate) fn schema_err(what: &'static str) -> impl FnOnce(RemoteError) -> SyncError {
    move |source| SyncError::SchemaFetch { what, source }
}

/// Convenience constructor for [`SyncError::Fetch`].
pub(crate) fn fetch_err(what: &'static str) -> impl FnOnce(RemoteError) -> SyncError {
    move |source| SyncError::Fetch { what, source }
}
