//! Structured outcome of one sync run.
//!
//! A [`SyncReport`] is what the caller renders: per-direction counts, one
//! [`ItemFailure`] per record or row that could not be synced, and the
//! non-fatal [`SyncWarning`]s collected along the way.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tabsync_core::{CodecError, RecordId, RemoteError, RowNumber};

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which way data flows in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Structured store to sheet.
    Forward,
    /// Sheet to structured store.
    Reverse,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Reverse => "reverse",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forward" | "notion-to-sheets" => Ok(Direction::Forward),
            "reverse" | "sheets-to-notion" => Ok(Direction::Reverse),
            other => Err(format!("unknown direction '{other}' (expected forward or reverse)")),
        }
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// Classification of a per-item failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Still failing after every retry.
    RemoteTransient,
    /// Rejected by the remote; not retried.
    RemotePermanent,
    /// The value carries a type tag the codec does not know.
    UnsupportedType,
    /// A read-only type was asked to accept a write.
    UnsupportedWrite,
    /// A value could not be converted.
    InvalidValue,
    /// The record was created but its identifier could not be stored in the
    /// sheet.
    WriteBack,
}

impl FailureKind {
    pub fn from_remote(err: &RemoteError) -> Self {
        if err.is_transient() {
            FailureKind::RemoteTransient
        } else {
            FailureKind::RemotePermanent
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::RemoteTransient => "remote_transient",
            FailureKind::RemotePermanent => "remote_permanent",
            FailureKind::UnsupportedType => "unsupported_type",
            FailureKind::UnsupportedWrite => "unsupported_write",
            FailureKind::InvalidValue => "invalid_value",
            FailureKind::WriteBack => "write_back",
        }
    }

    pub fn from_codec(err: &CodecError) -> Self {
        match err {
            CodecError::UnsupportedType { .. } => FailureKind::UnsupportedType,
            CodecError::UnsupportedWrite { .. } => FailureKind::UnsupportedWrite,
            CodecError::InvalidValue { .. } | CodecError::Mismatch { .. } => {
                FailureKind::InvalidValue
            }
        }
    }
}

/// One record or row that could not be synced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    /// `record <id>` or `row <n>`.
    pub item: String,
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.item, self.message)
    }
}

/// Label used for a record in failures and progress events.
pub fn record_label(id: &RecordId) -> String {
    format!("record {id}")
}

/// Label used for a row in failures and progress events.
pub fn row_label(row: RowNumber) -> String {
    format!("row {row}")
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Non-fatal conditions collected during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncWarning {
    /// More than one row carries the same identifier. The first row wins.
    DuplicateIdentifier {
        id: RecordId,
        row: RowNumber,
        first_row: RowNumber,
    },
    /// A row's identifier no longer resolves to a record; a new record was
    /// created for it.
    StaleIdentifier { id: RecordId, row: RowNumber },
    /// A cell could not be decoded and its column was left out of the write.
    CellWarning {
        row: RowNumber,
        column: String,
        message: String,
    },
    /// The store listed a record without an identifier.
    MissingIdentifier { position: usize },
}

impl fmt::Display for SyncWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncWarning::DuplicateIdentifier { id, row, first_row } => write!(
                f,
                "row {row} repeats identifier {id} already used by row {first_row}"
            ),
            SyncWarning::StaleIdentifier { id, row } => write!(
                f,
                "row {row} references unknown record {id}; created a new record"
            ),
            SyncWarning::CellWarning {
                row,
                column,
                message,
            } => write!(f, "row {row}, column '{column}' skipped: {message}"),
            SyncWarning::MissingIdentifier { position } => {
                write!(f, "record #{position} has no identifier")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SyncReport
// ---------------------------------------------------------------------------

/// Counts and per-item diagnostics of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    pub direction: Direction,
    pub dry_run: bool,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    pub failed: usize,
    #[serde(default)]
    pub failures: Vec<ItemFailure>,
    #[serde(default)]
    pub warnings: Vec<SyncWarning>,
    /// Store properties with no matching sheet column.
    #[serde(default)]
    pub ignored_properties: Vec<String>,
    /// Sheet columns with no matching store property.
    #[serde(default)]
    pub ignored_columns: Vec<String>,
    /// The run stopped early on request.
    #[serde(default)]
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncReport {
    pub fn new(direction: Direction, dry_run: bool) -> Self {
        Self {
            direction,
            dry_run,
            created: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            failures: Vec::new(),
            warnings: Vec::new(),
            ignored_properties: Vec::new(),
            ignored_columns: Vec::new(),
            cancelled: false,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Record a per-item failure and log it.
    pub fn fail(&mut self, item: String, kind: FailureKind, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{} sync: {item} failed: {message}", self.direction);
        self.failed += 1;
        self.failures.push(ItemFailure {
            item,
            kind,
            message,
        });
    }

    /// Record a warning and log it.
    pub fn warn(&mut self, warning: SyncWarning) {
        tracing::warn!("{} sync: {warning}", self.direction);
        self.warnings.push(warning);
    }

    /// Items written (or that would be written in a dry run).
    pub fn succeeded(&self) -> usize {
        self.created + self.updated
    }

    /// Items looked at, whatever the outcome.
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.skipped + self.failed
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    pub(crate) fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "{}{}: {} created, {} updated, {} skipped, {} failed",
            self.direction,
            if self.dry_run { " (dry run)" } else { "" },
            self.created,
            self.updated,
            self.skipped,
            self.failed
        );
        if !self.warnings.is_empty() {
            line.push_str(&format!(", {} warning(s)", self.warnings.len()));
        }
        if self.cancelled {
            line.push_str(", cancelled");
        }
        line
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_parses_aliases() {
        assert_eq!("Forward".parse::<Direction>().unwrap(), Direction::Forward);
        assert_eq!(
            "sheets-to-notion".parse::<Direction>().unwrap(),
            Direction::Reverse
        );
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn failure_kinds_follow_error_class() {
        assert_eq!(
            FailureKind::from_remote(&RemoteError::from_status(429, "slow")),
            FailureKind::RemoteTransient
        );
        assert_eq!(
            FailureKind::from_remote(&RemoteError::from_status(401, "auth")),
            FailureKind::RemotePermanent
        );
        let err = CodecError::UnsupportedType { tag: "rollup".into() };
        assert_eq!(FailureKind::from_codec(&err), FailureKind::UnsupportedType);
    }

    #[test]
    fn counts_and_summary() {
        let mut report = SyncReport::new(Direction::Reverse, true);
        report.created = 2;
        report.updated = 1;
        report.skipped = 4;
        report.fail(row_label(RowNumber(5)), FailureKind::RemotePermanent, "nope");
        assert_eq!(report.succeeded(), 3);
        assert_eq!(report.processed(), 8);
        assert_eq!(report.failures[0].item, "row 5");
        assert_eq!(
            report.summary(),
            "reverse (dry run): 2 created, 1 updated, 4 skipped, 1 failed"
        );
    }

    #[test]
    fn warnings_render_readably() {
        let warning = SyncWarning::DuplicateIdentifier {
            id: RecordId::from("abc"),
            row: RowNumber(7),
            first_row: RowNumber(3),
        };
        assert_eq!(
            warning.to_string(),
            "row 7 repeats identifier abc already used by row 3"
        );
    }
}
