//! Contracts of the two remote collaborators.
//!
//! The sync engine only ever talks to these traits; the HTTP clients in
//! `tabsync-clients` and the in-memory stores in `tabsync-sync` implement
//! them. Every call may fail with a [`RemoteError`] tagged transient or
//! permanent, which decides whether the engine retries it.

use crate::error::RemoteError;
use crate::types::{Properties, PropertySchema, Record, RecordId, Row, RowNumber};

/// The structured, property-typed record store.
pub trait RecordStore: Send + Sync {
    /// Property schema of the database.
    fn get_schema(&self) -> Result<PropertySchema, RemoteError>;

    /// Every record, in the store's native listing order.
    fn list_records(&self) -> Result<Vec<Record>, RemoteError>;

    /// Create a record and return its newly assigned identifier.
    fn create_record(&self, properties: &Properties) -> Result<RecordId, RemoteError>;

    /// Overwrite the given properties of an existing record.
    fn update_record(&self, id: &RecordId, properties: &Properties) -> Result<(), RemoteError>;
}

/// The flat spreadsheet.
pub trait SheetStore: Send + Sync {
    /// Cells of row 1. Empty when the sheet has no header.
    fn get_header(&self) -> Result<Vec<String>, RemoteError>;

    /// Every row below the header, top to bottom, with its 1-based number.
    fn get_all_rows(&self) -> Result<Vec<Row>, RemoteError>;

    /// Append a row after the last occupied one and return its number.
    fn append_row(&self, values: &[String]) -> Result<RowNumber, RemoteError>;

    /// Overwrite the cells of an existing row, starting at column A.
    fn update_row(&self, row: RowNumber, values: &[String]) -> Result<(), RemoteError>;
}
