//! # tabsync-sync
//!
//! Record reconciliation between a structured store and a spreadsheet.
//!
//! Call [`run_forward_sync`] to push store records into the sheet, or
//! [`run_reverse_sync`] to push sheet rows into the store. Both take the
//! collaborators as trait objects and return a [`SyncReport`].

pub mod error;
mod forward;
pub mod index;
pub mod lock;
pub mod memory;
pub mod pipeline;
pub mod progress;
pub mod report;
mod reverse;
pub mod schema;
pub mod throttle;

pub use error::SyncError;
pub use lock::{SyncLock, SyncSlot};
pub use pipeline::{run, run_forward_sync, run_reverse_sync, RunOptions};
pub use progress::{emit, CancelFlag, ItemOutcome, ProgressCallback, SyncProgress};
pub use report::{Direction, FailureKind, ItemFailure, SyncReport, SyncWarning};
pub use schema::{FieldMapping, MappedField, ResolvedSchema};
pub use throttle::{RetryPolicy, Throttle};
