//! Shared sync pipeline entrypoint used by CLI and daemon.
//!
//! A run is strictly sequential: validate config, resolve schemas, list both
//! sides, then walk the source items one at a time. Fatal errors can only
//! happen before the item loop; inside it every failure lands in the report.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tabsync_core::{RecordStore, SheetStore, SyncConfig};

use crate::error::SyncError;
use crate::index::RowIndex;
use crate::lock::{SyncLock, SyncSlot};
use crate::progress::{emit, CancelFlag, ItemOutcome, ProgressCallback, SyncProgress};
use crate::report::{Direction, SyncReport, SyncWarning};
use crate::schema::{self, ResolvedSchema};
use crate::throttle::Throttle;
use crate::{forward, reverse};

/// Per-invocation knobs that are not part of the config file.
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Compute and count every decision, issue no writes.
    pub dry_run: bool,
    pub cancel: CancelFlag,
    pub progress: Option<Arc<ProgressCallback>>,
    /// Directory for the cross-process `sync.lock`. `None` only guards
    /// against other runs in this process.
    pub lock_dir: Option<PathBuf>,
}

impl RunOptions {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(SyncProgress) + Send + Sync + 'static,
    {
        let callback: Arc<ProgressCallback> = Arc::new(callback);
        self.progress = Some(callback);
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_lock_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.lock_dir = Some(dir.into());
        self
    }
}

impl fmt::Debug for RunOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunOptions")
            .field("dry_run", &self.dry_run)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .field("lock_dir", &self.lock_dir)
            .finish()
    }
}

/// Store → sheet.
pub fn run_forward_sync(
    config: &SyncConfig,
    records: &dyn RecordStore,
    sheet: &dyn SheetStore,
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    run(Direction::Forward, config, records, sheet, options)
}

/// Sheet → store.
pub fn run_reverse_sync(
    config: &SyncConfig,
    records: &dyn RecordStore,
    sheet: &dyn SheetStore,
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    run(Direction::Reverse, config, records, sheet, options)
}

/// Run one direction to completion (or cancellation).
///
/// Returns [`SyncError::Busy`] if another run already targets the same
/// store and sheet, in this process or (with a lock dir) in another one.
pub fn run(
    direction: Direction,
    config: &SyncConfig,
    records: &dyn RecordStore,
    sheet: &dyn SheetStore,
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    config.validate()?;
    let _slot = SyncSlot::acquire(config)?;
    let _lock = options
        .lock_dir
        .as_deref()
        .map(|dir| SyncLock::acquire(dir, direction))
        .transpose()?;

    let callback = options.progress.as_deref();
    let mut report = SyncReport::new(direction, options.dry_run);
    emit(callback, SyncProgress::Started { direction });
    tracing::info!(
        "{direction} sync started{}",
        if options.dry_run { " [dry-run]" } else { "" }
    );

    let mut throttle = Throttle::from_config(config);
    let schema = schema::resolve(records, sheet, &config.identifier_column, &mut throttle)?;
    report.ignored_properties = schema.mapping.ignored_properties.clone();
    report.ignored_columns = schema.mapping.ignored_columns.clone();

    {
        let mut run = SyncRun {
            records,
            sheet,
            schema: &schema,
            options,
            throttle: &mut throttle,
            report: &mut report,
        };
        match direction {
            Direction::Forward => forward::run(&mut run)?,
            Direction::Reverse => reverse::run(&mut run)?,
        }
    }

    report.finish();
    tracing::info!("{} ({} remote calls)", report.summary(), throttle.calls());
    emit(
        callback,
        SyncProgress::Finished {
            created: report.created,
            updated: report.updated,
            skipped: report.skipped,
            failed: report.failed,
            cancelled: report.cancelled,
        },
    );
    Ok(report)
}

// ---------------------------------------------------------------------------
// Per-run state shared by both directions
// ---------------------------------------------------------------------------

pub(crate) struct SyncRun<'a> {
    pub records: &'a dyn RecordStore,
    pub sheet: &'a dyn SheetStore,
    pub schema: &'a ResolvedSchema,
    pub options: &'a RunOptions,
    pub throttle: &'a mut Throttle,
    pub report: &'a mut SyncReport,
}

impl SyncRun<'_> {
    pub fn dry_run(&self) -> bool {
        self.options.dry_run
    }

    /// Check the cancel flag between items.
    pub fn stop_requested(&mut self) -> bool {
        if !self.options.cancel.is_cancelled() {
            return false;
        }
        if !self.report.cancelled {
            tracing::info!("{} sync: cancelled", self.report.direction);
            self.report.cancelled = true;
        }
        true
    }

    pub fn report_duplicates(&mut self, index: &RowIndex) {
        for dup in &index.duplicates {
            self.report.warn(SyncWarning::DuplicateIdentifier {
                id: dup.id.clone(),
                row: dup.row,
                first_row: dup.first_row,
            });
        }
    }

    pub fn fetched(&self, total: usize) {
        emit(self.options.progress.as_deref(), SyncProgress::Fetched { total });
    }

    pub fn item_done(&self, index: usize, total: usize, item: String, outcome: ItemOutcome) {
        emit(
            self.options.progress.as_deref(),
            SyncProgress::ItemDone {
                index,
                total,
                item,
                outcome,
            },
        );
    }
}
