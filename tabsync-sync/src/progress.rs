//! Progress events and cancellation for a running sync.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::report::Direction;

/// Outcome of one item, as reported by [`SyncProgress::ItemDone`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemOutcome {
    Created,
    Updated,
    Skipped,
    Failed,
}

/// Events emitted while a run progresses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncProgress {
    Started { direction: Direction },
    /// Source items listed; `total` is how many will be looked at.
    Fetched { total: usize },
    ItemDone {
        /// 1-based.
        index: usize,
        total: usize,
        item: String,
        outcome: ItemOutcome,
    },
    Finished {
        created: usize,
        updated: usize,
        skipped: usize,
        failed: usize,
        cancelled: bool,
    },
}

/// Receives [`SyncProgress`] events. Called on the sync worker thread.
pub type ProgressCallback = dyn Fn(SyncProgress) + Send + Sync;

/// Send `event` to `callback` if one is set.
pub fn emit(callback: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = callback {
        cb(event);
    }
}

/// Shared stop request. The engine checks it between items, so a run stops
/// after the item in progress completes.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
