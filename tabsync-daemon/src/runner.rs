//! Single-slot sync queue.
//!
//! At most one run is in flight. A second request while one is running is
//! rejected with [`DaemonError::Busy`] rather than queued behind it, so a
//! forward and a reverse run can never interleave against the same sheet.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

use tabsync_sync::{CancelFlag, Direction, RunOptions, SyncError, SyncProgress, SyncReport};

use crate::error::DaemonError;

/// The blocking work behind one job.
pub type SyncFn = dyn Fn(Direction, &RunOptions) -> Result<SyncReport, SyncError> + Send + Sync;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InFlight {
    pub direction: Direction,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
}

/// Snapshot returned by the `status` command.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunnerStatus {
    pub in_flight: Option<InFlight>,
    pub cancel_requested: bool,
    pub completed_runs: u64,
    pub last_report: Option<SyncReport>,
    pub last_error: Option<String>,
}

struct SyncJob {
    direction: Direction,
    dry_run: bool,
    respond_to: oneshot::Sender<Result<SyncReport, String>>,
}

#[derive(Clone)]
pub struct SyncRunner {
    jobs: mpsc::Sender<SyncJob>,
    state: Arc<RwLock<RunnerStatus>>,
    cancel: CancelFlag,
}

impl SyncRunner {
    /// Spawn the processor task on the current tokio runtime.
    pub fn spawn(
        sync: Arc<SyncFn>,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> (Self, JoinHandle<Result<(), DaemonError>>) {
        let (jobs, job_rx) = mpsc::channel::<SyncJob>(1);
        let runner = Self {
            jobs,
            state: Arc::new(RwLock::new(RunnerStatus::default())),
            cancel: CancelFlag::new(),
        };
        let handle = {
            let state = runner.state.clone();
            let cancel = runner.cancel.clone();
            tokio::spawn(processor_task(sync, state, cancel, job_rx, shutdown_rx))
        };
        (runner, handle)
    }

    /// Run one sync and wait for its report.
    pub async fn submit(&self, direction: Direction, dry_run: bool) -> Result<SyncReport, DaemonError> {
        {
            let mut state = self.state.write().await;
            if let Some(current) = &state.in_flight {
                return Err(DaemonError::Busy {
                    direction: current.direction,
                });
            }
            state.in_flight = Some(InFlight {
                direction,
                dry_run,
                started_at: Utc::now(),
            });
            state.cancel_requested = false;
            self.cancel.reset();
        }

        let (tx, rx) = oneshot::channel();
        let job = SyncJob {
            direction,
            dry_run,
            respond_to: tx,
        };
        if self.jobs.send(job).await.is_err() {
            self.state.write().await.in_flight = None;
            return Err(DaemonError::ChannelClosed("sync queue"));
        }

        let outcome = rx
            .await
            .map_err(|_| DaemonError::ChannelClosed("sync response"))?;
        outcome.map_err(DaemonError::SyncFailed)
    }

    /// Ask the in-flight run to stop after its current item. Returns whether
    /// there was a run to cancel.
    pub async fn cancel(&self) -> bool {
        let mut state = self.state.write().await;
        if state.in_flight.is_none() {
            return false;
        }
        state.cancel_requested = true;
        self.cancel.cancel();
        true
    }

    pub async fn status(&self) -> RunnerStatus {
        self.state.read().await.clone()
    }
}

async fn processor_task(
    sync: Arc<SyncFn>,
    state: Arc<RwLock<RunnerStatus>>,
    cancel: CancelFlag,
    mut job_rx: mpsc::Receiver<SyncJob>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            maybe_job = job_rx.recv() => {
                let Some(job) = maybe_job else { break };
                let direction = job.direction;
                tracing::info!(%direction, dry_run = job.dry_run, "sync started");

                let mut options = RunOptions::default()
                    .with_cancel(cancel.clone())
                    .with_progress(log_progress);
                options.dry_run = job.dry_run;
                let sync = sync.clone();
                let result = tokio::task::spawn_blocking(move || sync(direction, &options))
                    .await
                    .map_err(|err| format!("sync task join error: {err}"))
                    .and_then(|result| result.map_err(|err| err.to_string()));

                let outcome = {
                    let mut state = state.write().await;
                    state.in_flight = None;
                    match result {
                        Ok(report) => {
                            tracing::info!(summary = %report.summary(), "sync finished");
                            state.completed_runs += 1;
                            state.last_report = Some(report.clone());
                            state.last_error = None;
                            Ok(report)
                        }
                        Err(message) => {
                            tracing::error!(error = %message, "sync failed");
                            state.last_error = Some(message.clone());
                            Err(message)
                        }
                    }
                };

                let _ = job.respond_to.send(outcome);
            }
        }
    }

    Ok(())
}

fn log_progress(event: SyncProgress) {
    match event {
        SyncProgress::ItemDone {
            index,
            total,
            item,
            outcome,
        } => tracing::debug!(index, total, %item, ?outcome, "item done"),
        other => tracing::debug!(event = ?other, "sync progress"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tabsync_core::ConfigError;

    fn ok_sync() -> Arc<SyncFn> {
        Arc::new(
            |direction: Direction, options: &RunOptions| -> Result<SyncReport, SyncError> {
                Ok(SyncReport::new(direction, options.dry_run))
            },
        )
    }

    /// Blocks until cancelled, then reports a cancelled run.
    fn blocking_sync() -> Arc<SyncFn> {
        Arc::new(|direction: Direction, options: &RunOptions| -> Result<SyncReport, SyncError> {
            while !options.cancel.is_cancelled() {
                std::thread::sleep(Duration::from_millis(5));
            }
            let mut report = SyncReport::new(direction, options.dry_run);
            report.cancelled = true;
            Ok(report)
        })
    }

    async fn wait_for_in_flight(runner: &SyncRunner) {
        for _ in 0..200 {
            if runner.status().await.in_flight.is_some() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("run never became in flight");
    }

    #[tokio::test]
    async fn completed_run_is_recorded_in_status() {
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (runner, _handle) = SyncRunner::spawn(ok_sync(), shutdown_rx);

        let report = runner.submit(Direction::Reverse, true).await.expect("run");
        assert_eq!(report.direction, Direction::Reverse);
        assert!(report.dry_run);

        let status = runner.status().await;
        assert!(status.in_flight.is_none());
        assert_eq!(status.completed_runs, 1);
        assert_eq!(status.last_report, Some(report));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn second_request_is_rejected_while_one_is_in_flight() {
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (runner, _handle) = SyncRunner::spawn(blocking_sync(), shutdown_rx);

        let first = {
            let runner = runner.clone();
            tokio::spawn(async move { runner.submit(Direction::Forward, false).await })
        };
        wait_for_in_flight(&runner).await;

        let err = runner
            .submit(Direction::Reverse, false)
            .await
            .expect_err("busy");
        assert!(matches!(
            err,
            DaemonError::Busy {
                direction: Direction::Forward
            }
        ));

        assert!(runner.cancel().await);
        let report = first.await.expect("join").expect("first run");
        assert!(report.cancelled);
        assert!(!runner.cancel().await, "nothing left to cancel");
    }

    #[tokio::test]
    async fn failed_run_keeps_error_and_frees_the_slot() {
        let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let sync: Arc<SyncFn> =
            Arc::new(|_: Direction, _: &RunOptions| -> Result<SyncReport, SyncError> {
                Err(SyncError::Config(ConfigError::MissingKey("notion.api_key")))
            });
        let (runner, _handle) = SyncRunner::spawn(sync, shutdown_rx);

        let err = runner
            .submit(Direction::Forward, false)
            .await
            .expect_err("config error");
        assert!(matches!(err, DaemonError::SyncFailed(ref m) if m.contains("notion.api_key")));

        let status = runner.status().await;
        assert!(status.in_flight.is_none());
        assert_eq!(status.completed_runs, 0);
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn stopped_processor_closes_the_queue() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let (runner, handle) = SyncRunner::spawn(ok_sync(), shutdown_rx);
        shutdown_tx.send(()).expect("shutdown");
        handle.await.expect("join").expect("processor");

        let err = runner
            .submit(Direction::Forward, false)
            .await
            .expect_err("closed");
        assert!(matches!(err, DaemonError::ChannelClosed(_)));
        assert!(runner.status().await.in_flight.is_none());
    }
}
