//! Background sync daemon: single-slot run queue + Unix socket server.

mod error;
pub mod paths;
pub mod protocol;
pub mod runner;
mod runtime;

pub use error::DaemonError;
pub use protocol::{
    request_cancel, request_status, request_stop, request_sync, send_request, DaemonRequest,
    DaemonResponse,
};
pub use runner::{InFlight, RunnerStatus, SyncFn, SyncRunner};
pub use runtime::{run, run_with, start_blocking};
