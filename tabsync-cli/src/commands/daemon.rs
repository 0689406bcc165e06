//! `tabsync daemon`: background runner lifecycle and remote control.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;

use tabsync_daemon::paths::socket_path;
use tabsync_daemon::{
    request_cancel, request_status, request_stop, request_sync, start_blocking, DaemonError,
};
use tabsync_sync::Direction;

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (runner + socket server).
    Start,
    /// Request graceful daemon shutdown over the Unix socket.
    Stop,
    /// Query runner status over the Unix socket.
    Status,
    /// Ask the daemon to run one sync and wait for its report.
    Sync(DaemonSyncArgs),
    /// Stop the in-flight run after its current item.
    Cancel,
}

#[derive(Args, Debug)]
pub struct DaemonSyncArgs {
    /// `forward` (database → sheet) or `reverse` (sheet → database).
    pub direction: Direction,

    /// Compute every change without writing anything.
    #[arg(long)]
    pub dry_run: bool,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = dirs::home_dir().context("could not determine home directory")?;

    match command {
        DaemonCommand::Start => {
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_stop(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => match request_status(&home) {
            Ok(status) => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&status)
                        .context("failed to render daemon status JSON")?
                );
            }
            Err(DaemonError::DaemonNotRunning { .. }) => {
                let payload = serde_json::json!({
                    "running": false,
                    "socket": socket_path(&home).display().to_string(),
                });
                println!(
                    "{}",
                    serde_json::to_string_pretty(&payload)
                        .context("failed to render daemon status JSON")?
                );
            }
            Err(err) => return Err(err).context("failed to query daemon status"),
        },
        DaemonCommand::Sync(args) => {
            let data = request_sync(&home, args.direction, args.dry_run)
                .with_context(|| format!("daemon {} sync failed", args.direction))?;
            let summary = data["summary"].as_str().unwrap_or("sync finished");
            println!("{} {summary}", "✓".green());
        }
        DaemonCommand::Cancel => {
            let data = request_cancel(&home).context("failed to cancel daemon run")?;
            if data["cancelled"].as_bool().unwrap_or(false) {
                println!("cancellation requested; the run stops after its current item");
            } else {
                println!("no sync is running");
            }
        }
    }

    Ok(())
}
