//! tabsync: keep a Notion database and a Google Sheet in step.
//!
//! # Usage
//!
//! ```text
//! tabsync init
//! tabsync schema [--config <path>] [--json]
//! tabsync forward [--config <path>] [--dry-run] [--json]
//! tabsync reverse [--config <path>] [--dry-run] [--json]
//! tabsync daemon start|stop|status|sync|cancel
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{daemon::DaemonCommand, init::InitArgs, schema::SchemaArgs, sync::SyncArgs};
use tabsync_sync::Direction;

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "tabsync",
    version,
    about = "Two-way sync between a Notion database and a Google Sheet",
    long_about = None,
)]
struct Cli {
    /// Log verbosity for the sync engine (error, warn, info, debug, trace).
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a config template to ~/.tabsync/config.yaml.
    Init(InitArgs),

    /// Show how database properties map onto sheet columns.
    Schema(SchemaArgs),

    /// Push database records into the sheet.
    Forward(SyncArgs),

    /// Push sheet rows into the database.
    Reverse(SyncArgs),

    /// Manage the background sync daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    // The daemon installs its own tracing subscriber, which also captures
    // `log` records from the engine.
    if !matches!(
        cli.command,
        Commands::Daemon {
            command: DaemonCommand::Start
        }
    ) {
        env_logger::Builder::new()
            .parse_filters(&cli.log_level)
            .format_target(false)
            .init();
    }

    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Schema(args) => args.run(),
        Commands::Forward(args) => args.run(Direction::Forward),
        Commands::Reverse(args) => args.run(Direction::Reverse),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
