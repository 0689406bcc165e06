//! # tabsync-clients
//!
//! Blocking HTTP implementations of the two collaborator traits:
//! [`NotionClient`] ([`RecordStore`](tabsync_core::RecordStore)) and
//! [`SheetsClient`] ([`SheetStore`](tabsync_core::SheetStore)), plus the
//! config-only entry points used by the CLI and the daemon.

mod http;
pub mod notion;
pub mod sheets;

pub use notion::NotionClient;
pub use sheets::SheetsClient;

use tabsync_core::SyncConfig;
use tabsync_sync::{Direction, RunOptions, SyncError, SyncReport};

/// Build both clients from a config.
pub fn connect(config: &SyncConfig) -> (NotionClient, SheetsClient) {
    (
        NotionClient::new(&config.notion),
        SheetsClient::new(&config.google_sheets),
    )
}

/// Run `direction` against the remote services named in `config`.
pub fn run(
    direction: Direction,
    config: &SyncConfig,
    options: &RunOptions,
) -> Result<SyncReport, SyncError> {
    config.validate()?;
    let (notion, sheets) = connect(config);
    tabsync_sync::run(direction, config, &notion, &sheets, options)
}

/// Store → sheet over HTTP.
pub fn run_forward_sync(config: &SyncConfig, options: &RunOptions) -> Result<SyncReport, SyncError> {
    run(Direction::Forward, config, options)
}

/// Sheet → store over HTTP.
pub fn run_reverse_sync(config: &SyncConfig, options: &RunOptions) -> Result<SyncReport, SyncError> {
    run(Direction::Reverse, config, options)
}
