pub mod daemon;
pub mod init;
pub mod schema;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};

use tabsync_core::{config, SyncConfig};

/// Load the config from `--config` or the default location.
pub fn load_config(path: Option<&PathBuf>) -> Result<SyncConfig> {
    match path {
        Some(path) => config::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => config::load().context("failed to load config, run `tabsync init` first"),
    }
}
