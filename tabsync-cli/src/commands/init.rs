//! `tabsync init`: write the config template.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use tabsync_core::config;

#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let (path, written) = config::write_template().context("failed to write config template")?;
        if written {
            println!("{} wrote {}", "✓".green(), path.display());
            println!("  fill in the Notion and Google Sheets credentials, then run `tabsync schema`");
        } else {
            println!("config already exists at {}, left untouched", path.display());
        }
        Ok(())
    }
}
