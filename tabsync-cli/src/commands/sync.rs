//! `tabsync forward` / `tabsync reverse`: run one direction in the foreground.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use tabsync_core::config;
use tabsync_sync::{Direction, ItemOutcome, RunOptions, SyncProgress, SyncReport};

use super::load_config;

/// Arguments shared by `tabsync forward` and `tabsync reverse`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Config file (defaults to ~/.tabsync/config.yaml).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Compute every change without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the full report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self, direction: Direction) -> Result<()> {
        let config = load_config(self.config.as_ref())?;

        let home = config::home_dir().context("failed to locate the sync lock directory")?;
        let mut options = RunOptions::default().with_lock_dir(config::tabsync_root(&home));
        options.dry_run = self.dry_run;
        if !self.json {
            options = options.with_progress(print_progress);
        }

        let report = tabsync_clients::run(direction, &config, &options)
            .with_context(|| format!("{direction} sync failed"))?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report JSON")?
            );
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

fn print_progress(event: SyncProgress) {
    match event {
        SyncProgress::Fetched { total } => println!("{total} item(s) to check"),
        SyncProgress::ItemDone {
            index,
            total,
            item,
            outcome,
        } => {
            let marker = match outcome {
                ItemOutcome::Created => "+".green(),
                ItemOutcome::Updated => "~".yellow(),
                ItemOutcome::Failed => "✗".red(),
                ItemOutcome::Skipped => return,
            };
            println!("  {marker} [{index}/{total}] {item}");
        }
        SyncProgress::Started { .. } | SyncProgress::Finished { .. } => {}
    }
}

#[derive(Tabled)]
struct FailureRow {
    #[tabled(rename = "item")]
    item: String,
    #[tabled(rename = "kind")]
    kind: String,
    #[tabled(rename = "error")]
    message: String,
}

fn print_report(report: &SyncReport) {
    let prefix = if report.dry_run { "[dry-run] " } else { "" };
    let summary = report.summary();
    if report.has_failures() {
        println!("{prefix}{} {summary}", "✗".red());
    } else {
        println!("{prefix}{} {summary}", "✓".green());
    }

    for warning in &report.warnings {
        println!("  {} {warning}", "!".yellow());
    }

    if report.has_failures() {
        let rows: Vec<FailureRow> = report
            .failures
            .iter()
            .map(|f| FailureRow {
                item: f.item.clone(),
                kind: f.kind.as_str().to_string(),
                message: f.message.clone(),
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    if report.cancelled {
        println!("{}", "run cancelled; re-run to finish the remaining items".yellow());
    }
}
