//! `tabsync schema`: resolve both schemas and print the field mapping.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use tabsync_sync::{schema, ResolvedSchema, Throttle};

use super::load_config;

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Config file (defaults to ~/.tabsync/config.yaml).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled, Serialize)]
struct FieldRow {
    #[tabled(rename = "column")]
    column: String,
    #[tabled(rename = "property")]
    property: String,
    #[tabled(rename = "type")]
    ty: String,
    #[tabled(rename = "reverse")]
    reverse: String,
}

#[derive(Serialize)]
struct SchemaJson {
    fields: Vec<FieldRow>,
    identifier_column: String,
    ignored_properties: Vec<String>,
    ignored_columns: Vec<String>,
}

impl SchemaArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config(self.config.as_ref())?;
        let (notion, sheets) = tabsync_clients::connect(&config);
        let mut throttle = Throttle::from_config(&config);
        let resolved = schema::resolve(&notion, &sheets, &config.identifier_column, &mut throttle)
            .context("failed to resolve schemas")?;

        let payload = build(&resolved, &config.identifier_column);
        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&payload).context("failed to serialize schema JSON")?
            );
            return Ok(());
        }
        print_table(payload);
        Ok(())
    }
}

fn build(resolved: &ResolvedSchema, identifier_column: &str) -> SchemaJson {
    let fields = resolved
        .mapping
        .fields
        .iter()
        .map(|field| FieldRow {
            column: column_letter(field.column),
            property: field.name.clone(),
            ty: field.ty.tag().to_string(),
            reverse: if field.ty.is_writable() {
                "written".to_string()
            } else {
                "read-only".to_string()
            },
        })
        .collect();
    SchemaJson {
        fields,
        identifier_column: format!(
            "{} ({})",
            identifier_column,
            column_letter(resolved.mapping.id_column)
        ),
        ignored_properties: resolved.mapping.ignored_properties.clone(),
        ignored_columns: resolved.mapping.ignored_columns.clone(),
    }
}

fn print_table(payload: SchemaJson) {
    println!(
        "{} field(s) mapped, identifier column {}",
        payload.fields.len(),
        payload.identifier_column.bold()
    );
    if !payload.fields.is_empty() {
        let mut table = Table::new(payload.fields);
        table.with(Style::rounded());
        println!("{table}");
    }
    if !payload.ignored_properties.is_empty() {
        println!(
            "{} properties with no column: {}",
            "·".bright_black(),
            payload.ignored_properties.join(", ")
        );
    }
    if !payload.ignored_columns.is_empty() {
        println!(
            "{} columns with no property: {}",
            "·".bright_black(),
            payload.ignored_columns.join(", ")
        );
    }
}

/// Zero-based column index to A1 letters (0 → A, 26 → AA).
fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}
