//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::NaiveDate;
use tabsync_core::{PropertySchema, PropertyValue, Record, RecordId, SyncConfig};
use tabsync_sync::memory::{MemoryRecordStore, MemorySheet};

pub const HEADER: [&str; 8] = [
    "Name",
    "Status",
    "Tags",
    "Done",
    "Due",
    "Owner",
    "Notes",
    "Notion Page ID",
];

pub const NAME: usize = 0;
pub const STATUS: usize = 1;
pub const TAGS: usize = 2;
pub const DONE: usize = 3;
pub const DUE: usize = 4;
pub const OWNER: usize = 5;
pub const NOTES: usize = 6;
pub const ID: usize = 7;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

static NEXT_SHEET: AtomicUsize = AtomicUsize::new(0);

/// Valid config with no pacing and near-instant retries.
///
/// Every call names a fresh spreadsheet id: tests run in parallel threads
/// and two runs on the same target would reject each other.
pub fn config() -> SyncConfig {
    let sheet = NEXT_SHEET.fetch_add(1, Ordering::Relaxed);
    config_for(&format!("sheet-{sheet}"))
}

pub fn config_for(spreadsheet_id: &str) -> SyncConfig {
    SyncConfig::from_yaml_str(
        &format!(
            r#"
notion:
  api_key: secret
  database_id: db
google_sheets:
  spreadsheet_id: {spreadsheet_id}
  access_token: token
rate_limit_delay_ms: 0
retry:
  max_attempts: 3
  initial_backoff_ms: 0
  max_backoff_ms: 1
"#
        ),
        Path::new("test.yaml"),
    )
    .expect("test config")
}

pub fn schema() -> PropertySchema {
    PropertySchema::from_tags([
        ("Name", "title"),
        ("Status", "status"),
        ("Tags", "multi_select"),
        ("Done", "checkbox"),
        ("Due", "date"),
        ("Owner", "people"),
        ("Score", "number"),
    ])
}

pub fn store() -> MemoryRecordStore {
    MemoryRecordStore::new(schema())
}

pub fn empty_sheet() -> MemorySheet {
    MemorySheet::new(&HEADER)
}

pub fn text(s: &str) -> PropertyValue {
    PropertyValue::Text(s.to_string())
}

pub fn record(id: &str, name: &str, status: &str, tags: &[&str], done: bool) -> Record {
    Record {
        id: RecordId::from(id),
        properties: [
            ("Name".to_string(), text(name)),
            ("Status".to_string(), text(status)),
            (
                "Tags".to_string(),
                PropertyValue::Options(tags.iter().map(|t| t.to_string()).collect()),
            ),
            ("Done".to_string(), PropertyValue::Checkbox(done)),
            (
                "Due".to_string(),
                PropertyValue::Date {
                    start: NaiveDate::from_ymd_opt(2023, 12, 1).expect("date"),
                    end: None,
                },
            ),
            (
                "Owner".to_string(),
                PropertyValue::People(vec!["Ada Lovelace".to_string()]),
            ),
            ("Score".to_string(), PropertyValue::Number(7.0)),
        ]
        .into_iter()
        .collect(),
    }
}

/// Identifiers found in the sheet's identifier column, in row order.
pub fn sheet_ids(sheet: &MemorySheet) -> Vec<String> {
    sheet
        .grid()
        .iter()
        .skip(1)
        .filter_map(|row| row.get(ID).cloned())
        .filter(|id| !id.trim().is_empty())
        .collect()
}
