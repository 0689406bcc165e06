//! Sheet → store integration tests against the in-memory collaborators.

mod common;

use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use common::*;
use tabsync_core::{PropertyValue, RecordId, RemoteError};
use tabsync_sync::{
    memory::{MemorySheet, StoreOp},
    run_forward_sync, run_reverse_sync, FailureKind, RunOptions, SyncError, SyncProgress,
    SyncReport, SyncWarning,
};

fn row<'a>(name: &'a str, status: &'a str, tags: &'a str, id: &'a str) -> [&'a str; 8] {
    [name, status, tags, "TRUE", "2024-01-15", "", "", id]
}

// ---------------------------------------------------------------------------
// Create, write back, update
// ---------------------------------------------------------------------------

#[test]
fn create_then_update_uses_written_back_identifier() {
    init_logging();
    let store = store();
    let sheet = MemorySheet::with_rows(&HEADER, &[&row("Alpha", "Active", "A, B", "")]);

    let first = run_reverse_sync(&config(), &store, &sheet, &RunOptions::default())
        .expect("first reverse");
    assert_eq!(first.created, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(sheet.cell(2, ID), "page-1");

    let created = store.get(&RecordId::from("page-1")).expect("created record");
    assert_eq!(created.properties["Name"], text("Alpha"));
    assert_eq!(
        created.properties["Tags"],
        PropertyValue::Options(vec!["A".into(), "B".into()])
    );
    assert_eq!(created.properties["Done"], PropertyValue::Checkbox(true));
    assert_eq!(
        created.properties["Due"],
        PropertyValue::Date {
            start: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            end: None
        }
    );

    sheet.set_cell(2, STATUS, "Done");
    let second = run_reverse_sync(&config(), &store, &sheet, &RunOptions::default())
        .expect("second reverse");
    assert_eq!(second.created, 0);
    assert_eq!(second.updated, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(
        store.get(&RecordId::from("page-1")).unwrap().properties["Status"],
        text("Done")
    );
}

#[test]
fn unchanged_rows_are_not_rewritten() {
    let store = store();
    let sheet = MemorySheet::with_rows(&HEADER, &[&row("Alpha", "Active", "A", "")]);
    run_reverse_sync(&config(), &store, &sheet, &RunOptions::default()).expect("first");
    let writes = store.writes();

    let report =
        run_reverse_sync(&config(), &store, &sheet, &RunOptions::default()).expect("second");

    assert_eq!(report.skipped, 1);
    assert_eq!(store.writes(), writes);
}

#[test]
fn write_back_preserves_cells_after_identifier_column() {
    let store = store();
    let sheet = MemorySheet::with_rows(
        &HEADER,
        &[&["Alpha", "", "", "", "", "", "", "", "extra"]],
    );
    run_reverse_sync(&config(), &store, &sheet, &RunOptions::default()).expect("reverse");
    assert_eq!(sheet.cell(2, ID), "page-1");
    assert_eq!(sheet.cell(2, ID + 1), "extra");
}

// ---------------------------------------------------------------------------
// Skips
// ---------------------------------------------------------------------------

#[test]
fn blank_rows_are_skipped() {
    let store = store();
    let sheet = MemorySheet::with_rows(
        &HEADER,
        &[
            &["", "", "", "", "", "", "", ""],
            &["", "", "", "", "", "", "only a note", ""],
            &[],
            &row("Real", "Active", "", ""),
        ],
    );

    let report = run_reverse_sync(&config(), &store, &sheet, &RunOptions::default())
        .expect("reverse");

    assert_eq!(report.created, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(report.skipped, 3);
    assert_eq!(store.len(), 1);
    assert_eq!(sheet.cell(2, ID), "");
    assert_eq!(sheet.cell(5, ID), "page-1");
}

#[test]
fn read_only_columns_are_never_written() {
    let store = store();
    let mut cells = row("Alpha", "Active", "", "");
    cells[OWNER] = "Grace Hopper";
    let sheet = MemorySheet::with_rows(&HEADER, &[&cells]);

    let report = run_reverse_sync(&config(), &store, &sheet, &RunOptions::default())
        .expect("reverse");

    assert_eq!(report.created, 1);
    assert!(report.warnings.is_empty());
    let created = store.get(&RecordId::from("page-1")).unwrap();
    assert!(!created.properties.contains_key("Owner"));
}

#[test]
fn rows_holding_only_read_only_cells_are_blank() {
    let store = store();
    store.insert(record("p1", "Alpha", "Active", &["A"], true));
    let before = store.get(&RecordId::from("p1"));
    let mut orphan = ["", "", "", "", "", "", "", ""];
    orphan[OWNER] = "Ada Lovelace";
    let mut linked = orphan;
    linked[ID] = "p1";
    let sheet = MemorySheet::with_rows(&HEADER, &[&orphan, &linked]);

    let report = run_reverse_sync(&config(), &store, &sheet, &RunOptions::default())
        .expect("reverse");

    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 0);
    assert_eq!(report.skipped, 2);
    assert_eq!(store.writes(), 0);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get(&RecordId::from("p1")), before);
    assert_eq!(sheet.cell(2, ID), "");
}

#[test]
fn surrounding_whitespace_in_store_text_is_not_a_change() {
    let store = store();
    store.insert(record("p1", " Alpha ", "Active", &["A"], true));
    let sheet = MemorySheet::with_rows(
        &HEADER,
        &[&["Alpha", "Active", "A", "TRUE", "2023-12-01", "", "", "p1"]],
    );

    let report = run_reverse_sync(&config(), &store, &sheet, &RunOptions::default())
        .expect("reverse");

    assert_eq!(report.skipped, 1);
    assert_eq!(report.updated, 0);
    assert_eq!(store.writes(), 0);
}

#[test]
fn invalid_cell_is_skipped_with_warning() {
    let store = store();
    let mut cells = row("Alpha", "Active", "", "");
    cells[DUE] = "next tuesday";
    let sheet = MemorySheet::with_rows(&HEADER, &[&cells]);

    let report = run_reverse_sync(&config(), &store, &sheet, &RunOptions::default())
        .expect("reverse");

    assert_eq!(report.created, 1);
    assert!(matches!(
        &report.warnings[..],
        [SyncWarning::CellWarning { column, .. }] if column == "Due"
    ));
    let created = store.get(&RecordId::from("page-1")).unwrap();
    assert!(!created.properties.contains_key("Due"));
    assert_eq!(created.properties["Name"], text("Alpha"));
}

#[test]
fn stale_identifier_creates_and_replaces_it() {
    let store = store();
    let sheet = MemorySheet::with_rows(&HEADER, &[&row("Alpha", "Active", "", "deleted-page")]);

    let report = run_reverse_sync(&config(), &store, &sheet, &RunOptions::default())
        .expect("reverse");

    assert_eq!(report.created, 1);
    assert_eq!(
        report.warnings,
        [SyncWarning::StaleIdentifier {
            id: RecordId::from("deleted-page"),
            row: tabsync_core::RowNumber(2),
        }]
    );
    assert_eq!(sheet.cell(2, ID), "page-1");
}

#[test]
fn duplicate_rows_update_the_record_once() {
    let store = store();
    store.insert(record("p1", "Alpha", "Active", &[], false));
    let sheet = MemorySheet::with_rows(
        &HEADER,
        &[&row("First", "Active", "", "p1"), &row("Second", "Active", "", "p1")],
    );

    let report = run_reverse_sync(&config(), &store, &sheet, &RunOptions::default())
        .expect("reverse");

    assert_eq!(report.updated, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.created, 0);
    assert_eq!(store.len(), 1);
    assert_eq!(
        store.get(&RecordId::from("p1")).unwrap().properties["Name"],
        text("First")
    );
    assert!(matches!(
        &report.warnings[..],
        [SyncWarning::DuplicateIdentifier { .. }]
    ));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn failed_write_back_is_reported() {
    let store = store();
    let sheet = MemorySheet::with_rows(&HEADER, &[&row("Alpha", "Active", "", "")]);
    sheet.fail_next(StoreOp::UpdateRow, RemoteError::from_status(403, "read-only sheet"));

    let report = run_reverse_sync(&config(), &store, &sheet, &RunOptions::default())
        .expect("reverse");

    assert_eq!(report.created, 0);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].kind, FailureKind::WriteBack);
    assert!(report.failures[0].message.contains("page-1"));
}

#[test]
fn failed_create_does_not_block_later_rows() {
    let store = store();
    let sheet = MemorySheet::with_rows(
        &HEADER,
        &[&row("Alpha", "Active", "", ""), &row("Beta", "Active", "", "")],
    );
    store.fail_next(StoreOp::CreateRecord, RemoteError::from_status(400, "validation"));

    let report = run_reverse_sync(&config(), &store, &sheet, &RunOptions::default())
        .expect("reverse");

    assert_eq!(report.created, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].item, "row 2");
    assert_eq!(report.failures[0].kind, FailureKind::RemotePermanent);
    assert_eq!(sheet.cell(2, ID), "");
    assert_eq!(sheet.cell(3, ID), "page-1");
}

#[test]
fn dry_run_creates_nothing() {
    let store = store();
    let sheet = MemorySheet::with_rows(&HEADER, &[&row("Alpha", "Active", "", "")]);

    let report =
        run_reverse_sync(&config(), &store, &sheet, &RunOptions::dry_run()).expect("dry run");

    assert_eq!(report.created, 1);
    assert!(store.is_empty());
    assert_eq!(sheet.writes(), 0);
}

// ---------------------------------------------------------------------------
// Both directions
// ---------------------------------------------------------------------------

#[test]
fn forward_then_reverse_is_a_no_op() {
    let store = store();
    store.insert(record("p1", "Alpha", "Active", &["A", "B"], true));
    store.insert(record("p2", "Beta", "Done", &[], false));
    let sheet = empty_sheet();

    run_forward_sync(&config(), &store, &sheet, &RunOptions::default()).expect("forward");
    let report = run_reverse_sync(&config(), &store, &sheet, &RunOptions::default())
        .expect("reverse");

    assert_eq!(report.created, 0);
    assert_eq!(report.updated, 0);
    assert_eq!(report.skipped, 2);
    assert_eq!(store.writes(), 0);
}

#[test]
fn interleaved_runs_never_duplicate() {
    let store = store();
    store.insert(record("p1", "Alpha", "Active", &[], false));
    let sheet = empty_sheet();
    let options = RunOptions::default();

    run_forward_sync(&config(), &store, &sheet, &options).expect("forward 1");
    sheet.set_cell(3, NAME, "Typed in the sheet");
    run_reverse_sync(&config(), &store, &sheet, &options).expect("reverse 1");
    run_forward_sync(&config(), &store, &sheet, &options).expect("forward 2");
    sheet.set_cell(4, NAME, "Another one");
    run_reverse_sync(&config(), &store, &sheet, &options).expect("reverse 2");
    run_reverse_sync(&config(), &store, &sheet, &options).expect("reverse 3");
    run_forward_sync(&config(), &store, &sheet, &options).expect("forward 3");

    let mut ids = sheet_ids(&sheet);
    assert_eq!(ids.len(), 3);
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), store.len());
    assert_eq!(sheet.row_count(), 3);
}

// ---------------------------------------------------------------------------
// Single sync in flight
// ---------------------------------------------------------------------------

#[test]
fn second_run_on_the_same_target_is_rejected_while_one_is_in_flight() {
    let store = Arc::new(store());
    store.insert(record("p1", "Alpha", "Active", &[], false));
    let sheet = Arc::new(MemorySheet::with_rows(
        &HEADER,
        &[&row("Beta", "Active", "", "")],
    ));
    let config = config();
    let nested: Arc<Mutex<Option<Result<SyncReport, SyncError>>>> = Arc::default();

    let options = {
        let store = store.clone();
        let sheet = sheet.clone();
        let config = config.clone();
        let nested = nested.clone();
        RunOptions::default().with_progress(move |event| {
            if let SyncProgress::Fetched { .. } = event {
                let result = run_forward_sync(
                    &config,
                    store.as_ref(),
                    sheet.as_ref(),
                    &RunOptions::default(),
                );
                *nested.lock().expect("nested result") = Some(result);
            }
        })
    };

    let report = run_reverse_sync(&config, store.as_ref(), sheet.as_ref(), &options)
        .expect("reverse");
    assert_eq!(report.created, 1);

    let nested = nested
        .lock()
        .expect("nested result")
        .take()
        .expect("progress callback ran");
    assert!(matches!(nested, Err(SyncError::Busy { .. })), "got {nested:?}");
    assert_eq!(sheet.row_count(), 1, "the rejected run wrote nothing");

    let after = run_forward_sync(&config, store.as_ref(), sheet.as_ref(), &RunOptions::default())
        .expect("slot released after the first run");
    assert_eq!(after.created, 1);
    assert_eq!(sheet.row_count(), 2);
}
