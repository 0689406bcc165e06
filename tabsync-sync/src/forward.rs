//! Store → sheet.
//!
//! For each record, in listing order:
//!
//! 1. Encode every mapped property into its column.
//! 2. If a row already carries the record's identifier, overlay the encoded
//!    cells onto that row and write it back only if something changed.
//!    Cells of unmapped columns are carried over unchanged.
//! 3. Otherwise append a fresh row with the identifier in its column.

use std::collections::HashMap;

use tabsync_core::{codec, PropertyValue, Record, Row, RowNumber};

use crate::error::{fetch_err, SyncError};
use crate::index::RowIndex;
use crate::pipeline::SyncRun;
use crate::progress::ItemOutcome;
use crate::report::{record_label, FailureKind, SyncWarning};
use crate::schema::ResolvedSchema;

pub(crate) fn run(run: &mut SyncRun<'_>) -> Result<(), SyncError> {
    let store = run.records;
    let sheet = run.sheet;
    let records = run
        .throttle
        .call("list records", || store.list_records())
        .map_err(fetch_err("records"))?;
    let rows = run
        .throttle
        .call("get rows", || sheet.get_all_rows())
        .map_err(fetch_err("sheet rows"))?;

    let mut index = RowIndex::build(&rows, run.schema.mapping.id_column);
    run.report_duplicates(&index);
    let by_number: HashMap<RowNumber, &Row> = rows.iter().map(|r| (r.number, r)).collect();

    let total = records.len();
    run.fetched(total);
    tracing::debug!("forward: {total} record(s), {} row(s)", rows.len());

    for (i, record) in records.iter().enumerate() {
        if run.stop_requested() {
            break;
        }
        let outcome = sync_record(run, i + 1, record, &mut index, &by_number);
        run.item_done(i + 1, total, record_label(&record.id), outcome);
    }
    Ok(())
}

fn sync_record(
    run: &mut SyncRun<'_>,
    position: usize,
    record: &Record,
    index: &mut RowIndex,
    by_number: &HashMap<RowNumber, &Row>,
) -> ItemOutcome {
    if record.id.is_empty() {
        run.report.warn(SyncWarning::MissingIdentifier { position });
        run.report.skipped += 1;
        return ItemOutcome::Skipped;
    }
    let item = record_label(&record.id);

    let cells = match encode_record(run.schema, record) {
        Ok(cells) => cells,
        Err((property, err)) => {
            run.report.fail(
                item,
                FailureKind::from_codec(&err),
                format!("property '{property}': {err}"),
            );
            return ItemOutcome::Failed;
        }
    };

    let width = run.schema.width();
    match index.get(&record.id) {
        Some(number) => {
            let existing = by_number
                .get(&number)
                .map(|row| row.cells.as_slice())
                .unwrap_or(&[]);
            let mut values = existing.to_vec();
            if values.len() < width {
                values.resize(width, String::new());
            }
            let before = values.clone();
            for (column, text) in cells {
                values[column] = text;
            }
            if values == before {
                tracing::debug!("unchanged: row {number}");
                run.report.skipped += 1;
                return ItemOutcome::Skipped;
            }
            if run.dry_run() {
                tracing::info!("[dry-run] would update row {number} from {item}");
                run.report.updated += 1;
                return ItemOutcome::Updated;
            }

            let sheet = run.sheet;
            match run
                .throttle
                .call("update row", || sheet.update_row(number, &values))
            {
                Ok(()) => {
                    tracing::debug!("updated row {number} from {item}");
                    run.report.updated += 1;
                    ItemOutcome::Updated
                }
                Err(err) => {
                    run.report
                        .fail(item, FailureKind::from_remote(&err), err.to_string());
                    ItemOutcome::Failed
                }
            }
        }
        None => {
            let mut values = vec![String::new(); width];
            for (column, text) in cells {
                values[column] = text;
            }
            if run.dry_run() {
                tracing::info!("[dry-run] would append a row for {item}");
                run.report.created += 1;
                return ItemOutcome::Created;
            }

            let sheet = run.sheet;
            match run.throttle.call("append row", || sheet.append_row(&values)) {
                Ok(number) => {
                    tracing::debug!("appended row {number} for {item}");
                    index.insert(record.id.clone(), number);
                    run.report.created += 1;
                    ItemOutcome::Created
                }
                Err(err) => {
                    run.report
                        .fail(item, FailureKind::from_remote(&err), err.to_string());
                    ItemOutcome::Failed
                }
            }
        }
    }
}

/// `(column, text)` for every mapped property plus the identifier column.
///
/// Fails on the first property that cannot be encoded, naming it.
fn encode_record(
    schema: &ResolvedSchema,
    record: &Record,
) -> Result<Vec<(usize, String)>, (String, tabsync_core::CodecError)> {
    let mut cells = Vec::with_capacity(schema.mapping.fields.len() + 1);
    for field in &schema.mapping.fields {
        let value = record
            .properties
            .get(&field.name)
            .unwrap_or(&PropertyValue::Empty);
        let text = codec::encode(field.ty, value).map_err(|e| (field.name.clone(), e))?;
        cells.push((field.column, text));
    }
    cells.push((schema.mapping.id_column, record.id.to_string()));
    Ok(cells)
}
