//! Sheet → store.
//!
//! Rows are walked top to bottom. Blank placeholder rows (every mapped,
//! writable cell empty) are skipped. A row whose identifier resolves to a record updates
//! it; any other row creates a record and immediately gets the new
//! identifier written back into its identifier column, so a re-run updates
//! instead of creating again.

use std::collections::HashMap;

use tabsync_core::{codec, Properties, PropertyValue, Record, RecordId, Row};

use crate::error::{fetch_err, SyncError};
use crate::index::{records_by_id, RowIndex};
use crate::pipeline::SyncRun;
use crate::progress::ItemOutcome;
use crate::report::{row_label, FailureKind, SyncWarning};

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

    let known = records_by_id(&records);
    let index = RowIndex::build(&rows, run.schema.mapping.id_column);
    run.report_duplicates(&index);

    let total = rows.len();
    run.fetched(total);
    tracing::debug!("reverse: {total} row(s), {} record(s)", records.len());

    for (i, row) in rows.iter().enumerate() {
        if run.stop_requested() {
            break;
        }
        let outcome = sync_row(run, row, &known, &index);
        run.item_done(i + 1, total, row_label(row.number), outcome);
    }
    Ok(())
}

fn sync_row(
    run: &mut SyncRun<'_>,
    row: &Row,
    known: &HashMap<RecordId, &Record>,
    index: &RowIndex,
) -> ItemOutcome {
    let schema = run.schema;
    let mapping = &schema.mapping;
    // Read-only columns are never decoded, so they cannot make a row count.
    if mapping
        .writable()
        .all(|f| row.cell(f.column).trim().is_empty())
    {
        tracing::debug!("row {}: blank, skipped", row.number);
        run.report.skipped += 1;
        return ItemOutcome::Skipped;
    }

    let id_cell = row.cell(mapping.id_column).trim();
    let id = (!id_cell.is_empty()).then(|| RecordId::from(id_cell));
    if let Some(id) = &id {
        // Later rows repeating an identifier were reported as duplicates.
        if !index.is_owner(id, row.number) {
            run.report.skipped += 1;
            return ItemOutcome::Skipped;
        }
    }

    let properties = decode_row(run, row);
    if properties.is_empty() {
        run.report.skipped += 1;
        return ItemOutcome::Skipped;
    }

    match id {
        Some(id) => match known.get(&id) {
            Some(record) => update(run, row, record, &properties),
            None => {
                run.report.warn(SyncWarning::StaleIdentifier {
                    id,
                    row: row.number,
                });
                create(run, row, &properties)
            }
        },
        None => create(run, row, &properties),
    }
}

/// Decode every mapped, writable column. Cells that fail to decode are left
/// out and reported as warnings.
fn decode_row(run: &mut SyncRun<'_>, row: &Row) -> Properties {
    let schema = run.schema;
    let mut properties = Properties::new();
    for field in schema.mapping.writable() {
        match codec::decode(field.ty, row.cell(field.column)) {
            Ok(value) => {
                properties.insert(field.name.clone(), value);
            }
            Err(err) => run.report.warn(SyncWarning::CellWarning {
                row: row.number,
                column: field.name.clone(),
                message: err.to_string(),
            }),
        }
    }
    properties
}

fn update(
    run: &mut SyncRun<'_>,
    row: &Row,
    record: &Record,
    properties: &Properties,
) -> ItemOutcome {
    let item = row_label(row.number);
    if is_unchanged(record, properties) {
        tracing::debug!("unchanged: {item} (record {})", record.id);
        run.report.skipped += 1;
        return ItemOutcome::Skipped;
    }
    if run.dry_run() {
        tracing::info!("[dry-run] would update record {} from {item}", record.id);
        run.report.updated += 1;
        return ItemOutcome::Updated;
    }

    let store = run.records;
    match run
        .throttle
        .call("update record", || store.update_record(&record.id, properties))
    {
        Ok(()) => {
            tracing::debug!("updated record {} from {item}", record.id);
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

fn create(run: &mut SyncRun<'_>, row: &Row, properties: &Properties) -> ItemOutcome {
    let item = row_label(row.number);
    if run.dry_run() {
        tracing::info!("[dry-run] would create a record from {item}");
        run.report.created += 1;
        return ItemOutcome::Created;
    }

    let store = run.records;
    let id = match run
        .throttle
        .call("create record", || store.create_record(properties))
    {
        Ok(id) => id,
        Err(err) => {
            run.report
                .fail(item, FailureKind::from_remote(&err), err.to_string());
            return ItemOutcome::Failed;
        }
    };

    // Write the identifier back before moving on to the next row.
    let id_column = run.schema.mapping.id_column;
    let mut values = row.cells.clone();
    if values.len() <= id_column {
        values.resize(id_column + 1, String::new());
    }
    values.truncate(id_column + 1);
    values[id_column] = id.to_string();

    let sheet = run.sheet;
    match run
        .throttle
        .call("write back identifier", || sheet.update_row(row.number, &values))
    {
        Ok(()) => {
            tracing::debug!("created record {id} from {item}");
            run.report.created += 1;
            ItemOutcome::Created
        }
        Err(err) => {
            run.report.fail(
                item,
                FailureKind::WriteBack,
                format!("created record {id} but could not store its identifier: {err}"),
            );
            ItemOutcome::Failed
        }
    }
}

/// Whether the record already holds every decoded value. Cells are decoded
/// trimmed, so store text is compared trimmed too.
fn is_unchanged(record: &Record, properties: &Properties) -> bool {
    properties.iter().all(|(name, wanted)| {
        let current = record.properties.get(name).unwrap_or(&PropertyValue::Empty);
        current == wanted || (is_blank(current) && is_blank(wanted)) || same_text(current, wanted)
    })
}

fn same_text(current: &PropertyValue, wanted: &PropertyValue) -> bool {
    match (current, wanted) {
        (PropertyValue::Text(a), PropertyValue::Text(b)) => a.trim() == b.trim(),
        (PropertyValue::Options(a), PropertyValue::Options(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.trim() == y.trim())
        }
        _ => false,
    }
}

fn is_blank(value: &PropertyValue) -> bool {
    match value {
        PropertyValue::Empty => true,
        PropertyValue::Text(s) => s.is_empty(),
        PropertyValue::Options(items) => items.is_empty(),
        _ => false,
    }
}
