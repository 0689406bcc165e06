//! Identifier lookups, rebuilt from live remote state at the start of every
//! run and never cached across runs.

use std::collections::HashMap;

use tabsync_core::{Record, RecordId, Row, RowNumber};

/// A row whose identifier was already claimed by an earlier row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateRow {
    pub id: RecordId,
    pub row: RowNumber,
    pub first_row: RowNumber,
}

/// Identifier → row number over the sheet, first occurrence wins.
#[derive(Debug, Clone, Default)]
pub struct RowIndex {
    by_id: HashMap<RecordId, RowNumber>,
    pub duplicates: Vec<DuplicateRow>,
}

impl RowIndex {
    /// Scan `rows` once, reading identifiers from `id_column`.
    pub fn build(rows: &[Row], id_column: usize) -> Self {
        let mut index = RowIndex::default();
        for row in rows {
            let id = row.cell(id_column).trim();
            if id.is_empty() {
                continue;
            }
            let id = RecordId::from(id);
            match index.by_id.get(&id) {
                Some(&first_row) => index.duplicates.push(DuplicateRow {
                    id,
                    row: row.number,
                    first_row,
                }),
                None => {
                    index.by_id.insert(id, row.number);
                }
            }
        }
        index
    }

    pub fn get(&self, id: &RecordId) -> Option<RowNumber> {
        self.by_id.get(id).copied()
    }

    /// Whether `row` is the row that owns `id`.
    pub fn is_owner(&self, id: &RecordId, row: RowNumber) -> bool {
        self.get(id) == Some(row)
    }

    pub fn insert(&mut self, id: RecordId, row: RowNumber) {
        self.by_id.entry(id).or_insert(row);
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Identifier → record over the store listing. Records without an
/// identifier are left out.
pub fn records_by_id(records: &[Record]) -> HashMap<RecordId, &Record> {
    records
        .iter()
        .filter(|r| !r.id.is_empty())
        .map(|r| (r.id.clone(), r))
        .collect()
}
