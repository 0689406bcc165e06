//! In-memory collaborators.
//!
//! [`MemoryRecordStore`] and [`MemorySheet`] hold their state behind a
//! `Mutex` so they satisfy the `Send + Sync` collaborator traits. Both count
//! calls per operation and accept queued failures, which is how the engine
//! is tested for retry and partial-failure behaviour without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use tabsync_core::{
    Properties, PropertySchema, Record, RecordId, RecordStore, RemoteError, Row, RowNumber,
    SheetStore,
};

/// Remote operations that can be counted and made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetSchema,
    ListRecords,
    CreateRecord,
    UpdateRecord,
    GetHeader,
    GetAllRows,
    AppendRow,
    UpdateRow,
}

#[derive(Debug, Default)]
struct Faults {
    queued: HashMap<StoreOp, VecDeque<RemoteError>>,
    calls: HashMap<StoreOp, usize>,
}

impl Faults {
    /// Count the call and pop the next queued failure for it, if any.
    fn enter(&mut self, op: StoreOp) -> Result<(), RemoteError> {
        *self.calls.entry(op).or_default() += 1;
        match self.queued.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the lock leaves plain data behind; keep going.
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// MemoryRecordStore
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RecordState {
    schema: PropertySchema,
    records: Vec<Record>,
    next_id: usize,
    faults: Faults,
}

/// A structured store kept in memory. New identifiers are `page-<n>`.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: Mutex<RecordState>,
}

impl MemoryRecordStore {
    pub fn new(schema: PropertySchema) -> Self {
        Self {
            state: Mutex::new(RecordState {
                schema,
                ..RecordState::default()
            }),
        }
    }

    /// Seed a record as if it already existed remotely.
    pub fn insert(&self, record: Record) {
        lock(&self.state).records.push(record);
    }

    pub fn records(&self) -> Vec<Record> {
        lock(&self.state).records.clone()
    }

    pub fn get(&self, id: &RecordId) -> Option<Record> {
        lock(&self.state)
            .records
            .iter()
            .find(|r| &r.id == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make the next call of `op` fail with `err`. Queued failures are
    /// consumed in order, one per call.
    pub fn fail_next(&self, op: StoreOp, err: RemoteError) {
        lock(&self.state)
            .faults
            .queued
            .entry(op)
            .or_default()
            .push_back(err);
    }

    pub fn calls(&self, op: StoreOp) -> usize {
        lock(&self.state).faults.calls.get(&op).copied().unwrap_or(0)
    }

    /// Creates plus updates.
    pub fn writes(&self) -> usize {
        self.calls(StoreOp::CreateRecord) + self.calls(StoreOp::UpdateRecord)
    }
}

impl RecordStore for MemoryRecordStore {
    fn get_schema(&self) -> Result<PropertySchema, RemoteError> {
        let mut state = lock(&self.state);
        state.faults.enter(StoreOp::GetSchema)?;
        Ok(state.schema.clone())
    }

    fn list_records(&self) -> Result<Vec<Record>, RemoteError> {
        let mut state = lock(&self.state);
        state.faults.enter(StoreOp::ListRecords)?;
        Ok(state.records.clone())
    }

    fn create_record(&self, properties: &Properties) -> Result<RecordId, RemoteError> {
        let mut state = lock(&self.state);
        state.faults.enter(StoreOp::CreateRecord)?;
        state.next_id += 1;
        let id = RecordId(format!("page-{}", state.next_id));
        state.records.push(Record {
            id: id.clone(),
            properties: properties.clone(),
        });
        Ok(id)
    }

    fn update_record(&self, id: &RecordId, properties: &Properties) -> Result<(), RemoteError> {
        let mut state = lock(&self.state);
        state.faults.enter(StoreOp::UpdateRecord)?;
        let record = state
            .records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| RemoteError::from_status(404, format!("record {id} not found")))?;
        for (name, value) in properties {
            record.properties.insert(name.clone(), value.clone());
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemorySheet
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SheetState {
    /// `grid[0]` is the header row, `grid[n - 1]` is sheet row `n`.
    grid: Vec<Vec<String>>,
    faults: Faults,
}

/// A single-tab spreadsheet kept in memory.
#[derive(Debug, Default)]
pub struct MemorySheet {
    state: Mutex<SheetState>,
}

impl MemorySheet {
    pub fn new(header: &[&str]) -> Self {
        Self::with_rows(header, &[])
    }

    /// A sheet with `header` in row 1 and `rows` from row 2 down.
    pub fn with_rows(header: &[&str], rows: &[&[&str]]) -> Self {
        let mut grid = vec![owned(header)];
        grid.extend(rows.iter().map(|r| owned(r)));
        Self {
            state: Mutex::new(SheetState {
                grid,
                faults: Faults::default(),
            }),
        }
    }

    /// Every row, header first, as currently stored.
    pub fn grid(&self) -> Vec<Vec<String>> {
        lock(&self.state).grid.clone()
    }

    /// Cell at 1-based `row`, 0-based `column`; `""` when absent.
    pub fn cell(&self, row: usize, column: usize) -> String {
        lock(&self.state)
            .grid
            .get(row.wrapping_sub(1))
            .and_then(|r| r.get(column))
            .cloned()
            .unwrap_or_default()
    }

    /// Rows below the header.
    pub fn row_count(&self) -> usize {
        lock(&self.state).grid.len().saturating_sub(1)
    }

    /// Overwrite a cell directly, as a person editing the sheet would.
    pub fn set_cell(&self, row: usize, column: usize, value: &str) {
        let mut state = lock(&self.state);
        if state.grid.len() < row {
            state.grid.resize(row, Vec::new());
        }
        let cells = &mut state.grid[row - 1];
        if cells.len() <= column {
            cells.resize(column + 1, String::new());
        }
        cells[column] = value.to_string();
    }

    pub fn fail_next(&self, op: StoreOp, err: RemoteError) {
        lock(&self.state)
            .faults
            .queued
            .entry(op)
            .or_default()
            .push_back(err);
    }

    pub fn calls(&self, op: StoreOp) -> usize {
        lock(&self.state).faults.calls.get(&op).copied().unwrap_or(0)
    }

    /// Appends plus row updates.
    pub fn writes(&self) -> usize {
        self.calls(StoreOp::AppendRow) + self.calls(StoreOp::UpdateRow)
    }
}

fn owned(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|c| c.to_string()).collect()
}

impl SheetStore for MemorySheet {
    fn get_header(&self) -> Result<Vec<String>, RemoteError> {
        let mut state = lock(&self.state);
        state.faults.enter(StoreOp::GetHeader)?;
        Ok(state.grid.first().cloned().unwrap_or_default())
    }

    fn get_all_rows(&self) -> Result<Vec<Row>, RemoteError> {
        let mut state = lock(&self.state);
        state.faults.enter(StoreOp::GetAllRows)?;
        Ok(state
            .grid
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, cells)| Row {
                number: RowNumber(i + 1),
                cells: cells.clone(),
            })
            .collect())
    }

    fn append_row(&self, values: &[String]) -> Result<RowNumber, RemoteError> {
        let mut state = lock(&self.state);
        state.faults.enter(StoreOp::AppendRow)?;
        if state.grid.is_empty() {
            state.grid.push(Vec::new());
        }
        state.grid.push(values.to_vec());
        Ok(RowNumber(state.grid.len()))
    }

    fn update_row(&self, row: RowNumber, values: &[String]) -> Result<(), RemoteError> {
        let mut state = lock(&self.state);
        state.faults.enter(StoreOp::UpdateRow)?;
        if row.0 < 2 || row.0 > state.grid.len() {
            return Err(RemoteError::from_status(400, format!("row {row} is out of range")));
        }
        // Cells past the end of `values` keep their content.
        let cells = &mut state.grid[row.0 - 1];
        if cells.len() < values.len() {
            cells.resize(values.len(), String::new());
        }
        cells[..values.len()].clone_from_slice(values);
        Ok(())
    }
}
