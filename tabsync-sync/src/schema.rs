//! Schema resolution: property schema + header row → field mapping.
//!
//! Columns and properties are matched by exact (trimmed) name. Anything
//! present on only one side is ignored for the run and listed in the
//! mapping so the caller can show it; partial overlap is the normal case.

use std::collections::BTreeSet;

use tabsync_core::{PropertySchema, PropertyType, RecordStore, SheetSchema, SheetStore};

use crate::error::{schema_err, SyncError};
use crate::throttle::Throttle;

/// One store property bound to one sheet column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedField {
    pub name: String,
    /// 0-based column position in the header.
    pub column: usize,
    pub ty: PropertyType,
}

/// Name-based correspondence between the two schemas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    /// Mapped fields, in header order. Never contains the identifier column.
    pub fields: Vec<MappedField>,
    /// 0-based position of the identifier column.
    pub id_column: usize,
    pub ignored_properties: Vec<String>,
    pub ignored_columns: Vec<String>,
}

impl FieldMapping {
    pub fn build(
        properties: &PropertySchema,
        sheet: &SheetSchema,
        identifier_column: &str,
    ) -> Result<Self, SyncError> {
        if sheet.is_empty() {
            return Err(SyncError::EmptyHeader);
        }
        let id_column =
            sheet
                .position(identifier_column)
                .ok_or_else(|| SyncError::IdentifierColumnMissing {
                    column: identifier_column.trim().to_string(),
                })?;

        let mut fields = Vec::new();
        let mut ignored_columns = Vec::new();
        let mut seen = BTreeSet::new();

        for (column, raw) in sheet.columns.iter().enumerate() {
            let name = raw.trim();
            if column == id_column || name.is_empty() {
                continue;
            }
            match properties.get(name) {
                // A repeated header name maps only its first column.
                Some(ty) if seen.insert(name.to_string()) => fields.push(MappedField {
                    name: name.to_string(),
                    column,
                    ty,
                }),
                _ => ignored_columns.push(name.to_string()),
            }
        }

        let ignored_properties = properties
            .properties
            .keys()
            .chain(properties.unsupported.keys())
            .filter(|name| !seen.contains(name.as_str()))
            .cloned()
            .collect();

        Ok(Self {
            fields,
            id_column,
            ignored_properties,
            ignored_columns,
        })
    }

    /// Mapped fields whose type accepts writes.
    pub fn writable(&self) -> impl Iterator<Item = &MappedField> {
        self.fields.iter().filter(|f| f.ty.is_writable())
    }
}

/// Both schemas and the mapping derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSchema {
    pub properties: PropertySchema,
    pub sheet: SheetSchema,
    pub mapping: FieldMapping,
}

impl ResolvedSchema {
    /// Number of header columns; rows are padded to this width.
    pub fn width(&self) -> usize {
        self.sheet.len()
    }
}

/// Fetch both schemas and build the field mapping.
pub fn resolve(
    records: &dyn RecordStore,
    sheet: &dyn SheetStore,
    identifier_column: &str,
    throttle: &mut Throttle,
) -> Result<ResolvedSchema, SyncError> {
    let properties = throttle
        .call("get schema", || records.get_schema())
        .map_err(schema_err("property schema"))?;
    let header = throttle
        .call("get header", || sheet.get_header())
        .map_err(schema_err("sheet header"))?;
    let sheet = SheetSchema::new(header);

    let mapping = FieldMapping::build(&properties, &sheet, identifier_column)?;

    if !mapping.ignored_properties.is_empty() {
        tracing::info!(
            "properties without a sheet column: {}",
            mapping.ignored_properties.join(", ")
        );
    }
    if !mapping.ignored_columns.is_empty() {
        tracing::info!(
            "sheet columns without a property: {}",
            mapping.ignored_columns.join(", ")
        );
    }
    tracing::debug!(
        "mapped {} field(s), identifier column at index {}",
        mapping.fields.len(),
        mapping.id_column
    );

    Ok(ResolvedSchema {
        properties,
        sheet,
        mapping,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
