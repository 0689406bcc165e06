//! Domain types shared by every tabsync crate.
//!
//! A [`Record`] lives in the structured store and carries typed
//! [`PropertyValue`]s; a [`Row`] lives in the spreadsheet and carries plain
//! cell strings. The two meet through the identifier column.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Opaque, stable record key assigned by the structured store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// 1-based sheet row position. Row 1 is always the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowNumber(pub usize);

impl fmt::Display for RowNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<usize> for RowNumber {
    fn from(n: usize) -> Self {
        Self(n)
    }
}

// ---------------------------------------------------------------------------
// Property types
// ---------------------------------------------------------------------------

/// Kind of a structured-store property.
///
/// The variant set is closed. Tags the store reports that are not listed
/// here fail to parse with [`CodecError::UnsupportedType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Title,
    RichText,
    Number,
    Select,
    Status,
    MultiSelect,
    Checkbox,
    Date,
    Url,
    Email,
    PhoneNumber,
    People,
    Formula,
    Relation,
}

impl PropertyType {
    pub const ALL: [PropertyType; 14] = [
        PropertyType::Title,
        PropertyType::RichText,
        PropertyType::Number,
        PropertyType::Select,
        PropertyType::Status,
        PropertyType::MultiSelect,
        PropertyType::Checkbox,
        PropertyType::Date,
        PropertyType::Url,
        PropertyType::Email,
        PropertyType::PhoneNumber,
        PropertyType::People,
        PropertyType::Formula,
        PropertyType::Relation,
    ];

    /// Wire tag used by the structured store.
    pub fn tag(self) -> &'static str {
        match self {
            PropertyType::Title => "title",
            PropertyType::RichText => "rich_text",
            PropertyType::Number => "number",
            PropertyType::Select => "select",
            PropertyType::Status => "status",
            PropertyType::MultiSelect => "multi_select",
            PropertyType::Checkbox => "checkbox",
            PropertyType::Date => "date",
            PropertyType::Url => "url",
            PropertyType::Email => "email",
            PropertyType::PhoneNumber => "phone_number",
            PropertyType::People => "people",
            PropertyType::Formula => "formula",
            PropertyType::Relation => "relation",
        }
    }

    /// Whether sheet values of this type may be written back to the store.
    pub fn is_writable(self) -> bool {
        !matches!(
            self,
            PropertyType::People | PropertyType::Formula | PropertyType::Relation
        )
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for PropertyType {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropertyType::ALL
            .into_iter()
            .find(|ty| ty.tag() == s)
            .ok_or_else(|| CodecError::UnsupportedType {
                tag: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Property values
// ---------------------------------------------------------------------------

/// A typed property value as held by the structured store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    /// No value set (null select, empty title, cleared date, ...).
    Empty,
    /// Plain text: title, rich text, select, status, url, email, phone.
    Text(String),
    Number(f64),
    Checkbox(bool),
    Date {
        start: NaiveDate,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end: Option<NaiveDate>,
    },
    /// Multi-select option names, in store order.
    Options(Vec<String>),
    /// Display names of assigned people.
    People(Vec<String>),
    /// Computed value in its string form.
    Computed(String),
    /// Identifiers of related records.
    Relation(Vec<String>),
    /// A value whose wire tag this crate does not understand.
    Unsupported { tag: String },
}

impl PropertyValue {
    /// Short name of the value shape, used in mismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            PropertyValue::Empty => "empty",
            PropertyValue::Text(_) => "text",
            PropertyValue::Number(_) => "number",
            PropertyValue::Checkbox(_) => "checkbox",
            PropertyValue::Date { .. } => "date",
            PropertyValue::Options(_) => "options",
            PropertyValue::People(_) => "people",
            PropertyValue::Computed(_) => "computed",
            PropertyValue::Relation(_) => "relation",
            PropertyValue::Unsupported { .. } => "unsupported",
        }
    }
}

/// Property name to value, as sent to or received from the store.
pub type Properties = BTreeMap<String, PropertyValue>;

// ---------------------------------------------------------------------------
// Records, rows, schemas
// ---------------------------------------------------------------------------

/// One structured-store entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(default)]
    pub properties: Properties,
}

/// One spreadsheet line below the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub number: RowNumber,
    #[serde(default)]
    pub cells: Vec<String>,
}

impl Row {
    /// Cell at `index`, or `""` when the row is shorter than the header.
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(String::as_str).unwrap_or("")
    }
}

/// Property schema of the structured store, keyed by property name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertySchema {
    pub properties: BTreeMap<String, PropertyType>,
    /// Properties whose type tag is outside [`PropertyType`], with that tag.
    #[serde(default)]
    pub unsupported: BTreeMap<String, String>,
}

impl PropertySchema {
    /// Build a schema from `(name, tag)` pairs, routing unknown tags into
    /// [`PropertySchema::unsupported`].
    pub fn from_tags<I, N, T>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: AsRef<str>,
    {
        let mut schema = PropertySchema::default();
        for (name, tag) in pairs {
            let name = name.into();
            match tag.as_ref().parse::<PropertyType>() {
                Ok(ty) => {
                    schema.properties.insert(name, ty);
                }
                Err(_) => {
                    schema.unsupported.insert(name, tag.as_ref().to_string());
                }
            }
        }
        schema
    }

    pub fn get(&self, name: &str) -> Option<PropertyType> {
        self.properties.get(name).copied()
    }
}

/// Ordered column names read from the first sheet row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSchema {
    pub columns: Vec<String>,
}

impl SheetSchema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    /// Position of the first column named `name` (trimmed comparison).
    pub fn position(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.columns.iter().position(|c| c.trim() == name)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.iter().all(|c| c.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
