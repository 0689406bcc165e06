//! Notion database client (the structured store).
//!
//! Endpoints used, all under `{api_base}/v1`:
//!
//! | call | endpoint |
//! |---|---|
//! | `get_schema` | `GET databases/{id}` |
//! | `list_records` | `POST databases/{id}/query`, following `next_cursor` |
//! | `create_record` | `POST pages` |
//! | `update_record` | `PATCH pages/{id}` |
//!
//! Writes need the property type of every name, so the schema fetched by
//! `get_schema` is kept and fetched on demand when missing.

use std::sync::Mutex;

use serde::Deserialize;
use serde_json::{json, Map, Value};

use tabsync_core::codec::parse_date;
use tabsync_core::config::NotionConfig;
use tabsync_core::{
    CodecError, Properties, PropertySchema, PropertyType, PropertyValue, Record, RecordId,
    RecordStore, RemoteError,
};

use crate::http::{agent, classify, read_json};

/// Longest text run the API accepts in one rich-text object.
pub const MAX_TEXT_RUN: usize = 2000;

const PAGE_SIZE: u32 = 100;

pub struct NotionClient {
    agent: ureq::Agent,
    api_base: String,
    api_key: String,
    version: String,
    database_id: String,
    schema: Mutex<Option<PropertySchema>>,
}

impl NotionClient {
    pub fn new(config: &NotionConfig) -> Self {
        Self {
            agent: agent(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            version: config.version.clone(),
            database_id: config.database_id.clone(),
            schema: Mutex::new(None),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.api_base)
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        self.agent
            .request(method, &self.url(path))
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .set("Notion-Version", &self.version)
    }

    fn send(&self, method: &str, path: &str, body: &Value) -> Result<ureq::Response, RemoteError> {
        tracing::debug!("notion: {method} {path}");
        self.request(method, path).send_json(body).map_err(classify)
    }

    fn cached_schema(&self) -> Result<PropertySchema, RemoteError> {
        if let Some(schema) = self.schema_slot().as_ref() {
            return Ok(schema.clone());
        }
        self.get_schema()
    }

    fn schema_slot(&self) -> std::sync::MutexGuard<'_, Option<PropertySchema>> {
        self.schema
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn properties_body(&self, properties: &Properties) -> Result<Value, RemoteError> {
        let schema = self.cached_schema()?;
        let mut body = Map::new();
        for (name, value) in properties {
            let Some(ty) = schema.get(name) else {
                tracing::warn!("notion: property '{name}' is not in the database schema, not sent");
                continue;
            };
            if !ty.is_writable() {
                continue;
            }
            let json = property_to_json(ty, value)
                .map_err(|e| RemoteError::permanent(format!("property '{name}': {e}")))?;
            body.insert(name.clone(), json);
        }
        Ok(Value::Object(body))
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DatabaseResponse {
    #[serde(default)]
    properties: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<PageResponse>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageResponse {
    id: String,
    #[serde(default)]
    properties: Map<String, Value>,
}

impl RecordStore for NotionClient {
    fn get_schema(&self) -> Result<PropertySchema, RemoteError> {
        let response = self
            .request("GET", &format!("databases/{}", self.database_id))
            .call()
            .map_err(classify)?;
        let database: DatabaseResponse = read_json(response)?;
        let schema = PropertySchema::from_tags(database.properties.iter().map(|(name, prop)| {
            let tag = prop.get("type").and_then(Value::as_str).unwrap_or("unknown");
            (name.clone(), tag.to_string())
        }));
        *self.schema_slot() = Some(schema.clone());
        Ok(schema)
    }

    fn list_records(&self) -> Result<Vec<Record>, RemoteError> {
        let path = format!("databases/{}/query", self.database_id);
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut body = json!({ "page_size": PAGE_SIZE });
            if let Some(cursor) = &cursor {
                body["start_cursor"] = json!(cursor);
            }
            let page: QueryResponse = read_json(self.send("POST", &path, &body)?)?;
            records.extend(page.results.into_iter().map(|item| Record {
                id: RecordId(item.id),
                properties: item
                    .properties
                    .iter()
                    .map(|(name, prop)| (name.clone(), property_from_json(prop)))
                    .collect(),
            }));
            match page.next_cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }
        tracing::debug!("notion: listed {} page(s)", records.len());
        Ok(records)
    }

    fn create_record(&self, properties: &Properties) -> Result<RecordId, RemoteError> {
        let body = json!({
            "parent": { "database_id": self.database_id },
            "properties": self.properties_body(properties)?,
        });
        let page: PageResponse = read_json(self.send("POST", "pages", &body)?)?;
        Ok(RecordId(page.id))
    }

    fn update_record(&self, id: &RecordId, properties: &Properties) -> Result<(), RemoteError> {
        let body = json!({ "properties": self.properties_body(properties)? });
        self.send("PATCH", &format!("pages/{id}"), &body)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// JSON → PropertyValue
// ---------------------------------------------------------------------------

/// Read one page property object (`{"type": tag, tag: payload}`).
pub fn property_from_json(prop: &Value) -> PropertyValue {
    let tag = prop.get("type").and_then(Value::as_str).unwrap_or("unknown");
    let payload = prop.get(tag).unwrap_or(&Value::Null);
    let Ok(ty) = tag.parse::<PropertyType>() else {
        return PropertyValue::Unsupported {
            tag: tag.to_string(),
        };
    };

    match ty {
        PropertyType::Title | PropertyType::RichText => PropertyValue::Text(plain_text(payload)),
        PropertyType::Number => payload
            .as_f64()
            .map_or(PropertyValue::Empty, PropertyValue::Number),
        PropertyType::Select | PropertyType::Status => name_of(payload)
            .map_or(PropertyValue::Empty, |n| PropertyValue::Text(n.to_string())),
        PropertyType::MultiSelect => PropertyValue::Options(names(payload)),
        PropertyType::Checkbox => PropertyValue::Checkbox(payload.as_bool().unwrap_or(false)),
        PropertyType::Date => date_from_json(payload),
        PropertyType::Url | PropertyType::Email | PropertyType::PhoneNumber => payload
            .as_str()
            .map_or(PropertyValue::Empty, |s| PropertyValue::Text(s.to_string())),
        PropertyType::People => PropertyValue::People(names(payload)),
        PropertyType::Formula => formula_from_json(payload),
        PropertyType::Relation => PropertyValue::Relation(
            payload
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .filter_map(|i| i.get("id").and_then(Value::as_str))
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
        ),
    }
}

fn plain_text(runs: &Value) -> String {
    runs.as_array()
        .map(|runs| {
            runs.iter()
                .filter_map(|r| r.get("plain_text").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default()
}

fn name_of(value: &Value) -> Option<&str> {
    value.get("name").and_then(Value::as_str)
}

fn names(values: &Value) -> Vec<String> {
    values
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(name_of)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn date_from_json(payload: &Value) -> PropertyValue {
    let start = payload
        .get("start")
        .and_then(Value::as_str)
        .and_then(parse_date);
    let end = payload
        .get("end")
        .and_then(Value::as_str)
        .and_then(parse_date);
    match start {
        Some(start) => PropertyValue::Date { start, end },
        None => PropertyValue::Empty,
    }
}

fn formula_from_json(payload: &Value) -> PropertyValue {
    let kind = payload.get("type").and_then(Value::as_str).unwrap_or("");
    let result = payload.get(kind).unwrap_or(&Value::Null);
    match kind {
        "string" => result
            .as_str()
            .map_or(PropertyValue::Empty, |s| PropertyValue::Computed(s.to_string())),
        "number" => result
            .as_f64()
            .map_or(PropertyValue::Empty, PropertyValue::Number),
        "boolean" => result
            .as_bool()
            .map_or(PropertyValue::Empty, PropertyValue::Checkbox),
        "date" => date_from_json(result),
        _ => PropertyValue::Empty,
    }
}

// ---------------------------------------------------------------------------
// PropertyValue → JSON
// ---------------------------------------------------------------------------

/// Build the write payload for one property. Empty values clear the field.
pub fn property_to_json(ty: PropertyType, value: &PropertyValue) -> Result<Value, CodecError> {
    use PropertyType as T;
    use PropertyValue as V;

    if !ty.is_writable() {
        return Err(CodecError::UnsupportedWrite { ty });
    }

    let payload = match (ty, value) {
        (T::Title | T::RichText, V::Text(s)) => text_runs(s),
        (T::Title | T::RichText | T::MultiSelect, V::Empty) => json!([]),
        (T::Number, V::Number(n)) => json!(n),
        (T::Select | T::Status, V::Text(s)) if !s.is_empty() => json!({ "name": s }),
        (T::MultiSelect, V::Options(items)) => {
            Value::Array(items.iter().map(|i| json!({ "name": i })).collect())
        }
        (T::Checkbox, V::Checkbox(b)) => json!(b),
        (T::Checkbox, V::Empty) => json!(false),
        (T::Date, V::Date { start, end }) => json!({
            "start": start.format("%Y-%m-%d").to_string(),
            "end": end.map(|e| e.format("%Y-%m-%d").to_string()),
        }),
        (T::Url | T::Email | T::PhoneNumber, V::Text(s)) if !s.is_empty() => json!(s),
        // Blank scalars clear the property.
        (T::Select | T::Status | T::Url | T::Email | T::PhoneNumber, V::Text(_))
        | (T::Number | T::Select | T::Status | T::Date | T::Url | T::Email | T::PhoneNumber, V::Empty) => {
            Value::Null
        }
        _ => {
            return Err(CodecError::Mismatch {
                expected: ty,
                found: value.kind(),
            })
        }
    };

    let mut property = Map::new();
    property.insert(ty.tag().to_string(), payload);
    Ok(Value::Object(property))
}

/// Split text into rich-text runs of at most [`MAX_TEXT_RUN`] characters.
pub fn text_runs(text: &str) -> Value {
    let chars: Vec<char> = text.chars().collect();
    Value::Array(
        chars
            .chunks(MAX_TEXT_RUN)
            .map(|chunk| {
                let content: String = chunk.iter().collect();
                json!({ "type": "text", "text": { "content": content } })
            })
            .collect(),
    )
}
