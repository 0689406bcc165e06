//! Google Sheets v4 values client (the spreadsheet).
//!
//! Works on one tab of one spreadsheet with a ready bearer token. Cells are
//! written with `valueInputOption=RAW` so `TRUE`, dates and numbers come back
//! exactly as written.

use serde::Deserialize;
use serde_json::{json, Value};

use tabsync_core::codec::{FALSE_TOKEN, TRUE_TOKEN};
use tabsync_core::config::SheetsConfig;
use tabsync_core::{RemoteError, Row, RowNumber, SheetStore};

use crate::http::{agent, classify, read_json};

pub struct SheetsClient {
    agent: ureq::Agent,
    api_base: String,
    spreadsheet_id: String,
    sheet_name: String,
    access_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendResponse {
    updates: AppendUpdates,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppendUpdates {
    updated_range: String,
}

impl SheetsClient {
    pub fn new(config: &SheetsConfig) -> Self {
        Self {
            agent: agent(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: config.spreadsheet_id.clone(),
            sheet_name: config.sheet_name.clone(),
            access_token: config.access_token.clone(),
        }
    }

    /// A1 range on the configured tab, e.g. `'Sheet1'!A5`.
    fn range(&self, cells: &str) -> String {
        let tab = format!("'{}'", self.sheet_name.replace('\'', "''"));
        if cells.is_empty() {
            tab
        } else {
            format!("{tab}!{cells}")
        }
    }

    fn values_url(&self, range: &str, suffix: &str) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}{suffix}",
            self.api_base,
            self.spreadsheet_id,
            urlencoding::encode(range)
        )
    }

    fn request(&self, method: &str, url: &str) -> ureq::Request {
        self.agent
            .request(method, url)
            .set("Authorization", &format!("Bearer {}", self.access_token))
    }

    fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, RemoteError> {
        tracing::debug!("sheets: GET {range}");
        let response = self
            .request("GET", &self.values_url(range, ""))
            .call()
            .map_err(classify)?;
        let body: ValueRange = read_json(response)?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect())
    }
}

impl SheetStore for SheetsClient {
    fn get_header(&self) -> Result<Vec<String>, RemoteError> {
        let rows = self.get_values(&self.range("1:1"))?;
        Ok(rows.into_iter().next().unwrap_or_default())
    }

    fn get_all_rows(&self) -> Result<Vec<Row>, RemoteError> {
        let rows = self.get_values(&self.range(""))?;
        Ok(rows
            .into_iter()
            .enumerate()
            .skip(1)
            .map(|(i, cells)| Row {
                number: RowNumber(i + 1),
                cells,
            })
            .collect())
    }

    fn append_row(&self, values: &[String]) -> Result<RowNumber, RemoteError> {
        let range = self.range("A1");
        tracing::debug!("sheets: append to {range}");
        let url = self.values_url(
            &range,
            ":append?valueInputOption=RAW&insertDataOption=INSERT_ROWS",
        );
        let response = self
            .request("POST", &url)
            .send_json(json!({ "majorDimension": "ROWS", "values": [values] }))
            .map_err(classify)?;
        let body: AppendResponse = read_json(response)?;
        parse_row_number(&body.updates.updated_range)
            .map(RowNumber)
            .ok_or_else(|| {
                RemoteError::permanent(format!(
                    "unexpected updatedRange '{}'",
                    body.updates.updated_range
                ))
            })
    }

    fn update_row(&self, row: RowNumber, values: &[String]) -> Result<(), RemoteError> {
        let range = self.range(&format!("A{row}"));
        tracing::debug!("sheets: update {range}");
        let url = self.values_url(&range, "?valueInputOption=RAW");
        self.request("PUT", &url)
            .send_json(json!({ "majorDimension": "ROWS", "values": [values] }))
            .map_err(classify)?;
        Ok(())
    }
}

/// Cells normally arrive as strings; anything else is rendered as JSON text.
fn cell_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(true) => TRUE_TOKEN.to_string(),
        Value::Bool(false) => FALSE_TOKEN.to_string(),
        other => other.to_string(),
    }
}

/// First row number of an A1 range such as `'Sheet 1'!A5:H5`.
pub fn parse_row_number(range: &str) -> Option<usize> {
    let cells = range.rsplit_once('!').map_or(range, |(_, cells)| cells);
    let start = cells.split(':').next()?;
    let digits: String = start
        .chars()
        .skip_while(|c| c.is_ascii_alphabetic() || *c == '$')
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().ok()
}
