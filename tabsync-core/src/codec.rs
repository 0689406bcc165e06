//! Property codec: typed store values to flat cell strings and back.
//!
//! One `encode` and one `decode` arm per [`PropertyType`] variant, selected by
//! a single `match` on the schema type. Encoding never yields a null cell:
//! a missing or empty value is always `""`.

use chrono::NaiveDate;

use crate::error::CodecError;
use crate::types::{PropertyType, PropertyValue};

/// Separator placed between list items (multi-select options, people).
pub const LIST_SEPARATOR: &str = ", ";

/// Separator between the start and end of a date range.
pub const DATE_RANGE_SEPARATOR: &str = " to ";

pub const TRUE_TOKEN: &str = "TRUE";
pub const FALSE_TOKEN: &str = "FALSE";

const TRUTHY: [&str; 4] = ["TRUE", "YES", "1", "✓"];
const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// encode
// ---------------------------------------------------------------------------

/// Render `value` (declared as `ty` in the schema) as a cell string.
pub fn encode(ty: PropertyType, value: &PropertyValue) -> Result<String, CodecError> {
    use PropertyType as T;
    use PropertyValue as V;

    let mismatch = || CodecError::Mismatch {
        expected: ty,
        found: value.kind(),
    };

    match (ty, value) {
        (_, V::Unsupported { tag }) => Err(CodecError::UnsupportedType { tag: tag.clone() }),
        (_, V::Empty) => Ok(String::new()),

        (T::Title | T::RichText | T::Select | T::Status | T::Url | T::Email | T::PhoneNumber, V::Text(s)) => {
            Ok(s.clone())
        }
        (T::Number, V::Number(n)) => Ok(format_number(*n)),
        (T::Checkbox, V::Checkbox(b)) => Ok(format_bool(*b)),
        (T::Date, V::Date { start, end }) => Ok(format_date(*start, *end)),
        (T::MultiSelect, V::Options(items)) | (T::People, V::People(items)) => {
            Ok(items.join(LIST_SEPARATOR))
        }

        // Formula results arrive in whatever shape the computation produced.
        (T::Formula, V::Computed(s) | V::Text(s)) => Ok(s.clone()),
        (T::Formula, V::Number(n)) => Ok(format_number(*n)),
        (T::Formula, V::Checkbox(b)) => Ok(format_bool(*b)),
        (T::Formula, V::Date { start, end }) => Ok(format_date(*start, *end)),

        (T::Relation, V::Relation(ids)) if ids.is_empty() => Ok(String::new()),
        (T::Relation, V::Relation(ids)) => Ok(format!("{} linked", ids.len())),

        _ => Err(mismatch()),
    }
}

fn format_number(n: f64) -> String {
    // f64's Display never uses exponent notation and drops a zero fraction.
    format!("{n}")
}

fn format_bool(b: bool) -> String {
    let token = if b { TRUE_TOKEN } else { FALSE_TOKEN };
    token.to_string()
}

fn format_date(start: NaiveDate, end: Option<NaiveDate>) -> String {
    match end {
        Some(end) => format!(
            "{}{DATE_RANGE_SEPARATOR}{}",
            start.format(DATE_FORMAT),
            end.format(DATE_FORMAT)
        ),
        None => start.format(DATE_FORMAT).to_string(),
    }
}

// ---------------------------------------------------------------------------
// decode
// ---------------------------------------------------------------------------

/// Parse a cell string into a value writable as `ty`.
///
/// Read-only types fail with [`CodecError::UnsupportedWrite`]. An empty (or
/// whitespace-only) cell yields the type's empty value.
pub fn decode(ty: PropertyType, cell: &str) -> Result<PropertyValue, CodecError> {
    use PropertyType as T;

    if !ty.is_writable() {
        return Err(CodecError::UnsupportedWrite { ty });
    }

    let s = cell.trim();
    if s.is_empty() {
        return Ok(empty_value(ty));
    }

    let invalid = |reason: &str| CodecError::InvalidValue {
        ty,
        value: s.to_string(),
        reason: reason.to_string(),
    };

    match ty {
        T::Title | T::RichText | T::Select | T::Status | T::PhoneNumber => {
            Ok(PropertyValue::Text(s.to_string()))
        }
        T::Url => {
            if is_url(s) {
                Ok(PropertyValue::Text(s.to_string()))
            } else {
                Err(invalid("expected an http:// or https:// URL"))
            }
        }
        T::Email => {
            if is_email(s) {
                Ok(PropertyValue::Text(s.to_string()))
            } else {
                Err(invalid("expected an address like name@example.com"))
            }
        }
        T::Number => {
            let n: f64 = s
                .replace(',', "")
                .parse()
                .map_err(|_| invalid("not a number"))?;
            if n.is_finite() {
                Ok(PropertyValue::Number(n))
            } else {
                Err(invalid("number is not finite"))
            }
        }
        T::Checkbox => Ok(PropertyValue::Checkbox(parse_bool(s))),
        T::Date => parse_date_range(s).ok_or_else(|| invalid("expected YYYY-MM-DD")),
        T::MultiSelect => {
            let mut items: Vec<String> = Vec::new();
            for item in s.split(',').map(str::trim).filter(|i| !i.is_empty()) {
                if !items.iter().any(|seen| seen == item) {
                    items.push(item.to_string());
                }
            }
            Ok(PropertyValue::Options(items))
        }
        T::People | T::Formula | T::Relation => Err(CodecError::UnsupportedWrite { ty }),
    }
}

/// The value a blank cell decodes to for `ty`.
pub fn empty_value(ty: PropertyType) -> PropertyValue {
    match ty {
        PropertyType::MultiSelect => PropertyValue::Options(Vec::new()),
        PropertyType::Checkbox => PropertyValue::Checkbox(false),
        _ => PropertyValue::Empty,
    }
}

fn parse_bool(s: &str) -> bool {
    let upper = s.to_uppercase();
    TRUTHY.contains(&upper.as_str())
}

fn parse_date_range(s: &str) -> Option<PropertyValue> {
    let (start, end) = match s.split_once(DATE_RANGE_SEPARATOR) {
        Some((start, end)) => (start, Some(end)),
        None => (s, None),
    };
    let start = parse_date(start)?;
    let end = match end {
        Some(end) => Some(parse_date(end)?),
        None => None,
    };
    Some(PropertyValue::Date { start, end })
}

/// Parse the leading `YYYY-MM-DD` of a date or datetime string.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, DATE_FORMAT).ok()
}

fn is_url(s: &str) -> bool {
    let rest = s
        .strip_prefix("https://")
        .or_else(|| s.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.contains(char::is_whitespace))
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !s.contains(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(name, tld)| !name.is_empty() && !tld.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
