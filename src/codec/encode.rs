use std::collections::BTreeMap;
use std::fmt::Display;

use itertools::Itertools;
use tracing::debug;
use uuid::Uuid;

use super::decode::parse_timestamp;
use super::{CodecError, CodecResult, Row};
use crate::data_types::{MapValue, Record, Value};
use crate::schema::{ColumnType, MapValueType, TableSchema};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// The header line of a table: its column names in declared order.
pub fn encode_header(schema: &TableSchema) -> Row {
    Row::new(schema.column_names())
}

/// Format one record as a row, in the schema's column order. Columns of the
/// record that the schema doesn't declare are dropped.
pub fn encode_row(record: &Record, schema: &TableSchema) -> CodecResult<Row> {
    for column in record.columns() {
        if schema.column_type(column).is_none() {
            debug!(
                "Dropping column {column:?} not declared in table {:?}",
                schema.name
            );
        }
    }

    let fields = schema
        .columns()
        .map(|(column, column_type)| encode_value(column, record.get(column), column_type))
        .collect::<CodecResult<Vec<_>>>()?;

    Ok(Row::new(fields))
}

/// Format a single (possibly NULL) value for a column of the given type.
pub fn encode_value(
    column: &str,
    value: Option<&Value>,
    column_type: ColumnType,
) -> CodecResult<String> {
    let Some(value) = value else {
        return Ok(match column_type {
            ColumnType::Set => "[]".to_string(),
            ColumnType::Map(_) => "{}".to_string(),
            _ => String::new(),
        });
    };

    let mismatch = |reason: String| CodecError::FieldEncode {
        column: column.to_string(),
        expected: column_type.to_string(),
        reason,
    };
    let wrong_kind = || mismatch(format!("got a {} value", value.kind()));

    match (column_type, value) {
        (ColumnType::Uuid | ColumnType::TimeUuid, Value::Uuid(id)) => {
            Ok(id.hyphenated().to_string())
        }
        (ColumnType::Uuid | ColumnType::TimeUuid, Value::Text(text)) => Uuid::parse_str(text)
            .map(|id| id.hyphenated().to_string())
            .map_err(|e| mismatch(e.to_string())),

        (ColumnType::Timestamp, Value::Timestamp(ts)) => {
            Ok(ts.format(TIMESTAMP_FORMAT).to_string())
        }
        // Textual timestamps are re-rendered so nothing but the canonical form is written
        (ColumnType::Timestamp, Value::Text(text)) => parse_timestamp(text.trim())
            .map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
            .ok_or_else(|| mismatch(format!("{text:?} is not a timestamp"))),

        (ColumnType::Date, Value::Date(date)) => Ok(date.format(DATE_FORMAT).to_string()),
        (ColumnType::Date, Value::Timestamp(ts)) => {
            Ok(ts.date_naive().format(DATE_FORMAT).to_string())
        }

        (ColumnType::Boolean, Value::Boolean(b)) => Ok(b.to_string()),

        (ColumnType::Int | ColumnType::Counter, Value::Int(v) | Value::Counter(v)) => {
            Ok(v.to_string())
        }

        (ColumnType::Float | ColumnType::Double, Value::Float(v)) => {
            format_float(*v).ok_or_else(|| mismatch(format!("{v} is not finite")))
        }
        (ColumnType::Float | ColumnType::Double, Value::Int(v)) => Ok(format!("{v}.0")),

        (ColumnType::Set, Value::Set(items)) => Ok(serde_json::to_string(items)?),

        (ColumnType::Map(value_type), Value::Map(entries)) => {
            encode_map(entries, value_type).map_err(mismatch)
        }

        (ColumnType::Vector(_), Value::Vector(items)) => {
            let tokens = items
                .iter()
                .map(|v| format_float(*v).ok_or_else(|| mismatch(format!("{v} is not finite"))))
                .collect::<CodecResult<Vec<_>>>()?;
            Ok(format!("[{}]", tokens.join(", ")))
        }

        (ColumnType::Text, Value::Text(text)) => Ok(normalize_text(text)),

        _ => Err(wrong_kind()),
    }
}

fn encode_map(
    entries: &BTreeMap<String, MapValue>,
    value_type: MapValueType,
) -> Result<String, String> {
    let mut object = serde_json::Map::new();
    for (key, value) in entries {
        let json = match (value_type, value) {
            (MapValueType::Float, MapValue::Float(v)) => serde_json::Number::from_f64(*v)
                .map(serde_json::Value::Number)
                .ok_or_else(|| format!("{v} under key {key:?} is not finite"))?,
            (MapValueType::Text, MapValue::Text(v)) => serde_json::Value::String(v.clone()),
            (_, MapValue::Float(_)) => return Err(format!("key {key:?} holds a float")),
            (_, MapValue::Text(_)) => return Err(format!("key {key:?} holds text")),
        };
        object.insert(key.clone(), json);
    }
    Ok(serde_json::Value::Object(object).to_string())
}

/// Decimal rendering that always carries a fractional part (`3.0`, not `3`).
fn format_float<F: Into<f64> + Display + Copy>(v: F) -> Option<String> {
    let wide: f64 = v.into();
    if !wide.is_finite() {
        return None;
    }
    let text = v.to_string();
    if text.contains(['.', 'e', 'E']) {
        Some(text)
    } else {
        Some(format!("{text}.0"))
    }
}

/// Collapse the text into one line that the bulk loader can't misparse:
/// line breaks and tabs become spaces, double quotes become single quotes,
/// space runs collapse to one, and the ends are trimmed.
fn normalize_text(text: &str) -> String {
    text.replace(['\n', '\r', '\t'], " ")
        .replace('"', "'")
        .split(' ')
        .filter(|part| !part.is_empty())
        .join(" ")
}
