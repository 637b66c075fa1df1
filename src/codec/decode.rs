use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use super::Row;
use crate::data_types::{MapValue, Record, Value};
use crate::schema::{ColumnType, MapValueType, TableSchema};

lazy_static! {
    static ref INTEGER: Regex = Regex::new(r"^-?\d+$").expect("valid regex");
    static ref DECIMAL: Regex = Regex::new(r"^-?(\d+\.\d*|\.\d+)$").expect("valid regex");
}

const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Source of declared column types for the decoder.
pub trait TypeHints {
    fn type_of(&self, column: &str) -> Option<ColumnType>;
}

/// Decode purely from column naming conventions and value shapes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHints;

impl TypeHints for NoHints {
    fn type_of(&self, _column: &str) -> Option<ColumnType> {
        None
    }
}

impl TypeHints for TableSchema {
    fn type_of(&self, column: &str) -> Option<ColumnType> {
        self.column_type(column)
    }
}

impl TypeHints for HashMap<String, ColumnType> {
    fn type_of(&self, column: &str) -> Option<ColumnType> {
        self.get(column).copied()
    }
}

/// Declared types looked up through a closure.
pub struct FnHints<F>(pub F);

impl<F: Fn(&str) -> Option<ColumnType>> TypeHints for FnHints<F> {
    fn type_of(&self, column: &str) -> Option<ColumnType> {
        (self.0)(column)
    }
}

impl<T: TypeHints + ?Sized> TypeHints for &T {
    fn type_of(&self, column: &str) -> Option<ColumnType> {
        (**self).type_of(column)
    }
}

/// Rebuild a record from a row read with the given header. Fields missing
/// at the end of a short row decode as NULL; extra fields are ignored.
pub fn decode_row<H: TypeHints + ?Sized>(columns: &[String], row: &Row, hints: &H) -> Record {
    columns
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let raw = row.get(i).unwrap_or_default();
            (
                column.clone(),
                decode_field(column, raw, hints.type_of(column)),
            )
        })
        .collect()
}

/// Best-effort decoding of one field. Never fails: anything that can't be
/// read as its declared or guessed type comes back as the raw text.
pub fn decode_field(column: &str, raw: &str, declared: Option<ColumnType>) -> Option<Value> {
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
        return None;
    }

    let value = match declared {
        Some(column_type) => decode_typed(raw, column_type).unwrap_or_else(|| {
            debug!("Column {column:?}: {raw:?} is not a valid {column_type}, keeping text");
            Value::Text(raw.to_string())
        }),
        None => infer(column, raw),
    };
    Some(value)
}

fn decode_typed(raw: &str, column_type: ColumnType) -> Option<Value> {
    match column_type {
        ColumnType::Uuid | ColumnType::TimeUuid => Uuid::parse_str(raw.trim()).ok().map(Value::Uuid),
        ColumnType::Timestamp => parse_timestamp(raw.trim()).map(Value::Timestamp),
        ColumnType::Date => {
            let raw = raw.trim();
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .or_else(|| parse_timestamp(raw).map(|ts| ts.date_naive()))
                .map(Value::Date)
        }
        ColumnType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(Value::Boolean(true)),
            "false" | "0" | "no" => Some(Value::Boolean(false)),
            _ => None,
        },
        ColumnType::Int => raw.trim().parse().ok().map(Value::Int),
        ColumnType::Counter => raw.trim().parse().ok().map(Value::Counter),
        ColumnType::Float | ColumnType::Double => raw.trim().parse().ok().map(Value::Float),
        ColumnType::Text => Some(Value::Text(raw.to_string())),
        ColumnType::Set => decode_set(raw).map(Value::Set),
        ColumnType::Map(value_type) => decode_map(raw, Some(value_type)).map(Value::Map),
        ColumnType::Vector(_) => serde_json::from_str::<Vec<f32>>(raw.trim())
            .ok()
            .map(Value::Vector),
    }
}

/// Guess the type of an undeclared column: UUID-shaped values first, then the
/// `*id` / `*date` naming conventions, then the shape of the text.
fn infer(column: &str, raw: &str) -> Value {
    if looks_like_uuid(raw) {
        if let Some(value) = decode_typed(raw, ColumnType::Uuid) {
            return value;
        }
    }

    let name = column.to_ascii_lowercase();
    let by_name = if name.ends_with("id") {
        decode_typed(raw, ColumnType::Uuid)
    } else if name.ends_with("date") {
        decode_typed(raw, ColumnType::Timestamp)
    } else {
        None
    };

    by_name.unwrap_or_else(|| sniff(raw))
}

fn sniff(raw: &str) -> Value {
    let text = raw.trim();

    if text.starts_with('[') && text.ends_with(']') {
        if let Some(value) = sniff_array(text) {
            return value;
        }
    } else if text.starts_with('{') && text.ends_with('}') {
        let inner = text[1..text.len() - 1].trim();
        let value = if inner.is_empty() || inner.contains(':') {
            decode_map(text, None).map(Value::Map)
        } else if inner.contains(['"', '\'']) {
            decode_set(text).map(Value::Set)
        } else {
            None
        };
        if let Some(value) = value {
            return value;
        }
    } else if text.eq_ignore_ascii_case("true") {
        return Value::Boolean(true);
    } else if text.eq_ignore_ascii_case("false") {
        return Value::Boolean(false);
    } else if INTEGER.is_match(text) {
        if let Ok(v) = text.parse() {
            return Value::Int(v);
        }
    } else if DECIMAL.is_match(text) {
        if let Ok(v) = text.parse() {
            return Value::Float(v);
        }
    }

    debug!("No structure recognised in {raw:?}, keeping text");
    Value::Text(raw.to_string())
}

// Quoted strings make a set, bare numbers a vector
fn sniff_array(text: &str) -> Option<Value> {
    let items: Vec<serde_json::Value> = serde_json::from_str(text).ok()?;

    if items.iter().all(serde_json::Value::is_string) {
        Some(Value::Set(
            items
                .into_iter()
                .filter_map(|item| item.as_str().map(String::from))
                .collect(),
        ))
    } else if items.iter().all(serde_json::Value::is_number) {
        Some(Value::Vector(
            items
                .iter()
                .filter_map(serde_json::Value::as_f64)
                .map(|v| v as f32)
                .collect(),
        ))
    } else {
        None
    }
}

/// A 36-character value with hyphens at exactly positions 8, 13, 18 and 23.
fn looks_like_uuid(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() == 36
        && bytes.iter().enumerate().all(|(i, &b)| match i {
            8 | 13 | 18 | 23 => b == b'-',
            _ => b != b'-',
        })
}

pub(super) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS.iter().find_map(|format| {
        NaiveDateTime::parse_from_str(raw, format)
            .ok()
            .map(|naive| Utc.from_utc_datetime(&naive))
    })
}

/// JSON arrays (`["a","b"]`) and CQL set literals (`{"a","b"}`, `{'a','b'}`).
fn decode_set(raw: &str) -> Option<std::collections::BTreeSet<String>> {
    let text = raw.trim();
    if text.starts_with('[') {
        return serde_json::from_str(text).ok();
    }
    if !(text.starts_with('{') && text.ends_with('}')) {
        return None;
    }

    let inner = &text[1..text.len() - 1];
    if inner.trim().is_empty() {
        return Some(Default::default());
    }
    Some(
        split_unquoted(inner, ',')?
            .into_iter()
            .map(unquote)
            .filter(|item| !item.is_empty())
            .collect(),
    )
}

/// JSON objects, falling back to the looser `{"k":0.8,'j':text}` spelling.
fn decode_map(
    raw: &str,
    value_type: Option<MapValueType>,
) -> Option<BTreeMap<String, MapValue>> {
    let text = raw.trim();
    if !(text.starts_with('{') && text.ends_with('}')) {
        return None;
    }

    if let Ok(object) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(text)
    {
        return object
            .into_iter()
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::Number(n) => MapValue::Float(n.as_f64()?),
                    serde_json::Value::String(s) => MapValue::Text(s),
                    _ => return None,
                };
                Some((key, coerce_map_value(value, value_type)?))
            })
            .collect();
    }

    let inner = &text[1..text.len() - 1];
    if inner.trim().is_empty() {
        return Some(BTreeMap::new());
    }
    split_unquoted(inner, ',')?
        .into_iter()
        .filter(|pair| !pair.trim().is_empty())
        .map(|pair| {
            let key = *split_unquoted(pair, ':')?.first()?;
            let value = pair.get(key.len() + 1..)?.trim();
            let value = match value.parse::<f64>() {
                Ok(v) if !value.starts_with(['"', '\'']) => MapValue::Float(v),
                _ => MapValue::Text(unquote(value)),
            };
            Some((unquote(key), coerce_map_value(value, value_type)?))
        })
        .collect()
}

fn coerce_map_value(value: MapValue, value_type: Option<MapValueType>) -> Option<MapValue> {
    match (value_type, value) {
        (Some(MapValueType::Float), MapValue::Text(s)) => s.trim().parse().ok().map(MapValue::Float),
        (Some(MapValueType::Text), MapValue::Float(v)) => Some(MapValue::Text(v.to_string())),
        (_, value) => Some(value),
    }
}

/// Split on `sep` wherever it occurs outside single- or double-quoted runs.
/// Doubled quotes inside a quoted run toggle twice and so stay inside it.
fn split_unquoted(text: &str, sep: char) -> Option<Vec<&str>> {
    let mut parts = vec![];
    let mut start = 0;
    let mut quote = None;

    for (i, c) in text.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None if c == sep => {
                parts.push(&text[start..i]);
                start = i + c.len_utf8();
            }
            None => {}
        }
    }

    if quote.is_some() {
        return None;
    }
    parts.push(&text[start..]);
    Some(parts)
}

fn unquote(item: &str) -> String {
    let item = item.trim();
    for q in ['"', '\''] {
        if item.len() >= 2 && item.starts_with(q) && item.ends_with(q) {
            let doubled = format!("{q}{q}");
            return item[1..item.len() - 1].replace(&doubled, &q.to_string());
        }
    }
    item.to_string()
}
