use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use uuid::Uuid;

/// Value of a `map<text, T>` entry.
#[derive(Debug, Clone, PartialEq)]
pub enum MapValue {
    Float(f64),
    Text(String),
}

/// A single typed column value. SQL NULL is represented by `Option::None`
/// at the record level, never by a variant here.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    Date(NaiveDate),
    Boolean(bool),
    Int(i64),
    Float(f64),
    Counter(i64),
    Text(String),
    Set(BTreeSet<String>),
    Map(BTreeMap<String, MapValue>),
    Vector(Vec<f32>),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Uuid(_) => "uuid",
            Value::Timestamp(_) => "timestamp",
            Value::Date(_) => "date",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Counter(_) => "counter",
            Value::Text(_) => "text",
            Value::Set(_) => "set",
            Value::Map(_) => "map",
            Value::Vector(_) => "vector",
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    pub fn set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Value::Set(items.into_iter().map(Into::into).collect())
    }

    pub fn float_map<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), MapValue::Float(v)))
                .collect(),
        )
    }
}

impl Serialize for MapValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            MapValue::Float(v) => serializer.serialize_f64(*v),
            MapValue::Text(v) => serializer.serialize_str(v),
        }
    }
}

// JSON rendering used by the line-delimited output of decoded tables
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Uuid(v) => serializer.serialize_str(&v.hyphenated().to_string()),
            Value::Timestamp(v) => {
                serializer.serialize_str(&v.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Value::Date(v) => serializer.serialize_str(&v.format("%Y-%m-%d").to_string()),
            Value::Boolean(v) => serializer.serialize_bool(*v),
            Value::Int(v) | Value::Counter(v) => serializer.serialize_i64(*v),
            Value::Float(v) => serializer.serialize_f64(*v),
            Value::Text(v) => serializer.serialize_str(v),
            Value::Set(items) => serializer.collect_seq(items),
            Value::Map(entries) => serializer.collect_map(entries),
            Value::Vector(items) => serializer.collect_seq(items),
        }
    }
}

/// Column name -> value mapping for one row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, Option<Value>>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, column: &str, value: Value) -> Self {
        self.insert(column, Some(value));
        self
    }

    pub fn with_null(mut self, column: &str) -> Self {
        self.insert(column, None);
        self
    }

    pub fn insert(&mut self, column: &str, value: Option<Value>) {
        self.values.insert(column.to_string(), value);
    }

    /// The value of a column; absent columns and explicit NULLs both read as `None`.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column).and_then(Option::as_ref)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, Option<Value>)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Option<Value>)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in &self.values {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}
