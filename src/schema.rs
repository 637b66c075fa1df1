use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use strum_macros::{Display, EnumString};

use crate::codec::{CodecError, CodecResult};

lazy_static! {
    static ref MAP_TYPE: Regex =
        Regex::new(r"^map<\s*text\s*,\s*([a-z]+)\s*>$").expect("valid regex");
    static ref VECTOR_TYPE: Regex =
        Regex::new(r"^vector<\s*float\s*,\s*(\d+)\s*>$").expect("valid regex");
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unknown column type {name:?}")]
    UnknownType { name: String },

    #[error("Column {column:?} is declared twice in table {table:?}")]
    DuplicateColumn { table: String, column: String },
}

/// Value type of a `map<text, T>` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MapValueType {
    Text,
    #[strum(to_string = "float", serialize = "double")]
    Float,
}

/// Column types understood by the bulk-load format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Uuid,
    TimeUuid,
    Timestamp,
    Date,
    Boolean,
    Int,
    Float,
    Double,
    Counter,
    Text,
    /// `set<text>`
    Set,
    /// `map<text, T>`
    Map(MapValueType),
    /// `vector<float, N>`
    Vector(usize),
}

impl ColumnType {
    pub fn is_collection(&self) -> bool {
        matches!(self, ColumnType::Set | ColumnType::Map(_))
    }
}

impl FromStr for ColumnType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let unknown = || SchemaError::UnknownType {
            name: s.to_string(),
        };

        Ok(match name.as_str() {
            "uuid" => Self::Uuid,
            "timeuuid" => Self::TimeUuid,
            "timestamp" => Self::Timestamp,
            "date" => Self::Date,
            "boolean" => Self::Boolean,
            "int" => Self::Int,
            "float" => Self::Float,
            "double" => Self::Double,
            "counter" => Self::Counter,
            "text" => Self::Text,
            _ if name.replace(' ', "") == "set<text>" => Self::Set,
            _ => {
                if let Some(caps) = MAP_TYPE.captures(&name) {
                    Self::Map(MapValueType::from_str(&caps[1]).map_err(|_| unknown())?)
                } else if let Some(caps) = VECTOR_TYPE.captures(&name) {
                    Self::Vector(caps[1].parse().map_err(|_| unknown())?)
                } else {
                    return Err(unknown());
                }
            }
        })
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Uuid => write!(f, "uuid"),
            ColumnType::TimeUuid => write!(f, "timeuuid"),
            ColumnType::Timestamp => write!(f, "timestamp"),
            ColumnType::Date => write!(f, "date"),
            ColumnType::Boolean => write!(f, "boolean"),
            ColumnType::Int => write!(f, "int"),
            ColumnType::Float => write!(f, "float"),
            ColumnType::Double => write!(f, "double"),
            ColumnType::Counter => write!(f, "counter"),
            ColumnType::Text => write!(f, "text"),
            ColumnType::Set => write!(f, "set<text>"),
            ColumnType::Map(value) => write!(f, "map<text,{value}>"),
            ColumnType::Vector(dim) => write!(f, "vector<float,{dim}>"),
        }
    }
}

/// Ordered column declarations of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    columns: Vec<(String, ColumnType)>,
}

impl TableSchema {
    pub fn try_new<I, S>(name: &str, columns: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (S, ColumnType)>,
        S: Into<String>,
    {
        let mut schema = Self {
            name: name.to_string(),
            columns: vec![],
        };
        for (column, column_type) in columns {
            let column = column.into();
            if schema.column_type(&column).is_some() {
                return Err(SchemaError::DuplicateColumn {
                    table: schema.name,
                    column,
                });
            }
            schema.columns.push((column, column_type));
        }
        Ok(schema)
    }

    /// Build a schema from textual type names, e.g. `("tags", "set<text>")`.
    pub fn parse<'a, I>(name: &str, columns: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let typed = columns
            .into_iter()
            .map(|(column, text_type)| Ok((column, ColumnType::from_str(text_type)?)))
            .collect::<Result<Vec<_>, SchemaError>>()?;
        Self::try_new(name, typed)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.columns.iter().map(|(name, t)| (name.as_str(), *t))
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn column_type(&self, column: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, t)| *t)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Table name -> schema lookup. Registration order is preserved for iteration.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    tables: Vec<TableSchema>,
    index: HashMap<String, usize>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: TableSchema) {
        match self.index.get(&schema.name) {
            Some(&pos) => self.tables[pos] = schema,
            None => {
                self.index.insert(schema.name.clone(), self.tables.len());
                self.tables.push(schema);
            }
        }
    }

    pub fn get(&self, table: &str) -> CodecResult<&TableSchema> {
        self.index
            .get(table)
            .map(|&pos| &self.tables[pos])
            .ok_or_else(|| CodecError::SchemaMissing {
                table: table.to_string(),
            })
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }

    /// The KillrVideo bulk-load tables.
    pub fn killrvideo() -> Self {
        let mut registry = Self::new();
        for (name, columns) in KILLRVIDEO_TABLES {
            let schema = TableSchema {
                name: name.to_string(),
                columns: columns
                    .iter()
                    .map(|(column, t)| (column.to_string(), *t))
                    .collect(),
            };
            registry.register(schema);
        }
        registry
    }
}

pub const EMBEDDING_DIMENSIONS: usize = 384;

type TableDecl = (&'static str, &'static [(&'static str, ColumnType)]);

use ColumnType::*;

const KILLRVIDEO_TABLES: &[TableDecl] = &[
    (
        "users",
        &[
            ("userid", Uuid),
            ("created_date", Timestamp),
            ("email", Text),
            ("firstname", Text),
            ("lastname", Text),
            ("account_status", Text),
            ("last_login_date", Timestamp),
        ],
    ),
    (
        "user_credentials",
        &[
            ("email", Text),
            ("password", Text),
            ("userid", Uuid),
            ("account_locked", Boolean),
        ],
    ),
    (
        "videos",
        &[
            ("videoid", Uuid),
            ("added_date", Timestamp),
            ("description", Text),
            ("location", Text),
            ("location_type", Int),
            ("name", Text),
            ("preview_image_location", Text),
            ("tags", Set),
            ("content_features", Vector(EMBEDDING_DIMENSIONS)),
            ("userid", Uuid),
            ("content_rating", Text),
            ("category", Text),
            ("language", Text),
        ],
    ),
    (
        "latest_videos",
        &[
            ("day", Date),
            ("added_date", Timestamp),
            ("videoid", Uuid),
            ("name", Text),
            ("preview_image_location", Text),
            ("userid", Uuid),
            ("content_rating", Text),
            ("category", Text),
        ],
    ),
    (
        "tags",
        &[
            ("tag", Text),
            ("tag_vector", Vector(EMBEDDING_DIMENSIONS)),
            ("related_tags", Set),
            ("category", Text),
        ],
    ),
    ("tag_counts", &[("tag", Text), ("count", Counter)]),
    (
        "comments",
        &[
            ("videoid", Uuid),
            ("commentid", TimeUuid),
            ("comment", Text),
            ("userid", Uuid),
            ("sentiment_score", Float),
        ],
    ),
    (
        "comments_by_user",
        &[
            ("userid", Uuid),
            ("commentid", TimeUuid),
            ("videoid", Uuid),
            ("comment", Text),
            ("sentiment_score", Float),
        ],
    ),
    (
        "video_ratings",
        &[
            ("videoid", Uuid),
            ("rating_counter", Counter),
            ("rating_total", Counter),
        ],
    ),
    (
        "video_ratings_by_user",
        &[
            ("videoid", Uuid),
            ("userid", Uuid),
            ("rating", Int),
            ("rating_date", Timestamp),
        ],
    ),
    (
        "video_playback_stats",
        &[
            ("videoid", Uuid),
            ("views", Counter),
            ("total_play_time", Counter),
            ("complete_views", Counter),
            ("unique_viewers", Counter),
        ],
    ),
    (
        "user_preferences",
        &[
            ("userid", Uuid),
            ("preference_vector", Vector(EMBEDDING_DIMENSIONS)),
            ("tag_preferences", Map(MapValueType::Float)),
            ("category_preferences", Map(MapValueType::Float)),
            ("last_updated", Timestamp),
        ],
    ),
];
