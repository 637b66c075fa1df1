use std::path::PathBuf;

use csv::{QuoteStyle, ReaderBuilder, StringRecord, WriterBuilder};

use crate::schema::SchemaError;

mod decode;
mod encode;

pub use decode::{decode_field, decode_row, FnHints, NoHints, TypeHints};
pub use encode::{encode_header, encode_row, encode_value};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("No schema defined for table {table:?}")]
    SchemaMissing { table: String },

    #[error("Input file {path:?} not found")]
    MissingInputFile { path: PathBuf },

    #[error("Cannot encode column {column:?} as {expected}: {reason}")]
    FieldEncode {
        column: String,
        expected: String,
        reason: String,
    },

    #[error("Invalid CSV dialect: {reason}")]
    InvalidDialect { reason: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed encoding JSON: {0}")]
    SerdeJson(#[from] serde_json::Error),
}

pub type CodecResult<T, E = CodecError> = Result<T, E>;

/// Framing rules of the delimited text files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvDialect {
    pub delimiter: u8,
    pub quote: u8,
    pub escape: Option<u8>,
    pub double_quote: bool,
}

impl Default for CsvDialect {
    fn default() -> Self {
        Self::dsbulk()
    }
}

impl CsvDialect {
    /// Backslash escaping instead of doubled quotes, which DSBulk requires.
    pub fn dsbulk() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            escape: Some(b'\\'),
            double_quote: false,
        }
    }

    /// RFC 4180 files with doubled quotes, as written by older CQL exports.
    pub fn legacy() -> Self {
        Self {
            delimiter: b',',
            quote: b'"',
            escape: None,
            double_quote: true,
        }
    }

    pub fn validate(self) -> CodecResult<Self> {
        let invalid = |reason: &str| {
            Err(CodecError::InvalidDialect {
                reason: reason.to_string(),
            })
        };

        if self.delimiter == self.quote {
            return invalid("delimiter and quote must differ");
        }
        match self.escape {
            Some(escape) if escape == self.delimiter || escape == self.quote => {
                invalid("escape must differ from delimiter and quote")
            }
            None if !self.double_quote => {
                invalid("an escape character is required when double_quote is off")
            }
            _ => Ok(self),
        }
    }

    /// Escape character written before literal escapes and quotes, if quote
    /// doubling is off.
    fn active_escape(&self) -> Option<u8> {
        if self.double_quote {
            None
        } else {
            self.escape
        }
    }

    pub fn writer_builder(&self) -> WriterBuilder {
        let mut builder = WriterBuilder::new();
        builder
            .delimiter(self.delimiter)
            .quote(self.quote)
            .quote_style(QuoteStyle::Always)
            .double_quote(self.double_quote);
        if let Some(escape) = self.escape {
            builder.escape(escape);
        }
        builder
    }

    pub fn reader_builder(&self) -> ReaderBuilder {
        let mut builder = ReaderBuilder::new();
        builder
            .delimiter(self.delimiter)
            .quote(self.quote)
            .escape(self.escape)
            .double_quote(self.double_quote);
        builder
    }
}

/// The field texts of one line, in column order, without quoting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    fields: Vec<String>,
}

impl Row {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields as handed to the CSV writer. The writer escapes quotes but not
    /// the escape character itself, so that one is doubled up front.
    pub(crate) fn framed_fields(&self, dialect: &CsvDialect) -> Vec<String> {
        match dialect.active_escape() {
            Some(escape) => {
                let escape = char::from(escape);
                let doubled = format!("{escape}{escape}");
                self.fields
                    .iter()
                    .map(|f| f.replace(escape, &doubled))
                    .collect()
            }
            None => self.fields.clone(),
        }
    }

    /// Render as a single line (no terminator), every field quoted.
    pub fn to_line(&self, dialect: &CsvDialect) -> CodecResult<String> {
        let mut writer = dialect.writer_builder().from_writer(vec![]);
        writer.write_record(self.framed_fields(dialect))?;
        let bytes = writer
            .into_inner()
            .map_err(|e| CodecError::Io(e.into_error()))?;
        let line = String::from_utf8_lossy(&bytes);
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    pub fn from_line(line: &str, dialect: &CsvDialect) -> CodecResult<Self> {
        let mut reader = dialect
            .reader_builder()
            .has_headers(false)
            .from_reader(line.as_bytes());
        match reader.records().next() {
            Some(record) => Ok(Self::from(record?)),
            None => Ok(Self::default()),
        }
    }
}

impl From<StringRecord> for Row {
    fn from(record: StringRecord) -> Self {
        Self {
            fields: record.iter().map(String::from).collect(),
        }
    }
}

impl From<Vec<&str>> for Row {
    fn from(fields: Vec<&str>) -> Self {
        Self {
            fields: fields.into_iter().map(String::from).collect(),
        }
    }
}
