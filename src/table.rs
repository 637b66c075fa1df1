//! Whole-table CSV files: one `<table>.csv` per schema, header first.

use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::ErrorKind;
use tracing::{debug, info, warn};

use crate::codec::{
    decode_row, encode_header, encode_row, CodecError, CodecResult, CsvDialect, Row,
    TypeHints,
};
use crate::data_types::{Record, Value};
use crate::schema::{ColumnType, SchemaRegistry, TableSchema};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WriteStats {
    pub rows_written: usize,
    pub rows_skipped: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadStats {
    pub rows_read: usize,
    pub rows_failed: usize,
    pub dimension_mismatches: usize,
}

pub fn table_file_name(table: &str) -> String {
    format!("{table}.csv")
}

pub struct TableWriter {
    output_dir: PathBuf,
    dialect: CsvDialect,
}

impl TableWriter {
    pub fn try_new(output_dir: impl Into<PathBuf>, dialect: CsvDialect) -> CodecResult<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self {
            output_dir,
            dialect: dialect.validate()?,
        })
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.output_dir.join(table_file_name(table))
    }

    /// Write `<table>.csv`. Records that can't be encoded are logged and
    /// skipped; only I/O problems abort the table.
    pub fn write_table<I>(&self, schema: &TableSchema, records: I) -> CodecResult<WriteStats>
    where
        I: IntoIterator<Item = Record>,
    {
        let path = self.table_path(&schema.name);
        let mut writer = self.dialect.writer_builder().from_path(&path)?;
        writer.write_record(encode_header(schema).framed_fields(&self.dialect))?;

        let mut stats = WriteStats::default();
        for (index, record) in records.into_iter().enumerate() {
            match encode_row(&record, schema) {
                Ok(row) => {
                    writer.write_record(row.framed_fields(&self.dialect))?;
                    stats.rows_written += 1;
                }
                Err(err @ CodecError::FieldEncode { .. }) => {
                    warn!("{}: skipping record {index}: {err}", schema.name);
                    stats.rows_skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }
        writer.flush()?;

        info!(
            "Wrote {} rows to {}",
            stats.rows_written,
            path.file_name().unwrap_or_default().to_string_lossy()
        );
        if stats.rows_skipped > 0 {
            warn!("{}: {} rows skipped", schema.name, stats.rows_skipped);
        }
        Ok(stats)
    }

    /// Write every table that has a schema. A table without one fails on its
    /// own and the remaining tables are still written.
    pub fn write_all_tables<I>(
        &self,
        registry: &SchemaRegistry,
        tables: I,
    ) -> Vec<(String, CodecResult<WriteStats>)>
    where
        I: IntoIterator<Item = (String, Vec<Record>)>,
    {
        info!("Writing CSV files to {}", self.output_dir.display());

        tables
            .into_iter()
            .map(|(table, records)| {
                let result = registry
                    .get(&table)
                    .and_then(|schema| self.write_table(schema, records));
                if let Err(err) = &result {
                    warn!("{table}: {err}");
                }
                (table, result)
            })
            .collect()
    }
}

pub struct TableReader {
    data_dir: PathBuf,
    dialect: CsvDialect,
}

impl TableReader {
    pub fn try_new(data_dir: impl Into<PathBuf>, dialect: CsvDialect) -> CodecResult<Self> {
        Ok(Self {
            data_dir: data_dir.into(),
            dialect: dialect.validate()?,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.data_dir.join(table_file_name(table))
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.table_path(table).is_file()
    }

    /// Visit every row of `<table>.csv` together with the file's header.
    pub fn scan<F>(&self, table: &str, visit: F) -> CodecResult<ReadStats>
    where
        F: FnMut(&[String], usize, Row) -> CodecResult<()>,
    {
        self.scan_path(&self.table_path(table), visit)
    }

    /// Like [`scan`](Self::scan), but rows with the wrong field count are
    /// still visited. The visitor gets however many fields the line had.
    pub fn scan_lenient<F>(&self, table: &str, visit: F) -> CodecResult<ReadStats>
    where
        F: FnMut(&[String], usize, Row) -> CodecResult<()>,
    {
        self.scan_with(&self.table_path(table), true, visit)
    }

    /// Visit every row of a CSV file. Rows that can't be framed (wrong field
    /// count, invalid UTF-8) are counted as failed and skipped.
    pub fn scan_path<F>(&self, path: &Path, visit: F) -> CodecResult<ReadStats>
    where
        F: FnMut(&[String], usize, Row) -> CodecResult<()>,
    {
        self.scan_with(path, false, visit)
    }

    fn scan_with<F>(&self, path: &Path, flexible: bool, mut visit: F) -> CodecResult<ReadStats>
    where
        F: FnMut(&[String], usize, Row) -> CodecResult<()>,
    {
        if !path.is_file() {
            return Err(CodecError::MissingInputFile {
                path: path.to_path_buf(),
            });
        }

        let mut reader = self
            .dialect
            .reader_builder()
            .has_headers(true)
            .flexible(flexible)
            .from_reader(File::open(path)?);
        let columns: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        debug!("{}: columns {}", path.display(), columns.join(", "));

        let mut stats = ReadStats::default();
        for (index, result) in reader.records().enumerate() {
            match result {
                Ok(record) => {
                    visit(&columns, index, Row::from(record))?;
                    stats.rows_read += 1;
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        ErrorKind::UnequalLengths { .. } | ErrorKind::Utf8 { .. }
                    ) =>
                {
                    warn!("{}: failed to parse row {index}: {err}", path.display());
                    stats.rows_failed += 1;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(stats)
    }

    /// Decode `<table>.csv` into records.
    pub fn read_table<H>(&self, table: &str, hints: &H) -> CodecResult<(Vec<Record>, ReadStats)>
    where
        H: TypeHints + ?Sized,
    {
        let (records, stats) = self.read_path(&self.table_path(table), hints)?;
        info!("{table}: loaded {} rows", stats.rows_read);
        if stats.rows_failed > 0 {
            warn!("{table}: {} rows failed", stats.rows_failed);
        }
        Ok((records, stats))
    }

    /// Decode any CSV file into records. Vectors whose length differs from the
    /// declared dimension are kept but reported; rejecting them is up to the
    /// database.
    pub fn read_path<H>(&self, path: &Path, hints: &H) -> CodecResult<(Vec<Record>, ReadStats)>
    where
        H: TypeHints + ?Sized,
    {
        let mut records = vec![];
        let mut mismatches = 0;

        let mut stats = self.scan_path(path, |columns, index, row| {
            let record = decode_row(columns, &row, hints);
            for column in columns {
                if let (Some(ColumnType::Vector(dim)), Some(Value::Vector(v))) =
                    (hints.type_of(column), record.get(column))
                {
                    if v.len() != dim {
                        warn!(
                            "{}: row {index} column {column:?} has {} dimensions, expected {dim}",
                            path.display(),
                            v.len()
                        );
                        mismatches += 1;
                    }
                }
            }
            records.push(record);
            Ok(())
        })?;

        stats.dimension_mismatches = mismatches;
        Ok((records, stats))
    }
}
