//! Rewrite legacy CQL exports into files the bulk loader accepts.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::codec::{decode_field, encode_value, CodecResult, CsvDialect, Row};
use crate::data_types::Value;
use crate::schema::{ColumnType, SchemaRegistry, TableSchema};
use crate::table::{table_file_name, TableReader};

/// `{"a","b"}` becomes `["a","b"]`. Anything that isn't a readable set is
/// returned untouched.
pub fn convert_set_literal(column: &str, raw: &str) -> CodecResult<String> {
    match decode_field(column, raw, Some(ColumnType::Set)) {
        Some(value @ Value::Set(_)) => encode_value(column, Some(&value), ColumnType::Set),
        _ => Ok(raw.to_string()),
    }
}

/// Copy one table file, reframing it for `output_dialect` and rewriting the
/// set columns declared in `schema`. Returns the number of rows written.
pub fn convert_table(
    input: &Path,
    output: &Path,
    schema: &TableSchema,
    input_dialect: CsvDialect,
    output_dialect: CsvDialect,
) -> CodecResult<usize> {
    let input_dir = input.parent().unwrap_or_else(|| Path::new("."));
    let reader = TableReader::try_new(input_dir, input_dialect)?;
    let output_dialect = output_dialect.validate()?;
    let mut writer = output_dialect.writer_builder().from_path(output)?;

    let mut header_written = false;
    let mut set_columns = vec![];
    let mut rows = 0;

    let stats = reader.scan_path(input, |columns, _, row| {
        if !header_written {
            set_columns = columns
                .iter()
                .map(|c| schema.column_type(c) == Some(ColumnType::Set))
                .collect();
            writer.write_record(Row::new(columns.to_vec()).framed_fields(&output_dialect))?;
            header_written = true;
        }

        let fields = row
            .fields()
            .iter()
            .enumerate()
            .map(|(i, field)| match (set_columns.get(i), field.is_empty()) {
                (Some(true), false) => convert_set_literal(&columns[i], field),
                _ => Ok(field.clone()),
            })
            .collect::<CodecResult<Vec<_>>>()?;
        writer.write_record(Row::new(fields).framed_fields(&output_dialect))?;
        rows += 1;
        Ok(())
    })?;

    // A file with a header but no rows still gets its header copied.
    if !header_written {
        let columns: Vec<String> = input_dialect
            .reader_builder()
            .has_headers(true)
            .from_path(input)?
            .headers()?
            .iter()
            .map(String::from)
            .collect();
        writer.write_record(Row::new(columns).framed_fields(&output_dialect))?;
    }
    writer.flush()?;

    if stats.rows_failed > 0 {
        warn!("{}: {} rows failed", schema.name, stats.rows_failed);
    }
    Ok(rows)
}

/// Convert every registered table found in `input_dir`. Tables without a
/// file are skipped.
pub fn convert_dir(
    input_dir: &Path,
    output_dir: &Path,
    registry: &SchemaRegistry,
    input_dialect: CsvDialect,
    output_dialect: CsvDialect,
) -> CodecResult<Vec<(String, usize)>> {
    fs::create_dir_all(output_dir)?;
    let mut converted = vec![];

    for schema in registry.tables() {
        let file_name = table_file_name(&schema.name);
        let input = input_dir.join(&file_name);
        if !input.is_file() {
            info!("{}: not found, skipping", input.display());
            continue;
        }

        let rows = convert_table(
            &input,
            &output_dir.join(&file_name),
            schema,
            input_dialect,
            output_dialect,
        )?;
        info!("Converted {rows} rows -> {file_name}");
        converted.push((schema.name.clone(), rows));
    }

    Ok(converted)
}
