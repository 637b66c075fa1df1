//! Foreign-key checks across the generated CSV files.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Write;

use itertools::Itertools;
use tracing::{info, warn};

use crate::codec::CodecResult;
use crate::table::TableReader;

pub const DEFAULT_MAX_EXAMPLES: usize = 5;

/// `table.column` must reference an existing `ref_table.ref_column` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

impl ForeignKey {
    pub fn new(table: &str, column: &str, ref_table: &str, ref_column: &str) -> Self {
        Self {
            table: table.to_string(),
            column: column.to_string(),
            ref_table: ref_table.to_string(),
            ref_column: ref_column.to_string(),
        }
    }
}

pub fn killrvideo_foreign_keys() -> Vec<ForeignKey> {
    [
        ("user_credentials", "email", "users", "email"),
        ("user_credentials", "userid", "users", "userid"),
        ("videos", "userid", "users", "userid"),
        ("latest_videos", "videoid", "videos", "videoid"),
        ("comments", "videoid", "videos", "videoid"),
        ("comments", "userid", "users", "userid"),
        ("comments_by_user", "videoid", "videos", "videoid"),
        ("comments_by_user", "userid", "users", "userid"),
        ("video_ratings", "videoid", "videos", "videoid"),
        ("video_ratings_by_user", "videoid", "videos", "videoid"),
        ("video_ratings_by_user", "userid", "users", "userid"),
        ("video_playback_stats", "videoid", "videos", "videoid"),
        ("user_preferences", "userid", "users", "userid"),
    ]
    .into_iter()
    .map(|(table, column, ref_table, ref_column)| {
        ForeignKey::new(table, column, ref_table, ref_column)
    })
    .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// Zero-based data row index (the header isn't counted).
    pub row: usize,
    pub column: String,
    pub value: String,
    pub ref_table: String,
    pub ref_column: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Row {}: {} {} not in {}.{}",
            self.row, self.column, self.value, self.ref_table, self.ref_column
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableReport {
    pub rows_checked: usize,
    /// Rows whose field count differs from the header, plus rows that
    /// couldn't be read at all.
    pub rows_malformed: usize,
    pub violations: Vec<Violation>,
}

impl TableReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty() && self.rows_malformed == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityReport {
    pub tables: BTreeMap<String, TableReport>,
    /// Dependent tables whose file wasn't there to check.
    pub skipped: Vec<String>,
}

impl IntegrityReport {
    pub fn is_valid(&self) -> bool {
        self.tables.values().all(TableReport::is_clean)
    }

    pub fn violation_count(&self) -> usize {
        self.tables.values().map(|t| t.violations.len()).sum()
    }

    pub fn malformed_count(&self) -> usize {
        self.tables.values().map(|t| t.rows_malformed).sum()
    }

    /// Human-readable outcome: one line per checked table, followed by up to
    /// `max_examples` violations for each table that has any.
    pub fn summary(&self, max_examples: usize) -> String {
        let mut out = String::new();
        let failing = self.tables.values().filter(|t| !t.is_clean()).count();

        if failing == 0 {
            let _ = writeln!(out, "VALIDATION SUCCESSFUL");
            let _ = writeln!(out, "All referential integrity constraints are satisfied.");
        } else {
            let _ = writeln!(out, "VALIDATION FAILED");
            let malformed = self.malformed_count();
            if malformed > 0 {
                let _ = writeln!(
                    out,
                    "Found {} error(s) and {malformed} malformed row(s) in {failing} table(s):",
                    self.violation_count(),
                );
            } else {
                let _ = writeln!(
                    out,
                    "Found {} error(s) in {failing} table(s):",
                    self.violation_count(),
                );
            }
        }

        for (table, report) in &self.tables {
            let _ = write!(
                out,
                "  {table}: {} rows checked, {} error(s)",
                report.rows_checked,
                report.violations.len()
            );
            if report.rows_malformed > 0 {
                let _ = write!(out, ", {} malformed row(s)", report.rows_malformed);
            }
            let _ = writeln!(out);

            for violation in report.violations.iter().take(max_examples) {
                let _ = writeln!(out, "    - {violation}");
            }
            if report.violations.len() > max_examples {
                let _ = writeln!(
                    out,
                    "    ... and {} more errors",
                    report.violations.len() - max_examples
                );
            }
        }

        if !self.skipped.is_empty() {
            let _ = writeln!(out, "Not checked (file missing): {}", self.skipped.join(", "));
        }
        out
    }
}

pub struct IntegrityChecker<'a> {
    reader: &'a TableReader,
}

impl<'a> IntegrityChecker<'a> {
    pub fn new(reader: &'a TableReader) -> Self {
        Self { reader }
    }

    /// Load each referenced key column once, then check every dependent
    /// table. A missing referenced file is fatal; a missing dependent file is
    /// only noted in the report.
    pub fn check(&self, foreign_keys: &[ForeignKey]) -> CodecResult<IntegrityReport> {
        let mut keys: HashMap<(&str, &str), HashSet<String>> = HashMap::new();
        for fk in foreign_keys {
            let target = (fk.ref_table.as_str(), fk.ref_column.as_str());
            if !keys.contains_key(&target) {
                let values = self.load_keys(&fk.ref_table, &fk.ref_column)?;
                info!(
                    "Loaded {} {}.{} keys",
                    values.len(),
                    fk.ref_table,
                    fk.ref_column
                );
                keys.insert(target, values);
            }
        }

        let mut report = IntegrityReport::default();
        let by_table = foreign_keys
            .iter()
            .into_group_map_by(|fk| fk.table.as_str());

        for (table, fks) in by_table.into_iter().sorted_by_key(|(table, _)| *table) {
            if !self.reader.has_table(table) {
                warn!("{table}: file not found, skipping");
                report.skipped.push(table.to_string());
                continue;
            }

            let mut table_report = TableReport::default();
            let stats = self.reader.scan_lenient(table, |columns, index, row| {
                if row.len() != columns.len() {
                    warn!(
                        "{table}: row {index} has {} fields, expected {}",
                        row.len(),
                        columns.len()
                    );
                    table_report.rows_malformed += 1;
                }
                for fk in &fks {
                    let value = columns
                        .iter()
                        .position(|c| *c == fk.column)
                        .and_then(|i| row.get(i))
                        .unwrap_or_default();
                    let known = &keys[&(fk.ref_table.as_str(), fk.ref_column.as_str())];
                    if !known.contains(value) {
                        table_report.violations.push(Violation {
                            row: index,
                            column: fk.column.clone(),
                            value: value.to_string(),
                            ref_table: fk.ref_table.clone(),
                            ref_column: fk.ref_column.clone(),
                        });
                    }
                }
                Ok(())
            })?;
            table_report.rows_checked = stats.rows_read;
            table_report.rows_malformed += stats.rows_failed;

            if table_report.is_clean() {
                info!("{table}: all foreign keys valid");
            } else {
                warn!(
                    "{table}: found {} errors in {} rows ({} malformed)",
                    table_report.violations.len(),
                    table_report.rows_checked,
                    table_report.rows_malformed
                );
            }
            report.tables.insert(table.to_string(), table_report);
        }

        Ok(report)
    }

    fn load_keys(&self, table: &str, column: &str) -> CodecResult<HashSet<String>> {
        let mut values = HashSet::new();
        self.reader.scan(table, |columns, _, row| {
            if let Some(value) = columns
                .iter()
                .position(|c| c == column)
                .and_then(|i| row.get(i))
            {
                values.insert(value.to_string());
            }
            Ok(())
        })?;
        Ok(values)
    }
}
