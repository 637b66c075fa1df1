use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use killrvideo_bulk::codec::{CsvDialect, NoHints, TypeHints};
use killrvideo_bulk::config::schema::{load_config, load_config_from_env, AppConfig};
use killrvideo_bulk::convert::convert_dir;
use killrvideo_bulk::integrity::{killrvideo_foreign_keys, IntegrityChecker};
use killrvideo_bulk::schema::SchemaRegistry;
use killrvideo_bulk::table::TableReader;

#[derive(Debug, Parser)]
#[clap(name = "killrvideo-bulk", version, about = "KillrVideo bulk-load CSV tooling")]
struct Args {
    /// Path to a TOML config file
    #[clap(short, long, global = true, value_parser)]
    config: Option<PathBuf>,

    /// Log as JSON lines instead of plain text
    #[clap(long, global = true, action)]
    json_logs: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check foreign keys across the table files
    Validate {
        #[clap(value_parser)]
        data_dir: Option<PathBuf>,
    },
    /// Rewrite legacy CQL exports for the bulk loader
    Convert {
        #[clap(value_parser)]
        input_dir: Option<PathBuf>,
        #[clap(value_parser)]
        output_dir: Option<PathBuf>,
    },
    /// Print a table file as line-delimited JSON
    Decode {
        #[clap(value_parser)]
        table: String,
        /// Read this file instead of `<data dir>/<table>.csv`
        #[clap(short, long, value_parser)]
        file: Option<PathBuf>,
        /// Ignore the declared schema and guess every column's type
        #[clap(long, action)]
        infer: bool,
    },
    /// Print declared columns and types
    Schema {
        #[clap(value_parser)]
        table: Option<String>,
    },
}

fn prepare_tracing(json_logs: bool) -> Result<()> {
    // Route `log` records from dependencies through tracing
    LogTracer::init()?;

    let builder = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr);

    if json_logs {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    prepare_tracing(args.json_logs)?;

    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => load_config_from_env().context("Failed to load config")?,
    };
    let dialect = config.csv.to_dialect()?;
    let registry = SchemaRegistry::killrvideo();

    match args.command {
        Command::Validate { data_dir } => {
            let data_dir = data_dir.unwrap_or_else(|| config.data.dir.clone());
            if !validate(&config, &data_dir, dialect)? {
                io::stdout().flush()?;
                process::exit(1);
            }
        }
        Command::Convert {
            input_dir,
            output_dir,
        } => {
            let input_dir = input_dir.unwrap_or_else(|| config.data.dir.clone());
            let output_dir = output_dir.unwrap_or_else(|| config.data.output_dir.clone());
            info!(
                "Converting {} -> {}",
                input_dir.display(),
                output_dir.display()
            );

            let converted = convert_dir(
                &input_dir,
                &output_dir,
                &registry,
                CsvDialect::legacy(),
                dialect,
            )
            .with_context(|| format!("Failed to convert {}", input_dir.display()))?;
            for (table, rows) in converted {
                println!("{table}: {rows} rows");
            }
        }
        Command::Decode { table, file, infer } => {
            let schema = registry.get(&table)?;
            let hints: &dyn TypeHints = if infer { &NoHints } else { schema };

            let reader = TableReader::try_new(&config.data.dir, dialect)?;
            let path = file.unwrap_or_else(|| reader.table_path(&table));
            let (records, stats) = reader
                .read_path(&path, hints)
                .with_context(|| format!("Failed to read {}", path.display()))?;

            let mut out = BufWriter::new(io::stdout().lock());
            for record in &records {
                serde_json::to_writer(&mut out, record)?;
                out.write_all(b"\n")?;
            }
            out.flush()?;

            info!("{table}: decoded {} rows", stats.rows_read);
            if stats.rows_failed > 0 || stats.dimension_mismatches > 0 {
                warn!(
                    "{table}: {} unreadable rows, {} vectors of the wrong dimension",
                    stats.rows_failed, stats.dimension_mismatches
                );
            }
        }
        Command::Schema { table } => {
            let schemas = match table {
                Some(table) => vec![registry.get(&table)?],
                None => registry.tables().collect(),
            };
            for schema in schemas {
                println!("{}", schema.name);
                for (column, column_type) in schema.columns() {
                    println!("  {column}: {column_type}");
                }
            }
        }
    }

    Ok(())
}

fn validate(config: &AppConfig, data_dir: &Path, dialect: CsvDialect) -> Result<bool> {
    info!("Validating {}", data_dir.display());
    let reader = TableReader::try_new(data_dir, dialect)?;
    let report = IntegrityChecker::new(&reader)
        .check(&killrvideo_foreign_keys())
        .context("Referential integrity check could not run")?;

    print!("{}", report.summary(config.validation.max_examples));
    Ok(report.is_valid())
}
