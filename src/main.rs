//! `minidb` command-line shell.
//!
//! ```bash
//! # Start the interactive shell on ./data
//! minidb
//!
//! # Run one statement and exit
//! minidb -d /tmp/db -e "SELECT * FROM users WHERE id = 1"
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use comfy_table::{Cell, ContentArrangement, Table};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use minidb::{Database, DatabaseConfig, ExecuteResult, Value};

const PROMPT: &str = "minidb> ";

const HELP: &str = "\
Statements:
  CREATE TABLE <name> (<col> <type> [PRIMARY KEY], ...)
  DROP TABLE [IF EXISTS] <name>
  INSERT INTO <name> (<col>, ...) VALUES (<value>, ...)
  SELECT <* | col, ...> FROM <name> [WHERE <cond> [AND <cond>]...] [LIMIT <n>]
  UPDATE <name> SET <col> = <value>, ... [WHERE ...]
  DELETE FROM <name> [WHERE ...]
  SHOW TABLES
  DESCRIBE <name>

Types: int, float, str, bool
Operators: = != > < >= <=

Shell commands:
  help         show this message
  exit, quit   leave the shell";

/// Interactive shell for a minidb data directory
#[derive(Parser, Debug)]
#[command(name = "minidb", version, about)]
struct Args {
    /// Directory holding the row logs
    #[arg(short = 'd', long, value_name = "DIR", env = "MINIDB_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Directory holding the schema documents (default: <DATA_DIR>/metadata)
    #[arg(long, value_name = "DIR", env = "MINIDB_METADATA_DIR")]
    metadata_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short = 'c', long, value_name = "FILE", env = "MINIDB_CONFIG")]
    config: Option<PathBuf>,

    /// Fail statements whose WHERE clause compares incomparable values
    #[arg(long)]
    strict: bool,

    /// fsync row logs after every write
    #[arg(long)]
    sync: bool,

    /// Execute a single statement and exit
    #[arg(short = 'e', long, value_name = "STATEMENT")]
    execute: Option<String>,

    /// Log filter, e.g. `info` or `minidb=debug`
    #[arg(long, default_value = "warn", env = "MINIDB_LOG")]
    log_level: String,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level);

    let config = load_config(&args)?;
    let mut db = Database::open(config).context("failed to open database")?;

    match &args.execute {
        Some(statement) => {
            info!(statement = %statement, "executing single statement");
            let result = db.execute(statement)?;
            println!("{}", format_result(&result));
            Ok(())
        }
        None => run_repl(&mut db),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &Args) -> Result<DatabaseConfig> {
    let mut config = match &args.config {
        Some(path) => DatabaseConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => DatabaseConfig::default(),
    };

    // command line overrides the file
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(dir) = &args.metadata_dir {
        config.metadata_dir = Some(dir.clone());
    }
    config.strict_comparisons |= args.strict;
    config.sync_writes |= args.sync;

    Ok(config)
}

fn run_repl(db: &mut Database) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    println!(
        "minidb {} on {}. Type 'help' for usage, 'exit' to quit.",
        env!("CARGO_PKG_VERSION"),
        db.config().data_dir.display()
    );

    loop {
        match editor.readline(PROMPT) {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Err(e) = editor.add_history_entry(line) {
                    warn!("failed to record history: {}", e);
                }

                match line.to_ascii_lowercase().trim_end_matches(';') {
                    "exit" | "quit" => break,
                    "help" => println!("{HELP}"),
                    _ => match db.execute(line) {
                        Ok(result) => println!("{}", format_result(&result)),
                        Err(e) => eprintln!("Error: {e}"),
                    },
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                error!("readline error: {}", e);
                break;
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

/// Renders a statement result for the terminal.
fn format_result(result: &ExecuteResult) -> String {
    match result {
        ExecuteResult::Selected { columns, rows, .. } => {
            let mut table = new_table(columns.iter().map(String::as_str));
            for row in rows {
                table.add_row(columns.iter().map(|col| {
                    Cell::new(row.get(col).unwrap_or(&Value::Null).to_plain_string())
                }));
            }
            format!("{table}\n{}", result.message())
        }
        ExecuteResult::Tables(names) if !names.is_empty() => {
            let mut table = new_table(["table"]);
            for name in names {
                table.add_row([Cell::new(name)]);
            }
            format!("{table}\n{}", result.message())
        }
        ExecuteResult::Schema(schema) => {
            let mut table = new_table(["column", "type", "key"]);
            for column in &schema.columns {
                let key = if schema.primary_key.as_deref() == Some(column.name.as_str()) {
                    "PRIMARY"
                } else {
                    ""
                };
                table.add_row([
                    Cell::new(&column.name),
                    Cell::new(column.data_type),
                    Cell::new(key),
                ]);
            }
            table.to_string()
        }
        _ => result.message(),
    }
}

fn new_table<'a>(header: impl IntoIterator<Item = &'a str>) -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_header(header);
    table
}
