//! Command implementations for envsync CLI

use crate::cli::{Commands, ConfigCommand, DiffFilter};
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::progress::ProgressReporter;
use anyhow::{bail, Context, Result};
use envsync_core::config::{get_config_from, Config};
use envsync_core::{
    DatasetStore, MigrationRequest, MigrationSession, Selection, SelectionBuilder,
    SelectionWarning,
};
use std::io::{BufRead, Write};
use std::path::Path;
use std::sync::Arc;

/// Execute a command
pub fn execute_command(command: Commands, config_path: Option<&Path>) -> Result<()> {
    let config = get_config_from(config_path)?;

    match command {
        Commands::Tables { dataset, json } => tables_command(&config, &dataset, json),
        Commands::Show {
            dataset,
            table,
            json,
        } => show_command(&config, &dataset, table.as_deref(), json),
        Commands::Diff {
            source,
            target,
            filter,
            search,
            page,
            json,
        } => diff_command(&config, &source, &target, filter, search.as_deref(), page, json),
        Commands::Migrate {
            source,
            target,
            selection,
            table,
            row,
            cells,
            dry_run,
            force,
            json,
        } => {
            let flags = SelectionFlags {
                tables: table,
                rows: row,
                cells,
            };
            migrate_command(
                &config,
                &source,
                &target,
                selection.as_deref(),
                &flags,
                dry_run,
                force,
                json,
            )
        }
        Commands::Backups { dataset, json } => backups_command(&config, dataset.as_deref(), json),
        Commands::Config { command } => match command {
            ConfigCommand::Show => {
                PrettyPrinter::print_config(&config);
                Ok(())
            }
        },
    }
}

fn session(config: &Config) -> MigrationSession {
    MigrationSession::new(Arc::new(config.local_store()), config.excluded_columns())
}

/// List tables of a dataset
fn tables_command(config: &Config, dataset_id: &str, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let dataset = rt.block_on(config.local_store().load(dataset_id))?;

    if json {
        println!("{}", JsonFormatter::format_tables(&dataset)?);
    } else {
        PrettyPrinter::print_tables(dataset_id, &dataset);
    }
    Ok(())
}

/// Show dataset content
fn show_command(config: &Config, dataset_id: &str, table: Option<&str>, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let dataset = rt.block_on(config.local_store().load(dataset_id))?;

    if let Some(table) = table {
        if !dataset.contains_table(table) {
            bail!("Table '{table}' not found in dataset '{dataset_id}'");
        }
    }

    if json {
        match table {
            Some(table) => println!("{}", JsonFormatter::format(dataset.rows(table))?),
            None => println!("{}", JsonFormatter::format(&dataset)?),
        }
    } else {
        PrettyPrinter::print_dataset(dataset_id, &dataset, table);
    }
    Ok(())
}

/// Compare two datasets
fn diff_command(
    config: &Config,
    source: &str,
    target: &str,
    filter: DiffFilter,
    search: Option<&str>,
    page: usize,
    json: bool,
) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let session = session(config);

    let mut progress = ProgressReporter::start(&format!("Comparing {source} → {target}..."), json);
    let comparison = rt.block_on(session.compare(source, target))?;
    progress.finish(&format!(
        "Compared {} tables",
        comparison.reconciliation.table_count()
    ));

    let view = comparison.reconciliation.filtered(filter.into(), search);
    let rows_per_page = config.view.rows_per_page;
    if json {
        println!("{}", JsonFormatter::format_diff(&view, page, rows_per_page)?);
    } else {
        PrettyPrinter::print_diff(source, target, &view, page, rows_per_page);
    }
    Ok(())
}

/// Selection given on the command line
struct SelectionFlags {
    tables: Vec<String>,
    rows: Vec<String>,
    cells: Vec<String>,
}

impl SelectionFlags {
    fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.rows.is_empty() && self.cells.is_empty()
    }
}

/// Migrate a selection from source into target
#[allow(clippy::too_many_arguments)]
fn migrate_command(
    config: &Config,
    source: &str,
    target: &str,
    selection_file: Option<&Path>,
    flags: &SelectionFlags,
    dry_run: bool,
    force: bool,
    json: bool,
) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let session = session(config);

    let (selection, mut warnings) = match selection_file {
        Some(path) => read_selection_file(path)?,
        None => {
            if flags.is_empty() {
                bail!("Nothing to migrate: pass --selection, --table, --row or --cells");
            }
            let mut progress =
                ProgressReporter::start(&format!("Comparing {source} → {target}..."), json);
            let comparison = rt.block_on(session.compare(source, target))?;
            progress.finish("Comparison complete");
            (build_selection(&comparison.reconciliation, flags)?, Vec::new())
        }
    };

    if selection.is_empty() {
        if !json {
            PrettyPrinter::print_warnings(&warnings);
        }
        bail!("Nothing to migrate: the selection is empty");
    }

    let request = MigrationRequest {
        source: source.to_string(),
        target: target.to_string(),
        selection,
    };

    if !json {
        let preview = rt.block_on(session.preview(&request))?;
        PrettyPrinter::print_preview(source, target, &preview);
    }

    if !dry_run && !force {
        let question = format!("⚠️  '{target}' will be backed up and overwritten. Continue? (y/N)");
        let stdin = std::io::stdin();
        // JSON output owns stdout
        let confirmed = if json {
            confirm(&question, stdin.lock(), std::io::stderr())?
        } else {
            confirm(&question, stdin.lock(), std::io::stdout())?
        };
        if !confirmed {
            return Ok(());
        }
    }

    let mut report = if dry_run {
        rt.block_on(session.dry_run(&request))?
    } else {
        rt.block_on(session.migrate(&request))?
    };
    warnings.append(&mut report.warnings);
    report.warnings = warnings;

    if json {
        println!("{}", JsonFormatter::format(&report)?);
    } else {
        PrettyPrinter::print_migration_report(&report, dry_run);
    }
    Ok(())
}

/// Ask `question` on `out`; only an answer starting with 'y' confirms
fn confirm(question: &str, mut input: impl BufRead, mut out: impl Write) -> std::io::Result<bool> {
    writeln!(out, "{question}")?;
    out.flush()?;
    let mut user_input = String::new();
    input.read_line(&mut user_input)?;

    if user_input.trim().to_lowercase().starts_with('y') {
        return Ok(true);
    }
    writeln!(out, "❌ Migration cancelled.")?;
    Ok(false)
}

/// Parse a selection request body from a JSON file
fn read_selection_file(path: &Path) -> Result<(Selection, Vec<SelectionWarning>)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read selection file {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Selection file {} is not valid JSON", path.display()))?;
    Ok(Selection::from_request(&value)?)
}

/// Build a selection from `--table`, `--row` and `--cells` flags
fn build_selection(
    reconciliation: &envsync_core::Reconciliation,
    flags: &SelectionFlags,
) -> Result<Selection> {
    let mut builder = SelectionBuilder::new(reconciliation);
    for table in &flags.tables {
        builder.table(table)?;
    }
    for arg in &flags.rows {
        let (table, key) = parse_row_arg(arg)?;
        builder.row(table, key)?;
    }
    for arg in &flags.cells {
        let (table, key, columns) = parse_cells_arg(arg)?;
        builder.cells(table, key, &columns)?;
    }
    Ok(builder.build())
}

/// `TABLE/KEY`; the key may itself contain '/'
fn parse_row_arg(arg: &str) -> Result<(&str, &str)> {
    match arg.split_once('/') {
        Some((table, key)) if !table.is_empty() && !key.is_empty() => Ok((table, key)),
        _ => bail!("Invalid row '{arg}', expected TABLE/KEY"),
    }
}

/// `TABLE/KEY=col1,col2`
fn parse_cells_arg(arg: &str) -> Result<(&str, &str, Vec<&str>)> {
    let Some((row, columns)) = arg.rsplit_once('=') else {
        bail!("Invalid cells '{arg}', expected TABLE/KEY=col1,col2");
    };
    let (table, key) = parse_row_arg(row)?;
    let columns: Vec<&str> = columns
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    if columns.is_empty() {
        bail!("Invalid cells '{arg}', no columns listed");
    }
    Ok((table, key, columns))
}

/// List backups
fn backups_command(config: &Config, dataset_id: Option<&str>, json: bool) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    let backups = rt.block_on(config.local_store().list_backups(dataset_id))?;

    if json {
        println!("{}", JsonFormatter::format(&backups)?);
    } else {
        PrettyPrinter::print_backups(&backups);
    }
    Ok(())
}
