//! Output formatting utilities

use envsync_core::reconcile::TableReconciliation;
use envsync_core::selection::SelectionPreview;
use envsync_core::{
    BackupHandle, CellValue, Classification, ClassifiedRow, Config, Dataset, MigrationReport,
    Reconciliation, Row, SelectionWarning,
};
use serde::Serialize;

/// Pretty printer for envsync output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print table names with row counts
    pub fn print_tables(dataset_id: &str, dataset: &Dataset) {
        println!("🗂️  Dataset: {dataset_id}");
        if dataset.is_empty() {
            println!("└─ (no tables)");
            return;
        }
        let count = dataset.table_count();
        for (i, (name, rows)) in dataset.tables().enumerate() {
            println!("{} {name}: {} rows", tree_prefix(i, count), rows.len());
        }
    }

    /// Print dataset content, optionally a single table
    pub fn print_dataset(dataset_id: &str, dataset: &Dataset, table: Option<&str>) {
        println!("🗂️  Dataset: {dataset_id}");
        let tables: Vec<(&str, &[Row])> = dataset
            .tables()
            .filter(|(name, _)| table.map_or(true, |wanted| wanted == *name))
            .collect();
        if tables.is_empty() {
            println!("└─ (no matching tables)");
            return;
        }

        for (i, (name, rows)) in tables.iter().enumerate() {
            let last_table = i == tables.len() - 1;
            println!("{} 📋 {name} ({} rows)", tree_prefix(i, tables.len()), rows.len());
            let indent = if last_table { "   " } else { "│  " };
            for (j, row) in rows.iter().enumerate() {
                println!(
                    "{indent}{} {}",
                    tree_prefix(j, rows.len()),
                    format_row(row)
                );
            }
        }
    }

    /// Print a reconciliation page by page
    pub fn print_diff(
        source: &str,
        target: &str,
        view: &Reconciliation,
        page: usize,
        rows_per_page: usize,
    ) {
        println!("🔍 Diff: {source} → {target}");

        let counts = view.counts();
        if view.table_count() == 0 {
            println!("└─ No rows match the current filter");
            return;
        }

        let count = view.table_count();
        for (i, table) in view.tables().enumerate() {
            let last_table = i == count - 1;
            Self::print_table_diff(
                table,
                tree_prefix(i, count),
                if last_table { "   " } else { "│  " },
                page,
                rows_per_page,
            );
        }

        println!();
        println!(
            "📊 {} same, {} diff, {} missing in target, {} missing in source",
            counts.same, counts.diff, counts.missing_in_target, counts.missing_in_source
        );
    }

    fn print_table_diff(
        table: &TableReconciliation,
        prefix: &str,
        indent: &str,
        page: usize,
        rows_per_page: usize,
    ) {
        let (rows, total_pages) = page_slice(&table.rows, page, rows_per_page);
        let marker = if table.counts().has_changes() { "❌" } else { "✅" };
        println!(
            "{prefix} {marker} {} ({} rows, page {}/{})",
            table.name,
            table.rows.len(),
            page.clamp(1, total_pages),
            total_pages
        );

        for (j, row) in rows.iter().enumerate() {
            let last_row = j == rows.len() - 1;
            println!(
                "{indent}{} {} {}",
                tree_prefix(j, rows.len()),
                classification_marker(row.classification),
                row.key
            );
            if row.classification == Classification::Diff {
                let detail_indent = if last_row { "   " } else { "│  " };
                Self::print_differing_cells(row, &format!("{indent}{detail_indent}"));
            }
        }
    }

    /// Print target → source values of each differing column
    fn print_differing_cells(row: &ClassifiedRow, prefix: &str) {
        let columns = &row.differing_columns;
        for (k, column) in columns.iter().enumerate() {
            let before = row.target_row.as_ref().and_then(|r| r.get(column));
            let after = row.source_row.as_ref().and_then(|r| r.get(column));
            println!(
                "{prefix}{} {column}: {} → {}",
                tree_prefix(k, columns.len()),
                format_cell(before),
                format_cell(after)
            );
        }
    }

    /// Print what a migration is about to touch
    pub fn print_preview(source: &str, target: &str, preview: &SelectionPreview) {
        println!("📦 Migration: {source} → {target}");
        println!("├─ Tables: {}", preview.tables);
        println!("└─ Rows: {}", preview.rows);
    }

    /// Print the outcome of a migration or dry run
    pub fn print_migration_report(report: &MigrationReport, dry_run: bool) {
        if dry_run {
            println!("🔍 Dry run - would migrate {} → {}:", report.source, report.target);
        } else {
            println!("✅ Migrated {} → {}", report.source, report.target);
        }
        let summary = &report.summary;
        println!("├─ Tables copied: {}", summary.tables_copied);
        println!("├─ Rows copied: {}", summary.rows_copied);
        println!("├─ Tables deleted: {}", summary.tables_deleted);
        match &report.backup {
            Some(backup) => {
                println!("├─ Rows deleted: {}", summary.rows_deleted);
                println!("└─ 💾 Backup: {}", backup.location);
            }
            None => println!("└─ Rows deleted: {}", summary.rows_deleted),
        }
        Self::print_warnings(&report.warnings);
    }

    /// Print skipped selection entries
    pub fn print_warnings(warnings: &[SelectionWarning]) {
        if warnings.is_empty() {
            return;
        }
        println!();
        println!("⚠️  Skipped {} selection entries:", warnings.len());
        for (i, warning) in warnings.iter().enumerate() {
            println!("{} {warning}", tree_prefix(i, warnings.len()));
        }
    }

    /// Print backup list
    pub fn print_backups(backups: &[BackupHandle]) {
        if backups.is_empty() {
            println!("No backups found.");
            return;
        }

        println!("💾 Backups:");
        for (i, backup) in backups.iter().enumerate() {
            println!(
                "{} {} ({}) {}",
                tree_prefix(i, backups.len()),
                backup.dataset,
                backup.created.format("%Y-%m-%d %H:%M:%S UTC"),
                backup.location
            );
        }
    }

    /// Print effective configuration
    pub fn print_config(config: &Config) {
        println!("⚙️  envsync configuration");
        println!("├─ Store root: {}", config.store.root.display());
        println!("├─ Backup dir: {}", config.store.backup_dir.display());
        println!(
            "├─ Excluded columns: [{}]",
            config.reconcile.excluded_columns.join(", ")
        );
        println!("├─ Rows per page: {}", config.view.rows_per_page);
        if config.datasets.is_empty() {
            println!("└─ Datasets: (none configured)");
            return;
        }
        println!("└─ Datasets:");
        let count = config.datasets.len();
        for (i, (id, path)) in config.datasets.iter().enumerate() {
            println!("   {} {id} → {}", tree_prefix(i, count), path.display());
        }
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(value)?)
    }

    /// Table names with row counts as a JSON object
    pub fn format_tables(dataset: &Dataset) -> anyhow::Result<String> {
        let tables: serde_json::Map<String, serde_json::Value> = dataset
            .tables()
            .map(|(name, rows)| (name.to_string(), rows.len().into()))
            .collect();
        Self::format(&tables)
    }

    /// One page of each table of a reconciliation, with overall counts
    pub fn format_diff(
        view: &Reconciliation,
        page: usize,
        rows_per_page: usize,
    ) -> anyhow::Result<String> {
        let tables: Vec<serde_json::Value> = view
            .tables()
            .map(|table| {
                let (rows, total_pages) = page_slice(&table.rows, page, rows_per_page);
                serde_json::json!({
                    "name": table.name,
                    "columns": table.columns,
                    "counts": table.counts(),
                    "page": page.clamp(1, total_pages),
                    "totalPages": total_pages,
                    "rows": rows,
                })
            })
            .collect();
        Self::format(&serde_json::json!({
            "counts": view.counts(),
            "tables": tables,
        }))
    }
}

/// Rows on 1-based `page`, and the page count (at least 1)
fn page_slice<T>(items: &[T], page: usize, per_page: usize) -> (&[T], usize) {
    let per_page = per_page.max(1);
    let total_pages = items.len().div_ceil(per_page).max(1);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * per_page;
    let end = (start + per_page).min(items.len());
    (&items[start.min(end)..end], total_pages)
}

fn tree_prefix(index: usize, count: usize) -> &'static str {
    if index + 1 == count {
        "└─"
    } else {
        "├─"
    }
}

fn classification_marker(classification: Classification) -> &'static str {
    match classification {
        Classification::Same => "✅",
        Classification::Diff => "❌",
        Classification::MissingInTarget => "➕",
        Classification::MissingInSource => "➖",
    }
}

fn format_cell(value: Option<&CellValue>) -> String {
    match value {
        Some(v) if !v.is_blank() => format!("'{v}'"),
        _ => "(empty)".to_string(),
    }
}

fn format_row(row: &Row) -> String {
    row.iter()
        .map(|(column, value)| format!("{column}={}", format_cell(Some(value))))
        .collect::<Vec<_>>()
        .join(", ")
}
