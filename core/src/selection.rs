//! Operator selections: whole tables, whole rows, or columns within a row

use crate::dataset::{Dataset, Row};
use crate::error::{EnvsyncError, Result};
use crate::reconcile::Reconciliation;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Row-level upsert or delete
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowSelection {
    pub table: String,
    pub key: String,
    #[serde(default)]
    pub source_row: Option<Row>,
    #[serde(default)]
    pub target_row: Option<Row>,
}

/// Column-level upsert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellSelection {
    pub table: String,
    pub key: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub source_row: Option<Row>,
}

/// Everything an operator picked for one migration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    #[serde(default)]
    pub selected_tables: Vec<String>,
    #[serde(default)]
    pub selected_rows: Vec<RowSelection>,
    #[serde(default)]
    pub selected_cells: Vec<CellSelection>,
}

/// A selection entry that was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionWarning {
    /// Location of the entry, e.g. `selectedRows[2]`
    pub entry: String,
    pub reason: String,
}

impl SelectionWarning {
    pub fn new(entry: impl Into<String>, reason: impl Into<String>) -> Self {
        let warning = Self {
            entry: entry.into(),
            reason: reason.into(),
        };
        log::warn!("Skipping {}: {}", warning.entry, warning.reason);
        warning
    }
}

impl std::fmt::Display for SelectionWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.entry, self.reason)
    }
}

/// What a selection would touch, for confirmation prompts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionPreview {
    pub tables: usize,
    pub rows: usize,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.selected_tables.is_empty()
            && self.selected_rows.is_empty()
            && self.selected_cells.is_empty()
    }

    /// Parse a request body entry by entry; malformed entries are skipped with a warning
    pub fn from_request(request: &Value) -> Result<(Self, Vec<SelectionWarning>)> {
        let object = request.as_object().ok_or_else(|| {
            EnvsyncError::invalid_selection("selection request must be a JSON object")
        })?;

        let mut selection = Selection::default();
        let mut warnings = Vec::new();

        for (index, entry) in entries(object.get("selectedTables"), "selectedTables", &mut warnings) {
            match entry.as_str() {
                Some(table) if !table.is_empty() => selection.selected_tables.push(table.to_string()),
                _ => warnings.push(SelectionWarning::new(
                    format!("selectedTables[{index}]"),
                    "table name must be a non-empty string",
                )),
            }
        }

        for (index, entry) in entries(object.get("selectedRows"), "selectedRows", &mut warnings) {
            let location = format!("selectedRows[{index}]");
            match parse_entry::<RowSelection>(entry) {
                Ok(row) => selection.selected_rows.push(row),
                Err(reason) => warnings.push(SelectionWarning::new(location, reason)),
            }
        }

        for (index, entry) in entries(object.get("selectedCells"), "selectedCells", &mut warnings) {
            let location = format!("selectedCells[{index}]");
            match parse_entry::<CellSelection>(entry) {
                Ok(cells) => selection.selected_cells.push(cells),
                Err(reason) => warnings.push(SelectionWarning::new(location, reason)),
            }
        }

        Ok((selection, warnings))
    }

    /// Tables and rows this selection would copy from `source`
    pub fn preview(&self, source: &Dataset) -> SelectionPreview {
        let table_rows: usize = self
            .selected_tables
            .iter()
            .map(|table| source.rows(table).len())
            .sum();
        SelectionPreview {
            tables: self.selected_tables.len(),
            rows: self.selected_rows.len() + table_rows,
        }
    }
}

fn entries<'a>(
    value: Option<&'a Value>,
    field: &str,
    warnings: &mut Vec<SelectionWarning>,
) -> Vec<(usize, &'a Value)> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().enumerate().collect(),
        Some(_) => {
            warnings.push(SelectionWarning::new(field, "expected an array"));
            Vec::new()
        }
    }
}

/// Deserialize one entry, requiring non-empty `table` and `key`
fn parse_entry<T: serde::de::DeserializeOwned>(entry: &Value) -> std::result::Result<T, String> {
    for field in ["table", "key"] {
        match entry.get(field).and_then(Value::as_str) {
            Some(s) if !s.is_empty() => {}
            _ => return Err(format!("missing '{field}'")),
        }
    }
    serde_json::from_value(entry.clone()).map_err(|e| e.to_string())
}

/// Builds a selection against a reconciliation, the way the diff view does
///
/// A `(table, key)` is never both a full-row and a cell selection: selecting a
/// row drops earlier cell selections for the same key, and cell selections for
/// an already selected row are ignored.
#[derive(Debug)]
pub struct SelectionBuilder<'a> {
    reconciliation: &'a Reconciliation,
    tables: IndexSet<String>,
    rows: Vec<RowSelection>,
    cells: Vec<CellSelection>,
}

impl<'a> SelectionBuilder<'a> {
    pub fn new(reconciliation: &'a Reconciliation) -> Self {
        Self {
            reconciliation,
            tables: IndexSet::new(),
            rows: Vec::new(),
            cells: Vec::new(),
        }
    }

    /// Select a whole table (copy from source, or delete when source lacks it)
    pub fn table(&mut self, table: &str) -> Result<&mut Self> {
        if self.reconciliation.table(table).is_none() {
            return Err(EnvsyncError::invalid_selection(format!(
                "unknown table '{table}'"
            )));
        }
        self.tables.insert(table.to_string());
        Ok(self)
    }

    /// Select a whole row; both sides are taken from the reconciliation
    pub fn row(&mut self, table: &str, key: &str) -> Result<&mut Self> {
        let classified = self.reconciliation.row(table, key).ok_or_else(|| {
            EnvsyncError::invalid_selection(format!("unknown row '{key}' in table '{table}'"))
        })?;

        self.cells.retain(|c| !(c.table == table && c.key == key));
        if self.has_row(table, key) {
            return Ok(self);
        }
        self.rows.push(RowSelection {
            table: table.to_string(),
            key: key.to_string(),
            source_row: classified.source_row.clone(),
            target_row: classified.target_row.clone(),
        });
        Ok(self)
    }

    /// Select individual columns of a source row
    pub fn cells<S: AsRef<str>>(&mut self, table: &str, key: &str, columns: &[S]) -> Result<&mut Self> {
        let classified = self.reconciliation.row(table, key).ok_or_else(|| {
            EnvsyncError::invalid_selection(format!("unknown row '{key}' in table '{table}'"))
        })?;
        let source_row = classified.source_row.clone().ok_or_else(|| {
            EnvsyncError::invalid_selection(format!(
                "row '{key}' in table '{table}' has no source side to copy cells from"
            ))
        })?;

        if self.has_row(table, key) {
            log::debug!("Row '{key}' in '{table}' already selected, ignoring cell selection");
            return Ok(self);
        }

        match self.cells.iter_mut().find(|c| c.table == table && c.key == key) {
            Some(existing) => {
                for column in columns {
                    let column = column.as_ref();
                    if !existing.columns.iter().any(|c| c == column) {
                        existing.columns.push(column.to_string());
                    }
                }
            }
            None => self.cells.push(CellSelection {
                table: table.to_string(),
                key: key.to_string(),
                columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
                source_row: Some(source_row),
            }),
        }
        Ok(self)
    }

    fn has_row(&self, table: &str, key: &str) -> bool {
        self.rows.iter().any(|r| r.table == table && r.key == key)
    }

    pub fn build(&self) -> Selection {
        Selection {
            selected_tables: self.tables.iter().cloned().collect(),
            selected_rows: self.rows.clone(),
            selected_cells: self.cells.clone(),
        }
    }
}
