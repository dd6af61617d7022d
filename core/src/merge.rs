//! Merge engine: applies a selection on top of a target dataset
//!
//! Selections are applied tables first, then rows, then cells, so that row and
//! cell operations land on a freshly replaced table rather than on stale
//! pre-replacement content. The engine never mutates its inputs.

use crate::dataset::{Dataset, Row, KEY_COLUMN};
use crate::selection::{CellSelection, RowSelection, Selection, SelectionWarning};
use serde::{Deserialize, Serialize};

/// Mutation counts of one merge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeSummary {
    pub tables_copied: usize,
    pub rows_copied: usize,
    pub tables_deleted: usize,
    pub rows_deleted: usize,
}

impl MergeSummary {
    pub fn total(&self) -> usize {
        self.tables_copied + self.rows_copied + self.tables_deleted + self.rows_deleted
    }
}

/// Result of a merge: the new target and what happened
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub dataset: Dataset,
    pub summary: MergeSummary,
    pub warnings: Vec<SelectionWarning>,
}

/// Applies selections to datasets
pub struct MergeEngine;

impl MergeEngine {
    /// Compute the new target for `selection`, copying from `source`
    pub fn merge(target: &Dataset, source: &Dataset, selection: &Selection) -> MergeOutcome {
        let mut state = MergeState {
            dataset: target.clone(),
            summary: MergeSummary::default(),
            warnings: Vec::new(),
        };

        for table in &selection.selected_tables {
            state.apply_table(table, source);
        }
        for (index, row) in selection.selected_rows.iter().enumerate() {
            state.apply_row(index, row);
        }
        for (index, cells) in selection.selected_cells.iter().enumerate() {
            state.apply_cells(index, cells);
        }

        log::debug!(
            "Merge applied: {} tables copied, {} rows copied, {} tables deleted, {} rows deleted",
            state.summary.tables_copied,
            state.summary.rows_copied,
            state.summary.tables_deleted,
            state.summary.rows_deleted
        );

        MergeOutcome {
            dataset: state.dataset,
            summary: state.summary,
            warnings: state.warnings,
        }
    }
}

struct MergeState {
    dataset: Dataset,
    summary: MergeSummary,
    warnings: Vec<SelectionWarning>,
}

impl MergeState {
    /// Replace the table with the source copy, or delete it when the source lacks it
    fn apply_table(&mut self, table: &str, source: &Dataset) {
        match source.table(table) {
            Some(rows) => {
                self.dataset.insert_table(table, rows.clone());
                self.summary.tables_copied += 1;
                self.summary.rows_copied += rows.len();
            }
            None => {
                if self.dataset.remove_table(table).is_some() {
                    self.summary.tables_deleted += 1;
                }
            }
        }
    }

    fn apply_row(&mut self, index: usize, selection: &RowSelection) {
        let entry = format!("selectedRows[{index}]");
        if selection.table.is_empty() || selection.key.is_empty() {
            self.warnings
                .push(SelectionWarning::new(entry, "missing 'table' or 'key'"));
            return;
        }
        let (table, key) = (selection.table.as_str(), selection.key.as_str());

        match (&selection.source_row, &selection.target_row) {
            (Some(source_row), _) => {
                let row = match keyed_row(source_row, key) {
                    Some(row) => row,
                    None => {
                        self.warnings.push(SelectionWarning::new(
                            entry,
                            format!("source row key does not match '{key}'"),
                        ));
                        return;
                    }
                };
                let rows = self.dataset.table_entry(table);
                match position(rows, key) {
                    Some(i) => rows[i] = row,
                    None => rows.push(row),
                }
                self.summary.rows_copied += 1;
            }
            (None, Some(_)) => {
                let Some(rows) = self.dataset.table_mut(table) else {
                    return;
                };
                let Some(i) = position(rows, key) else {
                    return;
                };
                rows.remove(i);
                self.summary.rows_deleted += 1;
                if rows.is_empty() {
                    self.dataset.remove_table(table);
                    self.summary.tables_deleted += 1;
                }
            }
            (None, None) => {}
        }
    }

    fn apply_cells(&mut self, index: usize, selection: &CellSelection) {
        if selection.table.is_empty() || selection.key.is_empty() {
            self.warnings.push(SelectionWarning::new(
                format!("selectedCells[{index}]"),
                "missing 'table' or 'key'",
            ));
            return;
        }
        let Some(source_row) = &selection.source_row else {
            return;
        };
        if selection.columns.is_empty() {
            return;
        }

        let key = selection.key.as_str();
        let rows = self.dataset.table_entry(&selection.table);
        let i = match position(rows, key) {
            Some(i) => i,
            None => {
                rows.push(Row::with_key(key));
                rows.len() - 1
            }
        };
        let row = &mut rows[i];

        for column in &selection.columns {
            if column == KEY_COLUMN {
                continue;
            }
            if let Some(value) = source_row.get(column) {
                row.insert(column.as_str(), value.clone());
            }
        }
    }
}

/// First row whose key equals `key`
fn position(rows: &[Row], key: &str) -> Option<usize> {
    rows.iter().position(|row| row.key() == Some(key))
}

/// The source row as written to the target; fills in a missing key
fn keyed_row(source_row: &Row, key: &str) -> Option<Row> {
    match source_row.key() {
        Some(k) if k == key => Some(source_row.clone()),
        Some(_) => None,
        None if source_row.contains_column(KEY_COLUMN) => None,
        None => {
            let mut row = Row::with_key(key);
            for (column, value) in source_row.iter() {
                row.insert(column, value.clone());
            }
            Some(row)
        }
    }
}

/// Compute the new target for `selection`; see [`MergeEngine::merge`]
pub fn merge(target: &Dataset, source: &Dataset, selection: &Selection) -> MergeOutcome {
    MergeEngine::merge(target, source, selection)
}
