//! Row reconciliation between a source and a target dataset
//!
//! Every row key found in either dataset is classified exactly once per table:
//! present on both sides and equal, present on both sides and different, or
//! present on one side only.

use crate::dataset::{CellValue, Dataset, Row, KEY_COLUMN};
use crate::error::{EnvsyncError, Result};
use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Columns ignored by the reconciler unless configured otherwise
pub const DEFAULT_EXCLUDED_COLUMNS: &[&str] = &["lastUpdated", "timestamp", "id"];

/// Columns ignored when deciding whether two rows differ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExcludedColumns(IndexSet<String>);

impl Default for ExcludedColumns {
    fn default() -> Self {
        Self::new(DEFAULT_EXCLUDED_COLUMNS.iter().copied())
    }
}

impl ExcludedColumns {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(columns.into_iter().map(Into::into).collect())
    }

    pub fn none() -> Self {
        Self(IndexSet::new())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

/// Classification of one row key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    Same,
    Diff,
    MissingInTarget,
    MissingInSource,
}

impl Classification {
    /// Classify a key from its source and target rows; `None` when both are absent
    pub fn of(
        source: Option<&Row>,
        target: Option<&Row>,
        excluded: &ExcludedColumns,
    ) -> Option<Self> {
        match (source, target) {
            (Some(s), Some(t)) => {
                if rows_differ(s, t, excluded) {
                    Some(Classification::Diff)
                } else {
                    Some(Classification::Same)
                }
            }
            (Some(_), None) => Some(Classification::MissingInTarget),
            (None, Some(_)) => Some(Classification::MissingInSource),
            (None, None) => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            Classification::MissingInTarget | Classification::MissingInSource
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Same => "same",
            Classification::Diff => "diff",
            Classification::MissingInTarget => "missing-in-target",
            Classification::MissingInSource => "missing-in-source",
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Absent, null and "" are the same value; 0 and false are not
pub fn values_equivalent(a: Option<&CellValue>, b: Option<&CellValue>) -> bool {
    let a = a.filter(|v| !v.is_blank());
    let b = b.filter(|v| !v.is_blank());
    a == b
}

/// Non-excluded columns whose values differ, in first-seen order
pub fn differing_columns(source: &Row, target: &Row, excluded: &ExcludedColumns) -> Vec<String> {
    compared_columns(source, target, excluded)
        .filter(|column| !values_equivalent(source.get(column), target.get(column)))
        .map(str::to_string)
        .collect()
}

pub fn rows_differ(source: &Row, target: &Row, excluded: &ExcludedColumns) -> bool {
    compared_columns(source, target, excluded)
        .any(|column| !values_equivalent(source.get(column), target.get(column)))
}

fn compared_columns<'a>(
    source: &'a Row,
    target: &'a Row,
    excluded: &'a ExcludedColumns,
) -> impl Iterator<Item = &'a str> {
    let mut seen = IndexSet::new();
    source
        .columns()
        .chain(target.columns())
        .filter(move |column| seen.insert(*column))
        .filter(move |column| *column != KEY_COLUMN && !excluded.contains(column))
}

/// One row key with both sides and its classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifiedRow {
    pub key: String,
    pub source_row: Option<Row>,
    pub target_row: Option<Row>,
    pub classification: Classification,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub differing_columns: Vec<String>,
}

/// Per-classification row counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationCounts {
    pub same: usize,
    pub diff: usize,
    pub missing_in_target: usize,
    pub missing_in_source: usize,
}

impl ClassificationCounts {
    fn record(&mut self, classification: Classification) {
        match classification {
            Classification::Same => self.same += 1,
            Classification::Diff => self.diff += 1,
            Classification::MissingInTarget => self.missing_in_target += 1,
            Classification::MissingInSource => self.missing_in_source += 1,
        }
    }

    fn add(&mut self, other: &ClassificationCounts) {
        self.same += other.same;
        self.diff += other.diff;
        self.missing_in_target += other.missing_in_target;
        self.missing_in_source += other.missing_in_source;
    }

    pub fn total(&self) -> usize {
        self.same + self.diff + self.missing_in_target + self.missing_in_source
    }

    pub fn has_changes(&self) -> bool {
        self.total() != self.same
    }
}

/// Classified rows of one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReconciliation {
    pub name: String,
    /// Union of non-key columns across both sides, first-seen order
    pub columns: Vec<String>,
    pub rows: Vec<ClassifiedRow>,
}

impl TableReconciliation {
    pub fn counts(&self) -> ClassificationCounts {
        let mut counts = ClassificationCounts::default();
        for row in &self.rows {
            counts.record(row.classification);
        }
        counts
    }

    pub fn row(&self, key: &str) -> Option<&ClassifiedRow> {
        self.rows.iter().find(|row| row.key == key)
    }
}

/// Reconciliation of every table of two datasets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Reconciliation {
    tables: IndexMap<String, TableReconciliation>,
}

impl Reconciliation {
    pub fn table(&self, name: &str) -> Option<&TableReconciliation> {
        self.tables.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableReconciliation> {
        self.tables.values()
    }

    pub fn row(&self, table: &str, key: &str) -> Option<&ClassifiedRow> {
        self.table(table).and_then(|t| t.row(key))
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn counts(&self) -> ClassificationCounts {
        let mut counts = ClassificationCounts::default();
        for table in self.tables.values() {
            counts.add(&table.counts());
        }
        counts
    }

    /// Restrict to rows matching `filter` in tables whose name contains `search`
    /// (case-insensitive); tables left without rows are dropped
    pub fn filtered(&self, filter: ViewFilter, search: Option<&str>) -> Reconciliation {
        let needle = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let tables = self
            .tables
            .iter()
            .filter(|(name, _)| match &needle {
                Some(needle) => name.to_lowercase().contains(needle.as_str()),
                None => true,
            })
            .filter_map(|(name, table)| {
                let rows: Vec<ClassifiedRow> = table
                    .rows
                    .iter()
                    .filter(|row| filter.matches(row.classification))
                    .cloned()
                    .collect();
                if rows.is_empty() {
                    return None;
                }
                Some((
                    name.clone(),
                    TableReconciliation {
                        name: name.clone(),
                        columns: table.columns.clone(),
                        rows,
                    },
                ))
            })
            .collect();

        Reconciliation { tables }
    }
}

/// Which classifications a diff view shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViewFilter {
    #[default]
    All,
    Diff,
    Missing,
    DiffMissing,
    Same,
}

impl ViewFilter {
    pub fn matches(&self, classification: Classification) -> bool {
        match self {
            ViewFilter::All => true,
            ViewFilter::Diff => classification == Classification::Diff,
            ViewFilter::Missing => classification.is_missing(),
            ViewFilter::DiffMissing => classification != Classification::Same,
            ViewFilter::Same => classification == Classification::Same,
        }
    }
}

impl FromStr for ViewFilter {
    type Err = EnvsyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "all" => Ok(ViewFilter::All),
            "diff" => Ok(ViewFilter::Diff),
            "missing" => Ok(ViewFilter::Missing),
            "diff-missing" => Ok(ViewFilter::DiffMissing),
            "same" => Ok(ViewFilter::Same),
            other => Err(EnvsyncError::invalid_input(format!(
                "Unknown view filter '{other}'"
            ))),
        }
    }
}

/// Classifies rows of two datasets
#[derive(Debug, Clone, Default)]
pub struct RowReconciler {
    excluded: ExcludedColumns,
}

impl RowReconciler {
    pub fn new(excluded: ExcludedColumns) -> Self {
        Self { excluded }
    }

    pub fn excluded_columns(&self) -> &ExcludedColumns {
        &self.excluded
    }

    /// Classify every row key of every table present in either dataset
    pub fn reconcile(&self, source: &Dataset, target: &Dataset) -> Reconciliation {
        let table_names: IndexSet<&str> =
            source.table_names().chain(target.table_names()).collect();
        let table_names: Vec<&str> = table_names.into_iter().collect();

        let tables: Vec<TableReconciliation> = table_names
            .par_iter()
            .map(|&name| self.reconcile_table(name, source.rows(name), target.rows(name)))
            .collect();

        log::debug!(
            "Reconciled {} tables ({} source rows, {} target rows)",
            tables.len(),
            source.row_count(),
            target.row_count()
        );

        Reconciliation {
            tables: tables.into_iter().map(|t| (t.name.clone(), t)).collect(),
        }
    }

    /// Classify the rows of one table
    pub fn reconcile_table(
        &self,
        name: &str,
        source_rows: &[Row],
        target_rows: &[Row],
    ) -> TableReconciliation {
        let source_by_key = index_by_key(name, "source", source_rows);
        let target_by_key = index_by_key(name, "target", target_rows);

        let keys: IndexSet<&str> = source_by_key
            .keys()
            .chain(target_by_key.keys())
            .copied()
            .collect();

        let mut columns: IndexSet<&str> = IndexSet::new();
        for row in source_rows.iter().chain(target_rows) {
            columns.extend(row.columns().filter(|c| *c != KEY_COLUMN));
        }

        let rows = keys
            .into_iter()
            .filter_map(|key| {
                let source_row = source_by_key.get(key).copied();
                let target_row = target_by_key.get(key).copied();
                let classification = Classification::of(source_row, target_row, &self.excluded)?;
                let differing_columns = match (source_row, target_row) {
                    (Some(s), Some(t)) if classification == Classification::Diff => {
                        differing_columns(s, t, &self.excluded)
                    }
                    _ => Vec::new(),
                };
                Some(ClassifiedRow {
                    key: key.to_string(),
                    source_row: source_row.cloned(),
                    target_row: target_row.cloned(),
                    classification,
                    differing_columns,
                })
            })
            .collect();

        TableReconciliation {
            name: name.to_string(),
            columns: columns.into_iter().map(str::to_string).collect(),
            rows,
        }
    }
}

/// Key -> row lookup; a duplicate key keeps its first position but the last row
fn index_by_key<'a>(table: &str, side: &str, rows: &'a [Row]) -> IndexMap<&'a str, &'a Row> {
    let mut by_key = IndexMap::with_capacity(rows.len());
    for row in rows {
        match row.key() {
            Some(key) => {
                if by_key.insert(key, row).is_some() {
                    log::debug!("Duplicate key '{key}' in {side} table '{table}', last row wins");
                }
            }
            None => log::warn!("Ignoring {side} row without a string key in table '{table}'"),
        }
    }
    by_key
}

/// Classify every row of `source` and `target` ignoring `excluded` columns
pub fn reconcile(source: &Dataset, target: &Dataset, excluded: &ExcludedColumns) -> Reconciliation {
    RowReconciler::new(excluded.clone()).reconcile(source, target)
}
