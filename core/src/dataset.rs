//! Dataset, row and cell value types
//!
//! A dataset is the JSON document of one environment snapshot: an object whose
//! keys are table names and whose values are arrays of flat row objects. Every
//! row is identified within its table by the string `key` column.

use crate::error::{EnvsyncError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Name of the column identifying a row within its table
pub const KEY_COLUMN: &str = "key";

/// A single cell value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    /// Any non-scalar JSON value; carried verbatim and compared as a whole
    Structured(serde_json::Value),
}

impl CellValue {
    /// Null and the empty string count as "no value"
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::String(s) => f.write_str(s),
            CellValue::Structured(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::String(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::String(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value.into())
    }
}

impl From<i32> for CellValue {
    fn from(value: i32) -> Self {
        CellValue::Number(value.into())
    }
}

/// One row: column name -> value, in document order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(IndexMap<String, CellValue>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// A row holding only its key column
    pub fn with_key(key: &str) -> Self {
        let mut row = Self::new();
        row.insert(KEY_COLUMN, key);
        row
    }

    /// The row key, if the row carries a string `key` column
    pub fn key(&self) -> Option<&str> {
        self.0.get(KEY_COLUMN).and_then(CellValue::as_str)
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.0.get(column)
    }

    pub fn contains_column(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        self.0.insert(column.into(), value.into());
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// A named environment snapshot: table name -> rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    tables: IndexMap<String, Vec<Row>>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a dataset document, attributing failures to `dataset_id`
    pub fn from_slice(dataset_id: &str, bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| EnvsyncError::parse(dataset_id, e))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Pretty-printed document with two-space indentation
    pub fn to_json_pretty(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Blake3 hex digest of the compact serialized form
    pub fn digest(&self) -> Result<String> {
        let bytes = serde_json::to_vec(self)?;
        Ok(blake3::hash(&bytes).to_hex().to_string())
    }

    /// Rows of `table`; an absent table is an empty row set
    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn table(&self, table: &str) -> Option<&Vec<Row>> {
        self.tables.get(table)
    }

    pub fn table_mut(&mut self, table: &str) -> Option<&mut Vec<Row>> {
        self.tables.get_mut(table)
    }

    /// Rows of `table`, creating an empty table when absent
    pub fn table_entry(&mut self, table: &str) -> &mut Vec<Row> {
        self.tables.entry(table.to_string()).or_default()
    }

    pub fn contains_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    /// Insert or replace a table, keeping its position when it already exists
    pub fn insert_table(&mut self, table: impl Into<String>, rows: Vec<Row>) -> Option<Vec<Row>> {
        self.tables.insert(table.into(), rows)
    }

    /// Remove a table, preserving the order of the remaining ones
    pub fn remove_table(&mut self, table: &str) -> Option<Vec<Row>> {
        self.tables.shift_remove(table)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&str, &[Row])> {
        self.tables.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn row_count(&self) -> usize {
        self.tables.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
