//! # envsync-core
//!
//! Core library for envsync - compares two JSON environment snapshots table by
//! table and row by row, and migrates operator-selected tables, rows or cells
//! from a source dataset into a target dataset, backing up the target first.
//!
//! This crate provides the core functionality that can be used by different
//! interfaces (CLI, web services, etc.).

pub mod config;
pub mod dataset;
pub mod error;
pub mod merge;
pub mod reconcile;
pub mod selection;
pub mod session;
pub mod store;

// Re-export the most commonly used types for convenience
pub use config::Config;
pub use dataset::{CellValue, Dataset, Row, KEY_COLUMN};
pub use error::{EnvsyncError, ErrorKind, Result};
pub use merge::{merge, MergeEngine, MergeOutcome, MergeSummary};
pub use reconcile::{
    reconcile, Classification, ClassifiedRow, ExcludedColumns, Reconciliation, RowReconciler,
    TableReconciliation, ViewFilter,
};
pub use selection::{CellSelection, RowSelection, Selection, SelectionBuilder, SelectionWarning};
pub use session::{MigrationReport, MigrationRequest, MigrationSession};
pub use store::{BackupHandle, DatasetStore, LocalDatasetStore};
