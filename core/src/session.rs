//! Migration sessions: load, reconcile, merge, back up and persist
//!
//! A session owns the dataset store and runs each migration as one unit:
//! `load(target) -> load(source) -> backup(target) -> merge -> save(target)`.
//! Migrations against the same target are serialized; different targets run
//! independently.

use crate::dataset::Dataset;
use crate::error::{EnvsyncError, Result};
use crate::merge::{MergeEngine, MergeSummary};
use crate::reconcile::{ExcludedColumns, Reconciliation, RowReconciler};
use crate::selection::{Selection, SelectionPreview, SelectionWarning};
use crate::store::{BackupHandle, DatasetStore};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// One operator commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationRequest {
    pub source: String,
    pub target: String,
    #[serde(flatten)]
    pub selection: Selection,
}

impl MigrationRequest {
    /// Parse a request body; malformed selection entries are skipped with a
    /// warning instead of rejecting the whole request
    pub fn from_request(request: &Value) -> Result<(Self, Vec<SelectionWarning>)> {
        let (selection, warnings) = Selection::from_request(request)?;
        let identity = |field: &str| {
            request
                .get(field)
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .ok_or_else(|| {
                    EnvsyncError::invalid_input(format!(
                        "request field '{field}' must be a non-empty string"
                    ))
                })
        };

        let request = Self {
            source: identity("source")?,
            target: identity("target")?,
            selection,
        };
        Ok((request, warnings))
    }
}

/// Outcome of a committed migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub source: String,
    pub target: String,
    #[serde(flatten)]
    pub summary: MergeSummary,
    /// Absent for dry runs
    pub backup: Option<BackupHandle>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SelectionWarning>,
}

/// Source and target as loaded for one comparison
#[derive(Debug, Clone)]
pub struct Comparison {
    pub source: Dataset,
    pub target: Dataset,
    pub reconciliation: Reconciliation,
}

pub struct MigrationSession {
    store: Arc<dyn DatasetStore>,
    reconciler: RowReconciler,
    target_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for MigrationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationSession")
            .field("store", &self.store.describe())
            .field("excluded_columns", self.reconciler.excluded_columns())
            .finish()
    }
}

impl MigrationSession {
    pub fn new(store: Arc<dyn DatasetStore>, excluded: ExcludedColumns) -> Self {
        Self {
            store,
            reconciler: RowReconciler::new(excluded),
            target_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &dyn DatasetStore {
        &*self.store
    }

    /// Load both datasets and classify their rows
    pub async fn compare(&self, source_id: &str, target_id: &str) -> Result<Comparison> {
        let source = self.store.load(source_id).await?;
        let target = self.store.load(target_id).await?;
        let reconciliation = self.reconciler.reconcile(&source, &target);

        let counts = reconciliation.counts();
        log::info!(
            "Compared '{source_id}' -> '{target_id}': {} same, {} diff, {} missing in target, {} missing in source",
            counts.same,
            counts.diff,
            counts.missing_in_target,
            counts.missing_in_source
        );

        Ok(Comparison {
            source,
            target,
            reconciliation,
        })
    }

    /// What a request would copy, without touching the target
    pub async fn preview(&self, request: &MigrationRequest) -> Result<SelectionPreview> {
        let source = self.store.load(&request.source).await?;
        Ok(request.selection.preview(&source))
    }

    /// Compute the merge without backing up or saving
    pub async fn dry_run(&self, request: &MigrationRequest) -> Result<MigrationReport> {
        let target = self.store.load(&request.target).await?;
        let source = self.store.load(&request.source).await?;
        let outcome = MergeEngine::merge(&target, &source, &request.selection);

        Ok(MigrationReport {
            source: request.source.clone(),
            target: request.target.clone(),
            summary: outcome.summary,
            backup: None,
            warnings: outcome.warnings,
        })
    }

    /// Apply a selection to the target and persist it, backing up first
    pub async fn migrate(&self, request: &MigrationRequest) -> Result<MigrationReport> {
        let lock = self.target_lock(&request.target);
        let _guard = lock.lock().await;

        let target = self.store.load(&request.target).await?;
        let source = self.store.load(&request.source).await?;

        let backup = self.store.backup(&request.target, &target).await?;
        let outcome = MergeEngine::merge(&target, &source, &request.selection);
        self.store.save(&request.target, &outcome.dataset).await?;

        let summary = outcome.summary;
        log::info!(
            "Migrated '{}' -> '{}': {} tables copied, {} rows copied, {} tables deleted, {} rows deleted",
            request.source,
            request.target,
            summary.tables_copied,
            summary.rows_copied,
            summary.tables_deleted,
            summary.rows_deleted
        );

        Ok(MigrationReport {
            source: request.source.clone(),
            target: request.target.clone(),
            summary,
            backup: Some(backup),
            warnings: outcome.warnings,
        })
    }

    fn target_lock(&self, target: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .target_locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(target.to_string()).or_default().clone()
    }
}
