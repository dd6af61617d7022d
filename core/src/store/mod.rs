use crate::dataset::Dataset;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to a written backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupHandle {
    pub dataset: String,
    /// Where the backup lives (a file path for local storage)
    pub location: String,
    pub created: DateTime<Utc>,
    /// Blake3 digest of the backed-up dataset
    #[serde(default)]
    pub digest: Option<String>,
    /// User that triggered the backup
    #[serde(default)]
    pub operator: Option<String>,
}

#[async_trait]
pub trait DatasetStore: Send + Sync {
    /// Human-readable location of this store
    fn describe(&self) -> String;

    /// Load a dataset; `NotFound` when nothing is stored for `dataset_id`
    async fn load(&self, dataset_id: &str) -> Result<Dataset>;

    /// Persist a dataset, creating its parent location when needed
    async fn save(&self, dataset_id: &str, dataset: &Dataset) -> Result<()>;

    /// Write an immutable, timestamp-named copy of `dataset`
    async fn backup(&self, dataset_id: &str, dataset: &Dataset) -> Result<BackupHandle>;

    /// Check whether a dataset has backing storage
    async fn exists(&self, dataset_id: &str) -> Result<bool>;

    /// Known dataset identities
    async fn list_datasets(&self) -> Result<Vec<String>>;

    /// Backups on record, newest first, optionally for one dataset
    async fn list_backups(&self, dataset_id: Option<&str>) -> Result<Vec<BackupHandle>>;
}

pub mod local;

pub use local::LocalDatasetStore;
