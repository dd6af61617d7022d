//! Common test utilities and fixtures

#![allow(dead_code)]

use envsync_core::{Config, Dataset, LocalDatasetStore};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Test fixture paths and utilities
pub struct TestFixtures {
    pub fixtures_dir: PathBuf,
    pub data_dir: PathBuf,
    pub configs_dir: PathBuf,
}

impl TestFixtures {
    pub fn new() -> Self {
        let fixtures_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");

        Self {
            data_dir: fixtures_dir.join("data"),
            configs_dir: fixtures_dir.join("configs"),
            fixtures_dir,
        }
    }

    pub fn data_file(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    pub fn config_file(&self, name: &str) -> PathBuf {
        self.configs_dir.join(name)
    }
}

/// A temporary workspace with a config file and a data root
pub struct TestWorkspace {
    pub temp_dir: TempDir,
    pub path: PathBuf,
    pub config: Config,
}

impl TestWorkspace {
    /// Create a workspace from a fixture config, pointing its store root into the temp dir
    pub fn new(config_name: &str) -> Self {
        let fixtures = TestFixtures::new();
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().to_path_buf();

        let mut config =
            Config::from_file(&fixtures.config_file(config_name)).expect("Failed to read config");
        config.store.root = path.join(&config.store.root);
        fs::create_dir_all(&config.store.root).expect("Failed to create data root");

        Self {
            temp_dir,
            path,
            config,
        }
    }

    /// Copy a fixture dataset to where `dataset_id` resolves
    pub fn install_dataset(&self, data_file_name: &str, dataset_id: &str) -> PathBuf {
        let fixtures = TestFixtures::new();
        let target = self
            .store()
            .resolve(dataset_id)
            .expect("Failed to resolve dataset");
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).expect("Failed to create dataset directory");
        }
        fs::copy(fixtures.data_file(data_file_name), &target).expect("Failed to copy data file");
        target
    }

    pub fn store(&self) -> LocalDatasetStore {
        self.config.local_store()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_dataset(&self, dataset_id: &str) -> Dataset {
        let path = self.store().resolve(dataset_id).expect("Failed to resolve dataset");
        let bytes = fs::read(path).expect("Failed to read dataset");
        Dataset::from_slice(dataset_id, &bytes).expect("Failed to parse dataset")
    }
}

/// Build a dataset from a JSON literal
pub fn dataset(value: serde_json::Value) -> Dataset {
    Dataset::from_value(value).expect("Invalid dataset literal")
}

/// Build a row from a JSON literal
pub fn row(value: serde_json::Value) -> envsync_core::Row {
    serde_json::from_value(value).expect("Invalid row literal")
}
