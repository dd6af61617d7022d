use crate::error::{EnvsyncError, Result};
use crate::reconcile::{ExcludedColumns, DEFAULT_EXCLUDED_COLUMNS};
use crate::store::LocalDatasetStore;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the project-local configuration file
pub const LOCAL_CONFIG_FILE: &str = "envsync.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    /// Dataset identity -> JSON file, relative to the store root
    #[serde(default)]
    pub datasets: IndexMap<String, PathBuf>,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    /// Backup directory, relative to the root
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_excluded_columns")]
    pub excluded_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_rows_per_page")]
    pub rows_per_page: usize,
}

fn default_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from("backups")
}

fn default_excluded_columns() -> Vec<String> {
    DEFAULT_EXCLUDED_COLUMNS.iter().map(|c| c.to_string()).collect()
}

fn default_rows_per_page() -> usize {
    20
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            backup_dir: default_backup_dir(),
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            excluded_columns: default_excluded_columns(),
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            rows_per_page: default_rows_per_page(),
        }
    }
}

impl Config {
    /// Parse a TOML configuration document
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EnvsyncError::config(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
            .map_err(|e| EnvsyncError::config(format!("{}: {e}", path.display())))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| EnvsyncError::config(e.to_string()))
    }

    pub fn excluded_columns(&self) -> ExcludedColumns {
        ExcludedColumns::new(self.reconcile.excluded_columns.iter().cloned())
    }

    /// Local store described by this configuration
    pub fn local_store(&self) -> LocalDatasetStore {
        LocalDatasetStore::new(self.store.root.clone())
            .with_backup_dir(&self.store.backup_dir)
            .with_datasets(self.datasets.iter().map(|(id, path)| (id.clone(), path.clone())))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(root) = env::var("ENVSYNC_DATA_ROOT") {
            if !root.is_empty() {
                self.store.root = PathBuf::from(root);
            }
        }
        if let Ok(columns) = env::var("ENVSYNC_EXCLUDED_COLUMNS") {
            self.reconcile.excluded_columns = columns
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string)
                .collect();
        }
    }
}

/// Global configuration file location (`~/.envsync/global.toml`)
pub fn global_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".envsync").join("global.toml"))
}

pub fn get_config() -> Result<Config> {
    get_config_from(None)
}

/// Resolve configuration.
///
/// Priority (highest first): `explicit` path, then the `ENVSYNC_CONFIG` file;
/// either one is used on its own. Otherwise the local `envsync.toml` overrides
/// the global `~/.envsync/global.toml`, which overrides the defaults.
/// Environment overrides apply last in every case.
pub fn get_config_from(explicit: Option<&Path>) -> Result<Config> {
    let explicit = explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var("ENVSYNC_CONFIG").ok().map(PathBuf::from));

    let mut config = match explicit {
        Some(path) => {
            log::debug!("Using configuration file {}", path.display());
            Config::from_file(&path)?
        }
        None => {
            let global = global_config_path().filter(|p| p.is_file());
            let local = Some(env::current_dir()?.join(LOCAL_CONFIG_FILE)).filter(|p| p.is_file());
            layered_config(global.as_deref(), local.as_deref())?
        }
    };

    config.apply_env_overrides();
    Ok(config)
}

/// Global settings overlaid key by key with the local file; keys the local file
/// leaves out keep their global value
fn layered_config(global: Option<&Path>, local: Option<&Path>) -> Result<Config> {
    let mut merged = toml::Table::new();
    for path in [global, local].into_iter().flatten() {
        log::debug!("Loading configuration {}", path.display());
        merge_tables(&mut merged, read_table(path)?);
    }
    toml::Value::Table(merged)
        .try_into::<Config>()
        .map_err(|e: toml::de::Error| EnvsyncError::config(e.to_string()))
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = fs::read_to_string(path).map_err(|e| {
        EnvsyncError::config(format!("Cannot read {}: {e}", path.display()))
    })?;
    toml::from_str(&content)
        .map_err(|e| EnvsyncError::config(format!("{}: {e}", path.display())))
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(nested) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_tables(existing, nested),
                _ => {
                    base.insert(key, toml::Value::Table(nested));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}
