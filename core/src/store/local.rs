use super::{BackupHandle, DatasetStore};
use crate::dataset::Dataset;
use crate::error::{EnvsyncError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use indexmap::IndexMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const BACKUP_PREFIX: &str = "backup-";
const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S-%3fZ";
// Length of a timestamp rendered with BACKUP_TIMESTAMP_FORMAT
const BACKUP_TIMESTAMP_LEN: usize = 24;

/// JSON files on the local filesystem
#[derive(Debug, Clone)]
pub struct LocalDatasetStore {
    root: PathBuf,
    backup_dir: PathBuf,
    datasets: IndexMap<String, PathBuf>,
}

impl LocalDatasetStore {
    /// Store rooted at `root`; backups go to `<root>/backups`
    pub fn new(root: PathBuf) -> Self {
        let backup_dir = root.join("backups");
        Self {
            root,
            backup_dir,
            datasets: IndexMap::new(),
        }
    }

    /// Backup directory; relative paths are under the root
    pub fn with_backup_dir(mut self, backup_dir: impl AsRef<Path>) -> Self {
        self.backup_dir = self.root.join(backup_dir);
        self
    }

    /// Explicit dataset locations; relative paths are under the root
    pub fn with_datasets<I, S, P>(mut self, datasets: I) -> Self
    where
        I: IntoIterator<Item = (S, P)>,
        S: Into<String>,
        P: AsRef<Path>,
    {
        for (id, path) in datasets {
            let path = self.root.join(path);
            self.datasets.insert(id.into(), path);
        }
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// File backing `dataset_id`
    pub fn resolve(&self, dataset_id: &str) -> Result<PathBuf> {
        if let Some(path) = self.datasets.get(dataset_id) {
            return Ok(path.clone());
        }
        if !is_plain_name(dataset_id) {
            return Err(EnvsyncError::invalid_input(format!(
                "Dataset identity '{dataset_id}' is neither configured nor a plain name"
            )));
        }
        Ok(self.root.join(format!("{dataset_id}.json")))
    }

    fn next_backup_path(&self, dataset_id: &str, created: &DateTime<Utc>) -> PathBuf {
        let stem = format!(
            "{BACKUP_PREFIX}{}-{}",
            sanitize(dataset_id),
            created.format(BACKUP_TIMESTAMP_FORMAT)
        );
        self.backup_dir.join(format!("{stem}.json"))
    }
}

#[async_trait]
impl DatasetStore for LocalDatasetStore {
    fn describe(&self) -> String {
        self.root.to_string_lossy().to_string()
    }

    async fn load(&self, dataset_id: &str) -> Result<Dataset> {
        let path = self.resolve(dataset_id)?;
        log::debug!("Loading dataset '{dataset_id}' from {}", path.display());

        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EnvsyncError::not_found(
                    dataset_id,
                    path.to_string_lossy(),
                ));
            }
            Err(e) => return Err(e.into()),
        };
        Dataset::from_slice(dataset_id, &bytes)
    }

    async fn save(&self, dataset_id: &str, dataset: &Dataset) -> Result<()> {
        let path = self.resolve(dataset_id)?;
        let data = dataset.to_json_pretty()?;
        write_atomically(&path, &data)
            .map_err(|e| EnvsyncError::persistence(dataset_id, "save", e))?;

        log::info!(
            "Saved dataset '{dataset_id}' ({} tables, {} rows) to {}",
            dataset.table_count(),
            dataset.row_count(),
            path.display()
        );
        Ok(())
    }

    async fn backup(&self, dataset_id: &str, dataset: &Dataset) -> Result<BackupHandle> {
        let created = Utc::now();
        let data = dataset.to_json_pretty()?;
        let digest = dataset.digest()?;

        std::fs::create_dir_all(&self.backup_dir)
            .map_err(|e| EnvsyncError::persistence(dataset_id, "back up", e))?;

        let base = self.next_backup_path(dataset_id, &created);
        let mut path = base.clone();
        let mut attempt = 0;
        let mut file = loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => break file,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt < 100 => {
                    attempt += 1;
                    path = base.with_extension(format!("{attempt}.json"));
                }
                Err(e) => return Err(EnvsyncError::persistence(dataset_id, "back up", e)),
            }
        };
        write_or_discard(&path, move || {
            file.write_all(&data)?;
            file.sync_all()
        })
        .map_err(|e| EnvsyncError::persistence(dataset_id, "back up", e))?;

        log::info!("Backed up dataset '{dataset_id}' to {}", path.display());

        Ok(BackupHandle {
            dataset: dataset_id.to_string(),
            location: path.to_string_lossy().to_string(),
            created,
            digest: Some(digest),
            operator: Some(whoami::username()),
        })
    }

    async fn exists(&self, dataset_id: &str) -> Result<bool> {
        Ok(self.resolve(dataset_id)?.is_file())
    }

    async fn list_datasets(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.datasets.keys().cloned().collect();

        let mut discovered = Vec::new();
        if self.root.is_dir() {
            for entry in std::fs::read_dir(&self.root)? {
                let path = entry?.path();
                if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if !ids.iter().any(|id| id == stem) {
                        discovered.push(stem.to_string());
                    }
                }
            }
        }
        discovered.sort();
        ids.extend(discovered);
        Ok(ids)
    }

    async fn list_backups(&self, dataset_id: Option<&str>) -> Result<Vec<BackupHandle>> {
        let mut backups = Vec::new();
        if !self.backup_dir.is_dir() {
            return Ok(backups);
        }

        for entry in WalkDir::new(&self.backup_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| EnvsyncError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            let Some((dataset, created)) = parse_backup_name(name) else {
                continue;
            };
            if let Some(wanted) = dataset_id {
                if sanitize(wanted) != dataset {
                    continue;
                }
            }
            backups.push(BackupHandle {
                dataset,
                location: entry.path().to_string_lossy().to_string(),
                created,
                digest: None,
                operator: None,
            });
        }

        backups.sort_by(|a, b| b.created.cmp(&a.created).then(b.location.cmp(&a.location)));
        Ok(backups)
    }
}

/// Write through a temp file in the target directory, then rename over the target
fn write_atomically(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Run `write` against a freshly created file; a failed write leaves no file behind
fn write_or_discard(
    path: &Path,
    write: impl FnOnce() -> std::io::Result<()>,
) -> std::io::Result<()> {
    if let Err(e) = write() {
        if let Err(remove) = std::fs::remove_file(path) {
            log::warn!("Failed to remove incomplete file {}: {remove}", path.display());
        }
        return Err(e);
    }
    Ok(())
}

fn is_plain_name(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\'])
        && !Path::new(id).is_absolute()
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

/// `backup-<dataset>-<timestamp>[.<n>].json` -> (dataset, timestamp)
fn parse_backup_name(name: &str) -> Option<(String, DateTime<Utc>)> {
    let stem = name.strip_prefix(BACKUP_PREFIX)?.strip_suffix(".json")?;
    let stem = match stem.rsplit_once('.') {
        Some((head, n)) if n.chars().all(|c| c.is_ascii_digit()) => head,
        _ => stem,
    };
    if stem.len() <= BACKUP_TIMESTAMP_LEN + 1 || !stem.is_char_boundary(stem.len() - BACKUP_TIMESTAMP_LEN) {
        return None;
    }
    let (head, timestamp) = stem.split_at(stem.len() - BACKUP_TIMESTAMP_LEN);
    let dataset = head.strip_suffix('-')?;
    let created = NaiveDateTime::parse_from_str(timestamp, BACKUP_TIMESTAMP_FORMAT).ok()?;
    Some((dataset.to_string(), created.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Dataset {
        Dataset::from_value(json!({"Users": [{"key": "u1", "name": "Alice"}]})).unwrap()
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = LocalDatasetStore::new(dir.path().to_path_buf())
            .with_datasets([("dev", "remote/eni/dev/en/en.json")]);

        store.save("dev", &sample()).await.unwrap();
        assert!(dir.path().join("remote/eni/dev/en/en.json").is_file());
        assert_eq!(store.load("dev").await.unwrap(), sample());
        assert!(store.exists("dev").await.unwrap());
    }

    #[tokio::test]
    async fn test_load_errors() {
        let dir = TempDir::new().unwrap();
        let store = LocalDatasetStore::new(dir.path().to_path_buf());

        let err = store.load("missing").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);

        std::fs::write(dir.path().join("broken.json"), b"{\"T\": 3}").unwrap();
        let err = store.load("broken").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::ParseError);

        let err = store.load("../escape").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_backups_are_never_overwritten() {
        let dir = TempDir::new().unwrap();
        let store = LocalDatasetStore::new(dir.path().to_path_buf()).with_backup_dir("audit");

        let first = store.backup("prod", &sample()).await.unwrap();
        let second = store.backup("prod", &Dataset::new()).await.unwrap();
        assert_ne!(first.location, second.location);
        assert!(first.location.contains("backup-prod-"));
        assert!(Path::new(&first.location).starts_with(dir.path().join("audit")));
        assert_eq!(first.digest, Some(sample().digest().unwrap()));

        let content = std::fs::read(&first.location).unwrap();
        assert_eq!(Dataset::from_slice("backup", &content).unwrap(), sample());

        let listed = store.list_backups(Some("prod")).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(store.list_backups(Some("dev")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_datasets() {
        let dir = TempDir::new().unwrap();
        let store = LocalDatasetStore::new(dir.path().to_path_buf())
            .with_datasets([("remote_dev", "remote/dev.json")]);
        store.save("local_b", &sample()).await.unwrap();
        store.save("local_a", &sample()).await.unwrap();

        assert_eq!(
            store.list_datasets().await.unwrap(),
            vec!["remote_dev", "local_a", "local_b"]
        );
    }

    #[tokio::test]
    async fn test_save_keeps_document_order() {
        let dir = TempDir::new().unwrap();
        let store = LocalDatasetStore::new(dir.path().to_path_buf());
        let doc = r#"{
  "Users": [
    {
      "key": "u1",
      "profile": {
        "zone": "eu",
        "age": 30
      }
    }
  ],
  "Accounts": []
}"#;
        let path = dir.path().join("dev.json");
        std::fs::write(&path, doc).unwrap();

        let dataset = store.load("dev").await.unwrap();
        store.save("dev", &dataset).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), doc);
    }

    #[test]
    fn test_failed_write_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup-prod-partial.json");
        std::fs::write(&path, b"{\"Us").unwrap();

        let err = write_or_discard(&path, || {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
        })
        .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
        assert!(!path.exists());

        std::fs::write(&path, b"{}").unwrap();
        write_or_discard(&path, || Ok(())).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_parse_backup_name() {
        let (dataset, created) =
            parse_backup_name("backup-remote_eni-dev-2025-03-04T05-06-07-089Z.json").unwrap();
        assert_eq!(dataset, "remote_eni-dev");
        assert_eq!(created.to_rfc3339(), "2025-03-04T05:06:07.089+00:00");

        let (dataset, _) = parse_backup_name("backup-dev-2025-03-04T05-06-07-089Z.2.json").unwrap();
        assert_eq!(dataset, "dev");

        assert!(parse_backup_name("backup-dev.json").is_none());
        assert!(parse_backup_name("notes.json").is_none());
    }
}
