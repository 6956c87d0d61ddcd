//! File-backed staging areas.
//!
//! Each category lives in its own directory and each writer owns a distinct
//! file name, so concurrent writers never touch the same file:
//!
//! | category | file |
//! |---|---|
//! | input | `<input_data_path>/input-mapper<N>.json` |
//! | mapper output | `<mapper_output_path>/mapper<N>.json` |
//! | reducer output | `<reducer_output_path>/reducer<N>.json` |
//! | final output | `<final_output_path>/final-output-<operation>.json` |

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{final_output_file_name, Config, OperationName};
use crate::partition::partition;
use crate::shuffle::LetterGroup;
use crate::workload::{self, Workload};
use crate::{count_lines, Dataset, Role, WorkerId};

#[derive(Debug)]
pub enum StoreError {
    /// The requested file does not exist.
    NotFound(PathBuf),
    Read { path: PathBuf, source: io::Error },
    Write { path: PathBuf, source: io::Error },
    /// The file exists but does not hold what the caller expected.
    Malformed { path: PathBuf, reason: String },
    /// The staged or submitted data could not be processed.
    Rejected(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::NotFound(path) => write!(f, "{} not found", path.display()),
            StoreError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            StoreError::Write { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            StoreError::Malformed { path, reason } => {
                write!(f, "{} is malformed: {}", path.display(), reason)
            }
            StoreError::Rejected(reason) => write!(f, "rejected: {}", reason),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Read { source, .. } | StoreError::Write { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub struct FileStore {
    config: Arc<Config>,
    workload: Workload,
}

impl FileStore {
    pub fn new(config: Arc<Config>) -> anyhow::Result<Self> {
        let workload = workload::select(&config)?;
        Ok(Self { config, workload })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates every staging directory that does not exist yet.
    pub async fn init(&self) -> Result<(), StoreError> {
        for dir in self.areas() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| StoreError::Write { path: dir.to_path_buf(), source })?;
        }
        Ok(())
    }

    fn areas(&self) -> [&Path; 4] {
        [
            self.config.input_data_path.as_path(),
            self.config.mapper_output_path.as_path(),
            self.config.reducer_output_path.as_path(),
            self.config.final_output_path.as_path(),
        ]
    }

    pub fn input_file(&self, mapper_id: WorkerId) -> PathBuf {
        self.config.input_data_path.join(format!("input-{mapper_id}.json"))
    }

    pub fn mapper_output_file(&self, mapper_id: WorkerId) -> PathBuf {
        self.config.mapper_output_path.join(format!("{mapper_id}.json"))
    }

    pub fn reducer_output_file(&self, reducer_id: WorkerId) -> PathBuf {
        self.config.reducer_output_path.join(format!("{reducer_id}.json"))
    }

    pub fn final_output_file(&self, operation: OperationName) -> PathBuf {
        self.config.final_output_path.join(final_output_file_name(operation))
    }

    /// Partitions `dataset` and writes one input file per mapper.
    ///
    /// Every shard is attempted; the first failure is reported once all
    /// writes have been tried.
    pub async fn store_input(&self, dataset: &Dataset, mapper_count: usize) -> Result<(), StoreError> {
        let shards = partition(dataset, mapper_count)
            .map_err(|e| StoreError::Rejected(e.to_string()))?;
        let mut first_failure = None;
        for shard in shards {
            let path = self.input_file(shard.mapper_id);
            info!(
                mapper = %shard.mapper_id,
                lines = count_lines(&shard.dataset),
                documents = shard.dataset.len(),
                path = %path.display(),
                "writing mapper input"
            );
            if let Err(e) = write_json(&path, &shard.dataset, false).await {
                first_failure.get_or_insert(e);
            }
        }
        match first_failure {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub async fn load_input(&self, mapper_id: WorkerId) -> Result<Dataset, StoreError> {
        read_json(&self.input_file(mapper_id)).await
    }

    pub async fn store_mapper_output(&self, mapper_id: WorkerId, output: &Value) -> Result<(), StoreError> {
        write_json(&self.mapper_output_file(mapper_id), output, false).await
    }

    pub async fn store_reducer_output(&self, reducer_id: WorkerId, output: &Value) -> Result<(), StoreError> {
        write_json(&self.reducer_output_file(reducer_id), output, false).await
    }

    /// Gathers the reducer input for `group` from every mapper's output.
    ///
    /// Any unreadable mapper file fails the whole request.
    pub async fn reducer_input(&self, group: &LetterGroup) -> Result<Value, StoreError> {
        let mut outputs = Vec::with_capacity(self.config.mapper_count);
        for mapper_id in WorkerId::all(Role::Mapper, self.config.mapper_count) {
            let path = self.mapper_output_file(mapper_id);
            debug!(%group, path = %path.display(), "reading mapper output");
            outputs.push(read_json::<Value>(&path).await?);
        }
        (self.workload.filter_fn)(outputs, group).map_err(|e| StoreError::Rejected(e.to_string()))
    }

    /// Merges every `reducer*.json` into the key-sorted final output.
    pub async fn combine(&self) -> Result<PathBuf, StoreError> {
        let pattern = self.config.reducer_output_path.join("reducer*.json");
        let files = glob_files(pattern).await?;
        info!(files = files.len(), "combining reducer outputs");

        let mut merged: BTreeMap<String, Value> = BTreeMap::new();
        for path in &files {
            let output: BTreeMap<String, Value> = read_json(path).await?;
            merged.extend(output);
        }

        let target = self.final_output_file(self.config.operation_name);
        write_json(&target, &merged, true).await?;
        info!(keys = merged.len(), path = %target.display(), "final output written");
        Ok(target)
    }

    pub async fn final_output(&self, operation: OperationName) -> Result<Value, StoreError> {
        read_json(&self.final_output_file(operation)).await
    }

    /// Deletes all staged input, mapper and reducer output, and this
    /// operation's final output. Returns how many files were removed.
    pub async fn cleanup(&self) -> Result<usize, StoreError> {
        let final_pattern = format!("final-output-{}*.json", self.config.operation_name);
        let patterns = [
            self.config.input_data_path.join("*"),
            self.config.mapper_output_path.join("*"),
            self.config.reducer_output_path.join("*"),
            self.config.final_output_path.join(final_pattern),
        ];
        let mut removed = 0;
        for pattern in &patterns {
            for path in glob_files(pattern.clone()).await? {
                match tokio::fs::remove_file(&path).await {
                    Ok(()) => removed += 1,
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(source) => return Err(StoreError::Write { path, source }),
                }
            }
        }
        info!(removed, "staging areas cleaned");
        Ok(removed)
    }
}

/// Regular files matching `pattern`, in lexicographic order. The directory
/// part of the pattern is matched literally. The walk runs on the blocking
/// pool.
async fn glob_files(pattern: PathBuf) -> Result<Vec<PathBuf>, StoreError> {
    let dir = pattern.parent().map(Path::to_path_buf).unwrap_or_default();
    tokio::task::spawn_blocking(move || glob_files_blocking(&pattern))
        .await
        .map_err(|e| StoreError::Read {
            path: dir,
            source: io::Error::new(io::ErrorKind::Other, e),
        })?
}

fn glob_files_blocking(pattern: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let dir = pattern.parent().unwrap_or_else(|| Path::new("."));
    let file_pattern = pattern
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let full = format!(
        "{}/{}",
        glob::Pattern::escape(&dir.to_string_lossy()),
        file_pattern
    );
    let paths = glob::glob(&full).map_err(|e| StoreError::Malformed {
        path: pattern.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut files = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| StoreError::Read {
            path: e.path().to_path_buf(),
            source: io::Error::new(e.error().kind(), e.error().to_string()),
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = tokio::fs::read(path).await.map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(path.to_path_buf())
        } else {
            StoreError::Read { path: path.to_path_buf(), source }
        }
    })?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Malformed {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

async fn write_json<T: Serialize>(path: &Path, value: &T, pretty: bool) -> Result<(), StoreError> {
    let encoded = if pretty {
        serde_json::to_vec_pretty(value)
    } else {
        serde_json::to_vec(value)
    };
    let bytes = encoded.map_err(|e| StoreError::Write {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| StoreError::Write { path: path.to_path_buf(), source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shuffle::letter_groups;
    use serde_json::json;

    async fn scratch_store(operation: OperationName) -> (FileStore, PathBuf) {
        let dir = std::env::temp_dir().join(format!("mrkv-store-{}", uuid::Uuid::new_v4()));
        let store = FileStore::new(Arc::new(Config::local(&dir, operation))).unwrap();
        store.init().await.unwrap();
        (store, dir)
    }

    #[tokio::test]
    async fn input_shards_are_staged_per_mapper() {
        let (store, dir) = scratch_store(OperationName::WordCount).await;
        let mut dataset = Dataset::new();
        dataset.insert("doc1".into(), vec!["a b".into(), "c".into()]);
        dataset.insert("doc2".into(), vec!["d".into(), "e".into()]);

        store.store_input(&dataset, 2).await.unwrap();
        let first = store.load_input(WorkerId::mapper(1)).await.unwrap();
        let second = store.load_input(WorkerId::mapper(2)).await.unwrap();
        assert_eq!(count_lines(&first) + count_lines(&second), 4);
        assert!(matches!(
            store.load_input(WorkerId::mapper(3)).await,
            Err(StoreError::NotFound(_))
        ));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn reducer_input_needs_every_mapper_file() {
        let (store, dir) = scratch_store(OperationName::WordCount).await;
        let group = letter_groups(1).remove(0);
        store.store_mapper_output(WorkerId::mapper(1), &json!({ "x": [1] })).await.unwrap();
        assert!(store.reducer_input(&group).await.is_err());

        store.store_mapper_output(WorkerId::mapper(2), &json!({ "x": [1], "y": [1] })).await.unwrap();
        let input = store.reducer_input(&group).await.unwrap();
        assert_eq!(input, json!({ "x": [1, 1], "y": [1] }));

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn combine_is_sorted_and_repeatable() {
        let (store, dir) = scratch_store(OperationName::WordCount).await;
        store.store_reducer_output(WorkerId::reducer(2), &json!({ "the": 2, "dog": 1 })).await.unwrap();
        store.store_reducer_output(WorkerId::reducer(1), &json!({ "cat": 1 })).await.unwrap();

        let path = store.combine().await.unwrap();
        let first = std::fs::read(&path).unwrap();
        store.combine().await.unwrap();
        let second = std::fs::read(&path).unwrap();
        assert_eq!(first, second);

        let text = String::from_utf8(first).unwrap();
        let cat = text.find("\"cat\"").unwrap();
        let dog = text.find("\"dog\"").unwrap();
        let the = text.find("\"the\"").unwrap();
        assert!(cat < dog && dog < the);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn cleanup_is_idempotent_and_spares_other_operations() {
        let (store, dir) = scratch_store(OperationName::WordCount).await;
        store.store_mapper_output(WorkerId::mapper(1), &json!({})).await.unwrap();
        store.store_reducer_output(WorkerId::reducer(1), &json!({ "a": 1 })).await.unwrap();
        store.combine().await.unwrap();
        let other = store.final_output_file(OperationName::InvertedIndex);
        std::fs::write(&other, b"{}").unwrap();

        assert_eq!(store.cleanup().await.unwrap(), 3);
        assert_eq!(store.cleanup().await.unwrap(), 0);
        assert!(other.exists());

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[tokio::test]
    async fn cleanup_tolerates_missing_directories() {
        let dir = std::env::temp_dir().join(format!("mrkv-store-{}", uuid::Uuid::new_v4()));
        let store = FileStore::new(Arc::new(Config::local(&dir, OperationName::WordCount))).unwrap();
        assert_eq!(store.cleanup().await.unwrap(), 0);
    }
}
