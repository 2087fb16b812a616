use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use super::{check_quota, KeyValueStore, DEFAULT_QUOTA_BYTES};
use crate::error::StorageError;

/// Key/value store persisted as a single JSON object file.
///
/// The file is re-read on every access so separate handles observe each
/// other's writes.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
    quota: usize,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_quota(path, DEFAULT_QUOTA_BYTES)
    }

    pub fn with_quota(path: impl Into<PathBuf>, quota: usize) -> Self {
        Self {
            path: path.into(),
            quota,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Map<String, Value>, StorageError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };
        if raw.trim().is_empty() {
            return Ok(Map::new());
        }
        let parsed: Value = serde_json::from_str(&raw)?;
        Ok(parsed.as_object().cloned().unwrap_or_default())
    }

    /// Current contents for a read-modify-write. An unreadable file is
    /// replaced rather than blocking every write, so its keys are lost.
    fn load_for_write(&self) -> Map<String, Value> {
        match self.load() {
            Ok(on_disk) => on_disk,
            Err(err) => {
                log::warn!(
                    "treating unreadable store {} as empty: {err}",
                    self.path.display()
                );
                Map::new()
            }
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let payload = self.load()?;
        Ok(payload
            .get(key)
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut on_disk = self.load_for_write();
        let others: usize = on_disk
            .iter()
            .filter(|(existing, _)| existing.as_str() != key)
            .map(|(existing, stored)| existing.len() + stored_len(stored))
            .sum();
        check_quota(others + key.len() + value.len(), self.quota)?;

        on_disk.insert(key.to_string(), Value::String(value.to_string()));
        write_json_object(&self.path, &on_disk)
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        let mut on_disk = self.load_for_write();
        if on_disk.remove(key).is_none() {
            return Ok(());
        }
        write_json_object(&self.path, &on_disk)
    }
}

fn stored_len(value: &Value) -> usize {
    value
        .as_str()
        .map(str::len)
        .unwrap_or_else(|| value.to_string().len())
}

fn write_json_object(path: &Path, payload: &Map<String, Value>) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        path,
        serde_json::to_string_pretty(&Value::Object(payload.clone()))?,
    )?;
    Ok(())
}
