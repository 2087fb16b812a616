//! Local persistence: a string key/value substrate with a capacity limit, and
//! the artifact/saved-prompt collections stored on top of it.
//!
//! The substrate is single-writer. Two handles writing the same key race with
//! last-write-wins semantics and no merge.

mod artifacts;
mod file;
mod prompts;

use std::collections::HashMap;

pub use artifacts::{
    AddOutcome, ArtifactKind, ArtifactStore, GeneratedArtifact, StoreConfig, StoreOutcome,
    DEFAULT_ARTIFACT_CAPACITY, HISTORY_KEY,
};
pub use file::FileStore;
pub use prompts::{SavedPrompt, SAVED_PROMPTS_KEY};

use crate::error::StorageError;

/// Browser local-storage equivalent: 5 MiB per origin.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: HashMap::new(),
            quota: Some(quota),
        }
    }

    pub fn used_bytes(&self) -> usize {
        usage(self.entries.iter())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError> {
        if let Some(limit) = self.quota {
            let others = usage(self.entries.iter().filter(|(existing, _)| *existing != key));
            check_quota(others + key.len() + value.len(), limit)?;
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StorageError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Bytes charged against the quota: key plus value length of every entry.
pub(crate) fn usage<'a>(entries: impl Iterator<Item = (&'a String, &'a String)>) -> usize {
    entries.map(|(key, value)| key.len() + value.len()).sum()
}

pub(crate) fn check_quota(needed: usize, limit: usize) -> Result<(), StorageError> {
    if needed > limit {
        return Err(StorageError::QuotaExceeded { needed, limit });
    }
    Ok(())
}
