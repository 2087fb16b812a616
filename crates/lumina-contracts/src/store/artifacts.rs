use std::fmt;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::KeyValueStore;
use crate::error::{StorageError, StoreWarning};
use crate::events::{emit_optional, EventPayload, EventWriter};

pub const HISTORY_KEY: &str = "lumina_history";
pub const DEFAULT_ARTIFACT_CAPACITY: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtifactKind {
    Generated,
    Edited,
    Logo,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Generated => "GENERATED",
            ArtifactKind::Edited => "EDITED",
            ArtifactKind::Logo => "LOGO",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One produced image. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    /// Encoded image, usually a `data:<mime>;base64,...` URL.
    #[serde(rename = "data")]
    pub payload: String,
    pub prompt: String,
    /// Creation time in Unix milliseconds.
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    pub artifact_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            artifact_capacity: DEFAULT_ARTIFACT_CAPACITY,
        }
    }
}

/// Result of adding an item to a persisted collection.
///
/// `item` is always the freshly created entry so callers can display it.
/// `collection` is what is persisted now: it contains `item` only when a
/// write succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddOutcome<T> {
    pub item: T,
    pub collection: Vec<T>,
    pub warning: Option<StoreWarning>,
}

impl<T> AddOutcome<T> {
    pub fn persisted(&self) -> bool {
        !matches!(
            self.warning,
            Some(StoreWarning::QuotaExceeded { .. }) | Some(StoreWarning::WriteFailed { .. })
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOutcome<T> {
    pub value: T,
    pub warning: Option<StoreWarning>,
}

/// Capacity-bounded image history plus an unbounded saved-prompt list, both
/// most-recent-first, on top of a [`KeyValueStore`].
///
/// No operation returns an error: read failures are logged and read as empty,
/// write failures come back as a [`StoreWarning`].
pub struct ArtifactStore {
    backend: Box<dyn KeyValueStore + Send>,
    config: StoreConfig,
    events: Option<EventWriter>,
}

impl ArtifactStore {
    pub fn new(backend: Box<dyn KeyValueStore + Send>) -> Self {
        Self::with_config(backend, StoreConfig::default())
    }

    pub fn with_config(backend: Box<dyn KeyValueStore + Send>, config: StoreConfig) -> Self {
        Self {
            backend,
            config,
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> StoreConfig {
        self.config
    }

    pub fn add_artifact(
        &mut self,
        kind: ArtifactKind,
        payload: impl Into<String>,
        prompt: impl Into<String>,
        metadata: Option<String>,
    ) -> AddOutcome<GeneratedArtifact> {
        let previous = self.list_artifacts();
        let timestamp = Utc::now().timestamp_millis();
        let artifact = GeneratedArtifact {
            id: next_id(timestamp, previous.first().map(|item| item.id.as_str())),
            kind,
            payload: payload.into(),
            prompt: prompt.into(),
            timestamp,
            metadata,
        };

        let capacity = self.config.artifact_capacity.max(1);
        let mut updated = Vec::with_capacity(previous.len() + 1);
        updated.push(artifact.clone());
        updated.extend(previous.iter().cloned());
        let evicted = updated.len().saturating_sub(capacity);
        updated.truncate(capacity);

        let first_attempt = self.write_collection(HISTORY_KEY, &updated);
        let warning = match first_attempt {
            Ok(()) => None,
            Err(err) if err.is_quota() => {
                let keep = (updated.len() / 2).max(1);
                let dropped = updated.len() - keep;
                updated.truncate(keep);
                self.emit(
                    "storage_quota_retry",
                    json!({ "key": HISTORY_KEY, "dropped": dropped, "error": err.to_string() }),
                );
                match self.write_collection(HISTORY_KEY, &updated) {
                    Ok(()) => Some(StoreWarning::Evicted { dropped }),
                    Err(err) => {
                        log::warn!("history not saved after eviction retry: {err}");
                        Some(StoreWarning::QuotaExceeded { attempted: keep })
                    }
                }
            }
            Err(err) => {
                log::warn!("history not saved: {err}");
                Some(StoreWarning::WriteFailed {
                    message: err.to_string(),
                })
            }
        };

        let outcome = AddOutcome {
            item: artifact,
            collection: updated,
            warning,
        };
        if outcome.persisted() {
            self.emit(
                "artifact_saved",
                json!({
                    "artifact_id": outcome.item.id,
                    "kind": outcome.item.kind,
                    "evicted": evicted,
                    "count": outcome.collection.len(),
                }),
            );
            outcome
        } else {
            self.emit_warning(HISTORY_KEY, outcome.warning.as_ref());
            AddOutcome {
                collection: previous,
                ..outcome
            }
        }
    }

    /// Stored artifacts, newest first. Unreadable storage reads as empty.
    pub fn list_artifacts(&self) -> Vec<GeneratedArtifact> {
        self.read_collection(HISTORY_KEY)
    }

    pub fn get_artifact(&self, id: &str) -> Option<GeneratedArtifact> {
        self.list_artifacts().into_iter().find(|item| item.id == id)
    }

    /// Removes the artifact with `id`; an unknown id leaves storage untouched.
    pub fn delete_artifact(&mut self, id: &str) -> StoreOutcome<Vec<GeneratedArtifact>> {
        let existed = self.list_artifacts().iter().any(|item| item.id == id);
        let outcome = self.delete_from(HISTORY_KEY, id, |item: &GeneratedArtifact| &item.id);
        if existed && outcome.warning.is_none() {
            self.emit("artifact_deleted", json!({ "artifact_id": id }));
        }
        outcome
    }

    pub fn clear_artifacts(&mut self) -> StoreOutcome<()> {
        let warning = match self.backend.remove(HISTORY_KEY) {
            Ok(()) => None,
            Err(err) => {
                log::warn!("history not cleared: {err}");
                Some(StoreWarning::WriteFailed {
                    message: err.to_string(),
                })
            }
        };
        if warning.is_none() {
            self.emit("artifacts_cleared", json!({}));
        } else {
            self.emit_warning(HISTORY_KEY, warning.as_ref());
        }
        StoreOutcome { value: (), warning }
    }

    pub(super) fn delete_from<T, F>(&mut self, key: &str, id: &str, id_of: F) -> StoreOutcome<Vec<T>>
    where
        T: Clone + Serialize + DeserializeOwned,
        F: Fn(&T) -> &String,
    {
        let current: Vec<T> = self.read_collection(key);
        if !current.iter().any(|item| id_of(item) == id) {
            return StoreOutcome {
                value: current,
                warning: None,
            };
        }
        let remaining: Vec<T> = current
            .iter()
            .filter(|item| id_of(item) != id)
            .cloned()
            .collect();
        match self.write_collection(key, &remaining) {
            Ok(()) => StoreOutcome {
                value: remaining,
                warning: None,
            },
            Err(err) => {
                log::warn!("{key} not updated after delete: {err}");
                let warning = Some(StoreWarning::WriteFailed {
                    message: err.to_string(),
                });
                self.emit_warning(key, warning.as_ref());
                StoreOutcome {
                    value: current,
                    warning,
                }
            }
        }
    }

    /// Reads a JSON array, skipping entries that no longer deserialize.
    pub(super) fn read_collection<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                log::warn!("failed to read {key}: {err}");
                return Vec::new();
            }
        };
        let parsed: Value = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::warn!("failed to parse {key}: {err}");
                return Vec::new();
            }
        };
        let Some(rows) = parsed.as_array() else {
            log::warn!("ignoring {key}: stored value is not a list");
            return Vec::new();
        };
        rows.iter()
            .filter_map(|row| serde_json::from_value::<T>(row.clone()).ok())
            .collect()
    }

    pub(super) fn write_collection<T: Serialize>(
        &mut self,
        key: &str,
        items: &[T],
    ) -> Result<(), StorageError> {
        let raw = serde_json::to_string(items)?;
        self.backend.set(key, &raw)
    }

    pub(super) fn emit(&self, event_type: &str, payload: Value) {
        let payload: EventPayload = payload.as_object().cloned().unwrap_or_default();
        emit_optional(self.events.as_ref(), event_type, payload);
    }

    pub(super) fn emit_warning(&self, key: &str, warning: Option<&StoreWarning>) {
        if let Some(warning) = warning {
            self.emit(
                "storage_warning",
                json!({ "key": key, "message": warning.to_string() }),
            );
        }
    }
}

/// Millisecond timestamp id, bumped past the newest stored id so ids stay
/// unique and increase with insertion even within one millisecond.
pub(super) fn next_id(now_ms: i64, newest: Option<&str>) -> String {
    let newest = newest.and_then(|raw| raw.parse::<i64>().ok());
    match newest {
        Some(newest) if newest >= now_ms => (newest + 1).to_string(),
        _ => now_ms.to_string(),
    }
}
