use std::env;
use std::path::PathBuf;
use std::time::Duration;

use lumina_contracts::store::{
    ArtifactStore, FileStore, StoreConfig, DEFAULT_ARTIFACT_CAPACITY, DEFAULT_QUOTA_BYTES,
};
use lumina_contracts::events::EventWriter;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REQUEST_TIMEOUT_S: u64 = 90;
const MIN_REQUEST_TIMEOUT_S: u64 = 15;
const MAX_REQUEST_TIMEOUT_S: u64 = 300;

const STORAGE_FILE: &str = "storage.json";
const EVENTS_FILE: &str = "events.jsonl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuminaConfig {
    pub api_key: Option<String>,
    pub api_base: String,
    pub home: PathBuf,
    pub storage_quota_bytes: usize,
    pub history_capacity: usize,
    pub request_timeout: Duration,
}

impl LuminaConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(non_empty_env)
    }

    /// Builds the config from any variable source; unset, blank or unparsable
    /// values fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_key = lookup("GEMINI_API_KEY")
            .or_else(|| lookup("GOOGLE_API_KEY"))
            .or_else(|| lookup("API_KEY"));
        let api_base = lookup("GEMINI_API_BASE")
            .map(|value| value.trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let home = lookup("LUMINA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                lookup("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".lumina")
            });
        let storage_quota_bytes = parse_number(lookup("LUMINA_STORAGE_QUOTA_BYTES"))
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_QUOTA_BYTES as u64) as usize;
        let history_capacity = parse_number(lookup("LUMINA_HISTORY_CAPACITY"))
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_ARTIFACT_CAPACITY as u64) as usize;
        let timeout_s = parse_number(lookup("LUMINA_REQUEST_TIMEOUT"))
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_S)
            .clamp(MIN_REQUEST_TIMEOUT_S, MAX_REQUEST_TIMEOUT_S);

        Self {
            api_key,
            api_base,
            home,
            storage_quota_bytes,
            history_capacity,
            request_timeout: Duration::from_secs(timeout_s),
        }
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    pub fn storage_path(&self) -> PathBuf {
        self.home.join(STORAGE_FILE)
    }

    pub fn default_events_path(&self) -> PathBuf {
        self.home.join(EVENTS_FILE)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            artifact_capacity: self.history_capacity,
        }
    }

    pub fn open_store(&self, events: Option<EventWriter>) -> ArtifactStore {
        let backend = FileStore::with_quota(self.storage_path(), self.storage_quota_bytes);
        let store = ArtifactStore::with_config(Box::new(backend), self.store_config());
        match events {
            Some(events) => store.with_events(events),
            None => store,
        }
    }
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_number(raw: Option<String>) -> Option<u64> {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> LuminaConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        LuminaConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[("HOME", "/home/ada")]);
        assert_eq!(config.api_key, None);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.home, PathBuf::from("/home/ada/.lumina"));
        assert_eq!(config.storage_quota_bytes, 5 * 1024 * 1024);
        assert_eq!(config.history_capacity, 30);
        assert_eq!(config.request_timeout, Duration::from_secs(90));
        assert_eq!(
            config.storage_path(),
            PathBuf::from("/home/ada/.lumina/storage.json")
        );
    }

    #[test]
    fn api_key_falls_back_in_order() {
        assert_eq!(
            config_from(&[("API_KEY", "c"), ("GOOGLE_API_KEY", "b")]).api_key,
            Some("b".to_string())
        );
        assert_eq!(
            config_from(&[("API_KEY", "c"), ("GEMINI_API_KEY", "a")]).api_key,
            Some("a".to_string())
        );
        assert_eq!(
            config_from(&[("API_KEY", "c")]).api_key,
            Some("c".to_string())
        );
    }

    #[test]
    fn overrides_are_parsed_and_clamped() {
        let config = config_from(&[
            ("GEMINI_API_BASE", "http://localhost:8080/v1/"),
            ("LUMINA_HOME", "/data/lumina"),
            ("LUMINA_STORAGE_QUOTA_BYTES", "4096"),
            ("LUMINA_HISTORY_CAPACITY", "5"),
            ("LUMINA_REQUEST_TIMEOUT", "3"),
        ]);
        assert_eq!(config.api_base, "http://localhost:8080/v1");
        assert_eq!(config.home, PathBuf::from("/data/lumina"));
        assert_eq!(config.storage_quota_bytes, 4096);
        assert_eq!(config.history_capacity, 5);
        assert_eq!(config.request_timeout, Duration::from_secs(15));

        let high = config_from(&[("LUMINA_REQUEST_TIMEOUT", "9000")]);
        assert_eq!(high.request_timeout, Duration::from_secs(300));
    }

    #[test]
    fn unparsable_numbers_use_defaults() {
        let config = config_from(&[
            ("LUMINA_HISTORY_CAPACITY", "lots"),
            ("LUMINA_STORAGE_QUOTA_BYTES", "0"),
        ]);
        assert_eq!(config.history_capacity, 30);
        assert_eq!(config.storage_quota_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn open_store_uses_home_and_capacity() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let config = config_from(&[("LUMINA_HISTORY_CAPACITY", "2")]).with_home(temp.path());
        let mut store = config.open_store(None);
        for idx in 0..3 {
            store.add_artifact(
                lumina_contracts::store::ArtifactKind::Generated,
                "data:image/png;base64,AAAA",
                format!("p{idx}"),
                None,
            );
        }
        assert_eq!(store.list_artifacts().len(), 2);
        assert!(config.storage_path().exists());
        Ok(())
    }
}
