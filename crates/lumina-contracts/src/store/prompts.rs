use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::artifacts::{next_id, AddOutcome, ArtifactStore, StoreOutcome};
use crate::error::StoreWarning;

pub const SAVED_PROMPTS_KEY: &str = "lumina_saved_prompts";

/// A user-bookmarked prompt. The list has no capacity bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedPrompt {
    pub id: String,
    pub text: String,
    pub timestamp: i64,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ArtifactStore {
    pub fn add_saved_prompt(&mut self, text: impl Into<String>) -> AddOutcome<SavedPrompt> {
        self.add_saved_prompt_with_tags(text, Vec::new())
    }

    pub fn add_saved_prompt_with_tags(
        &mut self,
        text: impl Into<String>,
        tags: Vec<String>,
    ) -> AddOutcome<SavedPrompt> {
        let previous = self.list_saved_prompts();
        let timestamp = Utc::now().timestamp_millis();
        let prompt = SavedPrompt {
            id: next_id(timestamp, previous.first().map(|item| item.id.as_str())),
            text: text.into(),
            timestamp,
            tags: normalize_tags(tags),
        };

        let mut updated = Vec::with_capacity(previous.len() + 1);
        updated.push(prompt.clone());
        updated.extend(previous.iter().cloned());

        match self.write_collection(SAVED_PROMPTS_KEY, &updated) {
            Ok(()) => {
                self.emit(
                    "prompt_saved",
                    json!({ "prompt_id": prompt.id, "count": updated.len() }),
                );
                AddOutcome {
                    item: prompt,
                    collection: updated,
                    warning: None,
                }
            }
            Err(err) => {
                log::warn!("saved prompts not written: {err}");
                let warning = if err.is_quota() {
                    StoreWarning::QuotaExceeded {
                        attempted: updated.len(),
                    }
                } else {
                    StoreWarning::WriteFailed {
                        message: err.to_string(),
                    }
                };
                self.emit_warning(SAVED_PROMPTS_KEY, Some(&warning));
                AddOutcome {
                    item: prompt,
                    collection: previous,
                    warning: Some(warning),
                }
            }
        }
    }

    pub fn list_saved_prompts(&self) -> Vec<SavedPrompt> {
        self.read_collection(SAVED_PROMPTS_KEY)
    }

    pub fn delete_saved_prompt(&mut self, id: &str) -> StoreOutcome<Vec<SavedPrompt>> {
        let existed = self.list_saved_prompts().iter().any(|item| item.id == id);
        let outcome = self.delete_from(SAVED_PROMPTS_KEY, id, |item: &SavedPrompt| &item.id);
        if existed && outcome.warning.is_none() {
            self.emit("prompt_deleted", json!({ "prompt_id": id }));
        }
        outcome
    }
}

fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{KeyValueStore, MemoryStore, HISTORY_KEY};

    fn store() -> ArtifactStore {
        ArtifactStore::new(Box::new(MemoryStore::new()))
    }

    #[test]
    fn saved_prompts_are_newest_first_and_unbounded() {
        let mut store = store();
        for idx in 0..40 {
            let outcome = store.add_saved_prompt(format!("prompt {idx}"));
            assert!(outcome.warning.is_none());
        }
        let listed = store.list_saved_prompts();
        assert_eq!(listed.len(), 40);
        assert_eq!(listed[0].text, "prompt 39");
        assert_eq!(listed[39].text, "prompt 0");
    }

    #[test]
    fn saved_prompts_do_not_touch_history() -> anyhow::Result<()> {
        let mut backend = MemoryStore::new();
        backend.set(HISTORY_KEY, "[]")?;
        let mut store = ArtifactStore::new(Box::new(backend));
        store.add_saved_prompt("a quiet harbor at dawn");
        assert!(store.list_artifacts().is_empty());
        assert_eq!(store.list_saved_prompts().len(), 1);
        Ok(())
    }

    #[test]
    fn tags_are_trimmed_lowercased_and_deduplicated() {
        let mut store = store();
        let outcome = store.add_saved_prompt_with_tags(
            "neon city",
            vec![
                " Cyberpunk ".to_string(),
                "cyberpunk".to_string(),
                "".to_string(),
                "Night".to_string(),
            ],
        );
        assert_eq!(outcome.item.tags, vec!["cyberpunk", "night"]);
        assert_eq!(store.list_saved_prompts()[0].tags, vec!["cyberpunk", "night"]);
    }

    #[test]
    fn prompts_without_tags_deserialize() -> anyhow::Result<()> {
        let mut backend = MemoryStore::new();
        backend.set(
            SAVED_PROMPTS_KEY,
            r#"[{"id":"7","text":"legacy","timestamp":7}]"#,
        )?;
        let store = ArtifactStore::new(Box::new(backend));
        let listed = store.list_saved_prompts();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].tags.is_empty());
        Ok(())
    }

    #[test]
    fn delete_saved_prompt_by_id() {
        let mut store = store();
        let keep = store.add_saved_prompt("keep").item;
        let drop = store.add_saved_prompt("drop").item;

        let outcome = store.delete_saved_prompt(&drop.id);
        assert_eq!(outcome.value, vec![keep.clone()]);

        let unchanged = store.delete_saved_prompt("missing");
        assert!(unchanged.warning.is_none());
        assert_eq!(unchanged.value, vec![keep]);
    }

    #[test]
    fn quota_failure_returns_warning_and_previous_list() {
        let mut store = ArtifactStore::new(Box::new(MemoryStore::with_quota(200)));
        let small = store.add_saved_prompt("short");
        assert!(small.warning.is_none());

        let large = store.add_saved_prompt("x".repeat(400));
        assert!(matches!(
            large.warning,
            Some(StoreWarning::QuotaExceeded { attempted: 2 })
        ));
        assert_eq!(large.collection, vec![small.item.clone()]);
        assert_eq!(store.list_saved_prompts(), vec![small.item]);
    }
}
