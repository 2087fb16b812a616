//! Activity log shared by the store and the studio.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type EventPayload = Map<String, Value>;

/// Append-only JSONL log of one session's activity.
///
/// Clones write to the same file under one lock.
#[derive(Debug, Clone)]
pub struct EventWriter {
    session: Arc<Session>,
}

#[derive(Debug)]
struct Session {
    log_path: PathBuf,
    id: String,
    appending: Mutex<()>,
}

impl EventWriter {
    pub fn new(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            session: Arc::new(Session {
                log_path: path.into(),
                id: session_id.into(),
                appending: Mutex::new(()),
            }),
        }
    }

    pub fn for_new_session(path: impl Into<PathBuf>) -> Self {
        Self::new(path, Uuid::new_v4().to_string())
    }

    pub fn path(&self) -> &Path {
        &self.session.log_path
    }

    pub fn session_id(&self) -> &str {
        &self.session.id
    }

    /// Appends one event and returns the object written.
    ///
    /// `type`, `session_id` and `ts` are filled in first; payload keys with
    /// the same names replace them.
    pub fn emit(&self, event_type: &str, payload: EventPayload) -> anyhow::Result<Value> {
        let mut record = self.envelope(event_type);
        record.extend(payload);
        let record = Value::Object(record);
        self.append_line(&serde_json::to_string(&record)?)
            .with_context(|| format!("failed to append to {}", self.path().display()))?;
        Ok(record)
    }

    /// Like [`EventWriter::emit`] but only logs a failure.
    pub fn emit_quietly(&self, event_type: &str, payload: EventPayload) {
        if let Err(err) = self.emit(event_type, payload) {
            log::warn!("dropped '{event_type}' event: {err:#}");
        }
    }

    fn envelope(&self, event_type: &str) -> EventPayload {
        EventPayload::from_iter([
            ("type".to_string(), Value::from(event_type)),
            ("session_id".to_string(), Value::from(self.session.id.as_str())),
            ("ts".to_string(), Value::from(timestamp())),
        ])
    }

    fn append_line(&self, line: &str) -> anyhow::Result<()> {
        if let Some(dir) = self.path().parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let _appending = self
            .session
            .appending
            .lock()
            .map_err(|_| anyhow!("event log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path())?;
        file.write_all(format!("{line}\n").as_bytes())?;
        Ok(())
    }
}

pub fn emit_optional(events: Option<&EventWriter>, event_type: &str, payload: EventPayload) {
    if let Some(writer) = events {
        writer.emit_quietly(event_type, payload);
    }
}

/// RFC 3339 UTC with microseconds.
fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use chrono::DateTime;

    use super::*;

    #[test]
    fn emit_writes_compact_jsonl_line() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("events.jsonl");
        let writer = EventWriter::new(&path, "session-1");

        let mut payload = EventPayload::new();
        payload.insert("artifact_id".to_string(), Value::String("17".to_string()));
        let emitted = writer.emit("artifact_saved", payload)?;

        let content = fs::read_to_string(&path)?;
        let line = content.lines().next().unwrap_or("");
        let parsed: Value = serde_json::from_str(line)?;

        assert_eq!(parsed, emitted);
        assert_eq!(parsed["type"], Value::String("artifact_saved".to_string()));
        assert_eq!(parsed["session_id"], Value::String("session-1".to_string()));
        assert_eq!(parsed["artifact_id"], Value::String("17".to_string()));

        let ts = parsed["ts"].as_str().unwrap_or("");
        DateTime::parse_from_rfc3339(ts)?;
        Ok(())
    }

    #[test]
    fn payload_can_override_default_keys() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = EventWriter::new(temp.path().join("events.jsonl"), "session-1");

        let mut payload = EventPayload::new();
        payload.insert("type".to_string(), Value::String("override".to_string()));
        let emitted = writer.emit("artifact_saved", payload)?;

        assert_eq!(emitted["type"], Value::String("override".to_string()));
        assert_eq!(emitted["session_id"], Value::String("session-1".to_string()));
        Ok(())
    }

    #[test]
    fn emit_appends_lines_from_clones() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("nested").join("events.jsonl");
        let writer = EventWriter::for_new_session(&path);
        let clone = writer.clone();

        writer.emit("one", EventPayload::new())?;
        clone.emit("two", EventPayload::new())?;

        let content = fs::read_to_string(&path)?;
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0])?;
        let second: Value = serde_json::from_str(lines[1])?;
        assert_eq!(first["type"], Value::String("one".to_string()));
        assert_eq!(second["type"], Value::String("two".to_string()));
        assert_eq!(first["session_id"], second["session_id"]);
        assert!(!writer.session_id().is_empty());
        Ok(())
    }

    #[test]
    fn emit_optional_without_writer_is_noop() {
        emit_optional(None, "ignored", EventPayload::new());
    }

    #[test]
    fn unwritable_log_is_reported_with_path() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let blocker = temp.path().join("not-a-dir");
        fs::write(&blocker, "file")?;
        let writer = EventWriter::new(blocker.join("events.jsonl"), "session-1");

        let err = match writer.emit("artifact_saved", EventPayload::new()) {
            Ok(_) => anyhow::bail!("expected append failure"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("not-a-dir"));
        writer.emit_quietly("artifact_saved", EventPayload::new());
        Ok(())
    }
}
