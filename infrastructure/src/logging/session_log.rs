//! JSONL file writer and reader for session records.
//!
//! Each [`SessionRecord`] is serialized as a single JSON line carrying its
//! `type` tag, a `timestamp` and the owning `agent_id`, appended to the file
//! via a buffered writer.

use gatehouse_application::SessionRecorder;
use gatehouse_domain::SessionRecord;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::warn;

/// JSONL session recorder that writes one JSON object per line.
///
/// Thread-safe via `Mutex<BufWriter<File>>`: a line is written and flushed
/// under the lock, so concurrent agents never interleave partial lines.
pub struct JsonlSessionRecorder {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl JsonlSessionRecorder {
    /// Create a new recorder writing to the given path.
    ///
    /// Creates the file (and parent directories) if they don't exist.
    /// Returns `None` if the file cannot be created.
    pub fn new(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(
                "Could not create session log directory {}: {}",
                parent.display(),
                e
            );
            return None;
        }

        let file = match File::create(path) {
            Ok(f) => f,
            Err(e) => {
                warn!("Could not create session log file {}: {}", path.display(), e);
                return None;
            }
        };

        Some(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    /// Get the path to the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Serialize a record into its log line.
fn to_line(record: &SessionRecord) -> Option<String> {
    let timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    let Ok(Value::Object(mut map)) = serde_json::to_value(record) else {
        return None;
    };
    map.insert("timestamp".to_string(), Value::String(timestamp));
    map.insert(
        "agent_id".to_string(),
        Value::String(record.agent_id().to_string()),
    );
    serde_json::to_string(&Value::Object(map)).ok()
}

impl SessionRecorder for JsonlSessionRecorder {
    fn record(&self, record: &SessionRecord) {
        let Some(line) = to_line(record) else {
            warn!(record = record.type_name(), "Could not serialize session record");
            return;
        };

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = writeln!(writer, "{}", line).and_then(|_| writer.flush()) {
            warn!("Could not write session log {}: {}", self.path.display(), e);
        }
    }
}

impl Drop for JsonlSessionRecorder {
    fn drop(&mut self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writer.flush();
    }
}

#[derive(Debug, Error)]
pub enum SessionLogError {
    #[error("Could not read session log {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: invalid session record: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Load every record of a session log, in file order.
///
/// Blank lines are skipped. The `timestamp` field is not part of the
/// record and is ignored.
pub fn read_session_log(path: impl AsRef<Path>) -> Result<Vec<SessionRecord>, SessionLogError> {
    let path = path.as_ref();
    let io_error = |source| SessionLogError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(io_error)?;

    let mut records = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_error)?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|source| SessionLogError::Parse {
            path: path.to_path_buf(),
            line: index + 1,
            source,
        })?;
        records.push(record);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatehouse_domain::{
        AgentId, AgentKind, AgentPhase, CallId, PhaseEvent, ToolOutput, ToolResult,
    };
    use std::sync::Arc;

    fn spawned(id: &str) -> SessionRecord {
        SessionRecord::AgentSpawned {
            agent_id: AgentId::new(id),
            parent: None,
            kind: AgentKind::Root,
            goal: "fix the bug".into(),
        }
    }

    #[test]
    fn test_lines_carry_type_timestamp_and_agent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        let recorder = JsonlSessionRecorder::new(&path).unwrap();

        recorder.record(&spawned("root"));
        recorder.record(&SessionRecord::ToolResult {
            agent_id: AgentId::new("root"),
            result: ToolResult::ok(CallId::new("c1"), "read_file", ToolOutput::text("x")),
        });
        drop(recorder);

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.trim().lines().collect();
        assert_eq!(lines.len(), 2);
        for line in &lines {
            let value: Value = serde_json::from_str(line).unwrap();
            assert!(value.get("timestamp").is_some());
            assert_eq!(value["agent_id"], "root");
        }
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["type"], "agent_spawned");
        assert_eq!(first["goal"], "fix the bug");
    }

    #[test]
    fn test_read_back_for_replay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dir/session.jsonl");
        let recorder = JsonlSessionRecorder::new(&path).unwrap();

        let records = vec![
            spawned("root"),
            SessionRecord::Transition {
                agent_id: AgentId::new("root"),
                from: AgentPhase::Boot,
                to: AgentPhase::Planning,
                event: PhaseEvent::Start,
            },
        ];
        for record in &records {
            recorder.record(record);
        }
        drop(recorder);

        let loaded = read_session_log(&path).unwrap();
        assert_eq!(loaded, records);
        let report = gatehouse_domain::session::replay(&loaded);
        assert!(report.is_consistent());
        assert_eq!(
            report.agents[&AgentId::new("root")].phase,
            AgentPhase::Planning
        );
    }

    #[test]
    fn test_concurrent_writers_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.jsonl");
        let recorder = Arc::new(JsonlSessionRecorder::new(&path).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let recorder = Arc::clone(&recorder);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        recorder.record(&spawned(&format!("agent-{}", i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        drop(recorder);

        assert_eq!(read_session_log(&path).unwrap().len(), 400);
    }

    #[test]
    fn test_invalid_line_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "\n{\"type\":\"unknown\"}\n").unwrap();

        match read_session_log(&path) {
            Err(SessionLogError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_session_log(dir.path().join("missing.jsonl")),
            Err(SessionLogError::Io { .. })
        ));
    }
}
