//! Command history persistence.
//!
//! Finished palette actions are kept most-recent-first and truncated to the
//! configured limit. The JSON file lives in the data directory
//! (`~/.local/share/skitz/history.json`) unless `SKITZ_HISTORY_PATH` points
//! elsewhere.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skitz_types::CommandRecord;
use thiserror::Error;
use tracing::warn;

use crate::path_processing::{app_data_dir, expand_tilde, path_from_env_or};

/// Environment variable controlling the history file location.
pub const HISTORY_PATH_ENV: &str = "SKITZ_HISTORY_PATH";

/// Default filename for the persisted history store.
pub const HISTORY_FILE_NAME: &str = "history.json";

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Errors surfaced by history store operations.
#[derive(Debug, Error)]
pub enum HistoryStoreError {
    /// I/O failure while reading or writing the history file.
    #[error("history I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Serialization or deserialization failure.
    #[error("history serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A stored history entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub command: String,
    pub tool: String,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
}

impl From<CommandRecord> for HistoryEntry {
    fn from(record: CommandRecord) -> Self {
        Self {
            command: record.command,
            tool: record.tool,
            timestamp: Utc::now(),
            success: record.success,
        }
    }
}

#[derive(Default, Serialize, Deserialize)]
struct HistoryFile {
    entries: VecDeque<HistoryEntry>,
}

impl HistoryFile {
    fn push(&mut self, entry: HistoryEntry, limit: usize) {
        self.entries.push_front(entry);
        self.truncate(limit);
    }

    fn truncate(&mut self, limit: usize) {
        while self.entries.len() > limit {
            self.entries.pop_back();
        }
    }

    fn recent(&self, count: usize) -> Vec<HistoryEntry> {
        self.entries.iter().take(count).cloned().collect()
    }
}

/// Shared trait implemented by history persistence backends.
pub trait HistoryStore: Send + Sync {
    /// Record a finished command at the front of the history.
    fn record(&self, entry: HistoryEntry) -> Result<(), HistoryStoreError>;

    /// The `count` most recent entries, newest first.
    fn recent(&self, count: usize) -> Result<Vec<HistoryEntry>, HistoryStoreError>;

    /// Drop every entry.
    fn clear(&self) -> Result<(), HistoryStoreError>;

    /// Change the retention limit, truncating immediately.
    fn set_limit(&self, max_entries: usize) -> Result<(), HistoryStoreError>;
}

/// JSON-backed history store persisted on disk.
pub struct JsonHistoryStore {
    path: PathBuf,
    state: Mutex<(HistoryFile, usize)>,
}

impl JsonHistoryStore {
    /// Create a new store at the provided path (or the default path when omitted).
    pub fn new<P: Into<Option<PathBuf>>>(path: P, max_entries: usize) -> Result<Self, HistoryStoreError> {
        let resolved_path = match path.into() {
            Some(path) => expand_tilde(&path.to_string_lossy()),
            None => default_history_path(),
        };

        let mut file = load_history_file(&resolved_path)?;
        file.truncate(max_entries);
        Ok(Self {
            path: resolved_path,
            state: Mutex::new((file, max_entries)),
        })
    }

    /// Access the underlying history path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn save_locked(&self, history_file: &HistoryFile) -> Result<(), HistoryStoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(history_file)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl HistoryStore for JsonHistoryStore {
    fn record(&self, entry: HistoryEntry) -> Result<(), HistoryStoreError> {
        let mut state = self.state.lock().expect("history lock poisoned");
        let limit = state.1;
        state.0.push(entry, limit);
        self.save_locked(&state.0)
    }

    fn recent(&self, count: usize) -> Result<Vec<HistoryEntry>, HistoryStoreError> {
        let state = self.state.lock().expect("history lock poisoned");
        Ok(state.0.recent(count))
    }

    fn clear(&self) -> Result<(), HistoryStoreError> {
        let mut state = self.state.lock().expect("history lock poisoned");
        state.0.entries.clear();
        self.save_locked(&state.0)
    }

    fn set_limit(&self, max_entries: usize) -> Result<(), HistoryStoreError> {
        let mut state = self.state.lock().expect("history lock poisoned");
        state.1 = max_entries;
        state.0.truncate(max_entries);
        self.save_locked(&state.0)
    }
}

/// In-memory history store, used when history persistence is disabled and in tests.
pub struct InMemoryHistoryStore {
    state: Mutex<(HistoryFile, usize)>,
}

impl InMemoryHistoryStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            state: Mutex::new((HistoryFile::default(), max_entries)),
        }
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl HistoryStore for InMemoryHistoryStore {
    fn record(&self, entry: HistoryEntry) -> Result<(), HistoryStoreError> {
        let mut state = self.state.lock().expect("history lock poisoned");
        let limit = state.1;
        state.0.push(entry, limit);
        Ok(())
    }

    fn recent(&self, count: usize) -> Result<Vec<HistoryEntry>, HistoryStoreError> {
        let state = self.state.lock().expect("history lock poisoned");
        Ok(state.0.recent(count))
    }

    fn clear(&self) -> Result<(), HistoryStoreError> {
        let mut state = self.state.lock().expect("history lock poisoned");
        state.0.entries.clear();
        Ok(())
    }

    fn set_limit(&self, max_entries: usize) -> Result<(), HistoryStoreError> {
        let mut state = self.state.lock().expect("history lock poisoned");
        state.1 = max_entries;
        state.0.truncate(max_entries);
        Ok(())
    }
}

pub fn default_history_path() -> PathBuf {
    path_from_env_or(HISTORY_PATH_ENV, || app_data_dir().join(HISTORY_FILE_NAME))
}

fn load_history_file(path: &Path) -> Result<HistoryFile, HistoryStoreError> {
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<HistoryFile>(&content) {
            Ok(file) => Ok(file),
            Err(error) => {
                warn!("Failed to parse history file at {}: {}", path.display(), error);
                Ok(HistoryFile::default())
            }
        },
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(HistoryFile::default()),
        Err(error) => Err(HistoryStoreError::Io(error)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn entry(command: &str) -> HistoryEntry {
        HistoryEntry::from(CommandRecord {
            command: command.into(),
            tool: "wizard".into(),
            success: true,
        })
    }

    #[test]
    fn in_memory_store_keeps_newest_first() {
        let store = InMemoryHistoryStore::default();
        store.record(entry("deploy")).unwrap();
        store.record(entry("code-review")).unwrap();

        let recent = store.recent(5).unwrap();
        assert_eq!(recent[0].command, "code-review");
        assert_eq!(recent[1].command, "deploy");
    }

    #[test]
    fn json_store_persists_entries() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = JsonHistoryStore::new(Some(path.clone()), 10).unwrap();
        store.record(entry("mcp:docs:search")).unwrap();

        drop(store);
        let reloaded = JsonHistoryStore::new(Some(path), 10).unwrap();
        assert_eq!(reloaded.recent(1).unwrap()[0].command, "mcp:docs:search");
    }

    #[test]
    fn json_store_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = JsonHistoryStore::new(Some(path.clone()), 2).unwrap();

        for index in 0..3 {
            store.record(entry(&format!("cmd{index}"))).unwrap();
        }

        drop(store);
        let reloaded = JsonHistoryStore::new(Some(path), 2).unwrap();
        let commands: Vec<String> = reloaded.recent(10).unwrap().into_iter().map(|e| e.command).collect();
        assert_eq!(commands, vec!["cmd2".to_string(), "cmd1".to_string()]);
    }

    #[test]
    fn lowering_limit_truncates_immediately() {
        let store = InMemoryHistoryStore::new(10);
        for index in 0..5 {
            store.record(entry(&format!("cmd{index}"))).unwrap();
        }
        store.set_limit(3).unwrap();
        assert_eq!(store.recent(10).unwrap().len(), 3);
    }

    #[test]
    fn clear_empties_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        let store = JsonHistoryStore::new(Some(path.clone()), 10).unwrap();
        store.record(entry("deploy")).unwrap();
        store.clear().unwrap();

        let reloaded = JsonHistoryStore::new(Some(path), 10).unwrap();
        assert!(reloaded.recent(10).unwrap().is_empty());
    }

    #[test]
    fn default_path_honors_env_override() {
        let override_path = "~/custom/history.json";
        temp_env::with_var(HISTORY_PATH_ENV, Some(override_path), || {
            assert_eq!(default_history_path(), expand_tilde(override_path));
        });
    }

    #[test]
    fn invalid_json_returns_empty_store() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "not json").unwrap();

        let store = JsonHistoryStore::new(Some(path), 10).unwrap();
        assert!(store.recent(10).unwrap().is_empty());
    }
}
