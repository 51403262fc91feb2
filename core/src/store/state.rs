//! Engine state: templates and per-job watch offsets.
//!
//! Unlike the job cache this document holds user data (templates), so a
//! corrupt file is an error rather than silently reset.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{JobError, Result};
use crate::store::atomic::{acquire_lock, lock_path_for, write_json_atomic, LOCK_TIMEOUT_MS};


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Template {
    pub command: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub created_at: String,
}

/// How far `watch` has read into a job's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct WatchEntry {
    pub last_byte_position: u64,
    pub last_check_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct LocalState {
    #[serde(default)]
    pub templates: BTreeMap<String, Template>,
    #[serde(default)]
    pub job_watch_state: BTreeMap<String, WatchEntry>,
}

impl LocalState {
    pub fn watch_offset(&self, id: &str) -> u64 {
        self.job_watch_state
            .get(id)
            .map(|w| w.last_byte_position)
            .unwrap_or(0)
    }

    /// Record a watch check. The offset never moves backwards.
    pub fn record_watch(&mut self, id: &str, position: u64, checked_at: &str) -> u64 {
        let position = position.max(self.watch_offset(id));
        self.job_watch_state.insert(
            id.to_string(),
            WatchEntry {
                last_byte_position: position,
                last_check_time: checked_at.to_string(),
            },
        );
        position
    }
}


/// File-backed `LocalState`.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StateStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing file reads as empty state; unreadable or malformed is an error.
    pub fn load(&self) -> Result<LocalState> {
        match fs::read_to_string(&self.path) {
            Ok(text) => serde_json::from_str(&text).map_err(|e| JobError::state(&self.path, e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(LocalState::default()),
            Err(e) => Err(JobError::state(&self.path, e)),
        }
    }

    pub fn save(&self, state: &LocalState) -> Result<()> {
        write_json_atomic(&self.path, state)
    }

    /// Locked read-modify-write.
    pub fn update<T>(&self, f: impl FnOnce(&mut LocalState) -> T) -> Result<T> {
        let _lock = acquire_lock(&lock_path_for(&self.path), LOCK_TIMEOUT_MS)?;
        let mut state = self.load()?;
        let out = f(&mut state);
        self.save(&state)?;
        Ok(out)
    }
}
