//! Job cache: the local mirror of remote job state read by dashboards.
//!
//! Optimistic updates (start, kill) patch the running slot; a list refresh
//! replaces the whole document. Loading is best-effort: a missing, corrupt
//! or version-mismatched file reads as no cache.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::jobs::status::JobStatus;
use crate::store::atomic::{acquire_lock, lock_path_for, write_json_atomic, LOCK_TIMEOUT_MS};

pub const CACHE_VERSION: u32 = 1;

/// Bound on `recent`.
pub const RECENT_CAP: usize = 10;

/// Exit code recorded for killed jobs.
pub const EXIT_KILLED: i32 = -9;

/// Exit code recorded when none was observed.
pub const EXIT_UNKNOWN: i32 = -1;


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunningJob {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub command: String,
    pub started_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workdir: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedJob {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub command: String,
    pub status: JobStatus,
    pub exit_code: i32,
    pub started_at: u64,
    /// Seconds.
    pub duration: i64,
    pub has_errors: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCache {
    pub version: u32,
    pub updated_at: String,
    pub host: String,
    pub container: String,
    #[serde(default)]
    pub running: Option<RunningJob>,
    #[serde(default)]
    pub recent: Vec<CompletedJob>,
}

impl JobCache {
    pub fn new(host: &str, container: &str, updated_at: &str) -> Self {
        JobCache {
            version: CACHE_VERSION,
            updated_at: updated_at.to_string(),
            host: host.to_string(),
            container: container.to_string(),
            running: None,
            recent: Vec::new(),
        }
    }

    /// Display name previously recorded for `id`, in either slot.
    pub fn name_of(&self, id: &str) -> Option<String> {
        if let Some(r) = self.running.as_ref().filter(|r| r.id == id) {
            return r.name.clone();
        }
        self.recent.iter().find(|c| c.id == id).and_then(|c| c.name.clone())
    }

    /// Put `job` in the running slot. A job already there whose end was
    /// never observed is demoted to `recent` as `unknown`.
    pub fn record_start(&mut self, job: RunningJob, now_secs: u64) {
        if let Some(prev) = self.running.take() {
            if prev.id != job.id {
                self.push_recent(demote(prev, JobStatus::Unknown, EXIT_UNKNOWN, now_secs));
            }
        }
        self.running = Some(job);
    }

    /// Move the running job to `recent` as killed if it is `id`.
    /// Returns whether anything changed.
    pub fn record_kill(&mut self, id: &str, now_secs: u64) -> bool {
        match self.running.take() {
            Some(r) if r.id == id => {
                self.push_recent(demote(r, JobStatus::Killed, EXIT_KILLED, now_secs));
                true
            }
            other => {
                self.running = other;
                false
            }
        }
    }

    fn push_recent(&mut self, job: CompletedJob) {
        self.recent.retain(|c| c.id != job.id);
        self.recent.insert(0, job);
        self.recent.truncate(RECENT_CAP);
    }
}

fn demote(job: RunningJob, status: JobStatus, exit_code: i32, now_secs: u64) -> CompletedJob {
    CompletedJob {
        duration: now_secs.saturating_sub(job.started_at) as i64,
        id: job.id,
        name: job.name,
        command: job.command,
        status,
        exit_code,
        started_at: job.started_at,
        has_errors: false,
    }
}


/// File-backed `JobCache`.
pub struct JobCacheStore {
    path: PathBuf,
}

impl JobCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JobCacheStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<JobCache> {
        read_cache(&self.path)
    }

    pub fn save(&self, cache: &JobCache) -> Result<()> {
        let _lock = match acquire_lock(&lock_path_for(&self.path), LOCK_TIMEOUT_MS) {
            Ok(g) => Some(g),
            Err(e) => {
                warn!(error = %e, "writing job cache unlocked");
                None
            }
        };
        write_json_atomic(&self.path, cache)
    }
}

/// Read a cache document; anything unusable is `None`.
pub fn read_cache(path: &Path) -> Option<JobCache> {
    let text = match fs::read_to_string(path) {
        Ok(t) => t,
        Err(_) => return None,
    };
    match serde_json::from_str::<JobCache>(&text) {
        Ok(c) if c.version == CACHE_VERSION => Some(c),
        Ok(c) => {
            warn!(path = %path.display(), version = c.version, "ignoring job cache with unsupported version");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring corrupt job cache");
            None
        }
    }
}
