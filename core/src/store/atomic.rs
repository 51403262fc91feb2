//! Whole-document JSON writes and the cross-process lock around them.

use std::fs;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{JobError, Result};

/// Default bound on lock waits.
pub const LOCK_TIMEOUT_MS: u64 = 2000;


/// Serialize `value` as pretty JSON and replace `path` with it.
///
/// Writes a sibling temp file and renames it over the target, so readers
/// see either the old or the new document, never a partial one.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(|e| JobError::state(path, e))?;
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|e| JobError::state(&parent, e))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "state".into());
    let tmp = parent.join(format!(".{}.tmp", name));
    fs::write(&tmp, json + "\n").map_err(|e| JobError::state(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| JobError::state(path, e))
}


/// Exclusive `flock` held until drop.
#[derive(Debug)]
pub struct LockGuard {
    file: fs::File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        unsafe {
            libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
        }
    }
}

/// Acquire an exclusive lock on `lock_path`, polling until `timeout_ms`.
///
/// The lock file itself is left in place; removing it would let a waiter
/// lock an unlinked inode.
pub fn acquire_lock(lock_path: &Path, timeout_ms: u64) -> Result<LockGuard> {
    if let Some(parent) = lock_path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| JobError::state(lock_path, format!("cannot open lock: {}", e)))?;

    let fd = file.as_raw_fd();
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        let ret = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
        if ret == 0 {
            return Ok(LockGuard { file });
        }
        if Instant::now() >= deadline {
            return Err(JobError::state(
                lock_path,
                format!("timed out acquiring lock after {}ms", timeout_ms),
            ));
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

/// Lock file shared by every store living in the same directory.
pub fn lock_path_for(document: &Path) -> PathBuf {
    match document.parent() {
        Some(p) => p.join(super::LOCK_FILE),
        None => PathBuf::from(super::LOCK_FILE),
    }
}
