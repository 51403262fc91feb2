//! Fixtures for Job Manager tests.

use tempfile::TempDir;

use crate::infrastructure::runner::MockRunner;
use crate::jobs::clock::FixedClock;
use crate::jobs::manager::JobManager;
use crate::store::cache::JobCacheStore;
use crate::store::state::StateStore;
use crate::store::{CACHE_FILE, STATE_FILE};
use crate::types::config::Settings;

pub const T0: u64 = 1_700_000_000;

/// Marker of the id reservation script.
pub const RESERVE: &str = "set -C";

/// Manager over `mock` with stores in a fresh temp dir and the clock at `T0`.
/// Id reservation answers `job_<T0>` unless `mock` has its own rule.
pub fn manager(mock: MockRunner) -> (JobManager<MockRunner>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mgr = JobManager::new(
        mock.on(RESERVE, &format!("job_{}\n", T0), 0),
        Settings::for_host("dgx"),
        StateStore::new(dir.path().join(STATE_FILE)),
        JobCacheStore::new(dir.path().join(CACHE_FILE)),
    )
    .with_clock(Box::new(FixedClock::new(T0)));
    (mgr, dir)
}
