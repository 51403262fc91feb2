//! Local persisted documents: the job cache mirror and the engine state
//! (templates + watch offsets). Every store takes an explicit path.

pub mod atomic;
pub mod cache;
pub mod state;

pub const STATE_FILE: &str = "state.json";
pub const CACHE_FILE: &str = "jobs-cache.json";
pub const LOCK_FILE: &str = "state.lock";
