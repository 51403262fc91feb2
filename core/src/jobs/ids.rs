//! Job id generation and validation.
//!
//! Ids are `job_<epoch_secs>` so that lexical order follows start time. The
//! id actually used is reserved on the remote (see
//! `script::reserve_id_script`), which appends `_<n>` when another start in
//! the same second, from any process, already holds the base id.

use crate::error::{JobError, Result};


/// `job_<secs>`, the id a start at `now_secs` asks to reserve.
pub fn base_id(now_secs: u64) -> String {
    format!("job_{}", now_secs)
}

/// The id echoed by the reservation script, if it is `base` or `base_<n>`.
pub fn parse_reserved(base: &str, output: &str) -> Option<String> {
    let id = output.trim();
    let suffix_ok = match id.strip_prefix(base) {
        Some("") => true,
        Some(rest) => rest
            .strip_prefix('_')
            .map(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false),
        None => false,
    };
    if suffix_ok {
        Some(id.to_string())
    } else {
        None
    }
}

/// Reject ids that could escape the jobs dir or glob other jobs' artifacts.
pub fn validate_job_id(id: &str) -> Result<()> {
    let ok = !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(JobError::Invalid(format!("Invalid job id: '{}'", id)))
    }
}
