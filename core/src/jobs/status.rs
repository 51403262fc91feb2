//! Job status and the single reconciliation rule applied at every read site.

use std::fmt;

use serde::{Deserialize, Serialize};


/// Derived lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Failed,
    Killed,
    Stale,
    Unknown,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Killed => "killed",
            JobStatus::Stale => "stale",
            JobStatus::Unknown => "unknown",
        }
    }

    /// Parse the raw status artifact. Anything unrecognised is `Unknown`.
    pub fn from_raw(raw: &str) -> JobStatus {
        match raw.trim() {
            "running" => JobStatus::Running,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "killed" => JobStatus::Killed,
            "stale" => JobStatus::Stale,
            _ => JobStatus::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }

    /// List icon; failed jobs with detected error patterns get a louder one.
    pub fn icon(&self, has_errors: bool) -> &'static str {
        match self {
            JobStatus::Running => "\u{1f504}",   // 🔄
            JobStatus::Completed => "\u{2705}",  // ✅
            JobStatus::Failed if has_errors => "\u{1f534}", // 🔴
            JobStatus::Failed => "\u{274c}",     // ❌
            JobStatus::Killed => "\u{26d4}",     // ⛔
            JobStatus::Stale => "\u{26a0}\u{fe0f}", // ⚠️
            JobStatus::Unknown => "\u{2753}",    // ❓
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reconcile the status artifact with the exit-code artifact.
///
/// An exit code always wins: `0` is completed, anything else failed. With
/// no exit code the raw field stands, except that a `running` job whose pid
/// is known to be gone is `stale`. `pid_alive` is `None` when liveness was
/// not checked.
pub fn effective_status(raw: &str, exit_code: Option<i32>, pid_alive: Option<bool>) -> JobStatus {
    match exit_code {
        Some(0) => JobStatus::Completed,
        Some(_) => JobStatus::Failed,
        None => match JobStatus::from_raw(raw) {
            JobStatus::Running if pid_alive == Some(false) => JobStatus::Stale,
            // "completed" with no exit artifact means the artifact was lost.
            JobStatus::Completed | JobStatus::Failed => JobStatus::Unknown,
            other => other,
        },
    }
}

/// Parse an exit-code artifact; `-` or blank means absent.
pub fn parse_exit_code(s: &str) -> Option<i32> {
    let s = s.trim();
    if s.is_empty() || s == "-" {
        return None;
    }
    s.parse().ok()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_zero_is_completed_regardless_of_raw() {
        assert_eq!(effective_status("running", Some(0), None), JobStatus::Completed);
        assert_eq!(effective_status("garbage", Some(0), Some(false)), JobStatus::Completed);
    }

    #[test]
    fn nonzero_exit_is_failed() {
        assert_eq!(effective_status("completed", Some(1), None), JobStatus::Failed);
        assert_eq!(effective_status("completed", Some(137), None), JobStatus::Failed);
    }

    #[test]
    fn no_exit_uses_raw_field() {
        assert_eq!(effective_status("running", None, None), JobStatus::Running);
        assert_eq!(effective_status("running", None, Some(true)), JobStatus::Running);
        assert_eq!(effective_status("killed", None, None), JobStatus::Killed);
        assert_eq!(effective_status("???", None, None), JobStatus::Unknown);
    }

    #[test]
    fn dead_pid_without_exit_is_stale() {
        assert_eq!(effective_status("running", None, Some(false)), JobStatus::Stale);
        assert_eq!(effective_status("killed", None, Some(false)), JobStatus::Killed);
    }

    #[test]
    fn terminal_raw_without_exit_is_unknown() {
        assert_eq!(effective_status("completed", None, None), JobStatus::Unknown);
    }

    #[test]
    fn parse_exit_code_sentinels() {
        assert_eq!(parse_exit_code("-"), None);
        assert_eq!(parse_exit_code(""), None);
        assert_eq!(parse_exit_code(" 0\n"), Some(0));
        assert_eq!(parse_exit_code("143"), Some(143));
        assert_eq!(parse_exit_code("x"), None);
    }

    #[test]
    fn failed_icon_depends_on_errors() {
        assert_ne!(JobStatus::Failed.icon(true), JobStatus::Failed.icon(false));
    }

    #[test]
    fn display_matches_wire_name() {
        assert_eq!(JobStatus::Killed.to_string(), "killed");
        assert_eq!(serde_json::to_string(&JobStatus::Stale).unwrap(), "\"stale\"");
    }
}
