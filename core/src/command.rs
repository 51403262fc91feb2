//! Command: the typed interface for every jobrig operation.
//!
//! Each variant is one operation in `Sys::execute()`. Commands serialize as
//! JSON objects with a `"command"` discriminant:
//!
//! ```json
//! {"command": "job.start", "cmd": "python a.py", "name": "baseline"}
//! {"command": "job.log", "id": "job_1700000000", "lines": 100}
//! {"command": "queue.start"}
//! ```
//!
//! | Group | Commands |
//! |-------|----------|
//! | Job | `job.start`, `job.list`, `job.log`, `job.kill`, `job.retry`, `job.clean`, `job.watch`, `job.compare`, `job.stats` |
//! | Queue | `queue.add`, `queue.list`, `queue.clear`, `queue.start` |
//! | Template | `template.save`, `template.list`, `template.delete`, `template.run` |
//! | Other | `gpu`, `dash`, `help` |

use serde::{Deserialize, Serialize};


#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "command")]
pub enum Command {
    // -----------------------------------------------------------------
    // Job commands
    // -----------------------------------------------------------------

    /// Dispatch a detached job.
    #[serde(rename = "job.start")]
    JobStart {
        cmd: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workdir: Option<String>,
    },

    /// Authoritative listing; refreshes the job cache.
    #[serde(rename = "job.list")]
    JobList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },

    /// Log tail with error/metric annotations. `lines == 0` is the full log.
    #[serde(rename = "job.log")]
    JobLog {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lines: Option<usize>,
    },

    #[serde(rename = "job.kill")]
    JobKill {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
    },

    #[serde(rename = "job.retry")]
    JobRetry {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
    },

    /// Remove artifacts of old jobs.
    #[serde(rename = "job.clean")]
    JobClean {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        hours: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        keep: Option<usize>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
    },

    /// Output since the previous watch of the same job.
    #[serde(rename = "job.watch")]
    JobWatch {
        id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
    },

    #[serde(rename = "job.compare")]
    JobCompare {
        a: String,
        b: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
    },

    #[serde(rename = "job.stats")]
    JobStats {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<usize>,
    },

    // -----------------------------------------------------------------
    // Queue commands
    // -----------------------------------------------------------------

    /// Enqueue a literal command or a template's command. Exactly one of
    /// `cmd` and `template` is set.
    #[serde(rename = "queue.add")]
    QueueAdd {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cmd: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workdir: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
    },

    #[serde(rename = "queue.list")]
    QueueList {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
    },

    #[serde(rename = "queue.clear")]
    QueueClear {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
    },

    #[serde(rename = "queue.start")]
    QueueStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
    },

    // -----------------------------------------------------------------
    // Template commands
    // -----------------------------------------------------------------

    #[serde(rename = "template.save")]
    TemplateSave {
        name: String,
        cmd: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        project: Option<String>,
    },

    #[serde(rename = "template.list")]
    TemplateList,

    #[serde(rename = "template.delete")]
    TemplateDelete { name: String },

    #[serde(rename = "template.run")]
    TemplateRun {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        container: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workdir: Option<String>,
    },

    // -----------------------------------------------------------------
    // Other
    // -----------------------------------------------------------------

    /// One-line GPU snapshot of the host.
    #[serde(rename = "gpu")]
    Gpu,

    /// Terminal dashboard over the job cache. Run by the CLI itself.
    #[serde(rename = "dash")]
    Dash,

    #[serde(rename = "help")]
    Help {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        topic: Option<String>,
    },
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_is_tagged() {
        let cmd = Command::JobLog {
            id: "job_1".into(),
            container: None,
            lines: Some(100),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert_eq!(json, r#"{"command":"job.log","id":"job_1","lines":100}"#);
    }

    #[test]
    fn parse_from_json() {
        let cmd: Command =
            serde_json::from_str(r#"{"command":"job.start","cmd":"python a.py"}"#).unwrap();
        assert_eq!(
            cmd,
            Command::JobStart {
                cmd: "python a.py".into(),
                name: None,
                container: None,
                workdir: None,
            }
        );
        let cmd: Command = serde_json::from_str(r#"{"command":"template.list"}"#).unwrap();
        assert_eq!(cmd, Command::TemplateList);
    }

    #[test]
    fn unknown_command_rejected() {
        assert!(serde_json::from_str::<Command>(r#"{"command":"agent.new"}"#).is_err());
    }
}
