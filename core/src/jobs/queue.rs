//! Sequential job queue, drained by a detached remote processor.

use tracing::info;

use crate::error::{JobError, Result};
use crate::infrastructure::runner::Remote;
use crate::jobs::artifacts::QUEUE_PROCESSOR_FILE;
use crate::jobs::format::ellipsize;
use crate::jobs::manager::JobManager;
use crate::jobs::script::queue_processor_script;
use crate::rig::remote::{in_container_argv, sh_quote};

const QUEUE_SHOW_CHARS: usize = 60;

/// What `queue add` enqueues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueSource {
    Command(String),
    Template(String),
}

impl<R: Remote> JobManager<R> {
    pub fn queue_add(
        &self,
        source: QueueSource,
        workdir: Option<&str>,
        container: Option<&str>,
    ) -> Result<String> {
        let command = match source {
            QueueSource::Command(c) => c,
            QueueSource::Template(name) => self.template(&name)?.command,
        };
        let command = command.trim().to_string();
        if command.is_empty() {
            return Err(JobError::Invalid("Usage: jobrig queue add <command...>".into()));
        }
        if command.contains('\n') || command.contains('\r') {
            return Err(JobError::Invalid(
                "Queued commands must be a single line".into(),
            ));
        }
        let workdir = workdir
            .filter(|w| !w.is_empty())
            .unwrap_or(self.settings().default_workdir.as_str())
            .to_string();
        if workdir.contains('|') {
            return Err(JobError::Invalid(format!("Invalid workdir: '{}'", workdir)));
        }
        let container = self.container_or(container);

        let entry = format!("{}|{}", workdir, command);
        let queue = self.paths().queue_file();
        let out = self.run_checked(
            &container,
            &format!(
                "mkdir -p {} && printf '%s\\n' {} >> {} && wc -l < {}",
                self.paths().dir(),
                sh_quote(&entry),
                queue,
                queue
            ),
        )?;
        let depth = out.trim().parse::<usize>().unwrap_or(0);
        info!(depth, container = %container, "queued");
        Ok(format!(
            "\u{1f4e5} Queued at position {}: {}",
            depth,
            ellipsize(&command, QUEUE_SHOW_CHARS)
        ))
    }

    pub fn queue_list(&self, container: Option<&str>) -> Result<String> {
        let container = self.container_or(container);
        // A missing marker or queue file reads as empty; only transport fails.
        let current = self.run_checked(
            &container,
            &format!("cat {} 2>/dev/null || true", self.paths().queue_current()),
        )?;
        let current = current.trim().to_string();
        let queued = self.run_checked(
            &container,
            &format!("cat {} 2>/dev/null || true", self.paths().queue_file()),
        )?;
        let mut pending: Vec<&str> = queued
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| l.split_once('|').map(|(_, cmd)| cmd).unwrap_or(l))
            .collect();
        // The entry in flight stays at the head of the file until it ends.
        if !current.is_empty() && pending.first() == Some(&current.as_str()) {
            pending.remove(0);
        }

        if current.is_empty() && pending.is_empty() {
            return Ok("Queue is empty".into());
        }
        let mut text = String::from("\u{1f4cb} Job queue\n");
        if !current.is_empty() {
            text.push_str(&format!(
                "\u{25b6}\u{fe0f} Currently running: {}\n",
                ellipsize(&current, QUEUE_SHOW_CHARS)
            ));
        }
        text.push_str(&format!("\nPending ({}):\n", pending.len()));
        for (i, cmd) in pending.iter().enumerate() {
            text.push_str(&format!("  {}. {}\n", i + 1, ellipsize(cmd, QUEUE_SHOW_CHARS)));
        }
        Ok(text)
    }

    /// Drop pending entries. A job already running is unaffected.
    pub fn queue_clear(&self, container: Option<&str>) -> Result<String> {
        let container = self.container_or(container);
        self.run_checked(&container, &format!("rm -f {}", self.paths().queue_file()))?;
        info!(container = %container, "queue cleared");
        Ok("\u{1f5d1}\u{fe0f}  Queue cleared".into())
    }

    /// Launch the processor unless one is already running.
    pub fn queue_start(&self, container: Option<&str>) -> Result<String> {
        let container = self.container_or(container);
        let probe = self.remote().execute(&in_container_argv(
            &container,
            &["pgrep", "-f", QUEUE_PROCESSOR_FILE],
        ));
        if probe.success() {
            return Ok("Queue processor already running".into());
        }

        let processor = self.paths().queue_processor();
        self.run_checked(
            &container,
            &format!(
                "mkdir -p {} && printf '%s' {} > {} && chmod +x {}",
                self.paths().dir(),
                sh_quote(&queue_processor_script(self.paths())),
                processor,
                processor
            ),
        )?;
        let launch = format!("docker exec -d {} bash {}", sh_quote(&container), processor);
        let out = self.remote().dispatch(&launch);
        if !out.success() {
            return Err(JobError::Dispatch(out.trimmed().to_string()));
        }
        info!(container = %container, "queue processor started");
        Ok("\u{25b6}\u{fe0f} Queue processor started".into())
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::runner::MockRunner;
    use crate::jobs::testutil::manager;

    #[test]
    fn add_appends_workdir_and_command() {
        let (mgr, _dir) = manager(MockRunner::new().on("wc -l", "3\n", 0));
        let out = mgr
            .queue_add(QueueSource::Command("python a.py".into()), Some("/workspace/exp"), None)
            .unwrap();
        assert_eq!(out, "\u{1f4e5} Queued at position 3: python a.py");
        let cmds = mgr.remote().commands_containing(">> /workspace/.jobs/queue.txt");
        assert_eq!(cmds.len(), 1);
        assert!(cmds[0].contains("/workspace/exp|python a.py"));
    }

    #[test]
    fn add_rejects_multiline() {
        let (mgr, _dir) = manager(MockRunner::new());
        let err = mgr
            .queue_add(QueueSource::Command("a\nb".into()), None, None)
            .unwrap_err();
        assert!(err.to_string().contains("single line"));
        assert!(mgr.remote().executed_commands().is_empty());
    }

    #[test]
    fn add_unknown_template() {
        let (mgr, _dir) = manager(MockRunner::new());
        let err = mgr
            .queue_add(QueueSource::Template("nope".into()), None, None)
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn add_from_template() {
        let (mgr, _dir) = manager(MockRunner::new().on("wc -l", "1", 0));
        mgr.template_save("sweep", "python sweep.py --k 8", None, None).unwrap();
        mgr.queue_add(QueueSource::Template("sweep".into()), None, None).unwrap();
        assert_eq!(
            mgr.remote().commands_containing("/workspace|python sweep.py --k 8").len(),
            1
        );
    }

    #[test]
    fn list_skips_entry_in_flight() {
        let mock = MockRunner::new()
            .on("queue_current.txt", "python a.py\n", 0)
            .on("queue.txt", "/workspace|python a.py\n/workspace|python b.py\n/w|python c.py\n", 0);
        let (mgr, _dir) = manager(mock);
        let out = mgr.queue_list(None).unwrap();
        assert!(out.contains("Currently running: python a.py\n"));
        assert!(out.contains("Pending (2):\n  1. python b.py\n  2. python c.py\n"));
    }

    #[test]
    fn list_empty() {
        let (mgr, _dir) = manager(MockRunner::new());
        assert_eq!(mgr.queue_list(None).unwrap(), "Queue is empty");
        assert!(mgr.remote().executed_commands()[0].contains("2>/dev/null || true"));
    }

    #[test]
    fn list_surfaces_transport_failure() {
        let refused = "ssh: connect to host dgx port 22: Connection refused";
        let (mgr, _dir) = manager(MockRunner::new().on("docker exec", refused, 255));
        let err = mgr.queue_list(None).unwrap_err();
        assert!(matches!(err, JobError::Remote { code: 255, .. }));
        assert!(err.to_string().contains("Connection refused"));
    }

    #[test]
    fn clear_removes_only_queue_file() {
        let (mgr, _dir) = manager(MockRunner::new());
        mgr.queue_clear(None).unwrap();
        let cmds = mgr.remote().executed_commands();
        assert_eq!(cmds.len(), 1);
        assert!(cmds[0].contains("rm -f /workspace/.jobs/queue.txt"));
        assert!(!cmds[0].contains("queue_current"));
    }

    #[test]
    fn start_is_noop_when_running() {
        let (mgr, _dir) = manager(MockRunner::new().on("pgrep", "812", 0));
        assert_eq!(mgr.queue_start(None).unwrap(), "Queue processor already running");
        assert!(mgr.remote().dispatched_commands().is_empty());
    }

    #[test]
    fn start_writes_and_dispatches_processor() {
        let (mgr, _dir) = manager(MockRunner::new().on("pgrep", "", 1));
        mgr.queue_start(None).unwrap();
        assert_eq!(
            mgr.remote().executed_commands()[0],
            "docker exec 'twinprime' 'pgrep' '-f' 'queue_processor.sh'"
        );
        assert_eq!(mgr.remote().commands_containing("chmod +x").len(), 1);
        assert_eq!(
            mgr.remote().dispatched_commands(),
            vec!["docker exec -d 'twinprime' bash /workspace/.jobs/queue_processor.sh"]
        );
    }
}
