//! Remote sidecar artifact layout.
//!
//! Every job is a set of small files `<jobs_dir>/<id>.<field>` written by the
//! generated runner script. The queue lives next to them as one text file
//! plus a marker naming the entry in flight.

/// One field of a job's remote state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Command,
    Status,
    Start,
    End,
    Pid,
    Exit,
    Log,
}

impl Artifact {
    pub fn extension(&self) -> &'static str {
        match self {
            Artifact::Command => "cmd",
            Artifact::Status => "status",
            Artifact::Start => "start",
            Artifact::End => "end",
            Artifact::Pid => "pid",
            Artifact::Exit => "exit",
            Artifact::Log => "log",
        }
    }
}

pub const QUEUE_FILE: &str = "queue.txt";
pub const QUEUE_CURRENT_FILE: &str = "queue_current.txt";
pub const QUEUE_PROCESSOR_FILE: &str = "queue_processor.sh";

/// Paths under the remote jobs dir. The dir is validated at config load
/// (absolute, no whitespace) and ids by `validate_job_id`, so paths are
/// embedded in scripts unquoted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPaths {
    dir: String,
}

impl JobPaths {
    pub fn new(jobs_dir: &str) -> Self {
        JobPaths {
            dir: jobs_dir.trim_end_matches('/').to_string(),
        }
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn artifact(&self, id: &str, artifact: Artifact) -> String {
        format!("{}/{}.{}", self.dir, id, artifact.extension())
    }

    /// Glob matching every artifact of exactly this job.
    pub fn all_artifacts(&self, id: &str) -> String {
        format!("{}/{}.*", self.dir, id)
    }

    pub fn status_glob(&self) -> String {
        format!("{}/*.status", self.dir)
    }

    pub fn queue_file(&self) -> String {
        format!("{}/{}", self.dir, QUEUE_FILE)
    }

    pub fn queue_current(&self) -> String {
        format!("{}/{}", self.dir, QUEUE_CURRENT_FILE)
    }

    pub fn queue_processor(&self) -> String {
        format!("{}/{}", self.dir, QUEUE_PROCESSOR_FILE)
    }

    /// Job id from a status artifact path (`.../job_1.status` → `job_1`).
    pub fn id_from_status_path(&self, path: &str) -> Option<String> {
        let name = path.trim().rsplit('/').next()?;
        let id = name.strip_suffix(".status")?;
        if id.is_empty() {
            None
        } else {
            Some(id.to_string())
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_paths() {
        let p = JobPaths::new("/workspace/.jobs/");
        assert_eq!(p.dir(), "/workspace/.jobs");
        assert_eq!(p.artifact("job_1", Artifact::Log), "/workspace/.jobs/job_1.log");
        assert_eq!(p.artifact("job_1", Artifact::Exit), "/workspace/.jobs/job_1.exit");
        assert_eq!(p.all_artifacts("job_1"), "/workspace/.jobs/job_1.*");
        assert_eq!(p.queue_file(), "/workspace/.jobs/queue.txt");
        assert_eq!(p.queue_current(), "/workspace/.jobs/queue_current.txt");
    }

    #[test]
    fn all_artifacts_glob_does_not_cover_suffixed_ids() {
        // job_5.* must not match job_5_1.status
        let p = JobPaths::new("/j");
        let glob = p.all_artifacts("job_5");
        assert!(!"/j/job_5_1.status".starts_with(glob.trim_end_matches('*')));
    }

    #[test]
    fn id_from_status_path() {
        let p = JobPaths::new("/j");
        assert_eq!(p.id_from_status_path("/j/job_17.status\n"), Some("job_17".into()));
        assert_eq!(p.id_from_status_path("/j/job_17.log"), None);
        assert_eq!(p.id_from_status_path("/j/.status"), None);
    }
}
