//! Job Manager: start, list, log, kill, retry and clean.
//!
//! Every remote interaction goes through the `Remote` it owns, one round
//! trip at a time. Watch, compare/stats, queue and template operations live
//! in sibling modules as further `impl` blocks on the same type.

use tracing::{debug, info, warn};

use crate::error::{JobError, Result};
use crate::infrastructure::runner::{ExecOutput, Remote};
use crate::jobs::artifacts::{Artifact, JobPaths};
use crate::jobs::clock::{Clock, SystemClock};
use crate::jobs::format::{ellipsize, format_duration};
use crate::jobs::gpu::{GpuSnapshot, GPU_QUERY};
use crate::jobs::ids::{base_id, parse_reserved, validate_job_id};
use crate::jobs::records::{parse_list, ListRecord, Probe};
use crate::jobs::scanner::{detect_errors, extract_metrics, format_errors, format_metrics};
use crate::jobs::script;
use crate::jobs::status::JobStatus;
use crate::rig::remote::{in_container, in_container_detached};
use crate::store::cache::{
    CompletedJob, JobCache, JobCacheStore, RunningJob, EXIT_KILLED, EXIT_UNKNOWN, RECENT_CAP,
};
use crate::store::state::StateStore;
use crate::types::config::Settings;

pub const DEFAULT_LIST_LIMIT: usize = 10;
pub const DEFAULT_LOG_LINES: usize = 50;
pub const DEFAULT_CLEAN_HOURS: u64 = 24;
pub const DEFAULT_CLEAN_KEEP: usize = 5;


/// Parameters of `start`.
#[derive(Debug, Clone, Default)]
pub struct StartRequest {
    pub command: String,
    pub name: Option<String>,
    pub container: Option<String>,
    pub workdir: Option<String>,
}

impl StartRequest {
    pub fn new(command: &str) -> Self {
        StartRequest {
            command: command.to_string(),
            ..Default::default()
        }
    }
}


pub struct JobManager<R: Remote> {
    remote: R,
    settings: Settings,
    paths: JobPaths,
    state: StateStore,
    cache: JobCacheStore,
    clock: Box<dyn Clock>,
}

impl<R: Remote> JobManager<R> {
    pub fn new(remote: R, settings: Settings, state: StateStore, cache: JobCacheStore) -> Self {
        let paths = JobPaths::new(&settings.jobs_dir);
        JobManager {
            remote,
            settings,
            paths,
            state,
            cache,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub(crate) fn paths(&self) -> &JobPaths {
        &self.paths
    }

    pub(crate) fn state(&self) -> &StateStore {
        &self.state
    }

    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn cache_store(&self) -> &JobCacheStore {
        &self.cache
    }

    pub(crate) fn container_or(&self, container: Option<&str>) -> String {
        container
            .filter(|c| !c.is_empty())
            .unwrap_or(self.settings.default_container.as_str())
            .to_string()
    }

    // -----------------------------------------------------------------------
    // Remote round trips
    // -----------------------------------------------------------------------

    /// Run `script` inside `container`.
    pub(crate) fn run_in(&self, container: &str, script: &str) -> ExecOutput {
        let out = self.remote.execute(&in_container(container, script));
        debug!(container, code = out.code, "container command");
        out
    }

    /// Like `run_in`, but a non-zero exit is an error.
    pub(crate) fn run_checked(&self, container: &str, script: &str) -> Result<String> {
        let out = self.run_in(container, script);
        if out.success() {
            Ok(out.output)
        } else {
            Err(JobError::Remote {
                code: out.code,
                output: out.trimmed().to_string(),
            })
        }
    }

    /// Current GPU snapshot, if the host reports one.
    pub fn gpu_snapshot(&self) -> Option<GpuSnapshot> {
        let out = self.remote.execute(GPU_QUERY);
        if !out.success() {
            debug!(code = out.code, "gpu query failed");
            return None;
        }
        GpuSnapshot::parse(&out.output)
    }

    pub fn gpu(&self) -> Result<String> {
        self.gpu_snapshot()
            .map(|g| format!("\u{1f5a5}\u{fe0f}  {}", g))
            .ok_or_else(|| JobError::Invalid("GPU stats unavailable (nvidia-smi failed)".into()))
    }

    /// Probe one job's artifacts; a missing log means the job is unknown.
    pub(crate) fn probe(&self, container: &str, id: &str) -> Result<Probe> {
        let out = self.run_in(container, &script::probe_script(&self.paths, id));
        if out.code == script::PROBE_MISSING {
            return Err(JobError::JobNotFound(id.to_string()));
        }
        if !out.success() {
            return Err(JobError::Remote {
                code: out.code,
                output: out.trimmed().to_string(),
            });
        }
        Probe::parse(&out.output).ok_or_else(|| JobError::Remote {
            code: out.code,
            output: format!("unexpected probe output: {}", out.trimmed()),
        })
    }

    /// One-line reminder that a finished job's results live remotely.
    pub(crate) fn sync_tip(&self) -> String {
        let project = self.settings.last_project.as_deref().unwrap_or("<project-name>");
        format!(
            "\u{1f4a1} TIP: Results may need syncing back to local (project: {})\n\n",
            project
        )
    }

    // -----------------------------------------------------------------------
    // Cache
    // -----------------------------------------------------------------------

    /// Load-modify-save of the job cache. Failures are logged, never returned.
    pub(crate) fn update_cache(&self, container: &str, f: impl FnOnce(&mut JobCache)) {
        let now = self.clock.now_rfc3339();
        let mut cache = self
            .cache
            .load()
            .unwrap_or_else(|| JobCache::new(&self.settings.host, container, &now));
        f(&mut cache);
        cache.updated_at = now;
        cache.host = self.settings.host.clone();
        cache.container = container.to_string();
        if let Err(e) = self.cache.save(&cache) {
            warn!(error = %e, "job cache not saved");
        }
    }

    // -----------------------------------------------------------------------
    // start
    // -----------------------------------------------------------------------

    pub fn start(&self, req: StartRequest) -> Result<String> {
        let command = req.command.trim();
        if command.is_empty() {
            return Err(JobError::Invalid("Usage: jobrig job start <command...>".into()));
        }
        let container = self.container_or(req.container.as_deref());
        let workdir = req
            .workdir
            .filter(|w| !w.is_empty())
            .unwrap_or_else(|| self.settings.default_workdir.clone());

        let gpu = self.gpu_snapshot();
        let mut warnings = gpu.as_ref().map(|g| g.warnings()).unwrap_or_default();
        let running = self
            .run_in(&container, &script::running_count_script(&self.paths))
            .trimmed()
            .parse::<usize>()
            .unwrap_or(0);
        if running > 0 {
            warnings.push(format!("{} job(s) already running", running));
        }

        let now = self.clock.now_secs();
        let id = self.reserve_id(&container, now)?;
        let runner = script::runner_script(&self.paths, &id, command, &workdir);
        let out = self.remote.dispatch(&in_container_detached(&container, &runner));
        if !out.success() {
            warn!(job_id = %id, code = out.code, "dispatch failed");
            let status = self.paths.artifact(&id, Artifact::Status);
            self.run_in(&container, &format!("rm -f {}", status));
            let detail = if out.trimmed().is_empty() {
                format!("exit {}", out.code)
            } else {
                out.trimmed().to_string()
            };
            return Err(JobError::Dispatch(detail));
        }
        info!(job_id = %id, container = %container, "job dispatched");

        let job = RunningJob {
            id: id.clone(),
            name: req.name.clone(),
            command: command.to_string(),
            started_at: now,
            workdir: Some(workdir.clone()),
        };
        self.update_cache(&container, |c| c.record_start(job, now));

        let mut text = format!("\u{1f680} Job started: {}\n", id);
        if let Some(name) = &req.name {
            text.push_str(&format!("   Name: {}\n", name));
        }
        text.push_str(&format!("   Command: {}\n", command));
        text.push_str(&format!("   Container: {}\n", container));
        text.push_str(&format!("   Workdir: {}\n", workdir));
        if let Some(g) = &gpu {
            text.push_str(&format!("   {}\n", g));
        }
        if !warnings.is_empty() {
            text.push_str("\n\u{26a0}\u{fe0f}  Warnings:\n");
            for w in &warnings {
                text.push_str(&format!("   - {}\n", w));
            }
        }
        text.push_str(&format!(
            "\nMonitor with: jobrig job watch {id}\n              jobrig job log {id}\n",
            id = id
        ));
        Ok(text)
    }

    /// Claim a fresh id on the remote. Starts in the same second, from this
    /// or any other process, get distinct `_<n>` suffixes.
    fn reserve_id(&self, container: &str, now_secs: u64) -> Result<String> {
        let base = base_id(now_secs);
        let out = self.run_checked(container, &script::reserve_id_script(&self.paths, &base))?;
        let id = parse_reserved(&base, &out).ok_or_else(|| JobError::Remote {
            code: 0,
            output: format!("unexpected id reservation output: {}", out.trim()),
        })?;
        debug!(job_id = %id, "id reserved");
        Ok(id)
    }

    // -----------------------------------------------------------------------
    // list
    // -----------------------------------------------------------------------

    /// Authoritative listing. Replaces the cached running/recent sets.
    pub fn list(&self, container: Option<&str>, limit: usize) -> Result<String> {
        let container = self.container_or(container);
        let limit = if limit == 0 { DEFAULT_LIST_LIMIT } else { limit };
        let out = self.run_checked(&container, &script::list_query(&self.paths, limit))?;
        let records = parse_list(&out);

        let previous = self.cache.load();
        self.update_cache(&container, |c| {
            let (running, recent) = reconcile(&records, previous.as_ref());
            c.running = running;
            c.recent = recent;
        });

        if records.is_empty() {
            return Ok("No jobs found".into());
        }
        let mut text = format!("\u{1f4cb} Jobs in {} ({}):\n", container, records.len());
        for r in &records {
            let status = r.status();
            let name = previous
                .as_ref()
                .and_then(|c| c.name_of(&r.id))
                .map(|n| format!(" ({})", n))
                .unwrap_or_default();
            text.push_str(&format!(
                "{} {}{}  [{}]  {}\n     {}\n",
                status.icon(r.has_errors),
                r.id,
                name,
                status,
                format_duration(r.duration),
                ellipsize(&r.command, script::LIST_COMMAND_BYTES)
            ));
        }
        Ok(text)
    }

    // -----------------------------------------------------------------------
    // log
    // -----------------------------------------------------------------------

    pub fn log(&self, id: &str, container: Option<&str>, lines: usize) -> Result<String> {
        validate_job_id(id)?;
        let container = self.container_or(container);
        let probe = self.probe(&container, id)?;
        let content = self.run_checked(&container, &script::tail_script(&self.paths, id, lines))?;

        let status = probe.status();
        let range = if lines == 0 {
            "full log".to_string()
        } else {
            format!("last {} lines", lines)
        };
        let mut text = format!("\u{1f4c4} {} [{}] ({})\n", id, status, range);
        if let Some(code) = probe.exit_code {
            text.push_str(&format!(
                "   Exit code: {} | Duration: {}\n",
                code,
                format_duration(probe.elapsed())
            ));
        }
        text.push('\n');
        text.push_str(&format_errors(&detect_errors(&content)));
        if probe.is_terminal() {
            text.push_str(&format_metrics(&extract_metrics(&content)));
            text.push_str(&self.sync_tip());
        }
        text.push_str("\u{2500}\u{2500}\u{2500} output \u{2500}\u{2500}\u{2500}\n");
        text.push_str(&content);
        Ok(text)
    }

    // -----------------------------------------------------------------------
    // kill
    // -----------------------------------------------------------------------

    /// Best-effort termination; the signal is not verified.
    pub fn kill(&self, id: &str, container: Option<&str>) -> Result<String> {
        validate_job_id(id)?;
        let container = self.container_or(container);
        let pid_file = self.paths.artifact(id, Artifact::Pid);
        let out = self.run_in(&container, &format!("cat {}", pid_file));
        if !out.success() {
            return Err(JobError::JobNotFound(id.to_string()));
        }
        let pid: u32 = out
            .trimmed()
            .parse()
            .map_err(|_| JobError::Invalid(format!("Job {} has an unreadable pid file", id)))?;

        let signalled = self
            .run_in(&container, &script::kill_script(&self.paths, id, pid))
            .success();
        info!(job_id = %id, pid, signalled, "job killed");

        let now = self.clock.now_secs();
        self.update_cache(&container, |c| {
            c.record_kill(id, now);
        });

        if signalled {
            Ok(format!("\u{1f6d1} Job {} killed (pid {})", id, pid))
        } else {
            Ok(format!(
                "\u{26a0}\u{fe0f}  Job {} may already be finished (pid {} not signalled); status set to killed",
                id, pid
            ))
        }
    }

    // -----------------------------------------------------------------------
    // retry
    // -----------------------------------------------------------------------

    /// Start the same command again. The display name is not carried over.
    pub fn retry(&self, id: &str, container: Option<&str>) -> Result<String> {
        validate_job_id(id)?;
        let container = self.container_or(container);
        let out = self.run_in(&container, &format!("cat {}", self.paths.artifact(id, Artifact::Command)));
        if !out.success() {
            return Err(JobError::JobNotFound(id.to_string()));
        }
        let command = out.trimmed();
        if command.is_empty() || command == "?" {
            return Err(JobError::Invalid(format!(
                "Job {} has no recorded command to retry",
                id
            )));
        }
        let started = self.start(StartRequest {
            command: command.to_string(),
            name: None,
            container: Some(container),
            workdir: None,
        })?;
        Ok(format!("\u{1f501} Retrying {}\n{}", id, started))
    }

    // -----------------------------------------------------------------------
    // clean
    // -----------------------------------------------------------------------

    /// Delete artifacts of jobs started more than `hours` ago, always
    /// keeping the newest `keep`. Per-job failures are counted, not fatal.
    pub fn clean(&self, hours: u64, keep: usize, container: Option<&str>) -> Result<String> {
        let container = self.container_or(container);
        let listing = self.run_checked(
            &container,
            &format!("ls -t {} 2>/dev/null || true", self.paths.status_glob()),
        )?;
        let ids: Vec<String> = listing
            .lines()
            .filter_map(|l| self.paths.id_from_status_path(l))
            .collect();
        if ids.is_empty() {
            return Ok("No jobs to clean".into());
        }

        let now: u64 = self
            .run_checked(&container, "date +%s")?
            .trim()
            .parse()
            .map_err(|_| JobError::Invalid("Remote clock unreadable".into()))?;
        let cutoff = now.saturating_sub(hours.saturating_mul(3600));

        let mut kept = ids.len().min(keep);
        let mut removed = 0usize;
        let mut failed = 0usize;
        for id in ids.iter().skip(keep) {
            let start = self
                .run_in(&container, &format!("cat {}", self.paths.artifact(id, Artifact::Start)))
                .trimmed()
                .parse::<u64>()
                .ok();
            match start {
                Some(s) if s < cutoff => {
                    let rm = self.run_in(&container, &format!("rm -f {}", self.paths.all_artifacts(id)));
                    if rm.success() {
                        removed += 1;
                    } else {
                        warn!(job_id = %id, code = rm.code, "artifact removal failed");
                        failed += 1;
                    }
                }
                _ => kept += 1,
            }
        }
        info!(removed, kept, failed, "clean finished");

        let mut text = format!(
            "\u{1f9f9} Removed {} job(s) older than {}h, kept {}",
            removed, hours, kept
        );
        if failed > 0 {
            text.push_str(&format!(", {} could not be removed", failed));
        }
        Ok(text)
    }
}


/// Cache slots from an authoritative listing. The newest running job takes
/// the running slot; everything else goes to `recent`, newest first.
/// Display names carry over by id.
fn reconcile(
    records: &[ListRecord],
    previous: Option<&JobCache>,
) -> (Option<RunningJob>, Vec<CompletedJob>) {
    let name_of = |id: &str| previous.and_then(|c| c.name_of(id));
    let mut running = None;
    let mut recent = Vec::new();
    for r in records {
        let status = r.status();
        if status == JobStatus::Running && running.is_none() {
            running = Some(RunningJob {
                id: r.id.clone(),
                name: name_of(&r.id),
                command: r.command.clone(),
                started_at: r.start,
                workdir: previous
                    .and_then(|c| c.running.as_ref())
                    .filter(|p| p.id == r.id)
                    .and_then(|p| p.workdir.clone()),
            });
            continue;
        }
        if recent.len() < RECENT_CAP {
            let exit_code = r.exit_code.unwrap_or(match status {
                JobStatus::Killed => EXIT_KILLED,
                _ => EXIT_UNKNOWN,
            });
            recent.push(CompletedJob {
                id: r.id.clone(),
                name: name_of(&r.id),
                command: r.command.clone(),
                status,
                exit_code,
                started_at: r.start,
                duration: r.duration,
                has_errors: r.has_errors,
            });
        }
    }
    (running, recent)
}
