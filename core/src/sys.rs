use std::path::Path;

use tracing::debug;

use crate::command::Command;
use crate::data::settings::{self, SETTINGS_FILE};
use crate::error::{JobError, Result};
use crate::infrastructure::runner::Remote;
use crate::jobs::analysis::DEFAULT_STATS_SAMPLE;
use crate::jobs::manager::{
    JobManager, StartRequest, DEFAULT_CLEAN_HOURS, DEFAULT_CLEAN_KEEP, DEFAULT_LIST_LIMIT,
    DEFAULT_LOG_LINES,
};
use crate::jobs::queue::QueueSource;
use crate::response::Response;
use crate::rig::config::RemoteConfig;
use crate::rig::remote::SshRemote;
use crate::store::cache::JobCacheStore;
use crate::store::state::StateStore;
use crate::store::{CACHE_FILE, STATE_FILE};


/// Runtime for one jobrig invocation. Owns the Job Manager and dispatches
/// commands to it.
pub struct Sys<R: Remote = Box<dyn Remote>> {
    jobs: JobManager<R>,
}


impl Sys {
    /// Load `config.yaml` from `config_dir` and connect over ssh. Local
    /// documents live next to the config file.
    pub fn new(config_dir: &Path) -> Result<Sys> {
        let settings = settings::load(&config_dir.join(SETTINGS_FILE))?;
        let remote: Box<dyn Remote> = Box::new(SshRemote::new(RemoteConfig::from_settings(&settings)));
        let jobs = JobManager::new(
            remote,
            settings,
            StateStore::new(config_dir.join(STATE_FILE)),
            JobCacheStore::new(config_dir.join(CACHE_FILE)),
        );
        Ok(Sys { jobs })
    }
}


impl<R: Remote> Sys<R> {
    /// Wrap a pre-built manager. Useful for testing.
    pub fn from_manager(jobs: JobManager<R>) -> Sys<R> {
        Sys { jobs }
    }

    pub fn jobs(&self) -> &JobManager<R> {
        &self.jobs
    }

    /// The single dispatch method. Every command enters here.
    pub fn execute(&mut self, cmd: Command) -> Response {
        debug!(?cmd, "execute");
        self.dispatch(cmd).into()
    }

    fn dispatch(&mut self, cmd: Command) -> Result<String> {
        let jobs = &self.jobs;
        match cmd {
            Command::JobStart { cmd, name, container, workdir } => jobs.start(StartRequest {
                command: cmd,
                name,
                container,
                workdir,
            }),
            Command::JobList { container, limit } => {
                jobs.list(container.as_deref(), limit.unwrap_or(DEFAULT_LIST_LIMIT))
            }
            Command::JobLog { id, container, lines } => {
                jobs.log(&id, container.as_deref(), lines.unwrap_or(DEFAULT_LOG_LINES))
            }
            Command::JobKill { id, container } => jobs.kill(&id, container.as_deref()),
            Command::JobRetry { id, container } => jobs.retry(&id, container.as_deref()),
            Command::JobClean { hours, keep, container } => jobs.clean(
                hours.unwrap_or(DEFAULT_CLEAN_HOURS),
                keep.unwrap_or(DEFAULT_CLEAN_KEEP),
                container.as_deref(),
            ),
            Command::JobWatch { id, container } => jobs.watch(&id, container.as_deref()),
            Command::JobCompare { a, b, container } => jobs.compare(&a, &b, container.as_deref()),
            Command::JobStats { container, count } => {
                jobs.stats(container.as_deref(), count.unwrap_or(DEFAULT_STATS_SAMPLE))
            }
            Command::QueueAdd { cmd, template, workdir, container } => {
                let source = match (cmd, template) {
                    (Some(c), None) => QueueSource::Command(c),
                    (None, Some(t)) => QueueSource::Template(t),
                    _ => {
                        return Err(JobError::Invalid(
                            "queue.add needs exactly one of cmd or template".into(),
                        ))
                    }
                };
                jobs.queue_add(source, workdir.as_deref(), container.as_deref())
            }
            Command::QueueList { container } => jobs.queue_list(container.as_deref()),
            Command::QueueClear { container } => jobs.queue_clear(container.as_deref()),
            Command::QueueStart { container } => jobs.queue_start(container.as_deref()),
            Command::TemplateSave { name, cmd, description, project } => {
                jobs.template_save(&name, &cmd, description.as_deref(), project.as_deref())
            }
            Command::TemplateList => jobs.template_list(),
            Command::TemplateDelete { name } => jobs.template_delete(&name),
            Command::TemplateRun { name, container, workdir } => {
                jobs.template_run(&name, container.as_deref(), workdir.as_deref())
            }
            Command::Gpu => jobs.gpu(),
            Command::Dash => Err(JobError::Invalid(
                "dash runs in the terminal; use `jobrig dash`".into(),
            )),
            Command::Help { topic } => Ok(crate::help::help_text(topic.as_deref())),
        }
    }
}
