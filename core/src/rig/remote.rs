//! SSH execution against the compute host and its containers.
//!
//! `SshRemote` implements both `Executor` and `Dispatcher` over one
//! multiplexed ssh connection. The free functions build the strings that
//! target a container (`docker exec`), quoting every embedded value for a
//! POSIX shell.

use tracing::debug;

use crate::infrastructure::runner::{run_program, Dispatcher, ExecOutput, Executor};
use crate::rig::config::RemoteConfig;


// ---------------------------------------------------------------------------
// Quoting and container targeting
// ---------------------------------------------------------------------------

/// Quote `s` as a single POSIX shell word.
pub fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// `docker exec <container> bash -c '<script>'`
pub fn in_container(container: &str, script: &str) -> String {
    format!("docker exec {} bash -c {}", sh_quote(container), sh_quote(script))
}

/// `docker exec -d <container> bash -c '<script>'` for detached launches.
pub fn in_container_detached(container: &str, script: &str) -> String {
    format!("docker exec -d {} bash -c {}", sh_quote(container), sh_quote(script))
}

/// `docker exec <container> <argv...>` without a shell, for commands whose
/// own argv must not contain the searched-for text (see `pgrep -f`).
pub fn in_container_argv(container: &str, argv: &[&str]) -> String {
    let mut cmd = format!("docker exec {}", sh_quote(container));
    for arg in argv {
        cmd.push(' ');
        cmd.push_str(&sh_quote(arg));
    }
    cmd
}


// ---------------------------------------------------------------------------
// SshRemote
// ---------------------------------------------------------------------------

/// Executor and dispatcher for the configured compute host.
#[derive(Debug, Clone)]
pub struct SshRemote {
    config: RemoteConfig,
}

impl SshRemote {
    pub fn new(config: RemoteConfig) -> Self {
        SshRemote { config }
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Full ssh argv for `command`; the remote login shell interprets it.
    pub fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = self.config.ssh_base_args();
        args.push(command.to_string());
        args
    }
}

impl Executor for SshRemote {
    fn execute(&self, command: &str) -> ExecOutput {
        debug!(host = %self.config.host, command, "ssh");
        let out = run_program("ssh", &self.ssh_args(command));
        debug!(code = out.code, bytes = out.output.len(), "ssh done");
        out
    }
}

impl Dispatcher for SshRemote {
    /// Launch must already be detached on the remote side (`docker exec -d`
    /// or `nohup ... &`); ssh returns as soon as the launcher exits.
    fn dispatch(&self, command: &str) -> ExecOutput {
        debug!(host = %self.config.host, command, "ssh dispatch");
        run_program("ssh", &self.ssh_args(command))
    }
}
