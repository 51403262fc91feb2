use serde::{Deserialize, Serialize};

/// Engine settings, loaded from `config.yaml` in the config dir.
///
/// Only `host` is required. Unknown keys are rejected so a typo never
/// silently falls back to a default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// SSH hostname (or IP) of the compute host.
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<String>,
    #[serde(default = "default_container")]
    pub default_container: String,
    #[serde(default = "default_workdir")]
    pub default_workdir: String,
    /// Remote directory holding the per-job sidecar artifacts.
    #[serde(default = "default_jobs_dir")]
    pub jobs_dir: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u32,
    /// How long the multiplexed SSH master lingers after the last use.
    #[serde(default = "default_control_persist")]
    pub control_persist_secs: u32,
    /// Metric called out in compare and aggregated in stats.
    #[serde(default = "default_headline_metric")]
    pub headline_metric: String,
    /// Project name suggested in result-sync reminders.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_project: Option<String>,
}

fn default_port() -> u16 {
    22
}

fn default_container() -> String {
    "twinprime".into()
}

fn default_workdir() -> String {
    "/workspace".into()
}

fn default_jobs_dir() -> String {
    "/workspace/.jobs".into()
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_control_persist() -> u32 {
    300
}

fn default_headline_metric() -> String {
    "Selection bias".into()
}

impl Settings {
    /// Settings for `host` with every optional field at its default.
    pub fn for_host(host: &str) -> Self {
        Settings {
            host: host.to_string(),
            user: None,
            port: default_port(),
            ssh_key: None,
            default_container: default_container(),
            default_workdir: default_workdir(),
            jobs_dir: default_jobs_dir(),
            connect_timeout_secs: default_connect_timeout(),
            control_persist_secs: default_control_persist(),
            headline_metric: default_headline_metric(),
            last_project: None,
        }
    }
}
