//! Remote host coordinates and SSH argument building.
//!
//! `RemoteConfig` describes the single compute host: SSH coordinates plus
//! the multiplexing options that let consecutive round trips reuse one
//! authenticated connection. A dead master socket is transparently replaced
//! by ssh itself (`ControlMaster=auto`), so reuse never surfaces as an error.

use serde::{Deserialize, Serialize};

use crate::types::config::Settings;


/// Configuration for the compute host.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteConfig {
    /// Hostname or IP address.
    pub host: String,
    /// SSH port.
    pub port: u16,
    /// SSH user; `None` leaves it to ssh_config.
    pub user: Option<String>,
    /// Path to an SSH private key, if not using the default.
    pub ssh_key: Option<String>,
    /// Connection-establishment timeout in seconds.
    pub connect_timeout_secs: u32,
    /// Seconds the master connection persists after the last client.
    pub control_persist_secs: u32,
    /// ssh `ControlPath` template for the shared master socket.
    pub control_path: String,
}

impl RemoteConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        RemoteConfig {
            host: settings.host.clone(),
            port: settings.port,
            user: settings.user.clone(),
            ssh_key: settings.ssh_key.clone(),
            connect_timeout_secs: settings.connect_timeout_secs,
            control_persist_secs: settings.control_persist_secs,
            control_path: default_control_path(),
        }
    }

    /// `user@host`, or just `host` when no user is configured.
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    /// Base SSH arguments (options, key, destination) without a command.
    pub fn ssh_base_args(&self) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.port.to_string(),
            "-o".to_string(),
            "ControlMaster=auto".to_string(),
            "-o".to_string(),
            format!("ControlPersist={}", self.control_persist_secs),
            "-o".to_string(),
            format!("ControlPath={}", self.control_path),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ];
        if let Some(ref key) = self.ssh_key {
            args.push("-i".to_string());
            args.push(key.clone());
        }
        args.push(self.destination());
        args
    }
}

/// `~/.ssh/jobrig-control-%r@%h:%p`, falling back to `/tmp` without HOME.
pub fn default_control_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    format!("{}/.ssh/jobrig-control-%r@%h:%p", home)
}
