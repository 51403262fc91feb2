//! Loading `Settings` from `config.yaml`.

use std::path::Path;

use crate::error::{JobError, Result};
use crate::types::config::Settings;


/// File name of the settings document inside the config dir.
pub const SETTINGS_FILE: &str = "config.yaml";


/// Load settings from a YAML file. A missing file is an error: the engine
/// cannot reach anything without a host.
pub fn load(path: &Path) -> Result<Settings> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        JobError::Config(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse(&content)
}


/// Parse settings from a YAML string and validate them.
pub fn parse(content: &str) -> Result<Settings> {
    let settings: Settings = serde_yaml::from_str(content)
        .map_err(|e| JobError::Config(format!("invalid config: {}", e)))?;
    validate(&settings)?;
    Ok(settings)
}


/// Save settings as YAML.
pub fn save(path: &Path, settings: &Settings) -> Result<()> {
    let content = serde_yaml::to_string(settings)
        .map_err(|e| JobError::Config(format!("cannot serialize config: {}", e)))?;
    std::fs::write(path, content)
        .map_err(|e| JobError::Config(format!("cannot write {}: {}", path.display(), e)))
}


fn validate(settings: &Settings) -> Result<()> {
    if settings.host.trim().is_empty() {
        return Err(JobError::Config("host must not be empty".into()));
    }
    if !settings.jobs_dir.starts_with('/') {
        return Err(JobError::Config(format!(
            "jobs_dir must be absolute, got '{}'",
            settings.jobs_dir
        )));
    }
    if settings.jobs_dir.contains(char::is_whitespace) {
        return Err(JobError::Config("jobs_dir must not contain whitespace".into()));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal() {
        let s = parse("host: spark.local\n").unwrap();
        assert_eq!(s.host, "spark.local");
        assert_eq!(s.default_container, "twinprime");
    }

    #[test]
    fn parse_full() {
        let yaml = r#"
host: gpu-box
user: ops
port: 2222
ssh_key: /home/ops/.ssh/id_ed25519
default_container: trainer
default_workdir: /work
jobs_dir: /work/.jobs
connect_timeout_secs: 3
control_persist_secs: 60
headline_metric: Total runtime
last_project: twinprime
"#;
        let s = parse(yaml).unwrap();
        assert_eq!(s.user.as_deref(), Some("ops"));
        assert_eq!(s.port, 2222);
        assert_eq!(s.default_container, "trainer");
        assert_eq!(s.jobs_dir, "/work/.jobs");
        assert_eq!(s.headline_metric, "Total runtime");
        assert_eq!(s.last_project.as_deref(), Some("twinprime"));
    }

    #[test]
    fn unknown_key_fails_closed() {
        let err = parse("host: a\ncontainer: b\n").unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }

    #[test]
    fn missing_host_fails() {
        assert!(parse("user: ops\n").is_err());
    }

    #[test]
    fn empty_host_fails() {
        assert!(parse("host: \"  \"\n").is_err());
    }

    #[test]
    fn relative_jobs_dir_fails() {
        let err = parse("host: a\njobs_dir: jobs\n").unwrap_err();
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SETTINGS_FILE);
        let mut s = Settings::for_host("spark");
        s.user = Some("me".into());
        save(&path, &s).unwrap();
        assert_eq!(load(&path).unwrap(), s);
    }

    #[test]
    fn load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("nope.yaml")).is_err());
    }
}
