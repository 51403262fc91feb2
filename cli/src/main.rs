//! jobrig CLI: the command-line entry point for the job engine.
//!
//! # Usage
//!
//! ```text
//! jobrig job start --name sweep -- python train.py --lr 3e-4
//! jobrig job list
//! jobrig queue add python eval.py
//! jobrig dash
//! ```

use std::path::{Path, PathBuf};
use std::process;

use tracing_subscriber::EnvFilter;

use jobrig_core::cli::parse_args;
use jobrig_core::command::Command;
use jobrig_core::help::help_text;
use jobrig_core::response::Response;
use jobrig_core::store::CACHE_FILE;
use jobrig_core::sys::Sys;


fn main() {
    init_logging();

    let args: Vec<String> = std::env::args().collect();
    let arg_refs: Vec<&str> = args[1..].iter().map(|s| s.as_str()).collect();

    let cmd = match parse_args(&arg_refs) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("jobrig: {}", e);
            process::exit(1);
        }
    };

    let config_dir = resolve_config_dir();

    // Neither help nor the dashboard needs a config file or a remote.
    match &cmd {
        Command::Help { topic } => {
            println!("{}", help_text(topic.as_deref()));
            return;
        }
        Command::Dash => {
            run_dashboard(config_dir.join(CACHE_FILE));
            return;
        }
        _ => {}
    }

    match execute(&config_dir, cmd) {
        Response::Ok { output } => {
            if !output.is_empty() {
                println!("{}", output);
            }
        }
        Response::Error { message } => {
            eprintln!("jobrig error: {}", message);
            process::exit(1);
        }
    }
}


/// Log to stderr, filtered by `JOBRIG_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_env("JOBRIG_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}


fn resolve_config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("JOBRIG_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".config").join("jobrig")
}


fn run_dashboard(cache_path: PathBuf) {
    match jobrig_tui::tui::Dashboard::new(cache_path) {
        Ok(mut dash) => {
            if let Err(e) = dash.run() {
                eprintln!("jobrig dash: {}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("jobrig dash: failed to start: {}", e);
            process::exit(1);
        }
    }
}


fn execute(config_dir: &Path, cmd: Command) -> Response {
    match Sys::new(config_dir) {
        Ok(mut sys) => sys.execute(cmd),
        Err(e) => Response::Error {
            message: format!("Failed to initialize: {}", e),
        },
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_config_dir_default_and_env() {
        let old = std::env::var("JOBRIG_CONFIG_DIR").ok();

        std::env::remove_var("JOBRIG_CONFIG_DIR");
        assert!(resolve_config_dir().to_string_lossy().ends_with(".config/jobrig"));

        std::env::set_var("JOBRIG_CONFIG_DIR", "/tmp/test-jobrig-config");
        assert_eq!(resolve_config_dir(), PathBuf::from("/tmp/test-jobrig-config"));

        match old {
            Some(v) => std::env::set_var("JOBRIG_CONFIG_DIR", v),
            None => std::env::remove_var("JOBRIG_CONFIG_DIR"),
        }
    }

    #[test]
    fn execute_without_config_reports_init_failure() {
        let dir = tempfile::tempdir().unwrap();
        let resp = execute(dir.path(), Command::Gpu);
        match resp {
            Response::Error { message } => assert!(message.starts_with("Failed to initialize")),
            Response::Ok { output } => panic!("unexpected output: {}", output),
        }
    }
}
