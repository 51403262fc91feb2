//! Engine error type.
//!
//! Not-found conditions and transport failures are ordinary values here;
//! `Sys::execute` turns every variant into a plain `Response::Error` message.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum JobError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Template '{0}' not found")]
    TemplateNotFound(String),

    #[error("Remote command failed (exit {code}): {output}")]
    Remote { code: i32, output: String },

    #[error("Failed to start job: {0}")]
    Dispatch(String),

    #[error("State file {path}: {reason}")]
    State { path: String, reason: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("{0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, JobError>;

impl JobError {
    pub fn state(path: &std::path::Path, reason: impl std::fmt::Display) -> Self {
        JobError::State {
            path: path.display().to_string(),
            reason: reason.to_string(),
        }
    }

    /// True for the "referenced thing is absent" family of errors.
    pub fn is_not_found(&self) -> bool {
        matches!(self, JobError::JobNotFound(_) | JobError::TemplateNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_messages_are_plain() {
        assert_eq!(
            JobError::JobNotFound("job_1".into()).to_string(),
            "Job not found: job_1"
        );
        assert_eq!(
            JobError::TemplateNotFound("sweep".into()).to_string(),
            "Template 'sweep' not found"
        );
    }

    #[test]
    fn is_not_found_classifies_variants() {
        assert!(JobError::JobNotFound("x".into()).is_not_found());
        assert!(JobError::TemplateNotFound("x".into()).is_not_found());
        assert!(!JobError::Invalid("x".into()).is_not_found());
        assert!(!JobError::Remote { code: 255, output: "unreachable".into() }.is_not_found());
    }

    #[test]
    fn state_error_carries_path() {
        let err = JobError::state(std::path::Path::new("/tmp/state.json"), "bad json");
        assert_eq!(err.to_string(), "State file /tmp/state.json: bad json");
    }
}
