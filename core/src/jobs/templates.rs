//! Named command presets kept in local state.

use tracing::info;

use crate::error::{JobError, Result};
use crate::infrastructure::runner::Remote;
use crate::jobs::format::ellipsize;
use crate::jobs::manager::{JobManager, StartRequest};
use crate::store::state::Template;

const LIST_COMMAND_CHARS: usize = 60;

fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.chars().any(|c| c.is_whitespace() || c == '/') {
        return Err(JobError::Invalid(format!("Invalid template name: '{}'", name)));
    }
    Ok(())
}

impl<R: Remote> JobManager<R> {
    pub fn template(&self, name: &str) -> Result<Template> {
        self.state()
            .load()?
            .templates
            .remove(name)
            .ok_or_else(|| JobError::TemplateNotFound(name.to_string()))
    }

    /// Save or overwrite a template.
    pub fn template_save(
        &self,
        name: &str,
        command: &str,
        description: Option<&str>,
        project: Option<&str>,
    ) -> Result<String> {
        validate_name(name)?;
        let command = command.trim();
        if command.is_empty() {
            return Err(JobError::Invalid(
                "Usage: jobrig template save <name> <command...>".into(),
            ));
        }
        let template = Template {
            command: command.to_string(),
            description: description.map(str::to_string),
            project: project.map(str::to_string),
            created_at: self.clock().now_rfc3339(),
        };
        let replaced = self
            .state()
            .update(|s| s.templates.insert(name.to_string(), template).is_some())?;
        info!(template = name, replaced, "template saved");
        Ok(format!("\u{1f4be} Template '{}' saved", name))
    }

    pub fn template_list(&self) -> Result<String> {
        let state = self.state().load()?;
        if state.templates.is_empty() {
            return Ok("No templates saved".into());
        }
        let mut text = format!("\u{1f4dd} Templates ({}):\n", state.templates.len());
        for (name, t) in &state.templates {
            text.push_str(&format!(
                "  {}: {}\n",
                name,
                ellipsize(&t.command, LIST_COMMAND_CHARS)
            ));
            if let Some(d) = &t.description {
                text.push_str(&format!("     {}\n", d));
            }
            if let Some(p) = &t.project {
                text.push_str(&format!("     project: {}\n", p));
            }
        }
        Ok(text)
    }

    pub fn template_delete(&self, name: &str) -> Result<String> {
        let removed = self
            .state()
            .update(|s| s.templates.remove(name).is_some())?;
        if !removed {
            return Err(JobError::TemplateNotFound(name.to_string()));
        }
        Ok(format!("\u{1f5d1}\u{fe0f}  Template '{}' deleted", name))
    }

    /// Start a job from a template; the job is named after it.
    pub fn template_run(
        &self,
        name: &str,
        container: Option<&str>,
        workdir: Option<&str>,
    ) -> Result<String> {
        let template = self.template(name)?;
        let mut text = self.start(StartRequest {
            command: template.command,
            name: Some(name.to_string()),
            container: container.map(str::to_string),
            workdir: workdir.map(str::to_string),
        })?;
        if let Some(project) = &template.project {
            text.push_str(&format!(
                "\u{1f4a1} When finished, sync results for project '{}'\n",
                project
            ));
        }
        Ok(text)
    }
}
