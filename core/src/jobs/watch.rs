//! Incremental log tailing with persisted read offsets.

use tracing::warn;

use crate::error::Result;
use crate::infrastructure::runner::Remote;
use crate::jobs::format::format_duration;
use crate::jobs::ids::validate_job_id;
use crate::jobs::manager::JobManager;
use crate::jobs::scanner::{detect_errors, extract_metrics, format_errors, format_metrics};
use crate::jobs::script;

/// Lines shown the first time a job with output is watched.
pub const BOOTSTRAP_LINES: usize = 20;

impl<R: Remote> JobManager<R> {
    /// Show what a job wrote since the previous watch of it.
    ///
    /// New output is exactly the bytes `[offset, size)`. The offset and
    /// check time are persisted on every call, even with nothing new.
    pub fn watch(&self, id: &str, container: Option<&str>) -> Result<String> {
        validate_job_id(id)?;
        let container = self.container_or(container);
        let probe = self.probe(&container, id)?;
        // Tailing must not depend on the template store being readable.
        let last = match self.state().load() {
            Ok(state) => state.watch_offset(id),
            Err(e) => {
                warn!(job_id = %id, error = %e, "watch state unreadable, starting from 0");
                0
            }
        };
        let status = probe.status();

        let mut text = format!(
            "\u{1f441}\u{fe0f}  {} {} [{}] elapsed {} | log {} bytes\n",
            status.icon(false),
            id,
            status,
            format_duration(probe.elapsed()),
            probe.size
        );

        if probe.is_terminal() {
            if let Some(code) = probe.exit_code {
                text.push_str(&format!("   Exit code: {}\n", code));
            }
            text.push('\n');
            let full = self.run_checked(&container, &script::tail_script(self.paths(), id, 0))?;
            text.push_str(&format_metrics(&extract_metrics(&full)));
            text.push_str(&self.sync_tip());
        } else {
            if let Some(g) = self.gpu_snapshot() {
                text.push_str(&format!("   {}\n", g));
            }
            text.push('\n');
        }

        let shown = if last == 0 && probe.size > 0 {
            let tail = self.run_checked(
                &container,
                &script::tail_script(self.paths(), id, BOOTSTRAP_LINES),
            )?;
            Some((format!("last {} lines", BOOTSTRAP_LINES), tail))
        } else if probe.size > last {
            let len = probe.size - last;
            let chunk = self.run_checked(
                &container,
                &script::byte_range_script(self.paths(), id, last, len),
            )?;
            Some((format!("{} new bytes", len), chunk))
        } else {
            None
        };

        match shown {
            Some((label, content)) => {
                text.push_str(&format_errors(&detect_errors(&content)));
                text.push_str(&format!("\u{2500}\u{2500}\u{2500} {} \u{2500}\u{2500}\u{2500}\n", label));
                text.push_str(&content);
                if !content.ends_with('\n') {
                    text.push('\n');
                }
                text.push_str("\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\u{2500}\n");
            }
            None => text.push_str("(no new output)\n"),
        }

        let checked_at = self.clock().now_rfc3339();
        let size = probe.size;
        if let Err(e) = self
            .state()
            .update(|s| s.record_watch(id, size, &checked_at))
        {
            warn!(job_id = %id, error = %e, "watch offset not saved");
        }
        Ok(text)
    }
}
