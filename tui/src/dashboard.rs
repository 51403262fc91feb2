//! Dashboard view: renders the job cache using ratatui widgets.

use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table};

use jobrig_core::jobs::format::{ellipsize, format_duration};
use jobrig_core::jobs::status::JobStatus;
use jobrig_core::store::cache::{CompletedJob, JobCache, RunningJob};


/// Render the dashboard: running job panel, recent table, summary line.
pub fn render_dashboard(frame: &mut Frame, area: Rect, cache: Option<&JobCache>, now_secs: u64) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // running job
            Constraint::Min(5),    // recent table
            Constraint::Length(1), // summary
        ])
        .split(area);

    let Some(cache) = cache else {
        let text = "No job cache yet. Run 'jobrig job list' to populate it.";
        frame.render_widget(
            Paragraph::new(text).block(Block::default().borders(Borders::ALL).title("Jobs")),
            area,
        );
        return;
    };

    render_running(frame, chunks[0], cache.running.as_ref(), now_secs);
    render_recent(frame, chunks[1], &cache.recent);
    frame.render_widget(Paragraph::new(summary_line(cache)), chunks[2]);
}


fn render_running(frame: &mut Frame, area: Rect, running: Option<&RunningJob>, now_secs: u64) {
    let lines = match running {
        Some(job) => vec![
            Line::from(vec![
                Span::styled(job.id.clone(), Style::default().bold()),
                Span::raw(job.name.as_ref().map(|n| format!(" ({})", n)).unwrap_or_default()),
                Span::raw(format!("  {}", elapsed_text(job.started_at, now_secs))),
            ]),
            Line::from(job.command.clone()),
        ],
        None => vec![Line::from(Span::styled(
            "No job running",
            Style::default().fg(Color::DarkGray),
        ))],
    };
    frame.render_widget(
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Running")),
        area,
    );
}


fn render_recent(frame: &mut Frame, area: Rect, recent: &[CompletedJob]) {
    let header = Row::new(vec!["St", "Job", "Name", "Exit", "Time", "Command"])
        .style(Style::default().bold());

    let rows: Vec<Row> = recent
        .iter()
        .map(|job| {
            Row::new(vec![
                Cell::from(job.status.icon(job.has_errors)),
                Cell::from(job.id.clone()),
                Cell::from(job.name.clone().unwrap_or_default()),
                Cell::from(job.exit_code.to_string()),
                Cell::from(format_duration(job.duration)),
                Cell::from(ellipsize(&job.command, 60)),
            ])
            .style(status_style(job.status))
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),  // status
            Constraint::Length(18), // id
            Constraint::Length(12), // name
            Constraint::Length(5),  // exit
            Constraint::Length(8),  // duration
            Constraint::Fill(1),    // command
        ],
    )
    .header(header)
    .block(Block::default().borders(Borders::ALL).title("Recent"));

    frame.render_widget(table, area);
}


fn status_style(status: JobStatus) -> Style {
    match status {
        JobStatus::Failed => Style::default().fg(Color::Red),
        JobStatus::Killed | JobStatus::Stale => Style::default().fg(Color::Yellow),
        JobStatus::Unknown => Style::default().fg(Color::DarkGray),
        _ => Style::default(),
    }
}


/// `running 3m 12s`; a start in the future shows as `0s`.
fn elapsed_text(started_at: u64, now_secs: u64) -> String {
    format!("running {}", format_duration(now_secs.saturating_sub(started_at) as i64))
}


/// Counts by outcome plus where the cache came from.
fn summary_line(cache: &JobCache) -> String {
    let count = |s: JobStatus| cache.recent.iter().filter(|j| j.status == s).count();
    format!(
        "\u{2705} {}  \u{274c} {}  \u{26d4} {}  | {}:{} | updated {}",
        count(JobStatus::Completed),
        count(JobStatus::Failed),
        count(JobStatus::Killed),
        cache.host,
        cache.container,
        cache.updated_at
    )
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;

    fn done(id: &str, status: JobStatus, exit_code: i32) -> CompletedJob {
        CompletedJob {
            id: id.into(),
            name: None,
            command: "python a.py".into(),
            status,
            exit_code,
            started_at: 100,
            duration: 60,
            has_errors: false,
        }
    }

    fn cache() -> JobCache {
        let mut c = JobCache::new("dgx", "twinprime", "2024-01-01T00:00:00+00:00");
        c.recent = vec![
            done("job_3", JobStatus::Failed, 1),
            done("job_2", JobStatus::Completed, 0),
            done("job_1", JobStatus::Completed, 0),
        ];
        c
    }

    #[test]
    fn summary_counts_outcomes() {
        assert_eq!(
            summary_line(&cache()),
            "\u{2705} 2  \u{274c} 1  \u{26d4} 0  | dgx:twinprime | updated 2024-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn elapsed_never_negative() {
        assert_eq!(elapsed_text(100, 292), "running 3m 12s");
        assert_eq!(elapsed_text(500, 100), "running 0s");
    }

    #[test]
    fn failed_rows_are_red() {
        assert_eq!(status_style(JobStatus::Failed).fg, Some(Color::Red));
        assert_eq!(status_style(JobStatus::Killed).fg, Some(Color::Yellow));
        assert_eq!(status_style(JobStatus::Completed).fg, None);
    }

    fn rendered(cache: Option<&JobCache>) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 16)).unwrap();
        terminal
            .draw(|f| render_dashboard(f, f.area(), cache, 200))
            .unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn renders_running_and_recent() {
        let mut c = cache();
        c.running = Some(RunningJob {
            id: "job_4".into(),
            name: Some("sweep".into()),
            command: "python sweep.py".into(),
            started_at: 140,
            workdir: None,
        });
        let screen = rendered(Some(&c));
        assert!(screen.contains("job_4 (sweep)  running 1m 0s"));
        assert!(screen.contains("job_3"));
        assert!(screen.contains("dgx:twinprime"));
    }

    #[test]
    fn renders_placeholder_without_cache() {
        assert!(rendered(None).contains("No job cache yet"));
    }
}
