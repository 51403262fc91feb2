//! Dashboard runner: ratatui event loop with terminal setup and cleanup.
//!
//! [`Dashboard`] owns the terminal and re-reads the local job cache once per
//! tick. It never contacts the remote host; `jobrig job list` is what keeps
//! the cache fresh.

use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use ratatui::Terminal;

use jobrig_core::jobs::clock::{Clock, SystemClock};
use jobrig_core::store::cache::{read_cache, JobCache};

use crate::dashboard;


pub struct Dashboard {
    terminal: Terminal<CrosstermBackend<io::Stdout>>,
    cache_path: PathBuf,
    cache: Option<JobCache>,
    clock: SystemClock,
    tick_rate: Duration,
    last_refresh: Instant,
}


impl Dashboard {
    /// Enter raw mode and the alternate screen, then load the cache once.
    pub fn new(cache_path: PathBuf) -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        let cache = read_cache(&cache_path);
        Ok(Self {
            terminal,
            cache_path,
            cache,
            clock: SystemClock,
            tick_rate: Duration::from_secs(1),
            last_refresh: Instant::now(),
        })
    }

    /// Draw until `q`, `Esc` or Ctrl-C.
    pub fn run(&mut self) -> Result<(), io::Error> {
        loop {
            let now = self.clock.now_secs();
            let cache = self.cache.as_ref();
            self.terminal.draw(|frame| render_frame(frame, cache, now))?;

            let timeout = self
                .tick_rate
                .checked_sub(self.last_refresh.elapsed())
                .unwrap_or(Duration::ZERO);

            if event::poll(timeout)? {
                if let Event::Key(key_event) = event::read()? {
                    if is_quit(key_event.code, key_event.modifiers) {
                        break;
                    }
                }
            }

            if self.last_refresh.elapsed() >= self.tick_rate {
                // A cache mid-rewrite reads as missing; keep the last good one.
                if let Some(cache) = read_cache(&self.cache_path) {
                    self.cache = Some(cache);
                }
                self.last_refresh = Instant::now();
            }
        }

        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), io::Error> {
        terminal::disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let _ = execute!(self.terminal.backend_mut(), LeaveAlternateScreen);
    }
}


fn render_frame(frame: &mut Frame, cache: Option<&JobCache>, now_secs: u64) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(frame.area());

    dashboard::render_dashboard(frame, chunks[0], cache, now_secs);

    let hint = Paragraph::new(Span::styled(
        " q: quit   refreshes every second",
        Style::default().fg(Color::DarkGray),
    ));
    frame.render_widget(hint, chunks[1]);
}


fn is_quit(code: KeyCode, modifiers: KeyModifiers) -> bool {
    match code {
        KeyCode::Char('c') => modifiers.contains(KeyModifiers::CONTROL),
        KeyCode::Char('q') | KeyCode::Esc => true,
        _ => false,
    }
}
