//! Terminal Surface
//!
//! Draws `SessionUpdate`s on the terminal. Progress and notices go to
//! stderr so stdout carries only the rendered report. On a terminal the
//! progress line is redrawn in place through crossterm; when stderr is
//! redirected each progress step is written as its own line.
//!
//! The surface holds no audit logic. It only mirrors what the driver tells
//! it, including whether the prompt (the submit control) is enabled.

use std::io::{self, Write};

use auditor_core::progress::DEFAULT_BAR_WIDTH;
use auditor_core::{NotifyLevel, SessionUpdate};
use crossterm::cursor::MoveToColumn;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use crossterm::tty::IsTty;
use tokio::sync::mpsc;

/// Terminal renderer for driver updates
pub struct Surface {
    updates: mpsc::UnboundedReceiver<SessionUpdate>,
    interactive: bool,
    in_place: bool,
    progress_visible: bool,
    submit_enabled: bool,
}

impl Surface {
    /// Create a surface reading from the driver's update channel
    pub fn new(updates: mpsc::UnboundedReceiver<SessionUpdate>, interactive: bool) -> Self {
        Self {
            updates,
            interactive,
            in_place: io::stderr().is_tty(),
            progress_visible: false,
            submit_enabled: true,
        }
    }

    /// Draw every pending update
    ///
    /// Returns whether a report became ready.
    pub fn flush(&mut self) -> bool {
        let mut report_ready = false;
        while let Ok(update) = self.updates.try_recv() {
            report_ready |= self.show(update);
        }
        report_ready
    }

    /// Show the input prompt
    pub fn prompt(&self) {
        if self.interactive && self.submit_enabled {
            eprint!("url [desktop|mobile]> ");
        }
    }

    fn show(&mut self, update: SessionUpdate) -> bool {
        match update {
            SessionUpdate::StateChanged { attempt, state } => {
                tracing::debug!(attempt = %attempt, state = ?state, "Session state changed");
            }
            SessionUpdate::SubmitEnabled(enabled) => {
                self.submit_enabled = enabled;
            }
            SessionUpdate::TransportSelected { attempt, strategy } => {
                tracing::info!(attempt = %attempt, strategy = %strategy, "Audit dispatched");
            }
            SessionUpdate::Progress { display, .. } => {
                if display.regressed {
                    let percent = &display.percent;
                    tracing::debug!(percent = ?percent, "Progress went backwards");
                }
                self.draw_progress(&display.render_bar(DEFAULT_BAR_WIDTH));
            }
            SessionUpdate::ProgressCleared => self.clear_progress(),
            SessionUpdate::ReportReady { .. } => return true,
            SessionUpdate::Notice { level, message } => {
                self.clear_progress();
                match level {
                    NotifyLevel::Info => eprintln!("{message}"),
                    NotifyLevel::Warning => eprintln!("⚠️  {message}"),
                    NotifyLevel::Error => eprintln!("❌ {message}"),
                }
            }
        }
        false
    }

    fn draw_progress(&mut self, line: &str) {
        if !self.in_place {
            eprintln!("{line}");
            return;
        }
        let mut stderr = io::stderr().lock();
        let drawn = queue!(
            stderr,
            MoveToColumn(0),
            Clear(ClearType::CurrentLine),
            Print(line)
        )
        .and_then(|()| stderr.flush());
        match drawn {
            Ok(()) => self.progress_visible = true,
            Err(e) => tracing::debug!(error = %e, "Progress redraw failed"),
        }
    }

    fn clear_progress(&mut self) {
        if !self.progress_visible {
            return;
        }
        self.progress_visible = false;
        let mut stderr = io::stderr().lock();
        let cleared = queue!(stderr, MoveToColumn(0), Clear(ClearType::CurrentLine))
            .and_then(|()| stderr.flush());
        if let Err(e) = cleared {
            tracing::debug!(error = %e, "Progress clear failed");
        }
    }
}
