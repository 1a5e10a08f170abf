//! Audit Session
//!
//! Pure state machine for the lifecycle of one audit attempt at a time.
//!
//! # States
//!
//! ```text
//!            begin                 mark_running / on_progress
//!   Idle ───────────▶ Starting ─────────────────────────────▶ Running
//!                        │                                      │
//!                        └──────────────┬───────────────────────┘
//!                  on_terminal(Ok) ─────┼───── on_terminal(Err) ── on_timeout
//!                        ▼              ▼                  ▼
//!                    Succeeded        Failed            TimedOut
//!                        └──────────────┴─── begin ────────┘──▶ Starting
//! ```
//!
//! # Resolution Guard
//!
//! Each accepted [`AuditSession::begin`] opens a new attempt with a fresh
//! [`AttemptId`]. Once the attempt resolves (terminal event or timeout) it is
//! marked resolved, and every later input for it is ignored. Inputs tagged
//! with an older attempt are ignored too. This is what makes a late terminal
//! after a timeout, a timer firing after a terminal, and a duplicated
//! terminal all no-ops, regardless of whether timer cancellation succeeded.
//!
//! The stored report is present if and only if the state is `Succeeded`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::AuditError;
use crate::events::ProgressEvent;
use crate::report::AuditReport;
use crate::request::{AuditMode, AuditRequest};

/// Default absolute budget for one attempt
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Identifier of one audit attempt within the process
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttemptId(pub u64);

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Session state
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// No attempt has been made yet
    #[default]
    Idle,
    /// Submitted; transport not yet confirmed
    Starting,
    /// Transport confirmed; awaiting progress or a terminal event
    Running,
    /// Report received and stored
    Succeeded,
    /// Transport or remote failure
    Failed,
    /// No terminal event within the budget
    TimedOut,
}

impl SessionState {
    /// Whether an attempt is in flight
    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Starting | Self::Running)
    }
}

/// Handed back by [`AuditSession::begin`] for an accepted submission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptTicket {
    /// The new attempt
    pub attempt: AttemptId,
    /// The validated request to send
    pub request: AuditRequest,
}

/// How an attempt ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Report stored
    Succeeded,
    /// Terminal error received
    Failed(AuditError),
    /// Budget exhausted first
    TimedOut,
}

#[derive(Debug)]
struct ActiveAttempt {
    id: AttemptId,
    request: AuditRequest,
    resolved: bool,
    started_at: Instant,
}

/// The audit session
#[derive(Debug)]
pub struct AuditSession {
    state: SessionState,
    attempt: Option<ActiveAttempt>,
    next_attempt: u64,
    last_progress: Option<ProgressEvent>,
    last_error: Option<AuditError>,
    report: Option<AuditReport>,
    timeout: Duration,
}

impl Default for AuditSession {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl AuditSession {
    /// Create an idle session with the given attempt budget
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: SessionState::Idle,
            attempt: None,
            next_attempt: 1,
            last_progress: None,
            last_error: None,
            report: None,
            timeout,
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether a new submission would be accepted
    #[must_use]
    pub fn can_start(&self) -> bool {
        !self.state.is_in_flight()
    }

    /// Absolute budget applied to each attempt
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Most recent attempt, resolved or not
    #[must_use]
    pub fn current_attempt(&self) -> Option<AttemptId> {
        self.attempt.as_ref().map(|a| a.id)
    }

    /// Request of the most recent attempt
    #[must_use]
    pub fn current_request(&self) -> Option<&AuditRequest> {
        self.attempt.as_ref().map(|a| &a.request)
    }

    /// Latest progress of the in-flight attempt
    #[must_use]
    pub fn last_progress(&self) -> Option<&ProgressEvent> {
        self.last_progress.as_ref()
    }

    /// Error that ended the most recent attempt
    #[must_use]
    pub fn last_error(&self) -> Option<&AuditError> {
        self.last_error.as_ref()
    }

    /// Stored report; present only in `Succeeded`
    #[must_use]
    pub fn report(&self) -> Option<&AuditReport> {
        self.report.as_ref()
    }

    /// Accept a submission and open a new attempt
    ///
    /// A full reset happens here: any stored report, progress and error from
    /// the previous attempt are cleared.
    ///
    /// # Errors
    ///
    /// - [`AuditError::Busy`] while an attempt is in flight
    /// - [`AuditError::Validation`] for an empty URL
    ///
    /// In both cases the session is left untouched.
    pub fn begin(&mut self, url: &str, mode: AuditMode) -> Result<AttemptTicket, AuditError> {
        if !self.can_start() {
            return Err(AuditError::Busy);
        }
        let request = AuditRequest::new(url, mode)?;

        let id = AttemptId(self.next_attempt);
        self.next_attempt += 1;

        self.report = None;
        self.last_progress = None;
        self.last_error = None;
        self.state = SessionState::Starting;
        self.attempt = Some(ActiveAttempt {
            id,
            request: request.clone(),
            resolved: false,
            started_at: Instant::now(),
        });

        Ok(AttemptTicket {
            attempt: id,
            request,
        })
    }

    /// Transport confirmed the attempt (handshake done or request dispatched)
    ///
    /// Returns whether the input was applied.
    pub fn mark_running(&mut self, attempt: AttemptId) -> bool {
        if self.live_attempt(attempt).is_none() {
            return false;
        }
        self.state = SessionState::Running;
        true
    }

    /// Record progress for the attempt
    ///
    /// The timeout is not re-armed; the budget is absolute. Returns whether
    /// the input was applied.
    pub fn on_progress(&mut self, attempt: AttemptId, event: ProgressEvent) -> bool {
        if self.live_attempt(attempt).is_none() {
            return false;
        }
        self.state = SessionState::Running;
        self.last_progress = Some(event);
        true
    }

    /// Apply the terminal event for the attempt
    ///
    /// Returns `None` when the input is stale (other attempt, or this attempt
    /// already resolved).
    pub fn on_terminal(
        &mut self,
        attempt: AttemptId,
        result: Result<AuditReport, AuditError>,
    ) -> Option<AttemptOutcome> {
        let active = self.live_attempt(attempt)?;
        active.resolved = true;
        let elapsed = active.started_at.elapsed();

        match result {
            Ok(report) => {
                tracing::info!(attempt = %attempt, elapsed_ms = elapsed.as_millis(), "Audit succeeded");
                self.report = Some(report);
                self.state = SessionState::Succeeded;
                Some(AttemptOutcome::Succeeded)
            }
            Err(error) => {
                tracing::warn!(attempt = %attempt, error = %error, "Audit failed");
                self.last_progress = None;
                self.last_error = Some(error.clone());
                self.state = SessionState::Failed;
                Some(AttemptOutcome::Failed(error))
            }
        }
    }

    /// Apply a timer expiry for the attempt
    ///
    /// Returns `None` when the input is stale.
    pub fn on_timeout(&mut self, attempt: AttemptId) -> Option<AttemptOutcome> {
        let timeout = self.timeout;
        let active = self.live_attempt(attempt)?;
        active.resolved = true;

        tracing::warn!(attempt = %attempt, timeout_ms = timeout.as_millis(), "Audit timed out");
        self.last_progress = None;
        self.last_error = Some(AuditError::Timeout(timeout));
        self.state = SessionState::TimedOut;
        Some(AttemptOutcome::TimedOut)
    }

    /// The attempt, if it is the current one and still unresolved
    fn live_attempt(&mut self, attempt: AttemptId) -> Option<&mut ActiveAttempt> {
        let active = self.attempt.as_mut().filter(|a| a.id == attempt);
        match active {
            Some(active) if !active.resolved => Some(active),
            _ => {
                tracing::debug!(attempt = %attempt, "Ignoring input for inactive attempt");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report() -> AuditReport {
        serde_json::from_value(json!({"overall": {"score": 82}})).unwrap()
    }

    #[test]
    fn test_begin_moves_idle_to_starting_once() {
        let mut session = AuditSession::default();
        assert_eq!(session.state(), SessionState::Idle);

        let ticket = session.begin("example.com", AuditMode::Desktop).unwrap();
        assert_eq!(ticket.attempt, AttemptId(1));
        assert_eq!(session.state(), SessionState::Starting);
        assert!(!session.can_start());

        assert_eq!(
            session.begin("example.com", AuditMode::Desktop),
            Err(AuditError::Busy)
        );
        assert_eq!(session.current_attempt(), Some(AttemptId(1)));
    }

    #[test]
    fn test_blank_url_leaves_session_idle() {
        let mut session = AuditSession::default();
        let result = session.begin("   ", AuditMode::Mobile);
        assert!(matches!(result, Err(AuditError::Validation(_))));
        assert_eq!(session.state(), SessionState::Idle);
        assert_eq!(session.current_attempt(), None);
    }

    #[test]
    fn test_progress_then_success_stores_report() {
        let mut session = AuditSession::default();
        let id = session.begin("example.com", AuditMode::Desktop).unwrap().attempt;

        assert!(session.mark_running(id));
        assert!(session.on_progress(id, ProgressEvent::new(30, "Scanning pages")));
        assert_eq!(session.last_progress().unwrap().percent, 30);

        let outcome = session.on_terminal(id, Ok(report()));
        assert_eq!(outcome, Some(AttemptOutcome::Succeeded));
        assert_eq!(session.state(), SessionState::Succeeded);
        assert!(session.report().is_some());
        assert!(session.can_start());
    }

    #[test]
    fn test_failure_clears_progress_and_keeps_no_report() {
        let mut session = AuditSession::default();
        let id = session.begin("example.com", AuditMode::Desktop).unwrap().attempt;
        session.on_progress(id, ProgressEvent::new(60, "Analyzing"));

        let err = AuditError::RemoteFailure("Failed to fetch URL".into());
        let outcome = session.on_terminal(id, Err(err.clone()));
        assert_eq!(outcome, Some(AttemptOutcome::Failed(err.clone())));
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.last_progress().is_none());
        assert!(session.report().is_none());
        assert_eq!(session.last_error(), Some(&err));
    }

    #[test]
    fn test_late_terminal_after_timeout_is_ignored() {
        let mut session = AuditSession::new(Duration::from_millis(500));
        let id = session.begin("example.com", AuditMode::Desktop).unwrap().attempt;

        assert_eq!(session.on_timeout(id), Some(AttemptOutcome::TimedOut));
        assert_eq!(session.on_terminal(id, Ok(report())), None);
        assert!(!session.on_progress(id, ProgressEvent::new(90, "late")));

        assert_eq!(session.state(), SessionState::TimedOut);
        assert!(session.report().is_none());
        assert_eq!(
            session.last_error(),
            Some(&AuditError::Timeout(Duration::from_millis(500)))
        );
    }

    #[test]
    fn test_timer_after_terminal_is_ignored() {
        let mut session = AuditSession::default();
        let id = session.begin("example.com", AuditMode::Desktop).unwrap().attempt;
        session.on_terminal(id, Ok(report()));

        assert_eq!(session.on_timeout(id), None);
        assert_eq!(session.state(), SessionState::Succeeded);
        assert!(session.report().is_some());
    }

    #[test]
    fn test_double_terminal_is_idempotent() {
        let mut session = AuditSession::default();
        let id = session.begin("example.com", AuditMode::Desktop).unwrap().attempt;
        session.on_terminal(id, Ok(report()));

        let second = session.on_terminal(id, Err(AuditError::RemoteFailure("dup".into())));
        assert_eq!(second, None);
        assert_eq!(session.state(), SessionState::Succeeded);
        assert!(session.last_error().is_none());
    }

    #[test]
    fn test_inputs_for_previous_attempt_are_ignored() {
        let mut session = AuditSession::default();
        let first = session.begin("a.example", AuditMode::Desktop).unwrap().attempt;
        session.on_timeout(first);

        let second = session.begin("b.example", AuditMode::Desktop).unwrap().attempt;
        assert_ne!(first, second);
        assert!(!session.on_progress(first, ProgressEvent::new(10, "stale")));
        assert_eq!(session.on_terminal(first, Ok(report())), None);
        assert_eq!(session.state(), SessionState::Starting);
    }

    #[test]
    fn test_restart_resets_report() {
        let mut session = AuditSession::default();
        let id = session.begin("example.com", AuditMode::Desktop).unwrap().attempt;
        session.on_terminal(id, Ok(report()));
        assert!(session.report().is_some());

        session.begin("example.org", AuditMode::Mobile).unwrap();
        assert!(session.report().is_none());
        assert!(session.last_progress().is_none());
        assert_eq!(session.current_request().unwrap().url(), "example.org");
    }

    #[test]
    fn test_report_present_iff_succeeded() {
        let mut session = AuditSession::default();
        let check = |s: &AuditSession| {
            assert_eq!(s.report().is_some(), s.state() == SessionState::Succeeded);
        };
        check(&session);
        let id = session.begin("example.com", AuditMode::Desktop).unwrap().attempt;
        check(&session);
        session.on_progress(id, ProgressEvent::new(50, "half"));
        check(&session);
        session.on_terminal(id, Ok(report()));
        check(&session);
        let id = session.begin("example.com", AuditMode::Desktop).unwrap().attempt;
        check(&session);
        session.on_terminal(id, Err(AuditError::TransportFailure("reset".into())));
        check(&session);
    }
}
