//! Audit Driver
//!
//! The single state-machine driver a surface talks to. It owns the
//! [`AuditSession`], the [`TransportSelector`], the [`ProgressPresenter`], the
//! timeout timer and the inbox every input arrives on.
//!
//! # Design Philosophy
//!
//! Transports and the timer run as tasks, but they only *send*
//! [`SessionInput`]s into the inbox. The driver is `&mut self` and is the only
//! thing that mutates the session, so the timeout race is decided by the
//! order inputs are handled in, and the session's resolved guard makes the
//! loser a no-op. Timer cancellation is therefore an optimisation, not a
//! correctness requirement.
//!
//! # Update Protocol
//!
//! For each accepted submission the surface receives, in order:
//!
//! 1. `SubmitEnabled(false)`, `StateChanged(Starting)`
//! 2. `TransportSelected`, `StateChanged(Running)`, and for polling an
//!    indeterminate `Progress`
//! 3. zero or more `Progress`
//! 4. `ProgressCleared`, then `ReportReady` or an error `Notice`, then the
//!    final `StateChanged` and `SubmitEnabled(true)`

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::error::AuditError;
use crate::events::{SessionInput, TransportEvent};
use crate::export::{self, ExportError, ExportFormat, ExportOptions};
use crate::messages::SessionUpdate;
use crate::progress::ProgressPresenter;
use crate::render::{render, RenderedReport};
use crate::report::AuditReport;
use crate::request::AuditMode;
use crate::session::{AttemptId, AttemptOutcome, AuditSession, SessionState};
use crate::transport::{EventStream, TransportSelector, TransportStrategy};

/// Capacity of the driver inbox
const INBOX_CAPACITY: usize = 256;

/// Message shown while a polling request is outstanding
pub const POLLING_MESSAGE: &str = "Audit in progress...";

/// Drives one audit session
pub struct AuditDriver {
    session: AuditSession,
    transport: TransportSelector,
    presenter: ProgressPresenter,
    inbox_tx: mpsc::Sender<SessionInput>,
    inbox_rx: mpsc::Receiver<SessionInput>,
    timer: Option<JoinHandle<()>>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    last_outcome: Option<(AttemptId, AttemptOutcome)>,
}

impl AuditDriver {
    /// Create a driver
    ///
    /// `timeout` is the absolute budget of each attempt. Updates for the
    /// surface are sent on `updates`; a dropped receiver is tolerated.
    #[must_use]
    pub fn new(
        transport: TransportSelector,
        timeout: Duration,
        updates: mpsc::UnboundedSender<SessionUpdate>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(INBOX_CAPACITY);
        Self {
            session: AuditSession::new(timeout),
            transport,
            presenter: ProgressPresenter::new(),
            inbox_tx,
            inbox_rx,
            timer: None,
            updates,
            last_outcome: None,
        }
    }

    /// The session, read-only
    #[must_use]
    pub fn session(&self) -> &AuditSession {
        &self.session
    }

    /// Current session state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Whether the submit control should be enabled
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.session.can_start()
    }

    /// Strategy the next attempt will use
    #[must_use]
    pub fn selection(&self) -> TransportStrategy {
        self.transport.selection()
    }

    /// Stored report of the last successful attempt
    #[must_use]
    pub fn report(&self) -> Option<&AuditReport> {
        self.session.report()
    }

    /// Rendering of the stored report
    #[must_use]
    pub fn rendered(&self) -> Option<RenderedReport> {
        self.session.report().map(render)
    }

    /// How the most recent resolved attempt ended
    #[must_use]
    pub fn last_outcome(&self) -> Option<&(AttemptId, AttemptOutcome)> {
        self.last_outcome.as_ref()
    }

    /// Outcome of `attempt`, once it has resolved
    #[must_use]
    pub fn outcome_of(&self, attempt: AttemptId) -> Option<&AttemptOutcome> {
        self.last_outcome
            .as_ref()
            .filter(|(id, _)| *id == attempt)
            .map(|(_, outcome)| outcome)
    }

    /// Export the stored report
    ///
    /// # Errors
    ///
    /// Returns `ExportError::NoReport` when no report is stored.
    pub fn export(&self, format: ExportFormat, options: &ExportOptions) -> Result<String, ExportError> {
        export::export(self.session.report(), format, options)
    }

    /// Submit an audit
    ///
    /// Opens a new attempt, arms the timer and starts the request on the
    /// selected transport. Returns once the request is handed off; progress
    /// and the outcome arrive through [`Self::next_input`] and
    /// [`Self::handle`].
    ///
    /// # Errors
    ///
    /// - [`AuditError::Busy`] while an attempt is in flight
    /// - [`AuditError::Validation`] for an empty URL
    ///
    /// Neither touches the transport. A transport that cannot start, or a
    /// budget that expires while it is starting, is not an error here: the
    /// attempt is already resolved when this returns, so check
    /// [`Self::outcome_of`] before waiting on [`Self::next_input`].
    pub async fn submit(&mut self, url: &str, mode: AuditMode) -> Result<AttemptId, AuditError> {
        let ticket = match self.session.begin(url, mode) {
            Ok(ticket) => ticket,
            Err(e) => {
                tracing::info!(error = %e, "Submission rejected");
                self.emit(SessionUpdate::warning(e.to_string()));
                return Err(e);
            }
        };
        let attempt = ticket.attempt;

        tracing::info!(
            attempt = %attempt,
            url = %ticket.request.url(),
            mode = %ticket.request.mode(),
            "Audit submitted"
        );

        self.presenter.reset();
        self.emit(SessionUpdate::SubmitEnabled(false));
        self.emit(SessionUpdate::StateChanged {
            attempt,
            state: SessionState::Starting,
        });
        let deadline = Instant::now() + self.session.timeout();
        self.arm_timer(attempt, deadline);

        // The handshake itself counts against the budget
        let started = tokio::select! {
            result = self.transport.start(&ticket.request) => Some(result),
            () = tokio::time::sleep_until(deadline) => None,
        };

        match started {
            None => {
                tracing::warn!(attempt = %attempt, "Budget expired before the transport started");
                self.handle(SessionInput::Timeout { attempt });
            }
            Some(Ok((strategy, events))) => {
                tracing::debug!(attempt = %attempt, strategy = %strategy, "Request handed to transport");
                self.emit(SessionUpdate::TransportSelected { attempt, strategy });

                if self.session.mark_running(attempt) {
                    self.emit(SessionUpdate::StateChanged {
                        attempt,
                        state: SessionState::Running,
                    });
                    if !strategy.reports_progress() {
                        let display = self.presenter.indeterminate(POLLING_MESSAGE);
                        self.emit(SessionUpdate::Progress { attempt, display });
                    }
                }
                self.spawn_forwarder(attempt, events);
            }
            Some(Err(e)) => {
                tracing::warn!(attempt = %attempt, error = %e, "Transport failed to start");
                self.handle(SessionInput::Transport {
                    attempt,
                    event: TransportEvent::transport_failure(e.to_string()),
                });
            }
        }

        Ok(attempt)
    }

    /// Wait for the next input
    pub async fn next_input(&mut self) -> Option<SessionInput> {
        self.inbox_rx.recv().await
    }

    /// Apply one input
    ///
    /// Returns the outcome when the input resolved the current attempt, and
    /// `None` for progress and for stale inputs.
    pub fn handle(&mut self, input: SessionInput) -> Option<AttemptOutcome> {
        match input {
            SessionInput::Transport {
                attempt,
                event: TransportEvent::Progress(progress),
            } => {
                let before = self.session.state();
                if !self.session.on_progress(attempt, progress.clone()) {
                    return None;
                }
                if before != SessionState::Running {
                    self.emit(SessionUpdate::StateChanged {
                        attempt,
                        state: SessionState::Running,
                    });
                }
                if let Some(display) = self.presenter.present(&progress) {
                    if display.regressed {
                        tracing::debug!(attempt = %attempt, percent = progress.percent, "Progress went backwards");
                    }
                    self.emit(SessionUpdate::Progress { attempt, display });
                }
                None
            }

            SessionInput::Transport {
                attempt,
                event: TransportEvent::Terminal(result),
            } => {
                let outcome = self.session.on_terminal(attempt, result)?;
                self.finish(attempt, &outcome);
                Some(outcome)
            }

            SessionInput::Timeout { attempt } => {
                let outcome = self.session.on_timeout(attempt)?;
                self.transport.abandon();
                self.finish(attempt, &outcome);
                Some(outcome)
            }
        }
    }

    /// Submit and drive the attempt to its outcome
    ///
    /// # Errors
    ///
    /// Returns the rejection if the submission is not accepted.
    pub async fn run_attempt(&mut self, url: &str, mode: AuditMode) -> Result<AttemptOutcome, AuditError> {
        let attempt = self.submit(url, mode).await?;
        loop {
            if let Some(outcome) = self.outcome_of(attempt) {
                return Ok(outcome.clone());
            }
            let Some(input) = self.next_input().await else {
                return Err(AuditError::TransportFailure("Session inbox closed".to_string()));
            };
            self.handle(input);
        }
    }

    fn finish(&mut self, attempt: AttemptId, outcome: &AttemptOutcome) {
        self.cancel_timer();
        self.presenter.reset();
        self.emit(SessionUpdate::ProgressCleared);

        match outcome {
            AttemptOutcome::Succeeded => self.emit(SessionUpdate::ReportReady { attempt }),
            AttemptOutcome::Failed(error) => self.emit(SessionUpdate::error(error.to_string())),
            AttemptOutcome::TimedOut => {
                let error = AuditError::Timeout(self.session.timeout());
                self.emit(SessionUpdate::error(error.to_string()));
            }
        }

        self.emit(SessionUpdate::StateChanged {
            attempt,
            state: self.session.state(),
        });
        self.emit(SessionUpdate::SubmitEnabled(true));
        self.last_outcome = Some((attempt, outcome.clone()));
    }

    fn arm_timer(&mut self, attempt: AttemptId, deadline: Instant) {
        self.cancel_timer();
        let inbox = self.inbox_tx.clone();

        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if inbox.send(SessionInput::Timeout { attempt }).await.is_err() {
                tracing::debug!(attempt = %attempt, "Timer fired after driver shut down");
            }
        }));
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }

    /// Tag the attempt's events and feed them into the inbox
    ///
    /// A stream that ends without a terminal event counts as a transport
    /// failure. Forwarders are never aborted; whatever they deliver after the
    /// attempt resolved is dropped by the session guard.
    fn spawn_forwarder(&self, attempt: AttemptId, mut events: EventStream) {
        let inbox = self.inbox_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let terminal = event.is_terminal();
                if inbox.send(SessionInput::Transport { attempt, event }).await.is_err() || terminal {
                    return;
                }
            }
            let closed = SessionInput::Transport {
                attempt,
                event: TransportEvent::transport_failure("Transport closed without a result"),
            };
            if inbox.send(closed).await.is_err() {
                tracing::debug!(attempt = %attempt, "Driver gone before stream closed");
            }
        });
    }

    fn emit(&self, update: SessionUpdate) {
        if self.updates.send(update).is_err() {
            tracing::trace!("Surface stopped listening for updates");
        }
    }
}

impl Drop for AuditDriver {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
