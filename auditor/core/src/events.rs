//! Session Inputs
//!
//! Everything that flows *into* the driver. Transports produce
//! [`TransportEvent`]s; the driver tags them with the attempt they belong to
//! and merges them with timer expiries into one typed stream of
//! [`SessionInput`]s, consumed by a single handler.
//!
//! # Design Philosophy
//!
//! Transport plumbing and timers never touch session state. They only send
//! inputs; the driver decides what an input means, including deciding that
//! it is stale and must be ignored.

use serde::{Deserialize, Serialize};

use crate::error::AuditError;
use crate::report::AuditReport;
use crate::session::AttemptId;

/// Incremental progress reported by the remote service
///
/// Wire form: `{"progress": 40, "message": "Fetching page content..."}`.
/// Percent is not range-checked here; the presenter clamps it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Completion percentage as reported
    #[serde(rename = "progress")]
    pub percent: i64,
    /// Human-readable step description
    #[serde(default)]
    pub message: String,
}

impl ProgressEvent {
    /// Create a progress event
    pub fn new(percent: i64, message: impl Into<String>) -> Self {
        Self {
            percent,
            message: message.into(),
        }
    }
}

/// An event delivered by a transport for the active request
#[derive(Clone, Debug, PartialEq)]
pub enum TransportEvent {
    /// Intermediate progress (streaming strategy only)
    Progress(ProgressEvent),
    /// The single success-or-failure event that ends an attempt
    Terminal(Result<AuditReport, AuditError>),
}

impl TransportEvent {
    /// Terminal event for a received report
    ///
    /// A report carrying an `error` field is a remote-side failure, not a
    /// success.
    #[must_use]
    pub fn completed(report: AuditReport) -> Self {
        match report.error() {
            Some(message) => Self::remote_failure(message),
            None => Self::Terminal(Ok(report)),
        }
    }

    /// Terminal remote failure
    pub fn remote_failure(message: impl Into<String>) -> Self {
        Self::Terminal(Err(AuditError::RemoteFailure(message.into())))
    }

    /// Terminal transport failure
    pub fn transport_failure(detail: impl Into<String>) -> Self {
        Self::Terminal(Err(AuditError::TransportFailure(detail.into())))
    }

    /// Whether this event ends the attempt
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminal(_))
    }
}

/// Input consumed by the driver
#[derive(Clone, Debug, PartialEq)]
pub enum SessionInput {
    /// An event from the transport serving `attempt`
    Transport {
        /// Attempt the event was produced for
        attempt: AttemptId,
        /// The event itself
        event: TransportEvent,
    },

    /// The timeout timer armed for `attempt` fired
    Timeout {
        /// Attempt the timer was armed for
        attempt: AttemptId,
    },
}

impl SessionInput {
    /// Attempt this input belongs to
    #[must_use]
    pub fn attempt(&self) -> AttemptId {
        match self {
            Self::Transport { attempt, .. } | Self::Timeout { attempt } => *attempt,
        }
    }
}
