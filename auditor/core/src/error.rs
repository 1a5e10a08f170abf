//! Audit Errors
//!
//! Error taxonomy for a single audit attempt. Every variant is terminal for
//! the attempt it belongs to; nothing here is retried automatically. The user
//! re-initiates.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced to the user for an audit attempt
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AuditError {
    /// Submission rejected before any transport call (empty URL)
    #[error("Invalid request: {0}")]
    Validation(String),

    /// An attempt is already in flight; the submit control is disabled
    #[error("An audit is already in progress")]
    Busy,

    /// Connection, handshake or network failure
    #[error("Transport failure: {0}")]
    TransportFailure(String),

    /// The remote service ran the audit and reported an error
    #[error("Audit failed: {0}")]
    RemoteFailure(String),

    /// No terminal event arrived within the budget
    #[error("Audit timed out after {} ms", .0.as_millis())]
    Timeout(Duration),
}

impl AuditError {
    /// Short machine-friendly name of the error kind
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Busy => "busy",
            Self::TransportFailure(_) => "transport",
            Self::RemoteFailure(_) => "remote",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Whether the error was raised before the session changed state
    ///
    /// Rejections leave the session exactly as it was; every other error
    /// ends an attempt.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Busy)
    }
}
