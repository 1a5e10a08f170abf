//! Transport Traits
//!
//! The one seam every audit transport implements, plus the transport error
//! type shared by all of them.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::events::TransportEvent;
use crate::request::AuditRequest;

/// Capacity of the per-attempt event channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Events produced for one started request
///
/// Ends after the terminal event, or when the transport is abandoned.
pub type EventStream = mpsc::Receiver<TransportEvent>;

/// Delivery strategy
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportStrategy {
    /// Persistent bidirectional channel with progress events
    Streaming,
    /// One request/response exchange, no progress
    Polling,
}

impl TransportStrategy {
    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Streaming => "streaming",
            Self::Polling => "polling",
        }
    }

    /// Whether this strategy reports intermediate progress
    #[must_use]
    pub fn reports_progress(&self) -> bool {
        matches!(self, Self::Streaming)
    }
}

impl fmt::Display for TransportStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportStrategy {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "streaming" | "stream" | "websocket" | "ws" => Ok(Self::Streaming),
            "polling" | "poll" | "http" => Ok(Self::Polling),
            other => Err(TransportError::InvalidState(format!(
                "Unknown transport strategy: {other}"
            ))),
        }
    }
}

/// Errors that can occur during transport operations
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Could not establish the connection (handshake failure)
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    /// Connection was closed
    #[error("Connection closed")]
    ConnectionClosed,
    /// Failed to send the request
    #[error("Send failed: {0}")]
    SendFailed(String),
    /// Message serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),
    /// Transport not in expected state
    #[error("Invalid state: {0}")]
    InvalidState(String),
    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(String),
}

impl TransportError {
    /// Whether the failure happened while establishing the channel
    ///
    /// Only handshake failures trigger the streaming-to-polling fallback.
    #[must_use]
    pub fn is_handshake_failure(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

/// A way of delivering an audit request and receiving its events
///
/// Implementations are driven from a single task; `start` is never called
/// concurrently with itself.
#[async_trait]
pub trait AuditTransport: Send {
    /// Strategy this transport implements
    fn strategy(&self) -> TransportStrategy;

    /// Send the request and return the stream its events arrive on
    ///
    /// For streaming transports this establishes the channel first if needed;
    /// a failure to do so is reported as [`TransportError::ConnectionFailed`].
    /// Errors after the request has been handed off are delivered as a
    /// terminal event on the stream instead.
    async fn start(&mut self, request: &AuditRequest) -> Result<EventStream, TransportError>;

    /// Stop delivering events for the in-flight request, best effort
    ///
    /// Called after a timeout. Events may still arrive on an already
    /// returned stream; the driver ignores them.
    fn abandon(&mut self) {}
}
