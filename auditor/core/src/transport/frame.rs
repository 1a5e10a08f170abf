//! Frame Protocol
//!
//! Wire format for the streaming channel: one JSON envelope per WebSocket
//! text frame.
//!
//! # Envelope Format
//!
//! ```text
//! {"event": "<name>", "data": <payload>}
//! ```
//!
//! | Event            | Direction        | Payload                          |
//! |------------------|------------------|----------------------------------|
//! | `start_audit`    | client → service | `{"url": ..., "mode": ...}`      |
//! | `audit_progress` | service → client | `{"progress": n, "message": s}`  |
//! | `audit_complete` | service → client | audit report object              |
//! | `audit_error`    | service → client | `{"message": s}`                 |
//!
//! # Security
//!
//! - Maximum frame size is enforced before parsing
//! - Unknown events are ignored rather than rejected, so the service can add
//!   events without breaking older clients

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::events::{ProgressEvent, TransportEvent};
use crate::report::AuditReport;
use crate::request::AuditRequest;

use super::TransportError;

/// Maximum frame size (10 MB)
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Event name of the start request
pub const START_AUDIT: &str = "start_audit";
/// Event name of progress notifications
pub const AUDIT_PROGRESS: &str = "audit_progress";
/// Event name of the success terminal
pub const AUDIT_COMPLETE: &str = "audit_complete";
/// Event name of the failure terminal
pub const AUDIT_ERROR: &str = "audit_error";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// A frame that could not be turned into an event
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecodeError {
    /// Event name, when the envelope itself was readable
    pub event: Option<String>,
    /// What went wrong
    pub detail: String,
}

impl DecodeError {
    fn new(event: Option<&str>, detail: impl Into<String>) -> Self {
        Self {
            event: event.map(str::to_string),
            detail: detail.into(),
        }
    }

    /// Whether the broken frame was a terminal event
    ///
    /// A broken terminal still ends the attempt (as a transport failure); a
    /// broken progress frame is only skipped.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.event.as_deref(),
            Some(AUDIT_COMPLETE | AUDIT_ERROR)
        )
    }
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.event {
            Some(event) => write!(f, "malformed '{event}' frame: {}", self.detail),
            None => write!(f, "malformed frame: {}", self.detail),
        }
    }
}

/// Encode the start request as a text frame
///
/// # Errors
///
/// Returns `TransportError::SerializationError` if JSON serialization fails
/// or the frame exceeds `MAX_FRAME_SIZE`.
pub fn encode_start(request: &AuditRequest) -> Result<String, TransportError> {
    let data =
        serde_json::to_value(request).map_err(|e| TransportError::SerializationError(e.to_string()))?;
    encode(START_AUDIT, data)
}

/// Encode an arbitrary event as a text frame
///
/// # Errors
///
/// Returns `TransportError::SerializationError` if JSON serialization fails
/// or the frame exceeds `MAX_FRAME_SIZE`.
pub fn encode(event: &str, data: Value) -> Result<String, TransportError> {
    let text = serde_json::to_string(&Envelope {
        event: event.to_string(),
        data,
    })
    .map_err(|e| TransportError::SerializationError(e.to_string()))?;

    if text.len() > MAX_FRAME_SIZE {
        return Err(TransportError::SerializationError(format!(
            "Frame too large: {} bytes (max {MAX_FRAME_SIZE})",
            text.len()
        )));
    }
    Ok(text)
}

/// Decode a service frame
///
/// Returns `Ok(None)` for events this client does not consume.
///
/// # Errors
///
/// Returns a [`DecodeError`] for oversized frames, non-envelope JSON and
/// known events whose payload has the wrong shape.
pub fn decode(text: &str) -> Result<Option<TransportEvent>, DecodeError> {
    if text.len() > MAX_FRAME_SIZE {
        return Err(DecodeError::new(
            None,
            format!("{} bytes exceeds {MAX_FRAME_SIZE}", text.len()),
        ));
    }

    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| DecodeError::new(None, e.to_string()))?;
    let event = envelope.event.as_str();

    match event {
        AUDIT_PROGRESS => serde_json::from_value::<ProgressEvent>(envelope.data)
            .map(|progress| Some(TransportEvent::Progress(progress)))
            .map_err(|e| DecodeError::new(Some(event), e.to_string())),

        AUDIT_COMPLETE => AuditReport::from_value(envelope.data)
            .map(|report| Some(TransportEvent::completed(report)))
            .ok_or_else(|| DecodeError::new(Some(event), "report is not an object")),

        AUDIT_ERROR => Ok(Some(TransportEvent::remote_failure(error_message(
            &envelope.data,
        )))),

        _ => Ok(None),
    }
}

/// Message of an `audit_error` payload
///
/// Accepts `{"message": s}`, `{"error": s}` or a bare string.
fn error_message(data: &Value) -> String {
    data.get("message")
        .or_else(|| data.get("error"))
        .unwrap_or(data)
        .as_str()
        .map_or_else(|| data.to_string(), str::to_string)
}
