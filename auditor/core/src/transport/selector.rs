//! Transport Selection
//!
//! Explicit two-state selector: `Streaming` or `Polling`. The state is
//! decided once from configuration and can only ever move from streaming to
//! polling, when the streaming handshake fails. That move is permanent for
//! the life of the process; the streaming channel is dropped and never
//! attempted again.

use crate::request::AuditRequest;

use super::traits::{AuditTransport, EventStream, TransportError, TransportStrategy};

/// Picks the transport serving each attempt
pub struct TransportSelector {
    streaming: Option<Box<dyn AuditTransport>>,
    polling: Box<dyn AuditTransport>,
    selection: TransportStrategy,
    fell_back: bool,
    active: Option<TransportStrategy>,
}

impl TransportSelector {
    /// Create a selector that starts in streaming when a streaming transport
    /// is given, polling otherwise
    #[must_use]
    pub fn new(
        streaming: Option<Box<dyn AuditTransport>>,
        polling: Box<dyn AuditTransport>,
    ) -> Self {
        let selection = if streaming.is_some() {
            TransportStrategy::Streaming
        } else {
            TransportStrategy::Polling
        };
        Self {
            streaming,
            polling,
            selection,
            fell_back: false,
            active: None,
        }
    }

    /// Create a selector that only ever polls
    #[must_use]
    pub fn polling_only(polling: Box<dyn AuditTransport>) -> Self {
        Self::new(None, polling)
    }

    /// Strategy the next attempt will use
    #[must_use]
    pub fn selection(&self) -> TransportStrategy {
        self.selection
    }

    /// Whether streaming has been given up for this process
    #[must_use]
    pub fn has_fallen_back(&self) -> bool {
        self.fell_back
    }

    /// Start the request on the selected transport
    ///
    /// A streaming handshake failure switches the selector to polling for
    /// good and serves this request through polling.
    ///
    /// # Errors
    ///
    /// Returns the polling transport's error, or a non-handshake streaming
    /// error.
    pub async fn start(
        &mut self,
        request: &AuditRequest,
    ) -> Result<(TransportStrategy, EventStream), TransportError> {
        if self.selection == TransportStrategy::Streaming {
            if let Some(streaming) = self.streaming.as_mut() {
                // Set before awaiting so a cancelled start can still be abandoned
                self.active = Some(TransportStrategy::Streaming);
                match streaming.start(request).await {
                    Ok(events) => {
                        return Ok((TransportStrategy::Streaming, events));
                    }
                    Err(e) if e.is_handshake_failure() => {
                        tracing::warn!(
                            error = %e,
                            "Streaming handshake failed; falling back to polling for this session"
                        );
                        self.streaming = None;
                        self.selection = TransportStrategy::Polling;
                        self.fell_back = true;
                    }
                    Err(e) => return Err(e),
                }
            } else {
                self.selection = TransportStrategy::Polling;
            }
        }

        self.active = Some(TransportStrategy::Polling);
        let events = self.polling.start(request).await?;
        Ok((TransportStrategy::Polling, events))
    }

    /// Abandon the in-flight request on whichever transport served it
    pub fn abandon(&mut self) {
        match self.active.take() {
            Some(TransportStrategy::Streaming) => {
                if let Some(streaming) = self.streaming.as_mut() {
                    streaming.abandon();
                }
            }
            Some(TransportStrategy::Polling) => self.polling.abandon(),
            None => {}
        }
    }
}
