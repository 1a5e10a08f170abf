//! In-Process Transport
//!
//! Direct channel-based stand-in for the remote audit service. Used when a
//! service is embedded in the same process, and by tests that need to script
//! exactly which events arrive and when.
//!
//! # Usage
//!
//! ```ignore
//! let (transport, mut server) = InProcessTransport::new_pair(TransportStrategy::Streaming);
//!
//! // Give transport to the selector, then play the service:
//! let job = server.next_job().await.unwrap();
//! job.progress(30, "Scanning pages").await;
//! job.complete(report).await;
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::events::{ProgressEvent, TransportEvent};
use crate::report::AuditReport;
use crate::request::AuditRequest;

use super::traits::{
    AuditTransport, EventStream, TransportError, TransportStrategy, EVENT_CHANNEL_CAPACITY,
};

/// State shared between the two halves
#[derive(Debug, Default)]
struct Shared {
    refuse_handshake: AtomicBool,
    starts: AtomicUsize,
}

/// Client half, handed to the selector
pub struct InProcessTransport {
    strategy: TransportStrategy,
    jobs_tx: mpsc::Sender<InProcessJob>,
    shared: Arc<Shared>,
}

/// Service half, used to answer jobs
pub struct InProcessServer {
    jobs_rx: mpsc::Receiver<InProcessJob>,
    shared: Arc<Shared>,
}

/// One started request, as seen by the service half
#[derive(Debug)]
pub struct InProcessJob {
    /// The request that was started
    pub request: AuditRequest,
    /// Where to push events for this request
    pub events: mpsc::Sender<TransportEvent>,
}

impl InProcessTransport {
    /// Create a new in-process transport pair
    ///
    /// Returns:
    /// - `InProcessTransport`: give this to the selector
    /// - `InProcessServer`: receives started jobs and answers them
    #[must_use]
    pub fn new_pair(strategy: TransportStrategy) -> (Self, InProcessServer) {
        Self::new_pair_with_capacity(strategy, 16)
    }

    /// Create with custom job queue capacity
    #[must_use]
    pub fn new_pair_with_capacity(
        strategy: TransportStrategy,
        capacity: usize,
    ) -> (Self, InProcessServer) {
        let (jobs_tx, jobs_rx) = mpsc::channel(capacity);
        let shared = Arc::new(Shared::default());

        let transport = Self {
            strategy,
            jobs_tx,
            shared: Arc::clone(&shared),
        };
        (transport, InProcessServer { jobs_rx, shared })
    }
}

#[async_trait]
impl AuditTransport for InProcessTransport {
    fn strategy(&self) -> TransportStrategy {
        self.strategy
    }

    async fn start(&mut self, request: &AuditRequest) -> Result<EventStream, TransportError> {
        self.shared.starts.fetch_add(1, Ordering::SeqCst);

        if self.shared.refuse_handshake.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionFailed(
                "In-process service refused the handshake".to_string(),
            ));
        }

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let job = InProcessJob {
            request: request.clone(),
            events: events_tx,
        };
        self.jobs_tx
            .send(job)
            .await
            .map_err(|_| TransportError::SendFailed("Service half dropped".to_string()))?;

        Ok(events_rx)
    }
}

impl InProcessServer {
    /// Wait for the next started job
    pub async fn next_job(&mut self) -> Option<InProcessJob> {
        self.jobs_rx.recv().await
    }

    /// Take a started job if one is queued
    pub fn try_next_job(&mut self) -> Option<InProcessJob> {
        self.jobs_rx.try_recv().ok()
    }

    /// Refuse (or accept again) subsequent handshakes
    pub fn set_refuse_handshake(&self, refuse: bool) {
        self.shared.refuse_handshake.store(refuse, Ordering::SeqCst);
    }

    /// How many times the client half tried to start a request
    #[must_use]
    pub fn start_count(&self) -> usize {
        self.shared.starts.load(Ordering::SeqCst)
    }
}

impl InProcessJob {
    /// Push a progress event; returns whether the client is still listening
    pub async fn progress(&self, percent: i64, message: impl Into<String>) -> bool {
        self.send(TransportEvent::Progress(ProgressEvent::new(percent, message)))
            .await
    }

    /// Push the success terminal
    pub async fn complete(&self, report: AuditReport) -> bool {
        self.send(TransportEvent::completed(report)).await
    }

    /// Push a remote failure terminal
    pub async fn fail(&self, message: impl Into<String>) -> bool {
        self.send(TransportEvent::remote_failure(message)).await
    }

    /// Push any event
    pub async fn send(&self, event: TransportEvent) -> bool {
        self.events.send(event).await.is_ok()
    }
}
