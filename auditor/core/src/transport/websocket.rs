//! WebSocket Streaming Transport
//!
//! The preferred strategy: a persistent WebSocket connection to the audit
//! service, opened on first use and reused across attempts. Each attempt
//! sends a `start_audit` envelope; the service answers with progress frames
//! and one terminal frame (see [`super::frame`]).
//!
//! # Design Philosophy
//!
//! The protocol carries no request identifier, so frames cannot be matched
//! to attempts on the wire. Instead the reader task forwards frames to the
//! *route*: the event sender of the attempt currently started on this
//! connection. The route is taken when a terminal frame arrives, when the
//! connection drops, or when the attempt is abandoned. Each route is bound
//! to the connection it was installed for, so a reader winding down an old
//! connection cannot deliver into an attempt started on a new one. Abandoning also closes
//! the connection, so frames of an abandoned job can never reach a later
//! attempt; the next `start` reconnects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::events::TransportEvent;
use crate::request::AuditRequest;

use super::config::TransportConfig;
use super::frame;
use super::traits::{
    AuditTransport, EventStream, TransportError, TransportStrategy, EVENT_CHANNEL_CAPACITY,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Route = Arc<Mutex<Option<RouteEntry>>>;

/// Event sender of the attempt started on connection `connection`
struct RouteEntry {
    connection: u64,
    tx: mpsc::Sender<TransportEvent>,
}

/// One open connection
struct Connection {
    id: u64,
    sink: SplitSink<WsStream, Message>,
    reader: JoinHandle<()>,
    alive: Arc<AtomicBool>,
}

impl Connection {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Streaming transport over WebSocket
pub struct WebSocketChannel {
    url: String,
    connect_timeout: Duration,
    connection: Option<Connection>,
    connections: u64,
    route: Route,
}

impl WebSocketChannel {
    /// Create a channel for `url`; nothing is connected until `start`
    #[must_use]
    pub fn new(url: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            url: url.into(),
            connect_timeout,
            connection: None,
            connections: 0,
            route: Arc::new(Mutex::new(None)),
        }
    }

    /// Create from transport configuration
    ///
    /// Returns `None` when no streaming endpoint is configured.
    #[must_use]
    pub fn from_config(config: &TransportConfig) -> Option<Self> {
        config
            .streaming_endpoint()
            .map(|url| Self::new(url, config.connect_timeout()))
    }

    /// Endpoint URL
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Whether a live connection is currently held
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(Connection::is_alive)
    }

    /// Perform the WebSocket handshake and spawn the reader task
    async fn connect(&mut self) -> Result<Connection, TransportError> {
        let handshake = tokio::time::timeout(self.connect_timeout, connect_async(self.url.as_str()))
            .await
            .map_err(|_| {
                TransportError::ConnectionFailed(format!(
                    "Handshake with {} timed out after {} ms",
                    self.url,
                    self.connect_timeout.as_millis()
                ))
            })?;
        let (stream, _response) = handshake
            .map_err(|e| TransportError::ConnectionFailed(format!("{}: {e}", self.url)))?;

        tracing::info!(url = %self.url, "Streaming channel connected");

        self.connections += 1;
        let id = self.connections;
        let (sink, stream) = stream.split();
        let alive = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_frames(
            stream,
            id,
            Arc::clone(&self.route),
            Arc::clone(&alive),
        ));

        Ok(Connection {
            id,
            sink,
            reader,
            alive,
        })
    }

    /// Send the start envelope over the current connection
    async fn send_start(&mut self, text: &str) -> Result<(), TransportError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| TransportError::InvalidState("Not connected".to_string()))?;
        connection
            .sink
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    /// Route the current connection's frames to `tx`
    fn install_route(&self, tx: mpsc::Sender<TransportEvent>) {
        let mut slot = self.route.lock();
        *slot = self
            .connection
            .as_ref()
            .map(|connection| RouteEntry {
                connection: connection.id,
                tx,
            });
    }

    fn disconnect(&mut self) {
        self.route.lock().take();
        if self.connection.take().is_some() {
            tracing::debug!(url = %self.url, "Streaming channel closed");
        }
    }
}

#[async_trait]
impl AuditTransport for WebSocketChannel {
    fn strategy(&self) -> TransportStrategy {
        TransportStrategy::Streaming
    }

    async fn start(&mut self, request: &AuditRequest) -> Result<EventStream, TransportError> {
        let text = frame::encode_start(request)?;

        if !self.is_connected() {
            self.disconnect();
            let connection = self.connect().await?;
            self.connection = Some(connection);
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        self.install_route(tx.clone());

        if let Err(first) = self.send_start(&text).await {
            // The held connection may have died without the reader noticing yet
            tracing::debug!(error = %first, "Start frame failed on reused connection; reconnecting");
            self.disconnect();
            let connection = self.connect().await?;
            self.connection = Some(connection);
            self.install_route(tx);
            if let Err(e) = self.send_start(&text).await {
                self.disconnect();
                return Err(e);
            }
        }

        tracing::debug!(url = %request.url(), mode = %request.mode(), "Start frame sent");
        Ok(rx)
    }

    fn abandon(&mut self) {
        self.disconnect();
    }
}

/// Forward service frames to whichever attempt holds the route
async fn read_frames(
    mut stream: SplitStream<WsStream>,
    connection: u64,
    route: Route,
    alive: Arc<AtomicBool>,
) {
    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(error = %e, "Streaming channel read failed");
                break;
            }
        };

        let event = match frame::decode(&text) {
            Ok(Some(event)) => event,
            Ok(None) => continue,
            Err(e) if e.is_terminal() => TransportEvent::transport_failure(e.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed frame");
                continue;
            }
        };
        deliver(&route, connection, event).await;
    }

    alive.store(false, Ordering::SeqCst);
    deliver(
        &route,
        connection,
        TransportEvent::transport_failure("Streaming connection closed"),
    )
    .await;
}

async fn deliver(route: &Route, connection: u64, event: TransportEvent) {
    let sender = {
        let mut slot = route.lock();
        let routed_here = slot.as_ref().is_some_and(|entry| entry.connection == connection);
        if !routed_here {
            None
        } else if event.is_terminal() {
            slot.take().map(|entry| entry.tx)
        } else {
            slot.as_ref().map(|entry| entry.tx.clone())
        }
    };

    match sender {
        Some(tx) => {
            if tx.send(event).await.is_err() {
                tracing::debug!("Attempt stopped listening; frame dropped");
            }
        }
        None => tracing::debug!("No attempt routed on this connection; frame dropped"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;
    use crate::events::ProgressEvent;
    use crate::request::AuditMode;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    fn request() -> AuditRequest {
        AuditRequest::new("example.com", AuditMode::Desktop).unwrap()
    }

    /// Accept one connection, check the start frame, then send `replies`
    async fn serve_once(replies: Vec<Value>, hang_up: bool) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(socket).await.unwrap();

            let start = loop {
                match ws.next().await.unwrap().unwrap() {
                    Message::Text(text) => break text,
                    _ => continue,
                }
            };
            let start: Value = serde_json::from_str(&start).unwrap();
            assert_eq!(start["event"], "start_audit");
            assert_eq!(start["data"]["url"], "example.com");

            for reply in replies {
                ws.send(Message::Text(reply.to_string())).await.unwrap();
            }
            if hang_up {
                ws.close(None).await.ok();
            } else {
                // Keep the socket open until the client goes away
                while ws.next().await.is_some() {}
            }
        });

        format!("ws://{addr}")
    }

    #[tokio::test]
    async fn test_progress_and_complete_are_forwarded() {
        let url = serve_once(
            vec![
                json!({"event": "connect", "data": {}}),
                json!({"event": "audit_progress", "data": {"progress": 30, "message": "Scanning pages"}}),
                json!({"event": "audit_progress", "data": {"progress": "bad"}}),
                json!({"event": "audit_progress", "data": {"progress": 70, "message": "Analyzing"}}),
                json!({"event": "audit_complete", "data": {"overall": {"score": 82}}}),
            ],
            false,
        )
        .await;

        let mut channel = WebSocketChannel::new(url, Duration::from_secs(5));
        let mut events = channel.start(&request()).await.unwrap();
        assert!(channel.is_connected());

        assert_eq!(
            events.recv().await,
            Some(TransportEvent::Progress(ProgressEvent::new(30, "Scanning pages")))
        );
        assert_eq!(
            events.recv().await,
            Some(TransportEvent::Progress(ProgressEvent::new(70, "Analyzing")))
        );
        assert!(matches!(
            events.recv().await,
            Some(TransportEvent::Terminal(Ok(_)))
        ));
        // Route was released with the terminal
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test]
    async fn test_audit_error_frame_is_remote_failure() {
        let url = serve_once(
            vec![json!({"event": "audit_error", "data": {"message": "Failed to fetch URL"}})],
            false,
        )
        .await;

        let mut channel = WebSocketChannel::new(url, Duration::from_secs(5));
        let mut events = channel.start(&request()).await.unwrap();
        assert_eq!(
            events.recv().await,
            Some(TransportEvent::Terminal(Err(AuditError::RemoteFailure(
                "Failed to fetch URL".into()
            ))))
        );
    }

    #[tokio::test]
    async fn test_drop_mid_attempt_is_transport_failure() {
        let url = serve_once(
            vec![json!({"event": "audit_progress", "data": {"progress": 10, "message": "Starting"}})],
            true,
        )
        .await;

        let mut channel = WebSocketChannel::new(url, Duration::from_secs(5));
        let mut events = channel.start(&request()).await.unwrap();
        assert!(matches!(events.recv().await, Some(TransportEvent::Progress(_))));
        assert!(matches!(
            events.recv().await,
            Some(TransportEvent::Terminal(Err(AuditError::TransportFailure(_))))
        ));
    }

    #[tokio::test]
    async fn test_refused_connection_is_handshake_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut channel = WebSocketChannel::new(format!("ws://{addr}"), Duration::from_secs(5));
        let err = channel.start(&request()).await.unwrap_err();
        assert!(err.is_handshake_failure());
        assert!(!channel.is_connected());
    }

    #[tokio::test]
    async fn test_old_connection_cannot_deliver_into_new_route() {
        let (tx, mut rx) = mpsc::channel(4);
        let route: Route = Arc::new(Mutex::new(Some(RouteEntry { connection: 2, tx })));

        // Reader of the replaced connection winding down
        deliver(
            &route,
            1,
            TransportEvent::transport_failure("Streaming connection closed"),
        )
        .await;
        assert!(rx.try_recv().is_err());
        assert!(route.lock().is_some());

        deliver(&route, 2, TransportEvent::Progress(ProgressEvent::new(10, "Starting"))).await;
        assert_eq!(
            rx.recv().await,
            Some(TransportEvent::Progress(ProgressEvent::new(10, "Starting")))
        );
        deliver(&route, 2, TransportEvent::remote_failure("boom")).await;
        assert!(matches!(rx.recv().await, Some(TransportEvent::Terminal(Err(_)))));
        assert!(route.lock().is_none());
    }

    #[tokio::test]
    async fn test_abandon_closes_connection() {
        let url = serve_once(Vec::new(), false).await;
        let mut channel = WebSocketChannel::new(url, Duration::from_secs(5));
        let mut events = channel.start(&request()).await.unwrap();

        channel.abandon();
        assert!(!channel.is_connected());
        assert_eq!(events.recv().await, None);
    }
}
