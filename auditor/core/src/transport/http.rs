//! HTTP Polling Transport
//!
//! The fallback strategy: one `POST {base}/audit` per attempt with the
//! request as JSON. The response body is the report, or an object with an
//! `error` field. There is no progress; the only event is the terminal.
//!
//! The request runs on its own task so `start` returns as soon as the call
//! is dispatched. `abandon` aborts that task; a response that still slips
//! through is dropped by the driver.

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::TransportEvent;
use crate::report::AuditReport;
use crate::request::AuditRequest;

use super::config::TransportConfig;
use super::traits::{AuditTransport, EventStream, TransportError, TransportStrategy};

/// Polling transport over HTTP
pub struct HttpPollingChannel {
    endpoint: String,
    client: Client,
    inflight: Option<JoinHandle<()>>,
}

impl HttpPollingChannel {
    /// Create a polling channel for the configured audit endpoint
    ///
    /// # Errors
    ///
    /// Returns `TransportError::Http` if the HTTP client cannot be built.
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self {
            endpoint: config.audit_endpoint(),
            client,
            inflight: None,
        })
    }

    /// Full URL requests are posted to
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AuditTransport for HttpPollingChannel {
    fn strategy(&self) -> TransportStrategy {
        TransportStrategy::Polling
    }

    async fn start(&mut self, request: &AuditRequest) -> Result<EventStream, TransportError> {
        let (tx, rx) = mpsc::channel(1);
        let call = self.client.post(&self.endpoint).json(request);
        let url = request.url().to_string();

        tracing::debug!(endpoint = %self.endpoint, url = %url, "Posting audit request");

        let handle = tokio::spawn(async move {
            let event = match call.send().await {
                Ok(response) => read_response(response).await,
                Err(e) => TransportEvent::transport_failure(TransportError::from(e).to_string()),
            };
            if tx.send(event).await.is_err() {
                tracing::debug!(url = %url, "Polling response arrived after the attempt was dropped");
            }
        });

        if let Some(previous) = self.inflight.replace(handle) {
            previous.abort();
        }
        Ok(rx)
    }

    fn abandon(&mut self) {
        if let Some(handle) = self.inflight.take() {
            handle.abort();
        }
    }
}

impl Drop for HttpPollingChannel {
    fn drop(&mut self) {
        self.abandon();
    }
}

/// Turn an HTTP response into the attempt's terminal event
async fn read_response(response: Response) -> TransportEvent {
    let status = response.status();
    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => return TransportEvent::transport_failure(format!("Failed to read response: {e}")),
    };

    let report = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(AuditReport::from_value);

    match report {
        Some(report) if report.error().is_some() || status.is_success() => {
            TransportEvent::completed(report)
        }
        _ if !status.is_success() => TransportEvent::transport_failure(format!("HTTP {status}")),
        _ => TransportEvent::transport_failure("Response body is not a JSON object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuditError;
    use crate::request::AuditMode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a loopback port
    async fn respond_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut seen = Vec::new();
            // Read until the JSON body has arrived
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                seen.extend_from_slice(&buf[..n]);
                if n == 0 || String::from_utf8_lossy(&seen).contains("\"mode\"") {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{addr}")
    }

    async fn poll(base: String) -> TransportEvent {
        let mut channel = HttpPollingChannel::new(&TransportConfig::polling(base)).unwrap();
        let request = AuditRequest::new("example.com", AuditMode::Desktop).unwrap();
        let mut events = channel.start(&request).await.unwrap();
        events.recv().await.unwrap()
    }

    #[tokio::test]
    async fn test_success_body_is_report() {
        let base = respond_once("200 OK", r#"{"overall":{"score":82}}"#).await;
        match poll(base).await {
            TransportEvent::Terminal(Ok(report)) => {
                assert!(report.category(crate::report::Category::Overall).is_some());
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_body_is_remote_failure() {
        let base = respond_once("500 Internal Server Error", r#"{"error":"Failed to fetch URL"}"#).await;
        assert_eq!(
            poll(base).await,
            TransportEvent::Terminal(Err(AuditError::RemoteFailure(
                "Failed to fetch URL".into()
            )))
        );
    }

    #[tokio::test]
    async fn test_non_json_body_is_transport_failure() {
        let base = respond_once("502 Bad Gateway", "<html>bad gateway</html>").await;
        match poll(base).await {
            TransportEvent::Terminal(Err(AuditError::TransportFailure(detail))) => {
                assert!(detail.contains("502"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let event = poll(format!("http://{addr}")).await;
        assert!(matches!(
            event,
            TransportEvent::Terminal(Err(AuditError::TransportFailure(_)))
        ));
    }

    #[test]
    fn test_endpoint() {
        let channel = HttpPollingChannel::new(&TransportConfig::polling("http://svc:5000/")).unwrap();
        assert_eq!(channel.endpoint(), "http://svc:5000/audit");
    }
}
