//! Loopback tests for the network transports
//!
//! A real WebSocket service (tokio-tungstenite, server side) and a minimal
//! HTTP responder run on loopback ports; the driver is built from
//! configuration exactly as the CLI builds it.

#![cfg(feature = "websocket")]

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use auditor_core::transport::create_selector;
use auditor_core::{
    AttemptOutcome, AuditDriver, AuditMode, Category, SessionUpdate, TransportConfig,
    TransportStrategy,
};

/// Streaming service answering every `start_audit` with progress and a report
async fn streaming_service() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut ws = accept_async(socket).await.unwrap();
                while let Some(Ok(message)) = ws.next().await {
                    let Message::Text(text) = message else { continue };
                    let frame: Value = serde_json::from_str(&text).unwrap();
                    if frame["event"] != "start_audit" {
                        continue;
                    }
                    let url = frame["data"]["url"].clone();
                    let replies = [
                        json!({"event": "audit_progress", "data": {"progress": 30, "message": "Scanning pages"}}),
                        json!({"event": "audit_progress", "data": {"progress": 70, "message": "Analyzing security"}}),
                        json!({"event": "audit_complete", "data": {
                            "url": url,
                            "overall": {"score": 82},
                            "security": {"score": 90, "ssl_valid": true, "issues": []},
                        }}),
                    ];
                    for reply in replies {
                        ws.send(Message::Text(reply.to_string())).await.unwrap();
                    }
                }
            });
        }
    });

    format!("ws://{addr}/ws")
}

/// HTTP responder answering every request with the same JSON body
async fn polling_service(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut seen = Vec::new();
                loop {
                    let Ok(n) = socket.read(&mut buf).await else { return };
                    seen.extend_from_slice(&buf[..n]);
                    if n == 0 || String::from_utf8_lossy(&seen).contains("\"mode\"") {
                        break;
                    }
                }
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.ok();
                socket.shutdown().await.ok();
            });
        }
    });

    format!("http://{addr}")
}

/// Plain HTTP server that answers every request with 404, like a Socket.IO
/// service asked for a raw WebSocket path
async fn not_found_service() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let mut seen = Vec::new();
                loop {
                    let Ok(n) = socket.read(&mut buf).await else { return };
                    seen.extend_from_slice(&buf[..n]);
                    if n == 0 || seen.windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }
                let body = "Not Found";
                let response = format!(
                    "HTTP/1.1 404 NOT FOUND\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.ok();
                socket.shutdown().await.ok();
            });
        }
    });

    addr.to_string()
}

async fn closed_port() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}

#[tokio::test]
async fn test_streaming_audit_end_to_end() {
    let config = TransportConfig {
        stream_url: Some(streaming_service().await),
        http_base: format!("http://{}", closed_port().await),
        ..Default::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut driver = AuditDriver::new(create_selector(&config).unwrap(), Duration::from_secs(10), tx);

    let outcome = driver.run_attempt("example.com", AuditMode::Desktop).await.unwrap();
    assert_eq!(outcome, AttemptOutcome::Succeeded);

    let rendered = driver.rendered().unwrap();
    assert_eq!(rendered.summary.url, "example.com");
    assert_eq!(rendered.category(Category::Overall).unwrap().score, "82%");

    let mut progress = Vec::new();
    while let Ok(update) = rx.try_recv() {
        if let SessionUpdate::Progress { display, .. } = update {
            progress.push(display.percent);
        }
    }
    assert_eq!(progress, vec![Some(30), Some(70)]);

    // The connection is reused for the next attempt
    let outcome = driver.run_attempt("example.org", AuditMode::Mobile).await.unwrap();
    assert_eq!(outcome, AttemptOutcome::Succeeded);
    assert_eq!(driver.rendered().unwrap().summary.url, "example.org");
    assert_eq!(driver.selection(), TransportStrategy::Streaming);
}

#[tokio::test]
async fn test_unreachable_streaming_falls_back_to_polling() {
    let config = TransportConfig {
        stream_url: Some(format!("ws://{}/ws", closed_port().await)),
        http_base: polling_service(r#"{"overall": {"score": 64}, "seo": {"issues": ["Title missing"]}}"#)
            .await,
        connect_timeout_ms: 2000,
        ..Default::default()
    };
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut driver = AuditDriver::new(create_selector(&config).unwrap(), Duration::from_secs(10), tx);

    let outcome = driver.run_attempt("example.com", AuditMode::Desktop).await.unwrap();
    assert_eq!(outcome, AttemptOutcome::Succeeded);
    assert_eq!(driver.selection(), TransportStrategy::Polling);

    let mut saw_indeterminate = false;
    while let Ok(update) = rx.try_recv() {
        if let SessionUpdate::Progress { display, .. } = update {
            saw_indeterminate |= display.percent.is_none();
        }
    }
    assert!(saw_indeterminate);

    let rendered = driver.rendered().unwrap();
    assert_eq!(rendered.summary.grade, "D");
    assert_eq!(rendered.summary.issue_count, 1);
}

#[tokio::test]
async fn test_non_websocket_service_falls_back_to_polling() {
    let config = TransportConfig {
        stream_url: Some(format!("ws://{}/ws", not_found_service().await)),
        http_base: polling_service(r#"{"overall": {"score": 91}}"#).await,
        connect_timeout_ms: 2000,
        ..Default::default()
    };
    assert_eq!(config.initial_strategy(), TransportStrategy::Streaming);

    let (tx, _rx) = mpsc::unbounded_channel();
    let mut driver = AuditDriver::new(create_selector(&config).unwrap(), Duration::from_secs(10), tx);

    let outcome = driver.run_attempt("example.com", AuditMode::Desktop).await.unwrap();
    assert_eq!(outcome, AttemptOutcome::Succeeded);
    assert_eq!(driver.selection(), TransportStrategy::Polling);
    assert_eq!(driver.rendered().unwrap().summary.grade, "A");
}
