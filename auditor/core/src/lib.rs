//! Auditor Core - Headless Session and Transport Layer for Website Audits
//!
//! This crate owns the lifecycle of a remotely executed website audit:
//! submitting the job, tracking its progress, arbitrating the timeout race and
//! exposing the finished report. It knows nothing about terminals or browsers;
//! a surface drives it and renders what it reports.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          Surface (CLI)                           │
//! │        submit(url, mode)  ▼              ▲  SessionUpdate         │
//! └───────────────────────────┼──────────────┼───────────────────────┘
//!                             │              │
//! ┌───────────────────────────┼──────────────┼───────────────────────┐
//! │                      AUDITOR CORE        │                       │
//! │  ┌────────────────────────┴──────────────┴─────────────────────┐ │
//! │  │                       AuditDriver                            │ │
//! │  │  ┌────────────┐  ┌────────────┐  ┌──────────┐  ┌──────────┐ │ │
//! │  │  │AuditSession│  │  Progress  │  │  Timer   │  │  Inbox   │ │ │
//! │  │  │  (state)   │  │ Presenter  │  │  (race)  │  │(inputs)  │ │ │
//! │  │  └────────────┘  └────────────┘  └──────────┘  └────▲─────┘ │ │
//! │  └──────────────────────────────────────────────────────┼──────┘ │
//! │  ┌──────────────────────────────────────────────────────┴──────┐ │
//! │  │        TransportSelector  (Streaming ─▶ Polling, once)       │ │
//! │  │     WebSocketChannel      HttpPollingChannel   InProcess     │ │
//! │  └─────────────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Types
//!
//! - [`AuditDriver`]: The single state-machine driver a surface talks to
//! - [`AuditSession`]: Pure state machine for one audit attempt at a time
//! - [`TransportSelector`]: Streaming/polling selection with permanent fallback
//! - [`AuditReport`]: Terminal payload, tolerant of missing or unknown fields
//! - [`SessionUpdate`]: Messages sent from the driver to the surface
//!
//! # Quick Start
//!
//! ```ignore
//! use auditor_core::{load_config, transport::create_selector, AuditDriver, AuditMode};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config()?;
//!     let selector = create_selector(&config.transport)?;
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     let mut driver = AuditDriver::new(selector, config.session_timeout, tx);
//!
//!     let outcome = driver.run_attempt("example.com", AuditMode::Desktop).await?;
//!     while let Ok(update) = rx.try_recv() {
//!         // Render update
//!     }
//!     if let Some(rendered) = driver.rendered() {
//!         println!("{rendered}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! - [`config`]: TOML/environment/CLI configuration loading
//! - [`driver`]: The driver that owns the session, timer and transports
//! - [`error`]: Audit error taxonomy
//! - [`events`]: Inputs flowing into the driver (transport events, timeouts)
//! - [`export`]: Tabular, document and JSON exports of the stored report
//! - [`messages`]: Updates flowing out of the driver to the surface
//! - [`progress`]: Progress presentation
//! - [`render`]: Report rendering into category views
//! - [`report`]: Report data model
//! - [`request`]: Audit request and mode
//! - [`session`]: Audit session state machine
//! - [`transport`]: Streaming, polling and in-process transports

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod export;
pub mod messages;
pub mod progress;
pub mod render;
pub mod report;
pub mod request;
pub mod session;
pub mod transport;

// Re-exports for convenience
pub use driver::AuditDriver;
pub use error::AuditError;
pub use events::{ProgressEvent, SessionInput, TransportEvent};
pub use export::{export, ExportError, ExportFormat, ExportOptions};
pub use messages::{NotifyLevel, SessionUpdate};
pub use progress::{ProgressDisplay, ProgressPhase, ProgressPresenter};
pub use render::{render, CategoryView, MetricView, RenderedReport, SummaryView};
pub use report::{AuditReport, Category, CategoryResult};
pub use request::{AuditMode, AuditRequest};
pub use session::{AttemptId, AttemptOutcome, AttemptTicket, AuditSession, SessionState};
pub use transport::{
    AuditTransport, EventStream, TransportConfig, TransportError, TransportSelector,
    TransportStrategy,
};

// Config exports
pub use config::{
    default_config_path, load_config, load_config_from_path, AuditorConfig, AuditorToml,
    ConfigError, ConfigOverrides, ConfigSource,
};
