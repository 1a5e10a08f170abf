//! Transport Layer for Audit Requests
//!
//! Provides abstraction over the ways an audit request reaches the remote
//! service and its events come back:
//! - `Streaming`: persistent WebSocket channel carrying progress and a terminal
//! - `Polling`: one HTTP POST per attempt whose response is the terminal
//! - `InProcess`: channel pair standing in for the service (tests, embedding)
//!
//! # Design Philosophy
//!
//! A transport only turns a request into a stream of [`TransportEvent`]s. It
//! never decides whether an event is stale or whether the attempt has timed
//! out; the driver does. The [`TransportSelector`] picks the strategy and
//! remembers, for the life of the process, that streaming failed its
//! handshake.
//!
//! [`TransportEvent`]: crate::events::TransportEvent

pub mod config;
pub mod factory;
pub mod frame;
pub mod http;
pub mod in_process;
pub mod selector;
pub mod traits;
#[cfg(feature = "websocket")]
pub mod websocket;

// Re-exports for convenience
pub use config::{StrategyPreference, TransportConfig};
pub use factory::create_selector;
pub use http::HttpPollingChannel;
pub use in_process::{InProcessJob, InProcessServer, InProcessTransport};
pub use selector::TransportSelector;
pub use traits::{AuditTransport, EventStream, TransportError, TransportStrategy};

#[cfg(feature = "websocket")]
pub use websocket::WebSocketChannel;
