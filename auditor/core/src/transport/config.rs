//! Transport Configuration
//!
//! Configuration types for selecting and configuring transport strategies.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::traits::TransportStrategy;

/// Default streaming endpoint of the audit service
///
/// The endpoint must speak plain WebSocket text frames carrying the
/// `{"event", "data"}` envelope. Socket.IO servers (Engine.IO framing under
/// `/socket.io/`) are not supported: their handshake at this path fails, and
/// the selector logs a warning and polls for the rest of the process. Set
/// `stream_url = ""` or `strategy = "polling"` for such services.
pub const DEFAULT_STREAM_URL: &str = "ws://127.0.0.1:5000/ws";

/// Default HTTP base of the audit service (the audit route is appended)
pub const DEFAULT_HTTP_BASE: &str = "http://127.0.0.1:5000";

/// Default connection timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Which strategy to start in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyPreference {
    /// Streaming when an endpoint is configured, falling back to polling
    #[default]
    Auto,
    /// Streaming, still falling back to polling on handshake failure
    Streaming,
    /// Polling only; streaming is never attempted
    Polling,
}

impl StrategyPreference {
    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Streaming => "streaming",
            Self::Polling => "polling",
        }
    }
}

impl fmt::Display for StrategyPreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" | "" => Ok(Self::Auto),
            other => match other.parse::<TransportStrategy>() {
                Ok(TransportStrategy::Streaming) => Ok(Self::Streaming),
                Ok(TransportStrategy::Polling) => Ok(Self::Polling),
                Err(_) => Err(format!(
                    "unknown transport '{other}' (expected auto, streaming or polling)"
                )),
            },
        }
    }
}

/// Transport configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Which strategy to start in
    pub strategy: StrategyPreference,

    /// Streaming endpoint (`None` disables streaming)
    pub stream_url: Option<String>,

    /// HTTP base for the polling strategy
    pub http_base: String,

    /// Connection timeout in milliseconds
    ///
    /// Bounds the streaming handshake and the polling connect phase.
    pub connect_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyPreference::Auto,
            stream_url: Some(DEFAULT_STREAM_URL.to_string()),
            http_base: DEFAULT_HTTP_BASE.to_string(),
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
        }
    }
}

impl TransportConfig {
    /// Create configuration that never attempts streaming
    #[must_use]
    pub fn polling(http_base: impl Into<String>) -> Self {
        Self {
            strategy: StrategyPreference::Polling,
            stream_url: None,
            http_base: http_base.into(),
            ..Default::default()
        }
    }

    /// Connection timeout as a duration
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Strategy the selector starts in
    #[must_use]
    pub fn initial_strategy(&self) -> TransportStrategy {
        match (self.strategy, self.streaming_endpoint()) {
            (StrategyPreference::Polling, _) | (_, None) => TransportStrategy::Polling,
            (_, Some(_)) => TransportStrategy::Streaming,
        }
    }

    /// Streaming endpoint, ignoring blank values
    #[must_use]
    pub fn streaming_endpoint(&self) -> Option<&str> {
        self.stream_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Full URL of the polling audit route
    #[must_use]
    pub fn audit_endpoint(&self) -> String {
        let base = self.http_base.trim().trim_end_matches('/');
        if base.ends_with("/audit") {
            base.to_string()
        } else {
            format!("{base}/audit")
        }
    }
}
