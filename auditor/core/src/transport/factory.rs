//! Transport Factory
//!
//! Builds the [`TransportSelector`] from configuration. This abstracts
//! transport creation from the driver and the CLI.

use super::{
    config::{StrategyPreference, TransportConfig},
    http::HttpPollingChannel,
    selector::TransportSelector,
    traits::{AuditTransport, TransportError},
};

#[cfg(feature = "websocket")]
use super::websocket::WebSocketChannel;

/// Create a transport selector based on configuration
///
/// The polling channel is always built. The streaming channel is built when
/// the preference allows it and an endpoint is configured. Without the
/// `websocket` feature the selector is polling-only.
///
/// # Errors
///
/// Returns `TransportError::Http` if the HTTP client cannot be built.
///
/// # Example
///
/// ```ignore
/// use auditor_core::transport::{create_selector, TransportConfig};
///
/// let selector = create_selector(&TransportConfig::default())?;
/// ```
pub fn create_selector(config: &TransportConfig) -> Result<TransportSelector, TransportError> {
    let polling: Box<dyn AuditTransport> = Box::new(HttpPollingChannel::new(config)?);
    let streaming = match config.strategy {
        StrategyPreference::Polling => None,
        StrategyPreference::Auto | StrategyPreference::Streaming => streaming_channel(config),
    };

    if streaming.is_none() && config.strategy == StrategyPreference::Streaming {
        tracing::warn!("Streaming requested but unavailable; using polling");
    }

    let selector = TransportSelector::new(streaming, polling);
    tracing::info!(
        strategy = %selector.selection(),
        preference = %config.strategy,
        "Transport selected"
    );
    Ok(selector)
}

#[cfg(feature = "websocket")]
fn streaming_channel(config: &TransportConfig) -> Option<Box<dyn AuditTransport>> {
    WebSocketChannel::from_config(config).map(|channel| Box::new(channel) as Box<dyn AuditTransport>)
}

#[cfg(not(feature = "websocket"))]
fn streaming_channel(_config: &TransportConfig) -> Option<Box<dyn AuditTransport>> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::TransportStrategy;

    #[test]
    fn test_polling_preference_builds_polling_selector() {
        let selector = create_selector(&TransportConfig::polling("http://127.0.0.1:5000")).unwrap();
        assert_eq!(selector.selection(), TransportStrategy::Polling);
    }

    #[cfg(feature = "websocket")]
    #[test]
    fn test_default_builds_streaming_selector() {
        let selector = create_selector(&TransportConfig::default()).unwrap();
        assert_eq!(selector.selection(), TransportStrategy::Streaming);
    }

    #[test]
    fn test_missing_endpoint_builds_polling_selector() {
        let config = TransportConfig {
            stream_url: None,
            ..Default::default()
        };
        let selector = create_selector(&config).unwrap();
        assert_eq!(selector.selection(), TransportStrategy::Polling);
    }
}
