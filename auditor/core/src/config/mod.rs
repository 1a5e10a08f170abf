//! TOML Configuration File Support
//!
//! This module provides centralized configuration loading for the auditor,
//! supporting a TOML configuration file at `~/.config/site-audit/config.toml`.
//!
//! # Configuration Priority
//!
//! Configuration values are loaded with the following priority (highest first):
//! 1. CLI arguments (applied by the caller through [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # XDG Base Directory Compliance
//!
//! The configuration file follows XDG Base Directory specification:
//! - `$XDG_CONFIG_HOME/site-audit/config.toml` (typically `~/.config/site-audit/config.toml`)
//!
//! # Example Configuration
//!
//! ```toml
//! [transport]
//! strategy = "auto"            # auto | streaming | polling
//! stream_url = "ws://127.0.0.1:5000/ws"   # plain WebSocket, not Socket.IO; "" disables
//! http_base = "http://127.0.0.1:5000"
//! connect_timeout_ms = 5000          # must be below session.timeout_ms
//!
//! [session]
//! timeout_ms = 30000                 # absolute budget, handshake included
//!
//! [export]
//! lines_per_page = 50
//! title = "Website Audit Report"
//! ```
//!
//! # Environment Variables
//!
//! | Variable                     | Setting                        |
//! |------------------------------|--------------------------------|
//! | `SITE_AUDIT_TRANSPORT`       | `transport.strategy`           |
//! | `SITE_AUDIT_STREAM_URL`      | `transport.stream_url`         |
//! | `SITE_AUDIT_HTTP_BASE`       | `transport.http_base`          |
//! | `SITE_AUDIT_CONNECT_TIMEOUT` | `transport.connect_timeout_ms` |
//! | `SITE_AUDIT_TIMEOUT`         | `session.timeout_ms`           |
//! | `SITE_AUDIT_LINES_PER_PAGE`  | `export.lines_per_page`        |

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::export::ExportOptions;
use crate::session::DEFAULT_TIMEOUT;
use crate::transport::config::{StrategyPreference, TransportConfig};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Transport section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportToml {
    /// Starting strategy: auto, streaming or polling
    pub strategy: Option<String>,

    /// Streaming endpoint (empty string disables streaming)
    pub stream_url: Option<String>,

    /// HTTP base of the polling strategy
    pub http_base: Option<String>,

    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

/// Session section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionToml {
    /// Absolute budget of one attempt in milliseconds
    pub timeout_ms: Option<u64>,
}

/// Export section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportToml {
    /// Content lines per document page
    pub lines_per_page: Option<usize>,

    /// Document title
    pub title: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditorToml {
    /// Transport configuration section
    pub transport: TransportToml,

    /// Session configuration section
    pub session: SessionToml,

    /// Export configuration section
    pub export: ExportToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Centralized configuration for the auditor
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct AuditorConfig {
    /// Transport configuration
    pub transport: TransportConfig,

    /// Absolute budget of one attempt
    pub session_timeout: Duration,

    /// Export options
    pub export: ExportOptions,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for AuditorConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            session_timeout: DEFAULT_TIMEOUT,
            export: ExportOptions::default(),
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl AuditorConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Check values that would make the auditor unusable
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` for a zero attempt timeout, a
    /// connect timeout that is zero or not below the attempt timeout, zero
    /// lines per page or an empty HTTP base.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "session timeout must be greater than zero".to_string(),
            ));
        }
        let connect_timeout = self.transport.connect_timeout();
        if connect_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "connect timeout must be greater than zero".to_string(),
            ));
        }
        if connect_timeout >= self.session_timeout {
            return Err(ConfigError::ValidationError(format!(
                "connect timeout ({} ms) must be below the session timeout ({} ms)",
                connect_timeout.as_millis(),
                self.session_timeout.as_millis()
            )));
        }
        if self.export.lines_per_page == 0 {
            return Err(ConfigError::ValidationError(
                "lines per page must be greater than zero".to_string(),
            ));
        }
        if self.transport.http_base.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "HTTP base must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/site-audit/config.toml` or
/// `~/.config/site-audit/config.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("site-audit").join("config.toml"))
}

/// Load configuration from all sources with proper priority
///
/// Priority order (highest first):
/// 1. CLI arguments (not handled here - caller should apply after)
/// 2. Environment variables
/// 3. TOML configuration file
/// 4. Default values
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or the
/// resulting configuration is invalid. A missing config file is not an error
/// (defaults are used).
pub fn load_config() -> Result<AuditorConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path
///
/// # Arguments
///
/// * `path` - Optional path to the configuration file. If `None`, only defaults
///   and environment variables are used.
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<AuditorConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration with an explicit environment lookup
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env<F>(path: Option<PathBuf>, env: F) -> Result<AuditorConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Start with defaults
    let mut config = AuditorConfig::default();

    // Try to load from file
    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: AuditorToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config)?;
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    // Apply environment variables (overrides file values)
    apply_env_config(&mut config, env);

    config.validate()?;
    Ok(config)
}

/// Apply TOML configuration values to the config struct
fn apply_toml_config(config: &mut AuditorConfig, toml: &AuditorToml) -> Result<(), ConfigError> {
    // Transport settings
    if let Some(ref strategy) = toml.transport.strategy {
        config.transport.strategy = strategy
            .parse::<StrategyPreference>()
            .map_err(ConfigError::ValidationError)?;
    }
    if let Some(ref url) = toml.transport.stream_url {
        config.transport.stream_url = non_empty(url);
    }
    if let Some(ref base) = toml.transport.http_base {
        config.transport.http_base.clone_from(base);
    }
    if let Some(timeout) = toml.transport.connect_timeout_ms {
        config.transport.connect_timeout_ms = timeout;
    }

    // Session settings
    if let Some(timeout) = toml.session.timeout_ms {
        config.session_timeout = Duration::from_millis(timeout);
    }

    // Export settings
    if let Some(lines) = toml.export.lines_per_page {
        config.export.lines_per_page = lines;
    }
    if let Some(ref title) = toml.export.title {
        config.export.title.clone_from(title);
    }
    Ok(())
}

/// Apply environment variable overrides to the config
fn apply_env_config<F>(config: &mut AuditorConfig, env: F)
where
    F: Fn(&str) -> Option<String>,
{
    // Transport settings from environment
    if let Some(strategy) = env("SITE_AUDIT_TRANSPORT") {
        match strategy.parse::<StrategyPreference>() {
            Ok(strategy) => {
                config.transport.strategy = strategy;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(error = %e, "Ignoring SITE_AUDIT_TRANSPORT"),
        }
    }
    if let Some(url) = env("SITE_AUDIT_STREAM_URL") {
        config.transport.stream_url = non_empty(&url);
        config.source = ConfigSource::Env;
    }
    if let Some(base) = env("SITE_AUDIT_HTTP_BASE") {
        config.transport.http_base = base;
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = env("SITE_AUDIT_CONNECT_TIMEOUT") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.transport.connect_timeout_ms = ms;
            config.source = ConfigSource::Env;
        }
    }

    // Session settings from environment
    if let Some(timeout) = env("SITE_AUDIT_TIMEOUT") {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.session_timeout = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }

    // Export settings from environment
    if let Some(lines) = env("SITE_AUDIT_LINES_PER_PAGE") {
        if let Ok(n) = lines.parse::<usize>() {
            config.export.lines_per_page = n;
            config.source = ConfigSource::Env;
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Builder for applying CLI overrides to configuration
///
/// Use this after [`load_config`] to apply command-line argument overrides.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Strategy override
    pub strategy: Option<StrategyPreference>,

    /// Streaming endpoint override
    pub stream_url: Option<String>,

    /// HTTP base override
    pub http_base: Option<String>,

    /// Connect timeout override (milliseconds)
    pub connect_timeout_ms: Option<u64>,

    /// Attempt timeout override (milliseconds)
    pub timeout_ms: Option<u64>,

    /// Lines per page override
    pub lines_per_page: Option<usize>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strategy override
    #[must_use]
    pub fn with_strategy(mut self, strategy: StrategyPreference) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set streaming endpoint override
    #[must_use]
    pub fn with_stream_url(mut self, url: String) -> Self {
        self.stream_url = Some(url);
        self
    }

    /// Set HTTP base override
    #[must_use]
    pub fn with_http_base(mut self, base: String) -> Self {
        self.http_base = Some(base);
        self
    }

    /// Set connect timeout override
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    /// Set attempt timeout override
    #[must_use]
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Set lines per page override
    #[must_use]
    pub fn with_lines_per_page(mut self, lines: usize) -> Self {
        self.lines_per_page = Some(lines);
        self
    }

    /// Whether any override is set
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategy.is_none()
            && self.stream_url.is_none()
            && self.http_base.is_none()
            && self.connect_timeout_ms.is_none()
            && self.timeout_ms.is_none()
            && self.lines_per_page.is_none()
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut AuditorConfig) {
        if !self.is_empty() {
            config.source = ConfigSource::Cli;
        }

        if let Some(strategy) = self.strategy {
            config.transport.strategy = strategy;
        }
        if let Some(ref url) = self.stream_url {
            config.transport.stream_url = non_empty(url);
        }
        if let Some(ref base) = self.http_base {
            config.transport.http_base.clone_from(base);
        }
        if let Some(timeout) = self.connect_timeout_ms {
            config.transport.connect_timeout_ms = timeout;
        }
        if let Some(timeout) = self.timeout_ms {
            config.session_timeout = Duration::from_millis(timeout);
        }
        if let Some(lines) = self.lines_per_page {
            config.export.lines_per_page = lines;
        }
    }
}
