//! Audit Request
//!
//! The immutable value submitted to the remote service. A request can only be
//! built through [`AuditRequest::new`], which trims the URL and rejects empty
//! input; nothing else about the URL is validated here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AuditError;

/// Device profile the remote service audits for
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditMode {
    /// Desktop browser profile
    #[default]
    Desktop,
    /// Mobile browser profile
    Mobile,
}

impl AuditMode {
    /// Wire name of the mode
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Desktop => "desktop",
            Self::Mobile => "mobile",
        }
    }
}

impl fmt::Display for AuditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditMode {
    type Err = AuditError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "mobile" => Ok(Self::Mobile),
            other => Err(AuditError::Validation(format!(
                "unknown mode '{other}' (expected desktop or mobile)"
            ))),
        }
    }
}

/// A validated audit submission
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRequest {
    url: String,
    mode: AuditMode,
}

impl AuditRequest {
    /// Build a request from raw user input
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::Validation`] if the URL is empty after trimming.
    pub fn new(url: &str, mode: AuditMode) -> Result<Self, AuditError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(AuditError::Validation("URL required".to_string()));
        }
        Ok(Self {
            url: url.to_string(),
            mode,
        })
    }

    /// Target URL (trimmed)
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Requested mode
    #[must_use]
    pub fn mode(&self) -> AuditMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_trims_url() {
        let request = AuditRequest::new("  example.com \n", AuditMode::Mobile).unwrap();
        assert_eq!(request.url(), "example.com");
        assert_eq!(request.mode(), AuditMode::Mobile);
    }

    #[test]
    fn test_request_rejects_blank_url() {
        for input in ["", "   ", "\t\n"] {
            let result = AuditRequest::new(input, AuditMode::Desktop);
            assert!(matches!(result, Err(AuditError::Validation(_))));
        }
    }

    #[test]
    fn test_request_wire_shape() {
        let request = AuditRequest::new("example.com", AuditMode::Desktop).unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"url": "example.com", "mode": "desktop"})
        );
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("Mobile".parse::<AuditMode>().unwrap(), AuditMode::Mobile);
        assert_eq!(" desktop ".parse::<AuditMode>().unwrap(), AuditMode::Desktop);
        assert!("tablet".parse::<AuditMode>().is_err());
    }
}
