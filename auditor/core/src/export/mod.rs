//! Report Export
//!
//! Stateless transforms from the stored report to text:
//! - [`tabular`]: CSV, one row per category
//! - [`document`]: paginated plain-text document
//! - JSON: the raw report, pretty-printed
//!
//! Every transform is deterministic: no clock, no randomness. Timestamps come
//! from the report's own metadata. Without a stored report every transform
//! is rejected with [`ExportError::NoReport`].

pub mod document;
pub mod tabular;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::report::AuditReport;

/// Default lines per document page
pub const DEFAULT_LINES_PER_PAGE: usize = 50;

/// Default document title
pub const DEFAULT_TITLE: &str = "Website Audit Report";

/// Errors from export transforms
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ExportError {
    /// No successful audit has stored a report
    #[error("No audit report to export; run an audit first")]
    NoReport,

    /// The report could not be serialized
    #[error("Failed to serialize report: {0}")]
    Serialization(String),
}

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Comma-separated table
    Csv,
    /// Paginated plain-text document
    Document,
    /// Raw report as JSON
    Json,
}

impl ExportFormat {
    /// Conventional file extension
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Document => "txt",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Csv => "csv",
            Self::Document => "document",
            Self::Json => "json",
        })
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" | "table" | "tabular" => Ok(Self::Csv),
            "doc" | "document" | "txt" | "text" => Ok(Self::Document),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown export format '{other}'")),
        }
    }
}

/// Export options
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    /// Content lines per document page (footer excluded)
    pub lines_per_page: usize,
    /// Document title
    pub title: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            lines_per_page: DEFAULT_LINES_PER_PAGE,
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl ExportOptions {
    /// Set lines per page
    #[must_use]
    pub fn with_lines_per_page(mut self, lines: usize) -> Self {
        self.lines_per_page = lines;
        self
    }
}

/// Export the stored report in `format`
///
/// # Errors
///
/// - [`ExportError::NoReport`] when `report` is `None`
/// - [`ExportError::Serialization`] if JSON encoding fails
pub fn export(
    report: Option<&AuditReport>,
    format: ExportFormat,
    options: &ExportOptions,
) -> Result<String, ExportError> {
    let report = report.ok_or(ExportError::NoReport)?;
    match format {
        ExportFormat::Csv => Ok(tabular::to_csv(report)),
        ExportFormat::Document => Ok(document::to_document(report, options)),
        ExportFormat::Json => serde_json::to_string_pretty(report)
            .map(|mut text| {
                text.push('\n');
                text
            })
            .map_err(|e| ExportError::Serialization(e.to_string())),
    }
}
