//! Audit Report
//!
//! The terminal payload of a successful audit. The remote service owns the
//! schema and may add, drop or reshape fields at any time, so parsing is
//! total over any JSON object:
//!
//! - the five category keys become [`CategoryResult`]s when they hold objects
//!   (anything else counts as absent)
//! - an `error` field marks a remote-side failure
//! - every other key (`url`, `mode`, `timestamp`, `issues`, unknown keys) is
//!   kept as metadata
//!
//! A missing category and a category with no metrics behave identically.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Audit categories, in display order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Aggregate score and run statistics
    Overall,
    /// Load timing and page weight
    Performance,
    /// Search engine optimisation
    Seo,
    /// TLS, headers and mixed content
    Security,
    /// Assistive technology support
    Accessibility,
}

impl Category {
    /// All categories in display order
    pub const ALL: [Category; 5] = [
        Self::Overall,
        Self::Performance,
        Self::Seo,
        Self::Security,
        Self::Accessibility,
    ];

    /// Key of the category in the report object
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Self::Overall => "overall",
            Self::Performance => "performance",
            Self::Seo => "seo",
            Self::Security => "security",
            Self::Accessibility => "accessibility",
        }
    }

    /// Human-readable title
    #[must_use]
    pub fn title(&self) -> &'static str {
        match self {
            Self::Overall => "Overview",
            Self::Performance => "Performance",
            Self::Seo => "SEO",
            Self::Security => "Security",
            Self::Accessibility => "Accessibility",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for Category {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|c| c.key() == s).ok_or(())
    }
}

/// Metrics reported for one category
///
/// An open mapping of metric name to value. Accessors never fail; a field
/// of the wrong type reads as missing.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryResult {
    fields: Map<String, Value>,
}

impl CategoryResult {
    /// Wrap a raw metrics object
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Category score (0-100), if numeric
    #[must_use]
    pub fn score(&self) -> Option<f64> {
        self.fields.get("score").and_then(Value::as_f64)
    }

    /// Issues reported for the category, in service order
    ///
    /// Non-string entries are skipped.
    #[must_use]
    pub fn issues(&self) -> Vec<String> {
        self.fields
            .get("issues")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Raw value of a named metric
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Whether the category carries no fields at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A completed audit report
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>", into = "Map<String, Value>")]
pub struct AuditReport {
    categories: BTreeMap<Category, CategoryResult>,
    error: Option<String>,
    metadata: Map<String, Value>,
}

impl AuditReport {
    /// Parse a report from an arbitrary JSON value
    ///
    /// Returns `None` when the value is not an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self::from(map)),
            _ => None,
        }
    }

    /// Result for a category, if the service reported one
    #[must_use]
    pub fn category(&self, category: Category) -> Option<&CategoryResult> {
        self.categories.get(&category)
    }

    /// Remote-side failure message carried in the payload
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Raw top-level metadata value
    #[must_use]
    pub fn metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Top-level metadata value as text
    #[must_use]
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// Distinct issues across every category, sorted
    #[must_use]
    pub fn distinct_issues(&self) -> BTreeSet<String> {
        self.categories
            .values()
            .flat_map(CategoryResult::issues)
            .collect()
    }
}

impl From<Map<String, Value>> for AuditReport {
    fn from(map: Map<String, Value>) -> Self {
        let mut report = Self::default();
        for (key, value) in map {
            if key == "error" {
                report.error = match value {
                    Value::Null => None,
                    Value::String(message) => Some(message),
                    other => Some(other.to_string()),
                };
                continue;
            }
            match (key.parse::<Category>(), value) {
                (Ok(category), Value::Object(fields)) => {
                    report
                        .categories
                        .insert(category, CategoryResult::new(fields));
                }
                (_, value) => {
                    report.metadata.insert(key, value);
                }
            }
        }
        report
    }
}

impl From<AuditReport> for Map<String, Value> {
    fn from(report: AuditReport) -> Self {
        let mut map = report.metadata;
        for (category, result) in report.categories {
            map.insert(category.key().to_string(), Value::Object(result.fields));
        }
        if let Some(error) = report.error {
            map.insert("error".to_string(), Value::String(error));
        }
        map
    }
}
