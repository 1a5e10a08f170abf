//! Tabular Export
//!
//! CSV with header `Category,Score,Issues`, one row per category in display
//! order. Scores are plain numbers or `N/A`; issues are joined with `"; "`.
//! Quoting follows RFC 4180 and records end with CRLF.

use crate::render::{format_number, UNAVAILABLE};
use crate::report::{AuditReport, Category};

const HEADER: [&str; 3] = ["Category", "Score", "Issues"];

/// Render the report as CSV
#[must_use]
pub fn to_csv(report: &AuditReport) -> String {
    let mut out = String::new();
    push_record(&mut out, &HEADER);

    for category in Category::ALL {
        let result = report.category(category);
        let score = result
            .and_then(|r| r.score())
            .filter(|s| s.is_finite())
            .map_or_else(|| UNAVAILABLE.to_string(), format_number);
        let issues = result.map(|r| r.issues().join("; ")).unwrap_or_default();

        push_record(&mut out, &[category.title(), score.as_str(), issues.as_str()]);
    }
    out
}

fn push_record(out: &mut String, fields: &[&str]) {
    let record: Vec<String> = fields.iter().map(|field| quote(field)).collect();
    out.push_str(&record.join(","));
    out.push_str("\r\n");
}

/// Quote a field when it contains a delimiter, quote or line break
fn quote(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
