//! Report Rendering
//!
//! Turns an [`AuditReport`] into a summary view plus one view per category.
//! Rendering is total: every field access degrades to the [`UNAVAILABLE`]
//! sentinel when the field is missing, null, the literal `"N/A"`, or of an
//! unexpected type. The remote schema may evolve; rendering must not fail.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::report::{AuditReport, Category, CategoryResult};

/// Sentinel shown for any value that is missing or unreadable
pub const UNAVAILABLE: &str = "N/A";

/// Placeholder shown when a category reports no issues
pub const NO_ISSUES: &str = "No issues found";

/// How a metric value is formatted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum MetricFormat {
    Plain,
    Percent,
    Seconds,
    Millis,
    Kilobytes,
    Chars,
    Bits,
    Days,
    SecureFlag,
    MixedContent,
}

/// One entry of a category's fixed metric schema
#[derive(Clone, Copy, Debug)]
struct MetricSpec {
    key: &'static str,
    label: &'static str,
    format: MetricFormat,
}

const fn metric(key: &'static str, label: &'static str, format: MetricFormat) -> MetricSpec {
    MetricSpec { key, label, format }
}

const OVERALL_METRICS: &[MetricSpec] = &[
    metric("response_time", "Response Time", MetricFormat::Millis),
    metric("pages_scanned", "Pages Scanned", MetricFormat::Plain),
    metric("audit_duration", "Audit Duration", MetricFormat::Seconds),
    metric("uptime", "Uptime", MetricFormat::Plain),
    metric("error_rate", "Error Rate", MetricFormat::Plain),
    metric("grade", "Grade", MetricFormat::Plain),
];

const PERFORMANCE_METRICS: &[MetricSpec] = &[
    metric("lcp_s", "Largest Contentful Paint", MetricFormat::Seconds),
    metric("fcp_s", "First Contentful Paint", MetricFormat::Seconds),
    metric("cls", "Cumulative Layout Shift", MetricFormat::Plain),
    metric("tti", "Time to Interactive", MetricFormat::Seconds),
    metric("fid", "First Input Delay", MetricFormat::Millis),
    metric("page_size", "Page Size", MetricFormat::Kilobytes),
    metric("requests_count", "Requests", MetricFormat::Plain),
];

const SEO_METRICS: &[MetricSpec] = &[
    metric("title", "Title", MetricFormat::Plain),
    metric("meta_desc_length", "Meta Description", MetricFormat::Chars),
    metric("keyword_density", "Keyword Density", MetricFormat::Plain),
    metric("backlinks", "Backlinks", MetricFormat::Plain),
    metric("page_depth", "Page Depth", MetricFormat::Plain),
    metric("internal_links", "Internal Links", MetricFormat::Plain),
];

const SECURITY_METRICS: &[MetricSpec] = &[
    metric("ssl_valid", "SSL Certificate", MetricFormat::SecureFlag),
    metric("encryption_strength", "Encryption", MetricFormat::Bits),
    metric("security_headers", "Security Headers", MetricFormat::Plain),
    metric("vulnerabilities", "Vulnerabilities", MetricFormat::Plain),
    metric("certificate_expiry", "Certificate Expiry", MetricFormat::Days),
    metric("mixed_content", "Mixed Content", MetricFormat::MixedContent),
];

const ACCESSIBILITY_METRICS: &[MetricSpec] = &[
    metric("contrast_ratio", "Contrast Ratio", MetricFormat::Plain),
    metric("alt_text_coverage", "Alt Text Coverage", MetricFormat::Percent),
    metric("keyboard_nav", "Keyboard Navigation", MetricFormat::Plain),
    metric("screen_reader", "Screen Reader", MetricFormat::Plain),
    metric("color_blind_compatibility", "Color Blind Compatibility", MetricFormat::Plain),
    metric("aria_usage", "ARIA Usage", MetricFormat::Percent),
];

fn schema(category: Category) -> &'static [MetricSpec] {
    match category {
        Category::Overall => OVERALL_METRICS,
        Category::Performance => PERFORMANCE_METRICS,
        Category::Seo => SEO_METRICS,
        Category::Security => SECURITY_METRICS,
        Category::Accessibility => ACCESSIBILITY_METRICS,
    }
}

/// One rendered metric
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MetricView {
    /// Report key
    pub key: &'static str,
    /// Display label
    pub label: &'static str,
    /// Formatted value or the sentinel
    pub value: String,
}

/// One rendered category
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CategoryView {
    /// Which category
    pub category: Category,
    /// Formatted score (`"82%"`) or the sentinel
    pub score: String,
    /// Metrics in schema order
    pub metrics: Vec<MetricView>,
    /// Issues, or a single placeholder
    pub issues: Vec<String>,
}

/// Headline view of the whole report
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SummaryView {
    /// Audited URL
    pub url: String,
    /// Audit mode
    pub mode: String,
    /// When the service produced the report
    pub generated_at: String,
    /// Overall score
    pub score: String,
    /// Letter grade
    pub grade: String,
    /// Distinct issues across categories
    pub issue_count: usize,
}

/// Complete rendering of a report
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RenderedReport {
    /// Headline view
    pub summary: SummaryView,
    /// One view per category, in display order
    pub categories: Vec<CategoryView>,
}

impl RenderedReport {
    /// View for a category
    #[must_use]
    pub fn category(&self, category: Category) -> Option<&CategoryView> {
        self.categories.iter().find(|v| v.category == category)
    }
}

/// Render a report
#[must_use]
pub fn render(report: &AuditReport) -> RenderedReport {
    let empty = CategoryResult::default();
    let categories = Category::ALL
        .into_iter()
        .map(|category| render_category(category, report.category(category).unwrap_or(&empty)))
        .collect();

    RenderedReport {
        summary: render_summary(report),
        categories,
    }
}

fn render_category(category: Category, result: &CategoryResult) -> CategoryView {
    let metrics = schema(category)
        .iter()
        .map(|spec| MetricView {
            key: spec.key,
            label: spec.label,
            value: result
                .metric(spec.key)
                .and_then(|value| format_metric(value, spec.format))
                .unwrap_or_else(|| UNAVAILABLE.to_string()),
        })
        .collect();

    let mut issues = result.issues();
    if issues.is_empty() {
        issues.push(NO_ISSUES.to_string());
    }

    CategoryView {
        category,
        score: format_score(result.score()),
        metrics,
        issues,
    }
}

fn render_summary(report: &AuditReport) -> SummaryView {
    let overall = report.category(Category::Overall);
    let score = overall.and_then(CategoryResult::score);

    let grade = overall
        .and_then(|o| o.metric("grade"))
        .and_then(Value::as_str)
        .filter(|g| !g.is_empty() && *g != UNAVAILABLE)
        .map(str::to_string)
        .or_else(|| score.map(|s| grade_for(s).to_string()))
        .unwrap_or_else(|| UNAVAILABLE.to_string());

    SummaryView {
        url: text_or_sentinel(report.metadata_str("url")),
        mode: text_or_sentinel(report.metadata_str("mode")),
        generated_at: report
            .metadata_str("timestamp")
            .map(format_timestamp)
            .unwrap_or_else(|| UNAVAILABLE.to_string()),
        score: format_score(score),
        grade,
        issue_count: report.distinct_issues().len(),
    }
}

/// Letter grade for a score, using the service's thresholds
#[must_use]
pub fn grade_for(score: f64) -> &'static str {
    match score {
        s if s >= 90.0 => "A",
        s if s >= 80.0 => "B",
        s if s >= 70.0 => "C",
        s if s >= 60.0 => "D",
        _ => "F",
    }
}

/// Format a score as a percentage, or the sentinel
#[must_use]
pub fn format_score(score: Option<f64>) -> String {
    score
        .filter(|s| s.is_finite())
        .map(|s| format!("{}%", format_number(s)))
        .unwrap_or_else(|| UNAVAILABLE.to_string())
}

fn format_metric(value: &Value, format: MetricFormat) -> Option<String> {
    match (format, value) {
        (MetricFormat::SecureFlag, Value::Bool(true)) => Some("✅ Secure".to_string()),
        (MetricFormat::SecureFlag, Value::Bool(false)) => Some("❌ Insecure".to_string()),
        (MetricFormat::MixedContent, Value::Bool(true)) => Some("⚠️ Detected".to_string()),
        (MetricFormat::MixedContent, Value::Bool(false)) => Some("✅ None".to_string()),
        (MetricFormat::SecureFlag | MetricFormat::MixedContent, _) => None,

        (_, Value::String(text)) => {
            let text = text.trim();
            (!text.is_empty() && text != UNAVAILABLE).then(|| text.to_string())
        }
        (MetricFormat::Plain, Value::Bool(flag)) => {
            Some(if *flag { "Yes" } else { "No" }.to_string())
        }
        (format, Value::Number(number)) => {
            let n = format_number(number.as_f64()?);
            Some(match format {
                MetricFormat::Percent => format!("{n}%"),
                MetricFormat::Seconds => format!("{n}s"),
                MetricFormat::Millis => format!("{n} ms"),
                MetricFormat::Kilobytes => format!("{n} KB"),
                MetricFormat::Chars => format!("{n} chars"),
                MetricFormat::Bits => format!("{n}-bit"),
                MetricFormat::Days => format!("{n} days"),
                _ => n,
            })
        }
        _ => None,
    }
}

/// Integers print without a fraction; others with at most two decimals
pub(crate) fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{n:.0}")
    } else {
        let fixed = format!("{n:.2}");
        fixed.trim_end_matches('0').trim_end_matches('.').to_string()
    }
}

fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| {
            ts.with_timezone(&Utc)
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}

fn text_or_sentinel(text: Option<&str>) -> String {
    text.map(str::trim)
        .filter(|t| !t.is_empty())
        .unwrap_or(UNAVAILABLE)
        .to_string()
}

impl fmt::Display for RenderedReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.summary;
        writeln!(f, "Website Audit: {} ({})", s.url, s.mode)?;
        writeln!(f, "Generated: {}", s.generated_at)?;
        writeln!(
            f,
            "Overall Score: {}  Grade: {}  Issues: {}",
            s.score, s.grade, s.issue_count
        )?;

        for view in &self.categories {
            writeln!(f)?;
            writeln!(f, "== {} ({}) ==", view.category.title(), view.score)?;
            for metric in &view.metrics {
                writeln!(f, "  {:<26} {}", metric.label, metric.value)?;
            }
            writeln!(f, "  Issues:")?;
            for issue in &view.issues {
                writeln!(f, "    - {issue}")?;
            }
        }
        Ok(())
    }
}
