//! Document Export
//!
//! Paginated plain-text rendition of the report: a title block with the
//! report metadata, then one section per category with its score and issues.
//! Content is split into pages of `lines_per_page` lines; each page ends with
//! a `Page n of m` footer and pages are separated by a form feed.

use crate::render::render;
use crate::report::AuditReport;

use super::ExportOptions;

const FORM_FEED: char = '\u{c}';

/// Render the report as a paginated document
#[must_use]
pub fn to_document(report: &AuditReport, options: &ExportOptions) -> String {
    paginate(&document_lines(report, options), options.lines_per_page)
}

fn document_lines(report: &AuditReport, options: &ExportOptions) -> Vec<String> {
    let rendered = render(report);
    let summary = &rendered.summary;

    let mut lines = vec![
        options.title.clone(),
        "=".repeat(options.title.chars().count()),
        format!("URL: {}", summary.url),
        format!("Mode: {}", summary.mode),
        format!("Generated: {}", summary.generated_at),
        format!("Overall Score: {} (Grade {})", summary.score, summary.grade),
        format!("Distinct Issues: {}", summary.issue_count),
    ];

    for view in &rendered.categories {
        let title = view.category.title();
        lines.push(String::new());
        lines.push(title.to_string());
        lines.push("-".repeat(title.chars().count()));
        lines.push(format!("Score: {}", view.score));

        let issues = report
            .category(view.category)
            .map(|result| result.issues())
            .unwrap_or_default();
        if issues.is_empty() {
            lines.push("No issues".to_string());
        } else {
            lines.extend(issues.iter().map(|issue| format!("  • {issue}")));
        }
    }
    lines
}

fn paginate(lines: &[String], lines_per_page: usize) -> String {
    let pages: Vec<&[String]> = lines.chunks(lines_per_page.max(1)).collect();
    let total = pages.len();

    pages
        .iter()
        .enumerate()
        .map(|(index, page)| {
            let mut text = page.join("\n");
            text.push_str(&format!("\n\nPage {} of {total}\n", index + 1));
            text
        })
        .collect::<Vec<_>>()
        .join(&FORM_FEED.to_string())
}
