//! Output formatting for per-package coverage diffs.

use std::fmt::Write;

use crate::diff::{CoverageDiff, DiffRow, Direction};

/// A diff plus what the title needs to say about it.
pub struct DiffReport<'a> {
    pub diff: &'a CoverageDiff,
    /// Monorepo folder the packages live in.
    pub folder: &'a str,
    /// Branch the pull request merges into.
    pub base_branch: &'a str,
}

impl DiffReport<'_> {
    /// Format using a specific formatter.
    #[must_use]
    pub fn format(&self, formatter: &dyn ReportFormatter) -> String {
        formatter.format(self)
    }
}

/// Trait for formatting diff reports.
pub trait ReportFormatter {
    /// Format the report to a string.
    fn format(&self, report: &DiffReport<'_>) -> String;
}

/// Output format for the rendered report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    #[default]
    Markdown,
    Text,
}

impl ReportFormat {
    pub fn formatter(self) -> &'static dyn ReportFormatter {
        match self {
            ReportFormat::Markdown => &MarkdownFormatter,
            ReportFormat::Text => &TextFormatter,
        }
    }
}

/// Hidden marker identifying this tool's comment. `scope` is the full
/// monorepo base path or a user-chosen app name.
#[must_use]
pub fn comment_marker(scope: &str) -> String {
    format!("<!-- monocov-{scope} -->")
}

/// Signed delta with a direction glyph, or `N/A` without a baseline.
#[must_use]
pub fn format_delta(row: &DiffRow) -> String {
    let Some(delta) = row.delta_pct else {
        return "N/A".to_string();
    };
    match row.direction() {
        Direction::Regression => format!("❌ ▾ {delta:.2}%"),
        Direction::Improvement => format!("✅ ▴ +{delta:.2}%"),
        Direction::Neutral => format!("{:.2}%", delta.abs()),
    }
}

fn breach_warning(diff: &CoverageDiff) -> Option<String> {
    if diff.breach_count == 0 {
        return None;
    }
    let count = diff.breach_count;
    let noun = if count == 1 { "package" } else { "packages" };
    let threshold = diff.threshold;
    Some(format!(
        "{count} {noun} dropped by more than {threshold} percentage points"
    ))
}

/// Plain text formatter.
pub struct TextFormatter;

impl ReportFormatter for TextFormatter {
    fn format(&self, report: &DiffReport<'_>) -> String {
        let mut out = String::new();
        writeln!(
            out,
            "Coverage for the {} folder after merging into {}",
            report.folder, report.base_branch
        )
        .unwrap();

        if report.diff.rows.is_empty() {
            out.push_str("No packages with coverage found.\n");
            return out;
        }

        out.push('\n');
        let width = report
            .diff
            .rows
            .iter()
            .map(|r| r.package_name.len())
            .max()
            .unwrap_or(0)
            .max("PACKAGE".len());
        writeln!(out, "{:<width$} {:>9}  DELTA", "PACKAGE", "COVERAGE").unwrap();
        for row in &report.diff.rows {
            let name = &row.package_name;
            let pct = row.current_pct;
            let delta = format_delta(row);
            writeln!(out, "{name:<width$} {pct:>8.2}%  {delta}").unwrap();
        }

        if let Some(warning) = breach_warning(report.diff) {
            writeln!(out, "\nWarning: {warning}").unwrap();
        }
        out
    }
}

/// Markdown formatter.
pub struct MarkdownFormatter;

impl ReportFormatter for MarkdownFormatter {
    fn format(&self, report: &DiffReport<'_>) -> String {
        let mut md = String::new();
        writeln!(
            md,
            "### Coverage for the **{}** folder after merging into **{}**\n",
            report.folder, report.base_branch
        )
        .unwrap();

        if report.diff.rows.is_empty() {
            md.push_str("No packages with coverage found.\n");
        } else {
            md.push_str("| Package | Coverage | Δ |\n");
            md.push_str("|:--------|---------:|--:|\n");
            for row in &report.diff.rows {
                let name = &row.package_name;
                let pct = row.current_pct;
                let delta = format_delta(row);
                writeln!(md, "| `{name}` | {pct:.2}% | {delta} |").unwrap();
            }
        }

        if let Some(warning) = breach_warning(report.diff) {
            writeln!(md, "\n> ⚠️ **Warning:** {warning}").unwrap();
        }

        md.push_str("\n<sub>monocov</sub>\n");
        md
    }
}
