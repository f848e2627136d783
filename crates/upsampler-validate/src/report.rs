//! Report generation for validation results

use crate::batch::BatchEntry;
use crate::gate::ValidationResult;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

/// Report format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Plain text report
    Text,
    /// JSON report
    Json,
    /// Markdown report
    Markdown,
    /// JUnit XML (for CI integration)
    JUnit,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "markdown" | "md" => Ok(Self::Markdown),
            "junit" | "xml" => Ok(Self::JUnit),
            other => Err(format!("unknown report format: {}", other)),
        }
    }
}

/// Console lines for one run, in fixed order
pub fn result_lines(result: &ValidationResult) -> String {
    let metrics = result.metrics();
    let mut output = String::new();

    output.push_str(&format!("Sample rate match: {}\n", result.sample_rate_match()));
    output.push_str(&format!("Channels match: {}\n", result.channels_match()));
    output.push_str(&format!("Alignment lag (samples): {}\n", result.lag()));
    output.push_str(&format!("Correlation: {:.4}\n", metrics.correlation()));
    output.push_str(&format!(
        "Spectral similarity: {:.4}\n",
        metrics.spectral_similarity()
    ));
    output.push_str(&format!("RMS dB diff: {:.2} dB\n", metrics.rms_db_diff()));

    output
}

/// Full single-run output: metric lines, verdict, failed checks
///
/// Markdown and JUnit describe batches; a single result renders as text for them.
pub fn format_result(result: &ValidationResult, format: ReportFormat) -> String {
    match format {
        ReportFormat::Json => {
            serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".into())
        }
        _ => {
            let mut output = result_lines(result);
            output.push_str(if result.is_pass() { "PASS\n" } else { "FAIL\n" });
            for check in result.failed_checks() {
                output.push_str(&format!("  ✗ {}: {}\n", check.name, check.description));
            }
            output
        }
    }
}

/// Aggregate report over many pairs
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    /// Report title
    pub title: String,

    /// RFC 3339 creation time
    pub timestamp: String,

    /// One entry per validated pair
    pub entries: Vec<BatchEntry>,

    /// Total pairs
    pub total: usize,

    /// Pairs that passed
    pub passed: usize,

    /// Pairs that failed the gate or errored
    pub failed: usize,

    /// Pairs that could not be validated at all
    pub errors: usize,
}

impl ValidationReport {
    /// Create a new report
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            entries: Vec::new(),
            total: 0,
            passed: 0,
            failed: 0,
            errors: 0,
        }
    }

    /// Add an entry to the report
    pub fn add_entry(&mut self, entry: BatchEntry) {
        self.total += 1;
        if entry.passed() {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        if entry.error.is_some() {
            self.errors += 1;
        }
        self.entries.push(entry);
    }

    /// Check if all pairs passed
    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Get pass rate (0.0 - 1.0)
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.passed as f64 / self.total as f64
        }
    }

    /// Generate report in specified format
    pub fn generate(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Text => self.to_text(),
            ReportFormat::Json => self.to_json(),
            ReportFormat::Markdown => self.to_markdown(),
            ReportFormat::JUnit => self.to_junit(),
        }
    }

    /// Save report to file
    pub fn save<P: AsRef<Path>>(&self, path: P, format: ReportFormat) -> std::io::Result<()> {
        let content = self.generate(format);
        let mut file = std::fs::File::create(path)?;
        file.write_all(content.as_bytes())
    }

    fn to_text(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("{}\n", self.title));
        output.push_str(&format!("{}\n\n", "=".repeat(self.title.len())));

        output.push_str(&format!("Timestamp: {}\n", self.timestamp));
        output.push_str(&format!(
            "Total: {} | Passed: {} | Failed: {} | Errors: {}\n",
            self.total, self.passed, self.failed, self.errors
        ));
        output.push_str(&format!("Pass Rate: {:.1}%\n\n", self.pass_rate() * 100.0));

        output.push_str("Results:\n");
        output.push_str(&"-".repeat(80));
        output.push('\n');

        for entry in &self.entries {
            output.push_str(&format!(
                "[{}] {}: {} vs {}\n",
                entry.status(),
                entry.name,
                entry.reference,
                entry.target
            ));

            match (&entry.result, &entry.error) {
                (Some(result), _) => {
                    output.push_str(&format!(
                        "  lag {} | {}\n",
                        result.lag(),
                        result.metrics().summary()
                    ));
                    for check in result.failed_checks() {
                        output.push_str(&format!("  ✗ {}: {}\n", check.name, check.description));
                    }
                }
                (None, Some(error)) => output.push_str(&format!("  ! {}\n", error)),
                (None, None) => {}
            }
            output.push('\n');
        }

        output.push_str(&"-".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "Summary: {} pairs, {} passed, {} failed\n",
            self.total, self.passed, self.failed
        ));

        output
    }

    fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".into())
    }

    fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("# {}\n\n", self.title));
        output.push_str(&format!("**Timestamp:** {}\n\n", self.timestamp));

        let status_emoji = if self.all_passed() { "✅" } else { "❌" };
        output.push_str(&format!("## Summary {}\n\n", status_emoji));
        output.push_str("| Metric | Value |\n");
        output.push_str("|--------|-------|\n");
        output.push_str(&format!("| Total | {} |\n", self.total));
        output.push_str(&format!("| Passed | {} |\n", self.passed));
        output.push_str(&format!("| Failed | {} |\n", self.failed));
        output.push_str(&format!("| Errors | {} |\n", self.errors));
        output.push_str(&format!("| Pass Rate | {:.1}% |\n\n", self.pass_rate() * 100.0));

        output.push_str("## Results\n\n");
        output.push_str("| Pair | Status | Lag | Correlation | Spectral | RMS dB |\n");
        output.push_str("|------|--------|-----|-------------|----------|--------|\n");

        for entry in &self.entries {
            match &entry.result {
                Some(result) => {
                    let m = result.metrics();
                    output.push_str(&format!(
                        "| `{}` | {} | {} | {:.4} | {:.4} | {:.2} |\n",
                        entry.name,
                        entry.status(),
                        result.lag(),
                        m.correlation(),
                        m.spectral_similarity(),
                        m.rms_db_diff()
                    ));
                }
                None => {
                    output.push_str(&format!(
                        "| `{}` | {} | - | - | - | - |\n",
                        entry.name,
                        entry.status()
                    ));
                }
            }
        }
        output.push('\n');

        let problems: Vec<&BatchEntry> = self.entries.iter().filter(|e| !e.passed()).collect();
        if !problems.is_empty() {
            output.push_str("## Failures\n\n");
            for entry in problems {
                output.push_str(&format!("### `{}`\n\n", entry.name));
                if let Some(error) = &entry.error {
                    output.push_str(&format!("- error: {}\n", error));
                }
                if let Some(result) = &entry.result {
                    for check in result.failed_checks() {
                        output.push_str(&format!("- {}: {}\n", check.name, check.description));
                    }
                }
                output.push('\n');
            }
        }

        output
    }

    fn to_junit(&self) -> String {
        let mut output = String::new();

        output.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        output.push_str(&format!(
            "<testsuite name=\"{}\" tests=\"{}\" failures=\"{}\" errors=\"{}\" timestamp=\"{}\">\n",
            xml_escape(&self.title),
            self.total,
            self.failed - self.errors,
            self.errors,
            &self.timestamp
        ));

        for entry in &self.entries {
            output.push_str(&format!("  <testcase name=\"{}\">\n", xml_escape(&entry.name)));

            if let Some(error) = &entry.error {
                output.push_str(&format!(
                    "    <error message=\"Validation error\">{}</error>\n",
                    xml_escape(error)
                ));
            } else if let Some(result) = entry.result.as_ref().filter(|r| !r.is_pass()) {
                let mut failure_msg = String::new();
                for check in result.failed_checks() {
                    failure_msg.push_str(&format!("{}: {}\n", check.name, check.description));
                }
                output.push_str(&format!(
                    "    <failure message=\"Round trip mismatch\">{}</failure>\n",
                    xml_escape(&failure_msg)
                ));
            }

            output.push_str("  </testcase>\n");
        }

        output.push_str("</testsuite>\n");

        output
    }
}

/// Escape XML special characters
fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
