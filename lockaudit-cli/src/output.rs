//! Output formatting abstraction for text vs JSON rendering
//!
//! All subcommand output flows through [`OutputWriter`] which handles format switching.
//! This keeps format-specific logic out of command handlers entirely.
//!
//! The audit report itself ([`AuditResult`]) renders as a severity summary
//! followed by direct and bundled finding tables.

use std::io::Write;

use colored::{ColoredString, Colorize};
use serde::Serialize;

use lockaudit_core::types::Severity;
use lockaudit_scanner::{AuditResult, Finding};

use crate::cli::OutputFormat;
use crate::error::CliError;

/// Abstraction for writing CLI output in different formats.
///
/// Subcommand handlers call `writer.render(&payload)` where `payload`
/// implements both `Serialize` (for JSON) and `Render` (for text).
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    /// Create a new output writer with the specified format.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), CliError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(payload, &mut handle)
    }

    /// Render a payload to an arbitrary writer.
    ///
    /// For `Text` format, delegates to `Render::render_text()`.
    /// For `Json` format, serialises via `serde_json`.
    pub fn render_to<T: Render + Serialize>(
        &self,
        payload: &T,
        w: &mut dyn Write,
    ) -> Result<(), CliError> {
        match self.format {
            OutputFormat::Text => payload.render_text(w)?,
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Trait for human-readable text rendering.
///
/// Implemented by every CLI output payload alongside `serde::Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

fn colored_severity(severity: Severity) -> ColoredString {
    let label = severity.to_string();
    match severity {
        Severity::Critical => label.red().bold(),
        Severity::High => label.red(),
        Severity::Medium => label.yellow(),
        Severity::Low => label.normal(),
        Severity::None | Severity::Unknown => label.dimmed(),
    }
}

fn advisory_label(finding: &Finding) -> String {
    match finding.record.cve_id() {
        Some(cve) => format!("{} ({cve})", finding.record.id),
        None => finding.record.id.clone(),
    }
}

fn write_table(w: &mut dyn Write, findings: &[Finding], show_path: bool) -> std::io::Result<()> {
    writeln!(
        w,
        "{:<10} {:<6} {:<35} {:<40} Fixed",
        "Severity", "Score", "Package", "Advisory"
    )?;
    writeln!(w, "{}", "-".repeat(100))?;

    for finding in findings {
        let score = finding
            .base_score
            .map(|s| format!("{s:.1}"))
            .unwrap_or_else(|| "-".to_owned());
        // 색상 코드가 폭 계산에 섞이지 않도록 먼저 패딩
        let severity = format!("{:<10}", finding.severity.to_string());
        let severity = match finding.severity {
            s @ (Severity::Critical | Severity::High | Severity::Medium) => {
                severity.replace(&s.to_string(), &colored_severity(s).to_string())
            }
            _ => severity,
        };
        writeln!(
            w,
            "{} {:<6} {:<35} {:<40} {}",
            severity,
            score,
            finding.package.to_string(),
            advisory_label(finding),
            finding.fixed_version.as_deref().unwrap_or("N/A")
        )?;

        if let Some(summary) = &finding.record.summary {
            writeln!(w, "{:<18}{}", "", summary.dimmed())?;
        }
        if show_path && let Some(path) = &finding.path {
            let rendered: Vec<String> = path.iter().map(ToString::to_string).collect();
            writeln!(w, "{:<18}path: {}", "", rendered.join(" > "))?;
            if let Some(root) = finding.root() {
                writeln!(
                    w,
                    "{:<18}update {} ({} dependency) to pull in a fixed {}",
                    "",
                    root.name.bold(),
                    finding.category(),
                    finding.package.name
                )?;
            }
        }
    }
    Ok(())
}

impl Render for AuditResult {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "Audit: {}", self.source.bold())?;
        writeln!(w, "Ecosystem: {}", self.ecosystem)?;
        writeln!(w, "Total packages: {}", self.total_packages)?;
        writeln!(w)?;

        let counts = &self.counts;
        let summary = format!(
            "{} total (C:{} H:{} M:{} L:{} N:{} U:{})",
            counts.total(),
            counts.critical,
            counts.high,
            counts.medium,
            counts.low,
            counts.none,
            counts.unknown
        );
        if counts.total() > 0 {
            writeln!(w, "Vulnerabilities: {}", summary.red().bold())?;
        } else {
            writeln!(w, "Vulnerabilities: {}", summary.green().bold())?;
        }

        for warning in &self.warnings {
            writeln!(w, "{} {}", "warning:".yellow().bold(), warning)?;
        }
        writeln!(w)?;

        if !self.has_findings() {
            writeln!(w, "{}", "No vulnerabilities found.".green())?;
            return Ok(());
        }

        if !self.direct.is_empty() {
            writeln!(w, "{} ({})", "Direct dependencies".bold(), self.direct.len())?;
            write_table(w, &self.direct, false)?;
            writeln!(w)?;
        }

        if !self.bundled.is_empty() {
            writeln!(w, "{} ({})", "Bundled dependencies".bold(), self.bundled.len())?;
            write_table(w, &self.bundled, true)?;
        }

        Ok(())
    }
}
