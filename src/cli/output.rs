//! Output formatting for multiple formats
//!
//! Classification, scan and verification results render as JSON, YAML or
//! human-readable text. Structured formats serialize the library types
//! directly; the human format is laid out for a terminal.
//!
//! # Example
//!
//! ```no_run
//! use packscout::cli::output::{OutputFormat, OutputFormatter};
//! use packscout::pipeline::Pipeline;
//! use packscout::BuildpackRegistry;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let pipeline = Pipeline::new(Arc::new(BuildpackRegistry::with_defaults()));
//! let detection = pipeline.detect(Path::new("."), None)?;
//! let formatter = OutputFormatter::new(OutputFormat::Json);
//! println!("{}", formatter.format_detection(&detection)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;

use crate::config::PackscoutConfig;
use crate::golden::BatchReport;
use crate::pipeline::Detection;
use crate::scan::ScanReport;

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format (human-friendly, version-control friendly)
    Yaml,
    /// Human-readable formatted text
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    fn structured<T: Serialize>(&self, value: &T, what: &str) -> Result<Option<String>> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(value)
                .with_context(|| format!("Failed to serialize {} to JSON", what))
                .map(Some),
            OutputFormat::Yaml => serde_yaml::to_string(value)
                .with_context(|| format!("Failed to serialize {} to YAML", what))
                .map(Some),
            OutputFormat::Human => Ok(None),
        }
    }

    /// Formats a classification. The human form is the bare buildpack
    /// label on the first line, then details.
    pub fn format_detection(&self, detection: &Detection) -> Result<String> {
        if let Some(out) = self.structured(detection, "detection result")? {
            return Ok(out);
        }

        let classification = &detection.classification;
        let mut output = String::new();
        writeln!(output, "{}", classification.label())?;

        if classification.ambiguous {
            writeln!(output, "\n\u{26A0} Tied candidates (score {}):", classification.score)?;
            for candidate in &classification.candidates {
                writeln!(
                    output,
                    "  - {} (priority {})",
                    candidate.name, candidate.priority
                )?;
            }
        } else if let Some(buildpack) = &classification.buildpack {
            writeln!(output, "\nScore:    {}", classification.score)?;
            writeln!(output, "Priority: {}", buildpack.priority)?;
            if !classification.matched_signals.is_empty() {
                writeln!(output, "Matched signals:")?;
                let last = classification.matched_signals.len() - 1;
                for (i, signal) in classification.matched_signals.iter().enumerate() {
                    let connector = if i == last { "\u{2514}" } else { "\u{251C}" };
                    writeln!(output, "{}\u{2500} {}", connector, signal)?;
                }
            }
        }

        push_scan_footer(&mut output, &detection.report)?;
        Ok(output)
    }

    pub fn format_scan(&self, report: &ScanReport) -> Result<String> {
        if let Some(out) = self.structured(report, "scan report")? {
            return Ok(out);
        }

        let mut output = String::new();
        writeln!(output, "Signals for {}", report.root.display())?;
        writeln!(output, "{}\n", RULE)?;

        if report.signals.is_empty() {
            writeln!(output, "(no signals)")?;
        }
        for signal in &report.signals {
            writeln!(
                output,
                "{:<10} {:<24} {}",
                signal.kind.name(),
                signal.value,
                signal.path.display()
            )?;
        }

        push_scan_footer(&mut output, report)?;
        Ok(output)
    }

    pub fn format_batch(&self, batch: &BatchReport) -> Result<String> {
        if let Some(out) = self.structured(batch, "verification report")? {
            return Ok(out);
        }

        let mut output = String::new();
        for fixture in &batch.fixtures {
            match (&fixture.result, &fixture.error) {
                (Some(result), _) if result.matched => {
                    writeln!(output, "\u{2713} {}", fixture.id)?;
                }
                (Some(result), _) => {
                    if result.golden_missing {
                        writeln!(output, "\u{2717} {} (golden missing)", fixture.id)?;
                    } else {
                        writeln!(output, "\u{2717} {}", fixture.id)?;
                    }
                    if let Some(diff) = &result.diff {
                        for line in diff.to_string().lines() {
                            writeln!(output, "    {}", line)?;
                        }
                    }
                }
                (None, Some(error)) => writeln!(output, "\u{2717} {}: {}", fixture.id, error)?,
                (None, None) => writeln!(output, "? {}", fixture.id)?,
            }
        }
        writeln!(
            output,
            "\n{}/{} fixtures match",
            batch.matched_count(),
            batch.len()
        )?;
        Ok(output)
    }

    pub fn format_config(&self, config: &PackscoutConfig) -> Result<String> {
        let config_map = config.to_display_map();
        if let Some(out) = self.structured(&config_map, "config")? {
            return Ok(out);
        }

        let mut output = String::new();
        writeln!(output, "packscout Configuration")?;
        writeln!(output, "{}\n", RULE)?;
        for (key, value) in &config_map {
            writeln!(output, "  {:<14} {}", format!("{}:", key), value)?;
        }
        Ok(output)
    }
}

fn push_scan_footer(output: &mut String, report: &ScanReport) -> Result<()> {
    if !report.omissions.is_empty() {
        writeln!(output, "\n\u{26A0} Skipped:")?;
        for omission in &report.omissions {
            writeln!(output, "  - {}: {}", omission.path.display(), omission.reason)?;
        }
    }
    if report.truncated {
        writeln!(output, "\n\u{26A0} File limit reached, scan truncated")?;
    }
    writeln!(
        output,
        "\nScanned {} files in {}ms",
        report.files_scanned, report.elapsed_ms
    )?;
    Ok(())
}
