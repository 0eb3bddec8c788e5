//! Markdown export implementation.
//!
//! Exports an update summary in Markdown format for documentation and reporting.

use std::io::{self, Write};

use super::{check_gap, current_version, latest_version, matching_advisories, update_note, ExportData, Exporter};
use crate::graph::DependencyNode;

/// Markdown exporter implementation.
pub struct MarkdownExporter;

impl MarkdownExporter {
    /// Escape pipes so cell text cannot break the table.
    fn cell(value: &str) -> String {
        value.replace('|', "\\|")
    }

    fn status(node: &DependencyNode) -> String {
        let mut parts = Vec::new();
        let advisories = matching_advisories(node);
        if node.is_vulnerable() {
            let ids: Vec<&str> = advisories.iter().map(|a| a.id.as_str()).collect();
            let severity = node.status().and_then(|s| s.severity).unwrap_or_default();
            parts.push(format!("vulnerable ({}): {}", severity, ids.join(", ")));
        }
        if let Some(note) = update_note(node) {
            parts.push(note.to_string());
        }
        if let Some(gap) = check_gap(node) {
            parts.push(gap);
        }
        if parts.is_empty() {
            "up to date".to_string()
        } else {
            parts.join("; ")
        }
    }
}

impl Exporter for MarkdownExporter {
    fn export<W: Write>(&self, data: &ExportData, writer: &mut W) -> io::Result<()> {
        // Title
        writeln!(writer, "# Dependency Update Report")?;
        writeln!(writer)?;

        // Summary section
        writeln!(writer, "## Summary")?;
        writeln!(writer)?;
        writeln!(writer, "| Metric | Count |")?;
        writeln!(writer, "|--------|-------|")?;
        writeln!(writer, "| Packages | {} |", data.graph.package_count())?;
        writeln!(writer, "| Vulnerable | {} |", data.vulnerable_count())?;
        writeln!(writer, "| Outdated | {} |", data.outdated_count())?;
        writeln!(writer, "| Could not check | {} |", data.unchecked_count())?;
        writeln!(writer, "| Warnings | {} |", data.warnings.len())?;
        writeln!(writer)?;

        let packages = data.packages();
        writeln!(writer, "## Packages ({}, filter: {})", packages.len(), data.filter)?;
        writeln!(writer)?;
        if packages.is_empty() {
            writeln!(writer, "_No packages match the filter._")?;
        } else {
            writeln!(writer, "| Package | Ecosystem | Declared | Current | Latest | Status |")?;
            writeln!(writer, "|---------|-----------|----------|---------|--------|--------|")?;
            for node in &packages {
                writeln!(
                    writer,
                    "| {} | {} | {} | {} | {} | {} |",
                    Self::cell(&node.id.name),
                    node.id.ecosystem,
                    Self::cell(&node.declared_range().unwrap_or_else(|| "-".to_string())),
                    Self::cell(current_version(node).unwrap_or("-")),
                    Self::cell(latest_version(node).unwrap_or("-")),
                    Self::cell(&Self::status(node))
                )?;
            }
        }
        writeln!(writer)?;

        let cycles = data.graph.detect_cycles();
        if !cycles.is_empty() {
            writeln!(writer, "## Circular Dependencies ({})", cycles.len())?;
            writeln!(writer)?;
            for cycle in &cycles {
                writeln!(writer, "- `{}`", cycle.cycle_path())?;
            }
            writeln!(writer)?;
        }

        if !data.warnings.is_empty() {
            writeln!(writer, "## Warnings ({})", data.warnings.len())?;
            writeln!(writer)?;
            for warning in data.warnings {
                writeln!(writer, "- **{}**: {}", warning.label(), warning)?;
            }
            writeln!(writer)?;
        }

        // Footer
        writeln!(writer, "---")?;
        writeln!(writer)?;
        writeln!(writer, "*Generated by deplens*")?;

        Ok(())
    }
}
