//! Plain-text update summary.
//!
//! Sections depend on the filter: `all` shows every section, `outdated`
//! and `vulnerable` show their own section plus "Could not check", so a
//! missing advisory lookup is never mistaken for a clean result.

use std::io::{self, Write};

use super::{check_gap, current_version, matching_advisories, update_note, ExportData, Exporter, ReportFilter};
use crate::graph::DependencyNode;

/// Text summary exporter implementation.
pub struct SummaryExporter;

fn section<W: Write>(writer: &mut W, title: &str, lines: &[String]) -> io::Result<()> {
    writeln!(writer, "{} ({})", title, lines.len())?;
    if lines.is_empty() {
        writeln!(writer, "  (none)")?;
    }
    for line in lines {
        writeln!(writer, "  {}", line)?;
    }
    writeln!(writer)
}

fn name_and_version(node: &DependencyNode) -> String {
    match current_version(node) {
        Some(version) => format!("{} {}", node.id, version),
        None => node.id.to_string(),
    }
}

fn vulnerable_line(node: &DependencyNode) -> String {
    let severity = node.status().and_then(|s| s.severity).unwrap_or_default();
    let details: Vec<String> = matching_advisories(node)
        .iter()
        .map(|a| {
            let fixed = a.fixed_versions();
            if fixed.is_empty() {
                a.id.clone()
            } else {
                format!("{} (fixed in {})", a.id, fixed.join(", "))
            }
        })
        .collect();
    format!("{} [{}] {}", name_and_version(node), severity, details.join(", "))
}

fn outdated_line(node: &DependencyNode) -> String {
    let latest = node.status().and_then(|s| s.latest.as_deref()).unwrap_or("?");
    match update_note(node) {
        Some(note) => format!("{} → {} ({})", name_and_version(node), latest, note),
        None => format!("{} → {}", name_and_version(node), latest),
    }
}

impl Exporter for SummaryExporter {
    fn export<W: Write>(&self, data: &ExportData, writer: &mut W) -> io::Result<()> {
        let packages = data.graph.packages();
        writeln!(
            writer,
            "Checked {} package(s): {} vulnerable, {} outdated, {} could not be checked",
            packages.len(),
            data.vulnerable_count(),
            data.outdated_count(),
            data.unchecked_count()
        )?;
        writeln!(writer)?;

        let vulnerable: Vec<String> = packages
            .iter()
            .filter(|n| n.is_vulnerable())
            .map(|n| vulnerable_line(n))
            .collect();
        let outdated: Vec<String> = packages
            .iter()
            .filter(|n| n.is_outdated())
            .map(|n| outdated_line(n))
            .collect();
        let unchecked: Vec<String> = packages
            .iter()
            .filter_map(|n| check_gap(n).map(|gap| format!("{} ({})", n.id, gap)))
            .collect();
        let up_to_date: Vec<String> = packages
            .iter()
            .filter(|n| !n.is_vulnerable() && !n.is_outdated() && check_gap(n).is_none())
            .map(|n| name_and_version(n))
            .collect();

        if matches!(data.filter, ReportFilter::All | ReportFilter::Vulnerable) {
            section(writer, "Vulnerable", &vulnerable)?;
        }
        if matches!(data.filter, ReportFilter::All | ReportFilter::Outdated) {
            section(writer, "Outdated", &outdated)?;
        }
        section(writer, "Could not check", &unchecked)?;
        if data.filter == ReportFilter::All {
            section(writer, "Up to date", &up_to_date)?;
        }

        writeln!(writer, "Warnings ({})", data.warnings.len())?;
        if data.warnings.is_empty() {
            writeln!(writer, "  (none)")?;
        }
        for warning in data.warnings {
            writeln!(writer, "  [{}] {}", warning.label(), warning)?;
        }
        Ok(())
    }
}
