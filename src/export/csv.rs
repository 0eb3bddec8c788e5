//! CSV export implementation.
//!
//! Exports one row per package in CSV format for spreadsheet use. Warnings
//! follow the package rows as a second table.

use std::io::{self, Write};

use super::{check_gap, current_version, latest_version, ExportData, Exporter};

/// CSV exporter implementation.
pub struct CsvExporter;

impl CsvExporter {
    /// Escape a field value for CSV format.
    ///
    /// Wraps the value in quotes if it contains commas, quotes, or newlines.
    fn escape_field(value: &str) -> String {
        if value.contains(',') || value.contains('"') || value.contains('\n') {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }
}

impl Exporter for CsvExporter {
    fn export<W: Write>(&self, data: &ExportData, writer: &mut W) -> io::Result<()> {
        writeln!(
            writer,
            "identity,ecosystem,name,declared,current,latest,outdated,latest_in_range,vulnerable,severity,advisories,check"
        )?;

        for node in data.packages() {
            let status = node.status();
            let in_range = status
                .and_then(|s| s.latest_in_range)
                .map(|b| b.to_string())
                .unwrap_or_default();
            let severity = status
                .and_then(|s| s.severity)
                .map(|s| s.to_string())
                .unwrap_or_default();
            let advisories = status.map(|s| s.advisories.join(";")).unwrap_or_default();
            let check = check_gap(node).unwrap_or_else(|| "ok".to_string());

            writeln!(
                writer,
                "{},{},{},{},{},{},{},{},{},{},{},{}",
                Self::escape_field(&node.id.to_string()),
                node.id.ecosystem,
                Self::escape_field(&node.id.name),
                Self::escape_field(&node.declared_range().unwrap_or_default()),
                Self::escape_field(current_version(node).unwrap_or_default()),
                Self::escape_field(latest_version(node).unwrap_or_default()),
                node.is_outdated(),
                in_range,
                node.is_vulnerable(),
                severity,
                Self::escape_field(&advisories),
                Self::escape_field(&check)
            )?;
        }

        if !data.warnings.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "warning,detail")?;
            for warning in data.warnings {
                writeln!(
                    writer,
                    "{},{}",
                    warning.label(),
                    Self::escape_field(&warning.to_string())
                )?;
            }
        }

        Ok(())
    }
}
