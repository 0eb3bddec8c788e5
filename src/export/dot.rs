//! Graphviz DOT export.

use std::io::{self, Write};

use super::{current_version, ExportData, Exporter};
use crate::graph::DependencyNode;

/// DOT exporter implementation.
pub struct DotExporter;

impl DotExporter {
    /// Escape a value for use inside a double-quoted DOT string.
    fn escape(value: &str) -> String {
        value.replace('\\', "\\\\").replace('"', "\\\"")
    }

    fn attributes(node: &DependencyNode) -> String {
        let mut label = Self::escape(&node.id.name);
        if let Some(version) = current_version(node) {
            label.push_str(&format!("\\n{}", Self::escape(version)));
        }

        let mut attrs = vec![format!("label=\"{}\"", label)];
        if node.is_project() {
            attrs.push("shape=box".to_string());
            attrs.push("style=bold".to_string());
        } else if node.is_vulnerable() {
            attrs.push("color=red".to_string());
            attrs.push("style=filled".to_string());
            attrs.push("fillcolor=\"#ffd6d6\"".to_string());
        } else if node.is_outdated() {
            attrs.push("color=orange".to_string());
        } else if node.is_unchecked() {
            attrs.push("style=dashed".to_string());
        }
        attrs.join(", ")
    }
}

impl Exporter for DotExporter {
    fn export<W: Write>(&self, data: &ExportData, writer: &mut W) -> io::Result<()> {
        writeln!(writer, "digraph dependencies {{")?;
        for warning in data.warnings {
            writeln!(writer, "    // warning [{}]: {}", warning.label(), warning.to_string().replace('\n', " "))?;
        }
        writeln!(writer, "    rankdir=LR;")?;
        writeln!(writer, "    node [shape=ellipse];")?;

        for node in data.graph.nodes() {
            writeln!(
                writer,
                "    \"{}\" [{}];",
                Self::escape(&node.id.to_string()),
                Self::attributes(node)
            )?;
        }
        for (from, to, edge) in data.graph.edges() {
            write!(writer, "    \"{}\" -> \"{}\"", Self::escape(&from.to_string()), Self::escape(&to.to_string()))?;
            if edge.requirement.is_empty() {
                writeln!(writer, ";")?;
            } else {
                writeln!(writer, " [label=\"{}\"];", Self::escape(&edge.requirement))?;
            }
        }
        writeln!(writer, "}}")
    }
}
