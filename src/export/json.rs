//! JSON export implementation.
//!
//! Exports the enriched graph in JSON format for machine-readable output.

use serde::Serialize;
use std::collections::HashSet;
use std::io::{self, Write};

use super::{latest_version, matching_advisories, ExportData, Exporter, ReportFilter};
use crate::diagnostics::Warning;
use crate::graph::{DependencyNode, NodeKind};
use crate::parser::types::{DependencyKind, PackageId};
use crate::registry::Severity;

/// JSON exporter implementation.
pub struct JsonExporter;

/// Serializable advisory for JSON output.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonAdvisory {
    id: String,
    severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<String>,
    fixed_versions: Vec<String>,
}

/// Serializable node for JSON output.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonNode {
    identity: String,
    ecosystem: String,
    declared_range: Option<String>,
    resolved_version: Option<String>,
    latest_version: Option<String>,
    advisories: Vec<JsonAdvisory>,
    outdated: bool,
    vulnerable: bool,
    severity: Option<Severity>,
    enrichment: &'static str,
    kind: NodeKind,
}

/// Serializable edge for JSON output.
#[derive(Serialize)]
struct JsonEdge {
    from: String,
    to: String,
    kind: DependencyKind,
    requirement: String,
}

/// Serializable cycle info for JSON output.
#[derive(Serialize)]
struct JsonCycle {
    packages: Vec<String>,
    path: String,
}

/// Root JSON export structure.
#[derive(Serialize)]
struct JsonExport<'a> {
    nodes: Vec<JsonNode>,
    edges: Vec<JsonEdge>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    cycles: Vec<JsonCycle>,
    warnings: &'a [Warning],
}

impl JsonExporter {
    fn node(node: &DependencyNode) -> JsonNode {
        let status = node.status();
        JsonNode {
            identity: node.id.to_string(),
            ecosystem: node.id.ecosystem.to_string(),
            declared_range: node.declared_range(),
            resolved_version: node.resolved.clone(),
            latest_version: latest_version(node).map(str::to_string),
            advisories: matching_advisories(node)
                .into_iter()
                .map(|a| JsonAdvisory {
                    id: a.id.clone(),
                    severity: a.severity,
                    summary: a.summary.clone(),
                    fixed_versions: a.fixed_versions().into_iter().map(str::to_string).collect(),
                })
                .collect(),
            outdated: node.is_outdated(),
            vulnerable: node.is_vulnerable(),
            severity: status.and_then(|s| s.severity),
            enrichment: match (node.kind, node.enrichment()) {
                (NodeKind::Project, _) => "project",
                (_, Some(enrichment)) => enrichment.label(),
                (_, None) => "unchecked",
            },
            kind: node.kind,
        }
    }
}

impl Exporter for JsonExporter {
    fn export<W: Write>(&self, data: &ExportData, writer: &mut W) -> io::Result<()> {
        let selected: Vec<&DependencyNode> = match data.filter {
            ReportFilter::All => data.graph.nodes(),
            _ => data.packages(),
        };
        let included: HashSet<&PackageId> = selected.iter().map(|n| &n.id).collect();

        let edges: Vec<JsonEdge> = data
            .graph
            .edges()
            .into_iter()
            .filter(|(from, to, _)| included.contains(from) && included.contains(to))
            .map(|(from, to, edge)| JsonEdge {
                from: from.to_string(),
                to: to.to_string(),
                kind: edge.kind,
                requirement: edge.requirement.clone(),
            })
            .collect();

        let cycles: Vec<JsonCycle> = data
            .graph
            .detect_cycles()
            .iter()
            .filter(|c| c.nodes.iter().all(|id| included.contains(id)))
            .map(|c| JsonCycle {
                packages: c.nodes.iter().map(ToString::to_string).collect(),
                path: c.cycle_path(),
            })
            .collect();

        let export = JsonExport {
            nodes: selected.into_iter().map(Self::node).collect(),
            edges,
            cycles,
            warnings: data.warnings,
        };

        let json = serde_json::to_string_pretty(&export).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        writeln!(writer, "{}", json)
    }
}
