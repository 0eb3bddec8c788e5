//! Indented tree export.
//!
//! One tree per root. Rendering uses an explicit stack, so deep or cyclic
//! graphs never recurse. A node already on the current path is printed with
//! `(cycle)` and not expanded again; a node already expanded elsewhere under
//! the same root is printed with `(*)`.

use std::collections::HashSet;
use std::io::{self, Write};

use super::{badges, current_version, ExportData, Exporter};
use crate::graph::{DependencyGraph, DependencyNode};
use crate::parser::types::PackageId;

/// Tree exporter implementation.
pub struct TreeExporter;

/// A line waiting to be printed.
struct Pending<'a> {
    node: &'a DependencyNode,
    depth: usize,
    prefix: String,
    is_last: bool,
}

fn label(node: &DependencyNode) -> String {
    let mut text = if node.is_project() {
        format!("{} ({} project)", node.id.name, node.id.ecosystem)
    } else {
        match current_version(node).map(str::to_string).or_else(|| node.declared_range()) {
            Some(version) => format!("{} {}", node.id.name, version),
            None => node.id.name.clone(),
        }
    };
    let badges = badges(node);
    if !badges.is_empty() {
        text.push_str(&format!(" [{}]", badges.join(", ")));
    }
    text
}

/// Writes the tree for one root.
///
/// Returns every identity printed, so the caller can find nodes that no
/// root reaches.
fn render_root<'a, W: Write>(
    graph: &'a DependencyGraph,
    root: &'a DependencyNode,
    writer: &mut W,
) -> io::Result<HashSet<&'a PackageId>> {
    let mut expanded: HashSet<&PackageId> = HashSet::new();
    let mut path: Vec<&PackageId> = Vec::new();
    let mut stack = vec![Pending {
        node: root,
        depth: 0,
        prefix: String::new(),
        is_last: true,
    }];

    while let Some(entry) = stack.pop() {
        path.truncate(entry.depth);
        let id = &entry.node.id;

        let (marker, expand) = if path.contains(&id) {
            (" (cycle)", false)
        } else if expanded.contains(id) {
            (" (*)", false)
        } else {
            ("", true)
        };

        if entry.depth == 0 {
            writeln!(writer, "{}{}", label(entry.node), marker)?;
        } else {
            let branch = if entry.is_last { "└── " } else { "├── " };
            writeln!(writer, "{}{}{}{}", entry.prefix, branch, label(entry.node), marker)?;
        }
        if !expand {
            continue;
        }

        expanded.insert(id);
        path.push(id);

        let child_prefix = if entry.depth == 0 {
            String::new()
        } else if entry.is_last {
            format!("{}    ", entry.prefix)
        } else {
            format!("{}│   ", entry.prefix)
        };
        let children = graph.direct_dependencies(id);
        let count = children.len();
        // pushed in reverse so the first child is printed first
        for (i, child) in children.into_iter().enumerate().rev() {
            stack.push(Pending {
                node: child,
                depth: entry.depth + 1,
                prefix: child_prefix.clone(),
                is_last: i + 1 == count,
            });
        }
    }
    Ok(expanded)
}

impl Exporter for TreeExporter {
    fn export<W: Write>(&self, data: &ExportData, writer: &mut W) -> io::Result<()> {
        let graph = data.graph;
        if graph.is_empty() {
            writeln!(writer, "(no dependencies)")?;
        }

        let mut printed: HashSet<&PackageId> = HashSet::new();
        let mut first = true;
        let mut roots: Vec<&DependencyNode> = graph.roots();
        // nodes only reachable through a cycle get a tree of their own
        let mut rest = graph.nodes().into_iter();

        loop {
            let root = if !roots.is_empty() {
                roots.remove(0)
            } else {
                match rest.by_ref().find(|n| !printed.contains(&n.id)) {
                    Some(node) => node,
                    None => break,
                }
            };
            if !root.is_project() && printed.contains(&root.id) {
                continue;
            }
            if !first {
                writeln!(writer)?;
            }
            first = false;
            printed.extend(render_root(graph, root, writer)?);
        }

        if !data.warnings.is_empty() {
            writeln!(writer)?;
            writeln!(writer, "Warnings:")?;
            for warning in data.warnings {
                writeln!(writer, "  [{}] {}", warning.label(), warning)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::EnrichedGraph;
    use crate::export::fixtures::{npm, sample};
    use crate::export::{render_to_string, ReportFilter, ReportFormat};
    use crate::graph::NodeKind;
    use crate::parser::types::DependencyKind;

    #[test]
    fn test_tree_render_sample() {
        let output = render_to_string(&sample(), ReportFormat::Tree, ReportFilter::All).unwrap();
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[0], "app (npm project)");
        assert_eq!(lines[1], "├── libx 1.2.3 [outdated → 1.5.0]");
        assert_eq!(lines[2], "│   └── liby 2.0.0 [vulnerable: high]");
        assert_eq!(lines[3], "│       └── libx 1.2.3 [outdated → 1.5.0] (cycle)");
        assert_eq!(lines[4], "├── liby 2.0.0 [vulnerable: high] (*)");
        assert_eq!(lines[5], "└── libz ^3.0.0 [unavailable]");
        assert!(output.contains("Warnings:"));
        assert!(output.contains("[registry] npm:libz: request timed out"));
    }

    #[test]
    fn test_tree_pure_cycle_terminates() {
        let mut graph = DependencyGraph::new();
        let (a, b) = (npm("a"), npm("b"));
        graph.ensure_node(&a, NodeKind::Package);
        graph.ensure_node(&b, NodeKind::Package);
        graph.add_edge(&a, &b, DependencyKind::Normal, "*");
        graph.add_edge(&b, &a, DependencyKind::Normal, "*");

        let enriched = EnrichedGraph::unenriched(graph, Vec::new());
        let output = render_to_string(&enriched, ReportFormat::Tree, ReportFilter::All).unwrap();
        assert_eq!(output.lines().collect::<Vec<_>>(), vec!["a", "└── b", "    └── a (cycle)"]);
    }

    #[test]
    fn test_tree_empty_graph() {
        let enriched = EnrichedGraph::unenriched(DependencyGraph::new(), Vec::new());
        let output = render_to_string(&enriched, ReportFormat::Tree, ReportFilter::All).unwrap();
        assert_eq!(output.trim(), "(no dependencies)");
    }

    #[test]
    fn test_tree_deep_chain() {
        let mut graph = DependencyGraph::new();
        let ids: Vec<PackageId> = (0..2_000).map(|i| npm(&format!("pkg{}", i))).collect();
        for id in &ids {
            graph.ensure_node(id, NodeKind::Package);
        }
        for pair in ids.windows(2) {
            graph.add_edge(&pair[0], &pair[1], DependencyKind::Normal, "*");
        }
        let enriched = EnrichedGraph::unenriched(graph, Vec::new());
        let output = render_to_string(&enriched, ReportFormat::Tree, ReportFilter::All).unwrap();
        assert_eq!(output.lines().count(), 2_000);
    }
}
