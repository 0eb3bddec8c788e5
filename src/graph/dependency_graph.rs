//! Dependency graph implementation using petgraph.
//!
//! Nodes are keyed by [`PackageId`] and stored in a petgraph arena; edges
//! point from the dependent (a project or package) to its dependency. Cycles
//! are allowed, and every traversal keeps a seen-set so it terminates.

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use crate::diagnostics::Warning;
use crate::parser::types::{Declaration, DependencyKind, Ecosystem, PackageId, ParsedManifest};
use crate::registry::Enrichment;
use crate::version::{classify, Classification, Comparison, Version, VersionRange};

/// Whether a node is a project read from a manifest or a package it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Project,
    Package,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Project => write!(f, "project"),
            NodeKind::Package => write!(f, "package"),
        }
    }
}

/// Represents a node in the dependency graph.
///
/// Each node holds every declaration made on its identity, the version a
/// lock file resolved it to, and, once fetched, its registry enrichment.
#[derive(Debug, Clone)]
pub struct DependencyNode {
    /// Package identity
    pub id: PackageId,
    /// Project root or package
    pub kind: NodeKind,
    /// Every declaration naming this package, direct and transitive
    pub declarations: Vec<Declaration>,
    /// Version selected by a lock file
    pub resolved: Option<String>,
    /// Intersection of all versioned declarations
    effective_range: Option<VersionRange>,
    enrichment: Option<Enrichment>,
    status: Option<Classification>,
}

impl DependencyNode {
    /// Creates a node with no declarations.
    pub fn new(id: PackageId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            declarations: Vec::new(),
            resolved: None,
            effective_range: None,
            enrichment: None,
            status: None,
        }
    }

    pub fn is_project(&self) -> bool {
        self.kind == NodeKind::Project
    }

    /// Returns true if some project declares this package itself.
    pub fn is_direct(&self) -> bool {
        self.declarations.iter().any(Declaration::is_direct)
    }

    /// The range every declaration agrees on, `None` when nothing is versioned.
    pub fn effective_range(&self) -> Option<&VersionRange> {
        self.effective_range.as_ref()
    }

    /// Distinct requirement texts, direct declarations first.
    ///
    /// Returns `None` when no declaration names a version.
    pub fn declared_range(&self) -> Option<String> {
        let mut seen = HashSet::new();
        let mut ordered: Vec<&Declaration> = self.declarations.iter().collect();
        ordered.sort_by_key(|d| !d.is_direct());

        let parts: Vec<&str> = ordered
            .into_iter()
            .map(|d| d.requirement.raw())
            .filter(|raw| !raw.is_empty() && seen.insert(*raw))
            .collect();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }

    /// The most significant kind among the declarations (runtime wins).
    pub fn dependency_kind(&self) -> Option<DependencyKind> {
        self.declarations
            .iter()
            .map(|d| d.kind)
            .min_by_key(|k| match k {
                DependencyKind::Normal => 0,
                DependencyKind::Optional => 1,
                DependencyKind::Peer => 2,
                DependencyKind::Build => 3,
                DependencyKind::Dev => 4,
            })
    }

    pub fn enrichment(&self) -> Option<&Enrichment> {
        self.enrichment.as_ref()
    }

    pub fn status(&self) -> Option<&Classification> {
        self.status.as_ref()
    }

    pub fn is_outdated(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.outdated)
    }

    pub fn is_vulnerable(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.vulnerable)
    }

    /// Returns true if registry data was requested but not obtained.
    pub fn is_unchecked(&self) -> bool {
        self.kind == NodeKind::Package && !matches!(self.enrichment, Some(Enrichment::Known(_)))
    }
}

/// Represents an edge in the dependency graph.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyEdge {
    /// Kind of the declaration that created the edge
    pub kind: DependencyKind,
    /// Requirement text written by the dependent
    pub requirement: String,
}

impl DependencyEdge {
    pub fn new(kind: DependencyKind, requirement: impl Into<String>) -> Self {
        Self {
            kind,
            requirement: requirement.into(),
        }
    }
}

/// Information about a detected circular dependency cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleInfo {
    /// The packages in the cycle (the last connects back to the first)
    pub nodes: Vec<PackageId>,
}

impl CycleInfo {
    /// Returns a formatted string representation of the cycle path.
    ///
    /// For example: "npm:a -> npm:b -> npm:a"
    pub fn cycle_path(&self) -> String {
        let Some(first) = self.nodes.first() else {
            return String::new();
        };
        let mut parts: Vec<String> = self.nodes.iter().map(ToString::to_string).collect();
        parts.push(first.to_string());
        parts.join(" -> ")
    }

    /// Returns the number of packages in the cycle.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Why projects could not be put in build order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildOrderError {
    #[error("no project named {0}")]
    UnknownProject(String),

    #[error("projects depend on each other: {}", cycle_paths(.0))]
    Cycle(Vec<CycleInfo>),
}

fn cycle_paths(cycles: &[CycleInfo]) -> String {
    cycles.iter().map(CycleInfo::cycle_path).collect::<Vec<_>>().join("; ")
}

/// A directed graph of projects and packages across ecosystems.
///
/// The graph uses petgraph's `DiGraph` internally with a side map from
/// identity to node index, so each identity has exactly one node.
///
/// # Example
///
/// ```rust
/// use deplens::graph::{DependencyGraph, NodeKind};
/// use deplens::parser::types::{DependencyKind, Ecosystem, PackageId};
///
/// let mut graph = DependencyGraph::new();
/// let app = PackageId::new(Ecosystem::Npm, "my-app");
/// let react = PackageId::new(Ecosystem::Npm, "react");
/// graph.ensure_node(&app, NodeKind::Project);
/// graph.ensure_node(&react, NodeKind::Package);
/// graph.add_edge(&app, &react, DependencyKind::Normal, "^18.2.0");
///
/// assert_eq!(graph.package_count(), 1);
/// assert_eq!(graph.edge_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<DependencyNode, DependencyEdge>,
    node_indices: HashMap<PackageId, NodeIndex>,
}

impl DependencyGraph {
    /// Creates a new empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new graph with pre-allocated capacity.
    pub fn with_capacity(nodes: usize, edges: usize) -> Self {
        Self {
            graph: DiGraph::with_capacity(nodes, edges),
            node_indices: HashMap::with_capacity(nodes),
        }
    }

    /// Builds the unified graph from parsed manifests.
    ///
    /// Manifests are folded in path order, so the result does not depend on
    /// the order the parsers finished in.
    ///
    /// # Arguments
    ///
    /// * `manifests` - Output of the manifest parsers
    ///
    /// # Returns
    ///
    /// The graph and the integrity warnings raised while merging
    /// declarations and lock data (conflicting locks, empty range
    /// intersections, resolved versions outside their declared range).
    pub fn from_manifests(mut manifests: Vec<ParsedManifest>) -> (Self, Vec<Warning>) {
        manifests.sort_by(|a, b| a.path.cmp(&b.path));
        let declared: usize = manifests.iter().map(|m| m.declarations.len()).sum();
        let mut graph = Self::with_capacity(declared + manifests.len(), declared);
        let mut warnings = Vec::new();

        for manifest in manifests {
            graph.ensure_node(&manifest.project, NodeKind::Project);
            warnings.extend(manifest.warnings);

            for declaration in manifest.declarations {
                let from = declaration.dependent.clone().unwrap_or_else(|| manifest.project.clone());
                graph.ensure_node(&from, NodeKind::Package);
                let to = graph.ensure_node(&declaration.package, NodeKind::Package);
                graph.add_edge(
                    &from,
                    &declaration.package,
                    declaration.kind,
                    declaration.requirement.raw(),
                );
                graph.graph[to].declarations.push(declaration);
            }

            for locked in manifest.locked {
                let idx = graph.ensure_node(&locked.package, NodeKind::Package);
                if let Some(warning) = graph.set_resolved(idx, locked.version) {
                    warnings.push(warning);
                }
            }
        }

        warnings.extend(graph.resolve_ranges());
        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            warnings = warnings.len(),
            "built dependency graph"
        );
        (graph, warnings)
    }

    /// Returns the node for `id`, creating it if needed.
    ///
    /// A package node later declared as a project becomes a project.
    pub fn ensure_node(&mut self, id: &PackageId, kind: NodeKind) -> NodeIndex {
        if let Some(&idx) = self.node_indices.get(id) {
            if kind == NodeKind::Project {
                self.graph[idx].kind = NodeKind::Project;
            }
            return idx;
        }
        let idx = self.graph.add_node(DependencyNode::new(id.clone(), kind));
        self.node_indices.insert(id.clone(), idx);
        idx
    }

    /// Adds an edge between two existing nodes, collapsing duplicates.
    ///
    /// # Returns
    ///
    /// `true` if a new edge was added, `false` if either node is missing
    /// or the edge already existed.
    pub fn add_edge(&mut self, from: &PackageId, to: &PackageId, kind: DependencyKind, requirement: &str) -> bool {
        let (Some(&from_idx), Some(&to_idx)) = (self.node_indices.get(from), self.node_indices.get(to)) else {
            return false;
        };
        if self.graph.find_edge(from_idx, to_idx).is_some() {
            return false;
        }
        self.graph.add_edge(from_idx, to_idx, DependencyEdge::new(kind, requirement));
        true
    }

    /// Records a lock file version; on disagreement the higher version wins.
    fn set_resolved(&mut self, idx: NodeIndex, version: String) -> Option<Warning> {
        let node = &mut self.graph[idx];
        let Some(existing) = node.resolved.clone() else {
            node.resolved = Some(version);
            return None;
        };
        if existing == version {
            return None;
        }
        let keep = match crate::version::compare(node.id.ecosystem, &version, &existing) {
            Comparison::Greater => version.clone(),
            Comparison::Incomparable => existing.clone().max(version.clone()),
            _ => existing.clone(),
        };
        node.resolved = Some(keep.clone());
        Some(Warning::Integrity {
            package: Some(node.id.to_string()),
            message: format!("lock files disagree ({} vs {}), using {}", existing, version, keep),
        })
    }

    /// Computes each node's effective range and checks resolved versions against it.
    fn resolve_ranges(&mut self) -> Vec<Warning> {
        let mut warnings = Vec::new();

        for node in self.graph.node_weights_mut() {
            let mut effective: Option<VersionRange> = None;
            // requirements met by a nested install do not constrain the hoisted copy
            let constraining = node.declarations.iter().filter(|d| !d.nested);
            for range in constraining.filter_map(|d| d.requirement.range()) {
                effective = Some(match effective {
                    None => range.clone(),
                    Some(current) => current.intersect(range),
                });
            }

            if effective.as_ref().is_some_and(VersionRange::is_empty) {
                warnings.push(Warning::Integrity {
                    package: Some(node.id.to_string()),
                    message: format!(
                        "declared ranges have no version in common: {}",
                        node.declared_range().unwrap_or_default()
                    ),
                });
            }

            if let (Some(range), Some(resolved)) = (&effective, &node.resolved) {
                match Version::parse(node.id.ecosystem, resolved) {
                    Ok(version) if !range.is_empty() && !range.contains(&version) => {
                        warnings.push(Warning::Integrity {
                            package: Some(node.id.to_string()),
                            message: format!("resolved version {} is outside declared range {}", resolved, range),
                        });
                    }
                    Ok(_) => {}
                    Err(e) => warnings.push(Warning::Integrity {
                        package: Some(node.id.to_string()),
                        message: format!("resolved version is not comparable: {}", e),
                    }),
                }
            }
            node.effective_range = effective;
        }
        warnings
    }

    /// Gets a node by identity.
    pub fn node(&self, id: &PackageId) -> Option<&DependencyNode> {
        self.node_indices.get(id).map(|&idx| &self.graph[idx])
    }

    pub fn contains(&self, id: &PackageId) -> bool {
        self.node_indices.contains_key(id)
    }

    /// All nodes, sorted by identity.
    pub fn nodes(&self) -> Vec<&DependencyNode> {
        let mut nodes: Vec<&DependencyNode> = self.graph.node_weights().collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Package nodes (projects excluded), sorted by identity.
    pub fn packages(&self) -> Vec<&DependencyNode> {
        self.nodes().into_iter().filter(|n| !n.is_project()).collect()
    }

    /// All edges as `(dependent, dependency, edge)`, sorted by endpoints.
    pub fn edges(&self) -> Vec<(&PackageId, &PackageId, &DependencyEdge)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| (&self.graph[e.source()].id, &self.graph[e.target()].id, e.weight()))
            .collect();
        edges.sort_by(|a, b| a.0.cmp(b.0).then_with(|| a.1.cmp(b.1)));
        edges
    }

    /// Rendering roots: projects, then packages nobody depends on.
    pub fn roots(&self) -> Vec<&DependencyNode> {
        let mut roots: Vec<&DependencyNode> = self
            .graph
            .node_indices()
            .filter(|&idx| {
                self.graph[idx].is_project()
                    || self.graph.neighbors_directed(idx, Direction::Incoming).next().is_none()
            })
            .map(|idx| &self.graph[idx])
            .collect();
        roots.sort_by(|a, b| match (a.is_project(), b.is_project()) {
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            _ => a.id.cmp(&b.id),
        });
        roots
    }

    /// Gets the packages a node depends on (outgoing edges), sorted by identity.
    pub fn direct_dependencies(&self, id: &PackageId) -> Vec<&DependencyNode> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Gets the nodes that depend on a node (incoming edges), sorted by identity.
    pub fn direct_dependents(&self, id: &PackageId) -> Vec<&DependencyNode> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: &PackageId, direction: Direction) -> Vec<&DependencyNode> {
        let Some(&idx) = self.node_indices.get(id) else {
            return Vec::new();
        };
        let unique: BTreeSet<NodeIndex> = self.graph.neighbors_directed(idx, direction).collect();
        let mut nodes: Vec<&DependencyNode> = unique.into_iter().map(|i| &self.graph[i]).collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    /// Every node reachable from `id`, each at most once, in breadth-first order.
    ///
    /// The start node is only included if it lies on a cycle back to itself.
    ///
    /// # Example
    ///
    /// ```rust
    /// use deplens::graph::{DependencyGraph, NodeKind};
    /// use deplens::parser::types::{DependencyKind, Ecosystem, PackageId};
    ///
    /// let mut graph = DependencyGraph::new();
    /// let a = PackageId::new(Ecosystem::Npm, "a");
    /// let b = PackageId::new(Ecosystem::Npm, "b");
    /// graph.ensure_node(&a, NodeKind::Package);
    /// graph.ensure_node(&b, NodeKind::Package);
    /// graph.add_edge(&a, &b, DependencyKind::Normal, "*");
    /// graph.add_edge(&b, &a, DependencyKind::Normal, "*");
    ///
    /// assert_eq!(graph.transitive_dependencies(&a).len(), 2);
    /// ```
    pub fn transitive_dependencies(&self, id: &PackageId) -> Vec<&DependencyNode> {
        self.reachable(id, Direction::Outgoing)
    }

    /// Every node from which `id` is reachable, each at most once.
    pub fn transitive_dependents(&self, id: &PackageId) -> Vec<&DependencyNode> {
        self.reachable(id, Direction::Incoming)
    }

    fn reachable(&self, id: &PackageId, direction: Direction) -> Vec<&DependencyNode> {
        let Some(&start) = self.node_indices.get(id) else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([start]);

        while let Some(idx) = queue.pop_front() {
            let mut next: Vec<NodeIndex> = self.graph.neighbors_directed(idx, direction).collect();
            next.sort_by(|a, b| self.graph[*a].id.cmp(&self.graph[*b].id));
            for neighbor in next {
                if seen.insert(neighbor) {
                    order.push(&self.graph[neighbor]);
                    queue.push_back(neighbor);
                }
            }
        }
        order
    }

    /// Detects every cycle using Tarjan's strongly connected components.
    ///
    /// A component is a cycle if it has more than one node, or if its single
    /// node has a self-loop.
    pub fn detect_cycles(&self) -> Vec<CycleInfo> {
        let mut cycles: Vec<CycleInfo> = tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                let mut nodes: Vec<PackageId> = scc.iter().map(|&idx| self.graph[idx].id.clone()).collect();
                nodes.sort();
                CycleInfo { nodes }
            })
            .collect();
        cycles.sort_by(|a, b| a.nodes.cmp(&b.nodes));
        cycles
    }

    /// Returns the set of identities that are part of any cycle.
    pub fn nodes_in_cycles(&self) -> HashSet<PackageId> {
        self.detect_cycles().into_iter().flat_map(|c| c.nodes).collect()
    }

    /// A copy holding only project nodes and the edges between them.
    ///
    /// Projects depend on each other when one declares another's identity,
    /// as with npm workspaces or Cargo path dependencies.
    pub fn projects_only(&self) -> DependencyGraph {
        let projects: Vec<&DependencyNode> = self.nodes().into_iter().filter(|n| n.is_project()).collect();
        let mut view = DependencyGraph::with_capacity(projects.len(), projects.len());
        for node in projects {
            let idx = view.graph.add_node(node.clone());
            view.node_indices.insert(node.id.clone(), idx);
        }
        for edge in self.graph.edge_references() {
            let (from, to) = (&self.graph[edge.source()], &self.graph[edge.target()]);
            if from.is_project() && to.is_project() {
                view.add_edge(&from.id, &to.id, edge.weight().kind, &edge.weight().requirement);
            }
        }
        view
    }

    /// Orders projects so every project comes after the projects it depends on.
    ///
    /// With a `target`, only the target and the projects it needs (directly
    /// or through other projects) are ordered. Ties are broken by identity.
    ///
    /// # Errors
    ///
    /// [`BuildOrderError::UnknownProject`] if `target` is not a project node,
    /// and [`BuildOrderError::Cycle`] if the projects to order depend on each
    /// other in a loop.
    pub fn build_order(&self, target: Option<&PackageId>) -> Result<Vec<&DependencyNode>, BuildOrderError> {
        let included: HashSet<NodeIndex> = match target {
            Some(id) => {
                let start = self
                    .node_indices
                    .get(id)
                    .copied()
                    .filter(|&idx| self.graph[idx].is_project())
                    .ok_or_else(|| BuildOrderError::UnknownProject(id.to_string()))?;
                let mut seen = HashSet::from([start]);
                let mut queue = VecDeque::from([start]);
                while let Some(idx) = queue.pop_front() {
                    for next in self.project_neighbors(idx, Direction::Outgoing) {
                        if seen.insert(next) {
                            queue.push_back(next);
                        }
                    }
                }
                seen
            }
            None => self
                .graph
                .node_indices()
                .filter(|&idx| self.graph[idx].is_project())
                .collect(),
        };

        // number of dependencies each project still waits for
        let mut waiting: HashMap<NodeIndex, usize> = included
            .iter()
            .map(|&idx| {
                let count = self
                    .project_neighbors(idx, Direction::Outgoing)
                    .into_iter()
                    .filter(|dep| included.contains(dep))
                    .count();
                (idx, count)
            })
            .collect();
        let mut ready: BTreeMap<&PackageId, NodeIndex> = waiting
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(&idx, _)| (&self.graph[idx].id, idx))
            .collect();

        let mut order = Vec::with_capacity(included.len());
        while let Some((_, idx)) = ready.pop_first() {
            order.push(&self.graph[idx]);
            for dependent in self.project_neighbors(idx, Direction::Incoming) {
                let Some(count) = waiting.get_mut(&dependent) else {
                    continue;
                };
                *count -= 1;
                if *count == 0 {
                    ready.insert(&self.graph[dependent].id, dependent);
                }
            }
        }

        if order.len() < included.len() {
            let cycles: Vec<CycleInfo> = self
                .projects_only()
                .detect_cycles()
                .into_iter()
                .filter(|cycle| cycle.nodes.iter().all(|id| included.contains(&self.node_indices[id])))
                .collect();
            return Err(BuildOrderError::Cycle(cycles));
        }
        Ok(order)
    }

    fn project_neighbors(&self, idx: NodeIndex, direction: Direction) -> BTreeSet<NodeIndex> {
        self.graph
            .neighbors_directed(idx, direction)
            .filter(|&n| self.graph[n].is_project())
            .collect()
    }

    /// Direct runtime declarations of `ecosystem` whose package name is not in `used`.
    ///
    /// Only `normal` and `optional` declarations count; dev, build and peer
    /// dependencies are legitimately absent from shipped imports.
    pub fn unused_declarations(&self, ecosystem: Ecosystem, used: &HashSet<String>) -> Vec<&Declaration> {
        let mut unused: Vec<&Declaration> = self
            .graph
            .node_weights()
            .filter(|n| n.id.ecosystem == ecosystem && !n.is_project())
            .flat_map(|n| n.declarations.iter())
            .filter(|d| d.is_direct() && d.kind.is_runtime() && !used.contains(&d.package.name))
            .collect();
        unused.sort_by(|a, b| a.package.cmp(&b.package).then_with(|| a.source.cmp(&b.source)));
        unused.dedup_by(|a, b| a.package == b.package);
        unused
    }

    /// Attaches registry data to a package node.
    ///
    /// # Returns
    ///
    /// `false` if the node does not exist or was already enriched; the
    /// existing enrichment is never overwritten.
    pub fn set_enrichment(&mut self, id: &PackageId, enrichment: Enrichment) -> bool {
        let Some(&idx) = self.node_indices.get(id) else {
            return false;
        };
        let node = &mut self.graph[idx];
        if node.enrichment.is_some() {
            return false;
        }
        node.enrichment = Some(enrichment);
        true
    }

    /// Identities of package nodes that have no enrichment yet.
    pub fn pending_enrichment(&self) -> Vec<PackageId> {
        let mut pending: Vec<PackageId> = self
            .graph
            .node_weights()
            .filter(|n| !n.is_project() && n.enrichment.is_none())
            .map(|n| n.id.clone())
            .collect();
        pending.sort();
        pending
    }

    /// Classifies every enriched package that has no status yet.
    pub fn classify_all(&mut self) -> Vec<Warning> {
        let mut warnings = Vec::new();

        for node in self.graph.node_weights_mut() {
            if node.status.is_some() {
                continue;
            }
            let Some(Enrichment::Known(record)) = &node.enrichment else {
                continue;
            };
            let (status, found) = classify(
                &node.id,
                node.effective_range.as_ref(),
                node.resolved.as_deref(),
                record,
            );
            if let Some(reason) = &record.advisory_error {
                warnings.push(Warning::Registry {
                    package: node.id.to_string(),
                    message: format!("advisories unavailable: {}", reason),
                });
            }
            warnings.extend(found);
            node.status = Some(status);
        }
        warnings
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of package nodes (projects excluded).
    pub fn package_count(&self) -> usize {
        self.graph.node_weights().filter(|n| !n.is_project()).count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}
