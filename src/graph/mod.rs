//! Graph module for dependency relationship modeling.
//!
//! This module provides the [`DependencyGraph`] struct: one node per package
//! identity across every ecosystem, with edges from dependents to their
//! dependencies, plus the traversal and cycle queries the reports rely on.
//!
//! # Example
//!
//! ```rust
//! use deplens::graph::{DependencyGraph, NodeKind};
//! use deplens::parser::types::{DependencyKind, Ecosystem, PackageId};
//!
//! let mut graph = DependencyGraph::new();
//! let react = PackageId::new(Ecosystem::Npm, "react");
//! let dom = PackageId::new(Ecosystem::Npm, "react-dom");
//! graph.ensure_node(&react, NodeKind::Package);
//! graph.ensure_node(&dom, NodeKind::Package);
//! graph.add_edge(&dom, &react, DependencyKind::Normal, "^18.2.0");
//!
//! assert_eq!(graph.node_count(), 2);
//! assert_eq!(graph.edge_count(), 1);
//! ```

mod dependency_graph;

pub use dependency_graph::{BuildOrderError, CycleInfo, DependencyEdge, DependencyGraph, DependencyNode, NodeKind};
