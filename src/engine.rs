//! Run-level entry points: manifest discovery, graph building and unused
//! dependency detection.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

use crate::analysis::{scan_imports, AnalysisError};
use crate::diagnostics::Warning;
use crate::graph::DependencyGraph;
use crate::parser::types::{Declaration, Ecosystem};
use crate::parser::{parse_manifests, ManifestKind, ParseError};

/// Directories never searched for manifests.
const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    ".git",
    "build",
    "dist",
    ".gradle",
    ".venv",
    "venv",
    "__pycache__",
    ".tox",
    ".idea",
];

/// Fatal errors of a graph build.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No candidate matched a known manifest format.
    #[error("no recognized manifest found among {candidates} candidate file(s)")]
    NoManifests { candidates: usize },

    /// Every recognized manifest failed to parse.
    #[error("all {count} manifest(s) failed to parse; {}: {source}", .path.display())]
    AllFailed {
        count: usize,
        path: PathBuf,
        #[source]
        source: ParseError,
    },
}

/// A built graph and the non-fatal warnings raised while building it.
#[derive(Debug)]
pub struct BuildOutput {
    pub graph: DependencyGraph,
    pub warnings: Vec<Warning>,
    /// Manifests that contributed to the graph, in path order
    pub manifests: Vec<PathBuf>,
}

/// Finds manifest and lock files under `root`, at most `max_depth` levels deep.
///
/// Dependency, build and VCS directories (`node_modules`, `target`, `.git`,
/// ...) are not entered. Results are sorted.
pub fn discover_manifests(root: &Path, max_depth: usize) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !SKIPPED_DIRS.contains(&e.file_name().to_string_lossy().as_ref())
        })
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && ManifestKind::detect(e.path()).is_some())
        .map(|e| e.into_path())
        .collect();
    found.sort();
    tracing::debug!(root = %root.display(), count = found.len(), "discovered manifests");
    found
}

/// Parses the candidate files and builds the unified dependency graph.
///
/// Relative candidates are resolved against `root`. Unrecognized files are
/// ignored; manifests that fail to parse become warnings.
///
/// # Errors
///
/// Fails only when no candidate is a recognized manifest, or when every
/// recognized manifest failed to parse. No partial graph is returned then.
pub fn build_graph(root: &Path, candidates: &[PathBuf]) -> Result<BuildOutput, BuildError> {
    let paths: Vec<PathBuf> = candidates
        .iter()
        .map(|p| if p.is_absolute() { p.clone() } else { root.join(p) })
        .collect();
    let mut outcome = parse_manifests(&paths);

    if outcome.recognized() == 0 {
        return Err(BuildError::NoManifests {
            candidates: candidates.len(),
        });
    }
    if outcome.manifests.is_empty() {
        let count = outcome.failures.len();
        let (path, source) = outcome.failures.remove(0);
        return Err(BuildError::AllFailed { count, path, source });
    }

    let mut warnings = outcome.failure_warnings();
    let manifests: Vec<PathBuf> = outcome.manifests.iter().map(|m| m.path.clone()).collect();
    let (graph, graph_warnings) = DependencyGraph::from_manifests(outcome.manifests);
    warnings.extend(graph_warnings);

    tracing::info!(
        manifests = manifests.len(),
        failed = outcome.failures.len(),
        packages = graph.package_count(),
        edges = graph.edge_count(),
        "built dependency graph"
    );
    Ok(BuildOutput {
        graph,
        warnings,
        manifests,
    })
}

/// npm declarations whose package is never imported by the sources under `root`.
#[derive(Debug, Default)]
pub struct UnusedReport {
    pub declarations: Vec<Declaration>,
    /// Distinct packages imported by the sources
    pub imported: HashSet<String>,
    pub files_scanned: usize,
    pub warnings: Vec<Warning>,
}

/// Scans JavaScript/TypeScript sources and reports unused npm declarations.
///
/// Only runtime declarations (`dependencies`, `optionalDependencies`) are
/// considered; tooling is rarely imported.
pub fn find_unused(graph: &DependencyGraph, root: &Path) -> Result<UnusedReport, AnalysisError> {
    let usage = scan_imports(root)?;
    let imported = usage.names();
    let declarations = graph
        .unused_declarations(Ecosystem::Npm, &imported)
        .into_iter()
        .cloned()
        .collect();
    Ok(UnusedReport {
        declarations,
        imported,
        files_scanned: usage.files_scanned,
        warnings: usage.failure_warnings(),
    })
}
