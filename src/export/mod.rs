//! Report rendering for enriched dependency graphs.
//!
//! Every format is a pure function of the [`EnrichedGraph`]: nothing is
//! fetched or recomputed here, and output only goes to the caller's writer.
//! Warnings collected during the run are rendered by every format.
//!
//! # Formats
//!
//! - **tree**: indented dependency tree per project root
//! - **dot**: Graphviz digraph
//! - **json**: `{ "nodes", "edges", "warnings" }`
//! - **markdown** and **csv**: update summary tables
//! - **text**: sectioned summary (vulnerable, outdated, could not check, up to date)

pub mod csv;
pub mod dot;
pub mod json;
pub mod markdown;
pub mod summary;
pub mod tree;

use std::io::{self, Write};

use crate::diagnostics::Warning;
use crate::enrich::EnrichedGraph;
use crate::graph::{DependencyGraph, DependencyNode};
use crate::registry::{Advisory, Enrichment};

/// Report format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// Indented tree, one per root
    Tree,
    /// Graphviz DOT
    Dot,
    /// JSON format - machine-readable, full data
    Json,
    /// Markdown format - documentation/reporting
    Markdown,
    /// CSV format - spreadsheet-friendly
    Csv,
    /// Plain-text update summary
    Text,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tree" => Ok(ReportFormat::Tree),
            "dot" | "graphviz" => Ok(ReportFormat::Dot),
            "json" => Ok(ReportFormat::Json),
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "csv" => Ok(ReportFormat::Csv),
            "text" | "txt" => Ok(ReportFormat::Text),
            _ => Err(format!(
                "Unknown report format: '{}'. Valid formats: tree, dot, json, markdown, csv, text",
                s
            )),
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Tree => write!(f, "tree"),
            ReportFormat::Dot => write!(f, "dot"),
            ReportFormat::Json => write!(f, "json"),
            ReportFormat::Markdown => write!(f, "markdown"),
            ReportFormat::Csv => write!(f, "csv"),
            ReportFormat::Text => write!(f, "text"),
        }
    }
}

/// Which packages a tabular report lists.
///
/// `tree` and `dot` always render the whole graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFilter {
    #[default]
    All,
    /// Packages with an update available
    Outdated,
    /// Packages affected by an advisory
    Vulnerable,
}

impl ReportFilter {
    /// Returns true if the package belongs in a report with this filter.
    pub fn matches(&self, node: &DependencyNode) -> bool {
        if node.is_project() {
            return false;
        }
        match self {
            ReportFilter::All => true,
            ReportFilter::Outdated => node.is_outdated(),
            ReportFilter::Vulnerable => node.is_vulnerable(),
        }
    }
}

impl std::str::FromStr for ReportFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(ReportFilter::All),
            "outdated" | "updates" => Ok(ReportFilter::Outdated),
            "vulnerable" | "vulnerabilities" => Ok(ReportFilter::Vulnerable),
            _ => Err(format!(
                "Unknown filter: '{}'. Valid filters: all, outdated, vulnerable",
                s
            )),
        }
    }
}

impl std::fmt::Display for ReportFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFilter::All => write!(f, "all"),
            ReportFilter::Outdated => write!(f, "outdated"),
            ReportFilter::Vulnerable => write!(f, "vulnerable"),
        }
    }
}

/// Data container for export operations.
#[derive(Debug, Clone, Copy)]
pub struct ExportData<'a> {
    pub graph: &'a DependencyGraph,
    pub warnings: &'a [Warning],
    pub filter: ReportFilter,
}

impl<'a> ExportData<'a> {
    pub fn new(enriched: &'a EnrichedGraph, filter: ReportFilter) -> Self {
        Self {
            graph: &enriched.graph,
            warnings: &enriched.warnings,
            filter,
        }
    }

    /// Packages selected by the filter, sorted by identity.
    pub fn packages(&self) -> Vec<&'a DependencyNode> {
        self.graph
            .packages()
            .into_iter()
            .filter(|n| self.filter.matches(n))
            .collect()
    }

    pub fn outdated_count(&self) -> usize {
        self.graph.packages().iter().filter(|n| n.is_outdated()).count()
    }

    pub fn vulnerable_count(&self) -> usize {
        self.graph.packages().iter().filter(|n| n.is_vulnerable()).count()
    }

    /// Packages with no registry data or no advisory data.
    pub fn unchecked_count(&self) -> usize {
        self.graph.packages().iter().filter(|n| check_gap(n).is_some()).count()
    }
}

/// Trait for exporters.
pub trait Exporter {
    /// Export the data to the given writer.
    fn export<W: Write>(&self, data: &ExportData, writer: &mut W) -> io::Result<()>;
}

/// Renders an enriched graph in the requested format.
///
/// # Example
///
/// ```
/// use deplens::enrich::EnrichedGraph;
/// use deplens::export::{render_to_string, ReportFilter, ReportFormat};
/// use deplens::graph::DependencyGraph;
///
/// let report = EnrichedGraph::unenriched(DependencyGraph::new(), Vec::new());
/// let json = render_to_string(&report, ReportFormat::Json, ReportFilter::All).unwrap();
/// assert!(json.contains("\"nodes\""));
/// ```
pub fn render<W: Write>(
    enriched: &EnrichedGraph,
    format: ReportFormat,
    filter: ReportFilter,
    writer: &mut W,
) -> io::Result<()> {
    let data = ExportData::new(enriched, filter);
    match format {
        ReportFormat::Tree => tree::TreeExporter.export(&data, writer),
        ReportFormat::Dot => dot::DotExporter.export(&data, writer),
        ReportFormat::Json => json::JsonExporter.export(&data, writer),
        ReportFormat::Markdown => markdown::MarkdownExporter.export(&data, writer),
        ReportFormat::Csv => csv::CsvExporter.export(&data, writer),
        ReportFormat::Text => summary::SummaryExporter.export(&data, writer),
    }
}

/// Renders to a string.
pub fn render_to_string(enriched: &EnrichedGraph, format: ReportFormat, filter: ReportFilter) -> io::Result<String> {
    let mut buffer = Vec::new();
    render(enriched, format, filter, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Version the project uses: the resolved one, else the candidate picked
/// during classification.
pub(crate) fn current_version(node: &DependencyNode) -> Option<&str> {
    node.resolved
        .as_deref()
        .or_else(|| node.status().and_then(|s| s.candidate.as_deref()))
}

pub(crate) fn latest_version(node: &DependencyNode) -> Option<&str> {
    node.status()
        .and_then(|s| s.latest.as_deref())
        .or_else(|| node.enrichment().and_then(Enrichment::record).and_then(|r| r.latest.as_deref()))
}

/// Why a package's check is incomplete, if it is.
///
/// Covers both missing registry data and missing advisory data, so "no
/// advisories found" is never confused with "advisories not fetched".
pub(crate) fn check_gap(node: &DependencyNode) -> Option<String> {
    if node.is_project() {
        return None;
    }
    match node.enrichment() {
        None => Some("not checked".to_string()),
        Some(Enrichment::Known(record)) => match &record.advisory_error {
            Some(e) => Some(format!("advisories unavailable: {}", e)),
            None if !record.advisories_checked => Some("advisories not checked".to_string()),
            None => None,
        },
        Some(other) => Some(format!("{}: {}", other.label(), other.reason().unwrap_or_default())),
    }
}

/// Advisories that matched the package's candidate version.
pub(crate) fn matching_advisories(node: &DependencyNode) -> Vec<&Advisory> {
    let (Some(status), Some(record)) = (node.status(), node.enrichment().and_then(Enrichment::record)) else {
        return Vec::new();
    };
    record
        .advisories
        .iter()
        .filter(|a| status.advisories.contains(&a.id))
        .collect()
}

/// Short status markers for tree and DOT output.
pub(crate) fn badges(node: &DependencyNode) -> Vec<String> {
    let mut badges = Vec::new();
    if node.is_project() {
        return badges;
    }
    if let Some(status) = node.status() {
        if status.vulnerable {
            let severity = status.severity.unwrap_or_default();
            badges.push(format!("vulnerable: {}", severity));
        }
        if status.outdated {
            if let Some(latest) = &status.latest {
                badges.push(format!("outdated → {}", latest));
            }
        }
    }
    match node.enrichment() {
        Some(Enrichment::Unavailable { .. }) => badges.push("unavailable".to_string()),
        Some(Enrichment::Unknown { .. }) => badges.push("unknown".to_string()),
        Some(Enrichment::Known(record)) if record.advisory_error.is_some() => {
            badges.push("advisories unavailable".to_string())
        }
        Some(Enrichment::Known(record)) if !record.advisories_checked => {
            badges.push("advisories not checked".to_string())
        }
        _ => {}
    }
    badges
}

/// "outdated" detail used by the tabular formats.
pub(crate) fn update_note(node: &DependencyNode) -> Option<&'static str> {
    let status = node.status()?;
    if !status.outdated {
        return None;
    }
    Some(match status.latest_in_range {
        Some(true) => "update within range",
        Some(false) => "requires range change",
        None => "update available",
    })
}
