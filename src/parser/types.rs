//! Shared types for dependency parsing.
//!
//! This module defines the core data structures used to represent
//! declared dependencies across the supported ecosystems. Every manifest
//! parser produces these types, and the graph builder consumes them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::diagnostics::Warning;
use crate::version::Requirement;

use super::ManifestKind;

/// A package-management ecosystem.
///
/// The ecosystem decides how package names are normalized, which version
/// grammar applies, and which registry is asked for metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// Node.js packages (package.json, package-lock.json).
    Npm,
    /// Rust crates (Cargo.toml, Cargo.lock).
    Cargo,
    /// Python distributions (requirements.txt).
    PyPI,
    /// JVM artifacts (Gradle version catalogs, gradle.lockfile).
    Maven,
}

impl Ecosystem {
    /// All supported ecosystems, in display order.
    pub const ALL: [Ecosystem; 4] = [
        Ecosystem::Npm,
        Ecosystem::Cargo,
        Ecosystem::PyPI,
        Ecosystem::Maven,
    ];

    /// Returns the short lowercase label for the ecosystem.
    pub fn label(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Cargo => "cargo",
            Ecosystem::PyPI => "pypi",
            Ecosystem::Maven => "maven",
        }
    }

    /// Returns the ecosystem name used by the OSV advisory database.
    pub fn osv_name(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Cargo => "crates.io",
            Ecosystem::PyPI => "PyPI",
            Ecosystem::Maven => "Maven",
        }
    }

    /// Normalizes a package name according to the ecosystem's rules.
    ///
    /// PyPI names are case-insensitive and treat runs of `-`, `_` and `.`
    /// as equivalent (PEP 503). Other ecosystems keep names verbatim.
    pub fn normalize_name(&self, name: &str) -> String {
        let name = name.trim();
        match self {
            Ecosystem::PyPI => {
                let mut normalized = String::with_capacity(name.len());
                let mut last_was_separator = false;
                for c in name.chars() {
                    if matches!(c, '-' | '_' | '.') {
                        if !last_was_separator {
                            normalized.push('-');
                        }
                        last_was_separator = true;
                    } else {
                        normalized.extend(c.to_lowercase());
                        last_was_separator = false;
                    }
                }
                normalized
            }
            _ => name.to_string(),
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Ecosystem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "npm" | "node" => Ok(Ecosystem::Npm),
            "cargo" | "crates" | "crates.io" | "rust" => Ok(Ecosystem::Cargo),
            "pypi" | "pip" | "python" => Ok(Ecosystem::PyPI),
            "maven" | "gradle" | "jvm" => Ok(Ecosystem::Maven),
            _ => Err(format!(
                "Unknown ecosystem: '{}'. Valid ecosystems: npm, cargo, pypi, maven",
                s
            )),
        }
    }
}

/// Stable identity of a package: ecosystem plus normalized name.
///
/// Two declarations with the same identity refer to the same logical
/// dependency, whatever ranges they ask for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId {
    /// Ecosystem the package belongs to.
    pub ecosystem: Ecosystem,
    /// Normalized package name (`group:artifact` for Maven).
    pub name: String,
}

impl PackageId {
    /// Creates a package identity, normalizing the name for the ecosystem.
    pub fn new(ecosystem: Ecosystem, name: impl AsRef<str>) -> Self {
        Self {
            ecosystem,
            name: ecosystem.normalize_name(name.as_ref()),
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ecosystem, self.name)
    }
}

/// Categorizes the type of dependency relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Runtime dependency.
    #[default]
    Normal,
    /// Development-only dependency (tests, tooling).
    Dev,
    /// Build-time dependency (Cargo build scripts).
    Build,
    /// Peer dependency that the host package must provide.
    Peer,
    /// Optional dependency that enhances functionality if available.
    Optional,
}

impl DependencyKind {
    /// Returns a short label for the dependency kind.
    pub fn label(&self) -> &'static str {
        match self {
            DependencyKind::Normal => "normal",
            DependencyKind::Dev => "dev",
            DependencyKind::Build => "build",
            DependencyKind::Peer => "peer",
            DependencyKind::Optional => "optional",
        }
    }

    /// Returns true if the dependency is expected to be imported by shipped code.
    pub fn is_runtime(&self) -> bool {
        matches!(self, DependencyKind::Normal | DependencyKind::Optional)
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single declared requirement on a package.
///
/// Direct declarations come from a project manifest and have no
/// `dependent`; transitive declarations come from lock files and name the
/// package that requires this one.
#[derive(Debug, Clone)]
pub struct Declaration {
    /// The package being required.
    pub package: PackageId,
    /// The normalized version requirement.
    pub requirement: Requirement,
    /// The category of this dependency.
    pub kind: DependencyKind,
    /// Manifest or lock file the declaration was read from.
    pub source: PathBuf,
    /// The package declaring this requirement, or `None` for the project itself.
    pub dependent: Option<PackageId>,
    /// Set when the lock file installs a separate copy for this dependent,
    /// so the requirement says nothing about the hoisted version.
    pub nested: bool,
}

impl Declaration {
    /// Creates a direct declaration made by the project itself.
    pub fn direct(
        package: PackageId,
        requirement: Requirement,
        kind: DependencyKind,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            package,
            requirement,
            kind,
            source: source.into(),
            dependent: None,
            nested: false,
        }
    }

    /// Creates a transitive declaration made by another package.
    pub fn transitive(
        dependent: PackageId,
        package: PackageId,
        requirement: Requirement,
        kind: DependencyKind,
        source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            package,
            requirement,
            kind,
            source: source.into(),
            dependent: Some(dependent),
            nested: false,
        }
    }

    /// Marks whether the requirement is met by a nested install.
    pub fn with_nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    /// Returns true if the project itself declared this dependency.
    pub fn is_direct(&self) -> bool {
        self.dependent.is_none()
    }
}

impl fmt::Display for Declaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} ({})", self.package, self.requirement, self.kind)
    }
}

/// A version pinned by a lock file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockedPackage {
    /// The locked package.
    pub package: PackageId,
    /// The exact version recorded in the lock file.
    pub version: String,
}

impl LockedPackage {
    /// Creates a new locked package entry.
    pub fn new(package: PackageId, version: impl Into<String>) -> Self {
        Self {
            package,
            version: version.into(),
        }
    }
}

/// Everything extracted from one manifest or lock file.
#[derive(Debug, Clone)]
pub struct ParsedManifest {
    /// Path of the parsed file.
    pub path: PathBuf,
    /// Which parser produced this result.
    pub kind: ManifestKind,
    /// The project that owns this file (root of its direct declarations).
    pub project: PackageId,
    /// Declared dependencies, direct and transitive.
    pub declarations: Vec<Declaration>,
    /// Versions pinned by a lock file.
    pub locked: Vec<LockedPackage>,
    /// Non-fatal problems found while parsing (unparseable ranges, skipped lines).
    pub warnings: Vec<Warning>,
}

impl ParsedManifest {
    /// Creates an empty result for the given file and project.
    pub fn new(path: impl Into<PathBuf>, kind: ManifestKind, project: PackageId) -> Self {
        Self {
            path: path.into(),
            kind,
            project,
            declarations: Vec::new(),
            locked: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Returns the ecosystem of this manifest.
    pub fn ecosystem(&self) -> Ecosystem {
        self.project.ecosystem
    }

    /// Returns the number of direct declarations.
    pub fn direct_count(&self) -> usize {
        self.declarations.iter().filter(|d| d.is_direct()).count()
    }

    /// Parses `raw` as a requirement, recording a warning and keeping an
    /// invalid requirement when it does not parse.
    pub fn requirement(&mut self, package: &PackageId, raw: &str) -> Requirement {
        match Requirement::parse(package.ecosystem, raw) {
            Ok(req) => req,
            Err(e) => {
                self.warnings.push(Warning::Integrity {
                    package: Some(package.to_string()),
                    message: format!("unparseable version requirement in {}: {}", self.path.display(), e),
                });
                Requirement::invalid(raw)
            }
        }
    }
}
